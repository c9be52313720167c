//! Argument binding.
//!
//! Caller values are matched against the declared arguments and flattened
//! into a positional list. Output order always follows the declaration, never
//! the caller's map.

use crate::schema::ArgumentSpec;
use std::collections::HashMap;

/// Error binding caller arguments
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// Required argument with neither a caller value nor a default
    #[error("Required argument '{0}' not provided")]
    MissingRequiredArgument(String),
}

/// Bind caller values to declared arguments
///
/// Per argument, in declaration order: the caller value, else the default,
/// else an error if required, else nothing.
///
/// # Errors
///
/// Returns [`BindError::MissingRequiredArgument`] naming the first required
/// argument that cannot be resolved
pub fn bind_arguments(
    specs: &[ArgumentSpec],
    supplied: &HashMap<String, String>,
) -> Result<Vec<String>, BindError> {
    let mut bound = Vec::with_capacity(specs.len());
    for spec in specs {
        if let Some(value) = supplied.get(&spec.name) {
            bound.push(value.clone());
        } else if let Some(default) = &spec.default {
            bound.push(default.clone());
        } else if spec.required {
            return Err(BindError::MissingRequiredArgument(spec.name.clone()));
        }
    }
    Ok(bound)
}

/// Caller-supplied names no argument declares
#[must_use]
pub fn undeclared<'a>(specs: &[ArgumentSpec], supplied: &'a HashMap<String, String>) -> Vec<&'a str> {
    let mut names: Vec<&str> = supplied
        .keys()
        .filter(|k| !specs.iter().any(|s| &s.name == *k))
        .map(String::as_str)
        .collect();
    names.sort_unstable();
    names
}
