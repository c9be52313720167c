//! Parsing of repeated `key=value` flags.

use indexmap::IndexMap;
use std::collections::HashMap;

/// Split `key=value` on the first `=`
///
/// Values may contain `=`; keys may not be empty.
pub fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid format '{}' (expected key=value)", raw))?;
    if key.is_empty() {
        return Err(format!("invalid format '{}' (empty key)", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Collect arguments; a repeated key keeps the last value
pub fn into_args(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    pairs.into_iter().collect()
}

/// Collect environment overrides in command-line order; a repeated key keeps
/// its first position and the last value
pub fn into_env(pairs: Vec<(String, String)>) -> IndexMap<String, String> {
    pairs.into_iter().collect()
}
