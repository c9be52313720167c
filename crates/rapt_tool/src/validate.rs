//! Tool definition validation.
//!
//! Only what argument binding depends on is checked. Anything else about a
//! tool is the cluster's business.

use crate::schema::ToolDefinition;
use std::collections::HashSet;

/// Error in a tool definition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Required field absent from the resource
    #[error("Tool '{tool}' is missing {field}")]
    MissingField {
        /// Tool name
        tool: String,
        /// Dotted path of the field
        field: String,
    },

    /// Resource did not match the expected shape
    #[error("Tool '{tool}' could not be decoded: {reason}")]
    Decode {
        /// Tool name
        tool: String,
        /// Decoder message
        reason: String,
    },

    /// Argument declared twice
    #[error("Tool '{tool}' declares argument '{argument}' more than once")]
    DuplicateArgument {
        /// Tool name
        tool: String,
        /// Argument name
        argument: String,
    },

    /// Required argument with a default value
    #[error("Tool '{tool}' argument '{argument}' is required but has a default")]
    RequiredWithDefault {
        /// Tool name
        tool: String,
        /// Argument name
        argument: String,
    },
}

/// Validation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    /// Argument names must be unique
    UniqueArguments,
    /// Required arguments must not carry a default
    RequiredWithoutDefault,
}

/// Validator for decoded tool definitions
pub struct ToolValidator {
    /// Enabled validation rules
    rules: Vec<ValidationRule>,
}

impl ToolValidator {
    /// Create a new validator with every rule enabled
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: vec![
                ValidationRule::UniqueArguments,
                ValidationRule::RequiredWithoutDefault,
            ],
        }
    }

    /// Create a validator with only specific rules
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<ValidationRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Validate a tool definition
    ///
    /// # Errors
    ///
    /// Returns the first rule violation found, in argument order
    pub fn validate(&self, tool: &ToolDefinition) -> Result<(), ToolError> {
        if self.rules.contains(&ValidationRule::UniqueArguments) {
            Self::validate_unique(tool)?;
        }

        if self.rules.contains(&ValidationRule::RequiredWithoutDefault) {
            Self::validate_required(tool)?;
        }

        Ok(())
    }

    fn validate_unique(tool: &ToolDefinition) -> Result<(), ToolError> {
        let mut seen = HashSet::new();
        for argument in &tool.arguments {
            if !seen.insert(argument.name.as_str()) {
                return Err(ToolError::DuplicateArgument {
                    tool: tool.name.clone(),
                    argument: argument.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_required(tool: &ToolDefinition) -> Result<(), ToolError> {
        match tool
            .arguments
            .iter()
            .find(|a| a.required && a.default.is_some())
        {
            Some(argument) => Err(ToolError::RequiredWithDefault {
                tool: tool.name.clone(),
                argument: argument.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for ToolValidator {
    fn default() -> Self {
        Self::new()
    }
}
