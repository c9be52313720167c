//! Typed tool definitions.
//!
//! Everything past the fetch boundary works on these values; the untyped
//! custom-resource document is only touched by [`crate::resource`].

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A registered tool, as stored in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Namespace the tool is registered in
    pub namespace: String,
    /// Container image
    pub image: String,
    /// Base command (`None` = image entrypoint)
    pub command: Option<Vec<String>>,
    /// Base environment, in declaration order
    pub env: IndexMap<String, String>,
    /// Declared arguments, in declaration order
    pub arguments: Vec<ArgumentSpec>,
    /// Help text
    pub help: Option<String>,
    /// Creation time reported by the cluster
    pub created: Option<DateTime<Utc>>,
}

impl ToolDefinition {
    /// Create a new tool definition
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            image: image.into(),
            command: None,
            env: IndexMap::new(),
            arguments: Vec::new(),
            help: None,
            created: None,
        }
    }

    /// Set base command
    #[must_use]
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = Some(command.into_iter().map(Into::into).collect());
        self
    }

    /// Add a base environment variable
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Add an argument
    #[must_use]
    pub fn with_argument(mut self, argument: ArgumentSpec) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Set help text
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Look up a declared argument by name
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// One declared tool argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    /// Argument name, unique within a tool
    pub name: String,
    /// Human description
    pub description: String,
    /// Whether the caller must supply a value
    pub required: bool,
    /// Value used when the caller supplies none
    pub default: Option<String>,
}

impl ArgumentSpec {
    /// Optional argument without a default
    #[must_use]
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            default: None,
        }
    }

    /// Required argument
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            required: true,
            ..Self::optional(name)
        }
    }

    /// Set default value
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
