//! Tool custom resource wire format.
//!
//! `tools.rapt.dev/v1alpha1` objects arrive as untyped JSON. They are decoded
//! here exactly once into a [`ToolDefinition`].

use crate::schema::{ArgumentSpec, ToolDefinition};
use crate::validate::{ToolError, ToolValidator};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

/// API group of the tool resource
pub const GROUP: &str = "rapt.dev";
/// API version of the tool resource
pub const VERSION: &str = "v1alpha1";
/// Kind of the tool resource
pub const KIND: &str = "Tool";
/// Plural resource name
pub const PLURAL: &str = "tools";

/// A fetched tool object before decoding
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResource {
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
    /// Creation timestamp
    pub created: Option<DateTime<Utc>>,
    /// Everything except `apiVersion`, `kind` and `metadata`
    pub data: serde_json::Value,
}

impl ToolResource {
    /// Decode into a typed definition
    ///
    /// # Errors
    ///
    /// Returns error if `spec`, `spec.jobTemplate` or the image is missing,
    /// or if the declared arguments are inconsistent
    pub fn decode(&self) -> Result<ToolDefinition, ToolError> {
        let raw = self
            .data
            .get("spec")
            .ok_or_else(|| ToolError::MissingField {
                tool: self.name.clone(),
                field: "spec".to_string(),
            })?;
        let spec: WireSpec =
            serde_json::from_value(raw.clone()).map_err(|e| ToolError::Decode {
                tool: self.name.clone(),
                reason: e.to_string(),
            })?;

        let template = spec.job_template.ok_or_else(|| ToolError::MissingField {
            tool: self.name.clone(),
            field: "spec.jobTemplate".to_string(),
        })?;
        let image = template
            .image
            .filter(|i| !i.is_empty())
            .ok_or_else(|| ToolError::MissingField {
                tool: self.name.clone(),
                field: "spec.jobTemplate.image".to_string(),
            })?;

        let env: IndexMap<String, String> = template
            .env
            .into_iter()
            .filter(|e| !e.name.is_empty())
            .map(|e| (e.name, e.value))
            .collect();

        let arguments = spec
            .arguments
            .into_iter()
            .filter(|a| !a.name.is_empty())
            .map(|a| ArgumentSpec {
                name: a.name,
                description: a.description,
                required: a.required,
                default: a.default.filter(|d| !d.is_empty()),
            })
            .collect();

        let definition = ToolDefinition {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            image,
            command: template.command.filter(|c| !c.is_empty()),
            env,
            arguments,
            help: spec.help.filter(|h| !h.is_empty()),
            created: self.created,
        };

        ToolValidator::new().validate(&definition)?;
        Ok(definition)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSpec {
    #[serde(default)]
    help: Option<String>,
    #[serde(default)]
    job_template: Option<WireJobTemplate>,
    #[serde(default)]
    arguments: Vec<WireArgument>,
}

#[derive(Debug, Default, Deserialize)]
struct WireJobTemplate {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    command: Option<Vec<String>>,
    #[serde(default)]
    env: Vec<WireEnvVar>,
}

#[derive(Debug, Deserialize)]
struct WireEnvVar {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct WireArgument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<String>,
}
