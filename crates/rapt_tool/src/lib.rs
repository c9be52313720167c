//! rapt Tool Model
//!
//! Typed tool definitions, the decode step for the `Tool` custom resource,
//! and argument binding against a tool's declared parameters.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binder;
pub mod resource;
pub mod schema;
pub mod validate;

pub use binder::{BindError, bind_arguments, undeclared};
pub use resource::ToolResource;
pub use schema::{ArgumentSpec, ToolDefinition};
pub use validate::{ToolError, ToolValidator, ValidationRule};
