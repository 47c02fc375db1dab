//! MCP `run_directive` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `run_directive` MCP tool.
///
/// Only locally installed directives can be run; registry content must be
/// downloaded first so the user has a chance to review it.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunDirectiveParams {
    /// Name of the directive to run.
    #[schemars(description = "Name of the directive to run, e.g. 'jwt_auth_zustand'")]
    pub name: String,

    /// Optional key/value inputs forwarded to the caller alongside the
    /// directive body.
    #[schemars(description = "Optional key/value inputs for the directive")]
    pub inputs: Option<serde_json::Value>,

    /// Project root for this request. Overrides the server's working
    /// directory as the project tier.
    #[schemars(
        description = "Project root for this request; its directives directory becomes the project tier"
    )]
    pub project_path: Option<String>,
}
