//! MCP `publish_directive` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `publish_directive` MCP tool.
///
/// Publishing starts from an installed directive: the named file is located
/// in the source tier, validated, and pushed to the registry.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PublishDirectiveParams {
    /// Name of the installed directive to publish.
    #[schemars(description = "Name of the installed directive to publish, e.g. 'jwt_auth'")]
    pub directive: String,

    /// Version being published. Must match the version declared inside the
    /// directive file; a mismatch is rejected.
    #[schemars(
        description = "Version being published. Must match the version attribute declared in the directive file."
    )]
    pub version: String,

    /// Tier holding the file: `"project"` (default) or `"user"`.
    #[schemars(description = "Tier holding the file: 'project' (default) or 'user'")]
    pub source: Option<String>,

    /// Project root for this request. Required when publishing from the
    /// project tier and the server has no project of its own.
    #[schemars(
        description = "Project root for this request; its directives directory becomes the project tier"
    )]
    pub project_path: Option<String>,

    /// Changelog note for this version.
    #[schemars(description = "Changelog note for this version")]
    pub changelog: Option<String>,
}
