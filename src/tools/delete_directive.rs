//! MCP `delete_directive` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `delete_directive` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteDirectiveParams {
    /// Name of the directive to delete.
    #[schemars(description = "Name of the directive to delete")]
    pub name: String,

    /// Which tier to delete from: `"project"`, `"user"` (default),
    /// `"registry"`, or `"all"`.
    #[schemars(
        description = "Tier to delete from: 'project', 'user' (default), 'registry', or 'all'"
    )]
    pub from: Option<String>,

    /// Safety gate; the delete only runs with `confirm: true`.
    #[schemars(description = "Must be true to actually delete. Safety gate against accidental calls.")]
    pub confirm: Option<bool>,

    /// Remove directories left empty by the delete. Defaults to true; the
    /// first-level category folders under a directives root are always kept.
    #[schemars(
        description = "Remove directories left empty by the delete. Defaults to true."
    )]
    pub cleanup_empty_dirs: Option<bool>,

    /// Project root for this request. Overrides the server's working
    /// directory as the project tier.
    #[schemars(
        description = "Project root for this request; its directives directory becomes the project tier"
    )]
    pub project_path: Option<String>,
}
