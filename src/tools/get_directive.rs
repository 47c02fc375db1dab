//! MCP `get_directive` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for the `get_directive` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetDirectiveParams {
    /// Directive name. Required for every action except `check_updates` and
    /// `update_all`.
    #[schemars(description = "Directive name. Not needed for 'check_updates' or 'update_all'.")]
    pub name: Option<String>,

    /// Version constraint: exact (`1.2.0`), caret (`^1.2.0`), tilde
    /// (`~1.2.0`), or `latest`.
    #[schemars(
        description = "Version constraint: exact ('1.2.0'), caret ('^1.2.0'), tilde ('~1.2.0'), or 'latest'"
    )]
    pub version: Option<String>,

    /// What to do: `"info"` (default), `"download"`, `"versions"`,
    /// `"check_updates"`, or `"update_all"`.
    #[schemars(
        description = "Action: 'info' (default) shows the directive, 'download' installs it, 'versions' lists published versions, 'check_updates' compares installed against the registry, 'update_all' syncs the core set"
    )]
    pub action: Option<String>,

    /// Install destination for `download`: `"project"` or `"user"` (default).
    /// Only user-tier installs are tracked in the lockfile.
    #[schemars(
        description = "Install destination for 'download': 'project' or 'user' (default). Project installs need a project tier, see project_path."
    )]
    pub to: Option<String>,

    /// Subdirectory under the category for `download` placement. Ignored when
    /// the registry record declares its own subcategory.
    #[schemars(
        description = "Optional subdirectory under the category for 'download' placement"
    )]
    pub path: Option<String>,

    /// Name-to-version map for `check_updates`. When given, updates are
    /// judged against this map instead of the lockfile.
    #[schemars(
        description = "For 'check_updates': map of installed directive names to versions. Compared instead of the lockfile when given."
    )]
    pub local_versions: Option<HashMap<String, String>>,

    /// Categories `check_updates` should cover. Defaults to every category.
    #[schemars(
        description = "For 'check_updates': restrict the scan to these categories. Defaults to all."
    )]
    pub categories: Option<Vec<String>>,

    /// Project root for this request. Overrides the server's working
    /// directory as the project tier.
    #[schemars(
        description = "Project root for this request; its directives directory becomes the project tier"
    )]
    pub project_path: Option<String>,
}
