//! MCP `search_directives` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_directives` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchDirectivesParams {
    /// Free-text query matched against names, descriptions, and metadata.
    #[schemars(description = "Free-text query, e.g. 'jwt auth' or 'deploy kubernetes'")]
    pub query: String,

    /// Where to search: `"local"`, `"registry"`, or `"all"`. Defaults to `"all"`.
    #[schemars(description = "Where to search: 'local', 'registry', or 'all'. Defaults to 'all'.")]
    pub source: Option<String>,

    /// Caller's tech stack, used for compatibility scoring and to boost
    /// already-installed matches.
    #[schemars(description = "Your project's tech stack, e.g. ['React 18', 'TypeScript']")]
    pub tech_stack: Option<Vec<String>>,

    /// Restrict to a single category, e.g. `"patterns"`.
    #[schemars(description = "Restrict results to one category, e.g. 'patterns'")]
    pub category: Option<String>,

    /// Post-merge filter: keep only these categories.
    #[schemars(description = "Filter: keep only results in these categories")]
    pub categories: Option<Vec<String>>,

    /// Post-merge filter: keep only these subcategories.
    #[schemars(description = "Filter: keep only results in these subcategories")]
    pub subcategories: Option<Vec<String>>,

    /// Post-merge filter: require at least one of these tags.
    #[schemars(description = "Filter: require at least one of these tags")]
    pub tags: Option<Vec<String>>,

    /// Only results updated on or after this date (ISO 8601).
    #[schemars(description = "Only results updated on or after this date (ISO 8601)")]
    pub date_from: Option<String>,

    /// Only results updated on or before this date (ISO 8601).
    #[schemars(description = "Only results updated on or before this date (ISO 8601)")]
    pub date_to: Option<String>,

    /// Sort policy: `"score"` (default), `"success_rate"`, `"date"`, `"downloads"`.
    #[schemars(description = "Sort policy: 'score' (default), 'success_rate', 'date', 'downloads'")]
    pub sort_by: Option<String>,

    /// Maximum results. Defaults to 10.
    #[schemars(description = "Maximum number of results. Defaults to 10.")]
    pub limit: Option<usize>,

    /// Project root for this request. Overrides the server's working
    /// directory as the project tier.
    #[schemars(
        description = "Project root for this request; its directives directory becomes the project tier"
    )]
    pub project_path: Option<String>,
}
