//! Core directive type definitions.
//!
//! Defines [`Source`] (the three resolution tiers), [`Directive`] (a loaded
//! document), [`DirectiveMatch`] (a transient search result), and the search
//! parameter types shared by the orchestrator and the MCP tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::directive::parser::DocValue;

/// Provenance tier of a directive. Attached at resolution time, never
/// persisted with the directive itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// `.ai/directives/` in the project tree — highest priority.
    Project,
    /// `~/.dirigent/directives/` — personal, cross-project.
    User,
    /// The remote registry — lowest priority, explicit download required
    /// before execution.
    Registry,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::User => "user",
            Self::Registry => "registry",
        }
    }

    /// Tie-break priority: lower wins. Project beats user beats registry.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Project => 0,
            Self::User => 1,
            Self::Registry => 2,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "user" => Ok(Self::User),
            "registry" => Ok(Self::Registry),
            _ => Err(format!("unknown source: {s}")),
        }
    }
}

/// Which backends a search fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    /// Project + user directories.
    Local,
    /// Remote registry only.
    Registry,
    /// Everything.
    All,
}

impl SearchSource {
    pub fn includes_local(&self) -> bool {
        matches!(self, Self::Local | Self::All)
    }

    pub fn includes_registry(&self) -> bool {
        matches!(self, Self::Registry | Self::All)
    }
}

impl std::str::FromStr for SearchSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "registry" => Ok(Self::Registry),
            "all" => Ok(Self::All),
            _ => Err(format!("unknown search source: {s} (expected 'local', 'registry', or 'all')")),
        }
    }
}

/// Result ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Relevance score, descending.
    #[default]
    Score,
    /// Quality score, descending.
    SuccessRate,
    /// Updated-or-created timestamp, newest first.
    Date,
    /// Download count, descending.
    Downloads,
}

impl SortBy {
    /// Parse leniently: unknown or absent values fall back to `Score`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("success_rate") => Self::SuccessRate,
            Some("date") => Self::Date,
            Some("downloads") => Self::Downloads,
            _ => Self::Score,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::SuccessRate => "success_rate",
            Self::Date => "date",
            Self::Downloads => "downloads",
        }
    }
}

/// A loaded directive with raw content and parsed structure.
#[derive(Debug, Clone)]
pub struct Directive {
    /// Name declared by the content's `name` attribute — authoritative over
    /// the filename.
    pub name: String,
    /// Semantic version string from the `version` attribute.
    pub version: String,
    /// Description from the metadata section.
    pub description: String,
    /// Full raw markdown content.
    pub content: String,
    /// Parsed structured block.
    pub parsed: DocValue,
    /// Tier this directive was resolved from.
    pub source: Source,
    /// Backing file, for local tiers. `None` for registry fetches.
    pub path: Option<PathBuf>,
    /// Tech stack from the context section.
    pub tech_stack: Vec<String>,
}

/// A transient search result. Created fresh per search call, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DirectiveMatch {
    pub name: String,
    pub description: String,
    pub version: String,
    pub source: Source,
    pub score: f64,
    pub tech_stack: Vec<String>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub tags: Vec<String>,
}

/// Post-merge filters applied uniformly across all result origins.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub categories: Option<Vec<String>>,
    pub subcategories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub tech_stack: Option<Vec<String>>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn source_priority_order() {
        assert!(Source::Project.priority() < Source::User.priority());
        assert!(Source::User.priority() < Source::Registry.priority());
    }

    #[test]
    fn source_round_trip() {
        for s in [Source::Project, Source::User, Source::Registry] {
            assert_eq!(Source::from_str(s.as_str()).unwrap(), s);
        }
        assert!(Source::from_str("cloud").is_err());
    }

    #[test]
    fn sort_by_defaults_on_unknown() {
        assert_eq!(SortBy::from_param(None), SortBy::Score);
        assert_eq!(SortBy::from_param(Some("bogus")), SortBy::Score);
        assert_eq!(SortBy::from_param(Some("date")), SortBy::Date);
        assert_eq!(SortBy::from_param(Some("downloads")), SortBy::Downloads);
        assert_eq!(SortBy::from_param(Some("success_rate")), SortBy::SuccessRate);
    }

    #[test]
    fn search_source_routing() {
        assert!(SearchSource::Local.includes_local());
        assert!(!SearchSource::Local.includes_registry());
        assert!(SearchSource::All.includes_local());
        assert!(SearchSource::All.includes_registry());
        assert!(!SearchSource::Registry.includes_local());
    }
}
