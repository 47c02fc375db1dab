//! Registry tier: shared published directives.
//!
//! [`RegistryStore`] is the seam between the directive engine and whatever
//! backs the registry. The engine only ever sees the trait object, handed in
//! at construction, so tests swap in an in-memory database and a deployment
//! could swap in a remote client without touching resolution logic.

pub mod schema;
pub mod sqlite;

use serde::Serialize;
use thiserror::Error;

pub use sqlite::SqliteRegistry;

use crate::directive::types::SortBy;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not found in registry: {0}")]
    NotFound(String),

    /// Registry not configured or unreachable. Callers degrade to local-only
    /// behavior instead of failing the whole operation.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("registry storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// A published directive, as stored in the registry. `content` is always the
/// latest published version; older versions live in [`VersionRecord`]s.
#[derive(Debug, Clone, Serialize)]
pub struct DirectiveRecord {
    pub name: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub tags: Vec<String>,
    pub tech_stack: Vec<String>,
    pub latest_version: String,
    pub content: String,
    pub content_hash: Option<String>,
    pub quality_score: f64,
    pub download_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// One published version of a directive.
#[derive(Debug, Clone, Serialize)]
pub struct VersionRecord {
    pub version: String,
    pub content: String,
    pub content_hash: Option<String>,
    pub changelog: Option<String>,
    pub is_latest: bool,
    pub published_at: String,
}

/// A server-side search hit with its scoring breakdown.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: DirectiveRecord,
    /// Term-match relevance on a 0-100 scale.
    pub relevance_score: f64,
    /// Tech-stack overlap ratio in `[0, 1]`.
    pub compatibility_score: f64,
}

/// Parameters for a server-side search. Filters apply before the result set
/// is truncated to `limit`, so a page never fills up with rows a filter
/// would discard.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    /// Caller's stack, for compatibility scoring. Empty means "no opinion".
    pub tech_stack: Vec<String>,
    pub category: Option<String>,
    pub categories: Option<Vec<String>>,
    pub subcategories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: usize,
    pub sort_by: SortBy,
}

/// Fields for first-time publication of a directive.
#[derive(Debug, Clone)]
pub struct NewDirective {
    pub name: String,
    pub version: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub tags: Vec<String>,
    pub tech_stack: Vec<String>,
    pub content: String,
    pub content_hash: String,
    pub changelog: Option<String>,
}

/// Storage backend for the registry tier.
///
/// Methods are blocking; async callers run them under
/// `tokio::task::spawn_blocking`.
pub trait RegistryStore: Send + Sync {
    /// Fetch a directive. With a version constraint, resolves the highest
    /// published version satisfying it and returns the record with that
    /// version's content.
    fn get(&self, name: &str, version_constraint: Option<&str>)
        -> Result<DirectiveRecord, RegistryError>;

    /// All published versions, newest first.
    fn versions(&self, name: &str) -> Result<Vec<VersionRecord>, RegistryError>;

    /// Every directive, optionally narrowed to one category. Bulk sync and
    /// update checks walk this.
    fn list(&self, category: Option<&str>) -> Result<Vec<DirectiveRecord>, RegistryError>;

    /// Server-side search with relevance and compatibility scoring.
    fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, RegistryError>;

    /// First publication: directive row plus initial version row, atomically.
    fn create(&self, directive: &NewDirective) -> Result<(), RegistryError>;

    /// Publish a new version of an existing directive and mark it latest.
    fn add_version(&self, directive: &NewDirective) -> Result<(), RegistryError>;

    /// Remove a directive and all its versions. Returns whether it existed.
    fn delete(&self, name: &str) -> Result<bool, RegistryError>;

    /// Bump the download counter after a successful fetch-to-disk.
    fn record_download(&self, name: &str) -> Result<(), RegistryError>;
}
