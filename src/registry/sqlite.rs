//! SQLite-backed [`RegistryStore`].
//!
//! The registry runs out of a single database file next to the rest of the
//! dirigent state. Tags and tech stacks are stored as JSON arrays in text
//! columns. All multi-row writes run inside a transaction so a failed
//! publish never leaves a directive without its version row.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::{
    DirectiveRecord, NewDirective, RegistryError, RegistryStore, SearchHit, SearchRequest,
    VersionRecord,
};
use crate::directive::types::SortBy;
use crate::semver;

pub struct SqliteRegistry {
    conn: Mutex<Connection>,
}

impl SqliteRegistry {
    /// Open (or create) the registry database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        super::schema::init_schema(&conn)?;

        info!(path = %path.display(), "registry database initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory registry for tests.
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        super::schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RegistryError> {
        self.conn
            .lock()
            .map_err(|_| RegistryError::Unavailable("registry lock poisoned".into()))
    }
}

const RECORD_COLUMNS: &str = "name, description, category, subcategory, tags, tech_stack, \
     latest_version, content, content_hash, quality_score, download_count, \
     created_at, updated_at";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<DirectiveRecord> {
    Ok(DirectiveRecord {
        name: row.get(0)?,
        description: row.get(1)?,
        category: row.get(2)?,
        subcategory: row.get(3)?,
        tags: decode_list(&row.get::<_, String>(4)?),
        tech_stack: decode_list(&row.get::<_, String>(5)?),
        latest_version: row.get(6)?,
        content: row.get(7)?,
        content_hash: row.get(8)?,
        quality_score: row.get(9)?,
        download_count: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl RegistryStore for SqliteRegistry {
    fn get(
        &self,
        name: &str,
        version_constraint: Option<&str>,
    ) -> Result<DirectiveRecord, RegistryError> {
        let conn = self.lock()?;
        let mut record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM directives WHERE name = ?1"),
                params![name],
                row_to_record,
            )
            .optional()?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let constraint = match version_constraint {
            None | Some("*") | Some("latest") => return Ok(record),
            Some(c) => c,
        };

        // Resolve the highest published version satisfying the constraint
        // and substitute its content into the record.
        let versions = versions_for(&conn, name)?;
        let best = versions
            .into_iter()
            .filter(|v| semver::satisfies(&v.version, constraint))
            .max_by_key(|v| semver::sort_key(&v.version))
            .ok_or_else(|| {
                RegistryError::NotFound(format!("{name} matching '{constraint}'"))
            })?;

        record.latest_version = best.version;
        record.content = best.content;
        record.content_hash = best.content_hash;
        Ok(record)
    }

    fn versions(&self, name: &str) -> Result<Vec<VersionRecord>, RegistryError> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM directives WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        versions_for(&conn, name)
    }

    fn list(&self, category: Option<&str>) -> Result<Vec<DirectiveRecord>, RegistryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM directives \
             WHERE (?1 = '' OR category = ?1) ORDER BY name"
        ))?;
        let records = stmt
            .query_map(params![category.unwrap_or_default()], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, RegistryError> {
        let terms: Vec<String> = request
            .query
            .to_lowercase()
            .split_whitespace()
            .filter(|t| t.len() >= 2)
            .map(str::to_string)
            .collect();
        // A query with no usable terms matches nothing on the registry side.
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;

        // Cheap prefilter in SQL, exact term filtering in Rust. Overfetch so
        // the post-filter still fills the page. Timestamps are RFC 3339, so
        // the date range compares lexicographically.
        let fetch_limit = (request.limit.max(1) * 3) as i64;
        let like = format!("%{}%", terms[0]);

        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM directives \
             WHERE (?1 = '' OR category = ?1) \
               AND (name || ' ' || description) LIKE ?2 \
               AND (?3 = '' OR updated_at >= ?3) \
               AND (?4 = '' OR updated_at <= ?4) \
             ORDER BY download_count DESC LIMIT ?5"
        ))?;
        let category = request.category.clone().unwrap_or_default();
        let date_from = request.date_from.clone().unwrap_or_default();
        let date_to = request.date_to.clone().unwrap_or_default();
        let candidates = stmt
            .query_map(
                params![category, like, date_from, date_to, fetch_limit],
                row_to_record,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .filter_map(|record| {
                let haystack =
                    format!("{} {}", record.name, record.description).to_lowercase();
                // Every term must appear somewhere in name + description.
                if !terms.iter().all(|t| haystack.contains(t)) {
                    return None;
                }
                if !passes_request_filters(&record, request) {
                    return None;
                }
                let compatibility_score =
                    compatibility(&request.tech_stack, &record.tech_stack)?;
                let relevance_score = relevance(&terms, &record);
                Some(SearchHit {
                    record,
                    relevance_score,
                    compatibility_score,
                })
            })
            .collect();

        sort_hits(&mut hits, request.sort_by);
        hits.truncate(request.limit);
        debug!(query = %request.query, hits = hits.len(), "registry search");
        Ok(hits)
    }

    fn create(&self, directive: &NewDirective) -> Result<(), RegistryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let timestamp = now();

        tx.execute(
            "INSERT INTO directives (name, description, category, subcategory, tags, \
             tech_stack, latest_version, content, content_hash, quality_score, \
             download_count, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0.0, 0, ?10, ?10)",
            params![
                directive.name,
                directive.description,
                directive.category,
                directive.subcategory,
                encode_list(&directive.tags),
                encode_list(&directive.tech_stack),
                directive.version,
                directive.content,
                directive.content_hash,
                timestamp,
            ],
        )?;
        insert_version(&tx, directive, &timestamp)?;

        tx.commit()?;
        info!(name = %directive.name, version = %directive.version, "directive created");
        Ok(())
    }

    fn add_version(&self, directive: &NewDirective) -> Result<(), RegistryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let timestamp = now();

        let updated = tx.execute(
            "UPDATE directives SET description = ?2, category = ?3, subcategory = ?4, \
             tags = ?5, tech_stack = ?6, latest_version = ?7, content = ?8, \
             content_hash = ?9, updated_at = ?10 WHERE name = ?1",
            params![
                directive.name,
                directive.description,
                directive.category,
                directive.subcategory,
                encode_list(&directive.tags),
                encode_list(&directive.tech_stack),
                directive.version,
                directive.content,
                directive.content_hash,
                timestamp,
            ],
        )?;
        if updated == 0 {
            return Err(RegistryError::NotFound(directive.name.clone()));
        }

        tx.execute(
            "UPDATE directive_versions SET is_latest = 0 WHERE directive_name = ?1",
            params![directive.name],
        )?;
        insert_version(&tx, directive, &timestamp)?;

        tx.commit()?;
        info!(name = %directive.name, version = %directive.version, "version published");
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, RegistryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM directive_versions WHERE directive_name = ?1",
            params![name],
        )?;
        let deleted = tx.execute("DELETE FROM directives WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn record_download(&self, name: &str) -> Result<(), RegistryError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE directives SET download_count = download_count + 1 WHERE name = ?1",
            params![name],
        )?;
        Ok(())
    }
}

fn versions_for(conn: &Connection, name: &str) -> Result<Vec<VersionRecord>, RegistryError> {
    let mut stmt = conn.prepare(
        "SELECT version, content, content_hash, changelog, is_latest, published_at \
         FROM directive_versions WHERE directive_name = ?1",
    )?;
    let mut versions = stmt
        .query_map(params![name], |row| {
            Ok(VersionRecord {
                version: row.get(0)?,
                content: row.get(1)?,
                content_hash: row.get(2)?,
                changelog: row.get(3)?,
                is_latest: row.get::<_, i64>(4)? != 0,
                published_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    versions.sort_by_key(|v| std::cmp::Reverse(semver::sort_key(&v.version)));
    Ok(versions)
}

fn insert_version(
    tx: &Transaction<'_>,
    directive: &NewDirective,
    timestamp: &str,
) -> Result<(), RegistryError> {
    tx.execute(
        "INSERT INTO directive_versions (directive_name, version, content, content_hash, \
         changelog, is_latest, published_at) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        params![
            directive.name,
            directive.version,
            directive.content,
            directive.content_hash,
            directive.changelog,
            timestamp,
        ],
    )?;
    Ok(())
}

/// Category, subcategory, and tag filters, applied before truncation so a
/// page of filtered-out rows never starves matching results.
fn passes_request_filters(record: &DirectiveRecord, request: &SearchRequest) -> bool {
    if let Some(categories) = &request.categories {
        if !categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&record.category))
        {
            return false;
        }
    }
    if let Some(subcategories) = &request.subcategories {
        match &record.subcategory {
            Some(sub) => {
                if !subcategories.iter().any(|s| s.eq_ignore_ascii_case(sub)) {
                    return false;
                }
            }
            None => return false,
        }
    }
    if let Some(tags) = &request.tags {
        let have: Vec<String> = record.tags.iter().map(|t| t.to_lowercase()).collect();
        if !tags.iter().any(|t| have.contains(&t.to_lowercase())) {
            return false;
        }
    }
    true
}

/// The registry relevance table: exact name 100, all terms in name 80, some
/// terms in name 60 scaled by coverage, all terms in description 40, some
/// 20 scaled, otherwise 0. No category or stack bonuses on this side.
fn relevance(terms: &[String], record: &DirectiveRecord) -> f64 {
    let name_lower = record.name.to_lowercase();
    let normalized = name_lower.replace(['_', '-'], " ");
    let joined = terms.join(" ");
    if normalized == joined || name_lower == joined.replace(' ', "_") {
        return 100.0;
    }

    let total = terms.len() as f64;
    let in_name = terms.iter().filter(|t| name_lower.contains(*t)).count();
    let mut score = if in_name == terms.len() {
        80.0
    } else if in_name > 0 {
        60.0 * in_name as f64 / total
    } else {
        0.0
    };

    let desc_lower = record.description.to_lowercase();
    let in_desc = terms.iter().filter(|t| desc_lower.contains(*t)).count();
    if in_desc == terms.len() {
        score = score.max(40.0);
    } else if in_desc > 0 {
        score = score.max(20.0 * in_desc as f64 / total);
    }
    score
}

/// Exact lowercase stack intersection, as a share of the directive's
/// declared stack. `None` excludes the candidate: a directive that declares
/// a stack sharing nothing with the caller's is not compatible. Directives
/// with no declared stack are universal, as is a caller with no stack.
fn compatibility(wanted: &[String], have: &[String]) -> Option<f64> {
    if wanted.is_empty() || have.is_empty() {
        return Some(1.0);
    }
    let wanted_lower: std::collections::HashSet<String> =
        wanted.iter().map(|s| s.to_lowercase()).collect();
    let overlap = have
        .iter()
        .filter(|h| wanted_lower.contains(&h.to_lowercase()))
        .count();
    if overlap == 0 {
        return None;
    }
    Some(overlap as f64 / have.len().max(1) as f64)
}

fn sort_hits(hits: &mut [SearchHit], sort_by: SortBy) {
    match sort_by {
        SortBy::Score => {
            // Blend: relevance dominates, compatibility breaks near-ties.
            hits.sort_by(|a, b| {
                let ka = 0.7 * a.relevance_score + 0.3 * a.compatibility_score * 100.0;
                let kb = 0.7 * b.relevance_score + 0.3 * b.compatibility_score * 100.0;
                kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        SortBy::SuccessRate => hits.sort_by(|a, b| {
            b.record
                .quality_score
                .partial_cmp(&a.record.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        SortBy::Downloads => {
            hits.sort_by_key(|h| std::cmp::Reverse(h.record.download_count))
        }
        SortBy::Date => hits.sort_by(|a, b| b.record.updated_at.cmp(&a.record.updated_at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_directive(name: &str, version: &str) -> NewDirective {
        NewDirective {
            name: name.to_string(),
            version: version.to_string(),
            description: format!("{name} description"),
            category: "actions".to_string(),
            subcategory: None,
            tags: vec!["test".to_string()],
            tech_stack: vec!["Rust".to_string()],
            content: format!("<directive name=\"{name}\" version=\"{version}\">\n</directive>"),
            content_hash: crate::directive::lockfile::compute_content_hash(name),
            changelog: None,
        }
    }

    fn registry_with(directives: &[(&str, &str)]) -> SqliteRegistry {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        for (name, version) in directives {
            registry.create(&new_directive(name, version)).unwrap();
        }
        registry
    }

    #[test]
    fn create_and_get() {
        let registry = registry_with(&[("deploy", "1.0.0")]);
        let record = registry.get("deploy", None).unwrap();
        assert_eq!(record.latest_version, "1.0.0");
        assert_eq!(record.download_count, 0);
        assert!(matches!(
            registry.get("missing", None),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_create_fails() {
        let registry = registry_with(&[("deploy", "1.0.0")]);
        assert!(registry.create(&new_directive("deploy", "2.0.0")).is_err());
    }

    #[test]
    fn version_constraint_resolution() {
        let registry = registry_with(&[("deploy", "1.0.0")]);
        registry.add_version(&new_directive("deploy", "1.1.0")).unwrap();
        registry.add_version(&new_directive("deploy", "2.0.0")).unwrap();

        let latest = registry.get("deploy", Some("latest")).unwrap();
        assert_eq!(latest.latest_version, "2.0.0");

        let pinned = registry.get("deploy", Some("^1.0.0")).unwrap();
        assert_eq!(pinned.latest_version, "1.1.0");

        assert!(matches!(
            registry.get("deploy", Some("^3.0.0")),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn versions_newest_first_with_latest_flag() {
        let registry = registry_with(&[("deploy", "1.0.0")]);
        registry.add_version(&new_directive("deploy", "1.1.0")).unwrap();

        let versions = registry.versions("deploy").unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version, "1.1.0");
        assert!(versions[0].is_latest);
        assert!(!versions[1].is_latest);
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            limit: 10,
            ..SearchRequest::default()
        }
    }

    #[test]
    fn search_requires_all_terms() {
        let registry = registry_with(&[("jwt_auth", "1.0.0"), ("deploy_k8s", "1.0.0")]);
        let hits = registry.search(&request("jwt auth")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.name, "jwt_auth");
        assert_eq!(hits[0].relevance_score, 100.0);
        assert_eq!(hits[0].compatibility_score, 1.0);
    }

    #[test]
    fn partial_name_relevance_scales_with_coverage() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        let mut d = new_directive("jwt_helper", "1.0.0");
        d.description = "deploy tooling".to_string();
        registry.create(&d).unwrap();

        let hits = registry.search(&request("jwt deploy")).unwrap();
        assert_eq!(hits.len(), 1);
        // One of two terms in the name: 60 * 1/2.
        assert_eq!(hits[0].relevance_score, 30.0);
    }

    #[test]
    fn degenerate_query_matches_nothing() {
        let registry = registry_with(&[("deploy", "1.0.0")]);
        assert!(registry.search(&request("a")).unwrap().is_empty());
        assert!(registry.search(&request("")).unwrap().is_empty());
    }

    #[test]
    fn search_compatibility_is_share_of_directive_stack() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        let mut d = new_directive("deploy", "1.0.0");
        d.tech_stack = vec!["Rust".to_string(), "Kubernetes".to_string()];
        registry.create(&d).unwrap();

        let hits = registry
            .search(&SearchRequest {
                tech_stack: vec!["rust".to_string()],
                ..request("deploy")
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].compatibility_score, 0.5);
    }

    #[test]
    fn search_excludes_disjoint_stacks() {
        // Declared stack: ["Rust"]. No exact overlap rules the row out
        // entirely instead of scoring it low.
        let registry = registry_with(&[("deploy", "1.0.0")]);
        let hits = registry
            .search(&SearchRequest {
                tech_stack: vec!["Vue".to_string()],
                ..request("deploy")
            })
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_category_filter() {
        let registry = registry_with(&[("deploy", "1.0.0")]);
        let hits = registry
            .search(&SearchRequest {
                category: Some("patterns".to_string()),
                ..request("deploy")
            })
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn filters_apply_before_truncation() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        for name in ["task_a", "task_b", "task_c"] {
            registry.create(&new_directive(name, "1.0.0")).unwrap();
        }
        let mut wanted = new_directive("task_d", "1.0.0");
        wanted.category = "patterns".to_string();
        registry.create(&wanted).unwrap();

        // A page-sized prefix of action rows must not crowd out the one
        // row the filter keeps.
        let hits = registry
            .search(&SearchRequest {
                categories: Some(vec!["patterns".to_string()]),
                limit: 2,
                ..request("task")
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.name, "task_d");
    }

    #[test]
    fn delete_cascades_versions() {
        let registry = registry_with(&[("deploy", "1.0.0")]);
        registry.add_version(&new_directive("deploy", "1.1.0")).unwrap();

        assert!(registry.delete("deploy").unwrap());
        assert!(!registry.delete("deploy").unwrap());
        assert!(matches!(
            registry.versions("deploy"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn download_counter() {
        let registry = registry_with(&[("deploy", "1.0.0")]);
        registry.record_download("deploy").unwrap();
        registry.record_download("deploy").unwrap();
        assert_eq!(registry.get("deploy", None).unwrap().download_count, 2);
    }

    #[test]
    fn list_sorted_and_scoped() {
        let registry = registry_with(&[("b_dir", "1.0.0"), ("a_dir", "1.0.0")]);
        let mut other = new_directive("c_dir", "1.0.0");
        other.category = "patterns".to_string();
        registry.create(&other).unwrap();

        let actions = registry.list(Some("actions")).unwrap();
        let names: Vec<&str> = actions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a_dir", "b_dir"]);

        let all = registry.list(None).unwrap();
        assert_eq!(all.len(), 3);
    }
}
