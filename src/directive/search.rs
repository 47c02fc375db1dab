//! Cross-tier directive search.
//!
//! Fans out to the local tiers and the registry, normalizes everything onto
//! one result shape, applies the post-merge filters uniformly, and sorts by
//! the requested policy with tier priority as the tie-break (project beats
//! user beats registry).

use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::directive::loader::{load_file, DirectiveResolver};
use crate::directive::parser;
use crate::directive::score::score_directive;
use crate::directive::types::{
    DirectiveMatch, SearchFilters, SearchSource, SortBy, Source,
};
use crate::error::DirigentError;
use crate::registry::{RegistryError, SearchRequest};

/// Flat score bonus for local directives whose stack overlaps the caller's.
/// Keeps already-installed content ahead of equivalent registry results.
const LOCAL_STACK_BONUS: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub source: SearchSource,
    pub tech_stack: Vec<String>,
    pub category: Option<String>,
    pub limit: usize,
    pub sort_by: SortBy,
    pub filters: SearchFilters,
}

pub struct SearchOrchestrator {
    resolver: Arc<DirectiveResolver>,
}

impl SearchOrchestrator {
    pub fn new(resolver: Arc<DirectiveResolver>) -> Self {
        Self { resolver }
    }

    pub fn search(&self, params: &SearchParams) -> Result<Vec<DirectiveMatch>, DirigentError> {
        let mut matches: Vec<DirectiveMatch> = Vec::new();

        if params.source.includes_local() {
            matches.extend(self.search_local(params));
        }

        if params.source.includes_registry() {
            match self.search_registry(params) {
                Ok(hits) => matches.extend(hits),
                // Registry trouble degrades to local-only results.
                Err(err) => warn!(error = %err, "registry search failed, returning local results"),
            }
        }

        matches.retain(|m| passes_filters(m, &params.filters));
        sort_matches(&mut matches, params.sort_by);
        matches.truncate(params.limit);
        debug!(query = %params.query, results = matches.len(), "search complete");
        Ok(matches)
    }

    fn search_local(&self, params: &SearchParams) -> Vec<DirectiveMatch> {
        let tiers = [
            (self.resolver.project_dir().map(Path::to_path_buf), Source::Project),
            (Some(self.resolver.user_dir().to_path_buf()), Source::User),
        ];

        let mut matches = Vec::new();
        for (root, source) in tiers {
            let Some(root) = root else { continue };
            for path in markdown_files(&root) {
                let Some(directive) = load_file(&path, source) else {
                    continue;
                };
                let category = parser::category(&directive.parsed);
                if let Some(wanted) = &params.category {
                    if !category.eq_ignore_ascii_case(wanted) {
                        continue;
                    }
                }

                let mut score = score_directive(
                    &params.query,
                    &directive.name,
                    &directive.description,
                    &category,
                    &directive.tech_stack,
                );
                if score <= 0.0 {
                    continue;
                }
                if !params.tech_stack.is_empty()
                    && stacks_overlap(&params.tech_stack, &directive.tech_stack)
                {
                    score += LOCAL_STACK_BONUS;
                }

                let mtime = file_mtime_rfc3339(&path);
                matches.push(DirectiveMatch {
                    name: directive.name.clone(),
                    description: directive.description.clone(),
                    version: directive.version.clone(),
                    source,
                    score,
                    tech_stack: directive.tech_stack.clone(),
                    category,
                    subcategory: parser::subcategory(&directive.parsed),
                    path: Some(path),
                    quality_score: None,
                    download_count: None,
                    created_at: mtime.clone(),
                    updated_at: mtime,
                    tags: parser::tags(&directive.parsed),
                });
            }
        }
        matches
    }

    fn search_registry(&self, params: &SearchParams) -> Result<Vec<DirectiveMatch>, RegistryError> {
        let Some(registry) = self.resolver.registry() else {
            return Ok(Vec::new());
        };
        let hits = registry.search(&SearchRequest {
            query: params.query.clone(),
            tech_stack: params.tech_stack.clone(),
            category: params.category.clone(),
            categories: params.filters.categories.clone(),
            subcategories: params.filters.subcategories.clone(),
            tags: params.filters.tags.clone(),
            date_from: params.filters.date_from.clone(),
            date_to: params.filters.date_to.clone(),
            limit: params.limit,
            sort_by: params.sort_by,
        })?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                // Registry hits land on the merged axis as compatibility on
                // the 0-100 scale; the store's relevance blend only orders
                // its own page.
                let score = hit.compatibility_score * 100.0;
                DirectiveMatch {
                    name: hit.record.name,
                    description: hit.record.description,
                    version: hit.record.latest_version,
                    source: Source::Registry,
                    score,
                    tech_stack: hit.record.tech_stack,
                    category: hit.record.category,
                    subcategory: hit.record.subcategory,
                    path: None,
                    quality_score: Some(hit.record.quality_score),
                    download_count: Some(hit.record.download_count),
                    created_at: Some(hit.record.created_at),
                    updated_at: Some(hit.record.updated_at),
                    tags: hit.record.tags,
                }
            })
            .collect())
    }
}

fn markdown_files(root: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    collect_markdown(root, &mut files);
    files
}

fn collect_markdown(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_markdown(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "md") {
            out.push(path);
        }
    }
}

fn stacks_overlap(wanted: &[String], have: &[String]) -> bool {
    wanted.iter().any(|w| {
        let w = w.to_lowercase();
        have.iter().any(|h| {
            let h = h.to_lowercase();
            h.contains(&w) || w.contains(&h)
        })
    })
}

fn file_mtime_rfc3339(path: &Path) -> Option<String> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).to_rfc3339())
}

/// Parse the timestamps that show up in practice: RFC 3339 (with `Z` or an
/// explicit offset) and bare dates.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0)?,
        Utc,
    ))
}

fn passes_filters(m: &DirectiveMatch, filters: &SearchFilters) -> bool {
    if let Some(categories) = &filters.categories {
        if !categories.iter().any(|c| c.eq_ignore_ascii_case(&m.category)) {
            return false;
        }
    }
    if let Some(subcategories) = &filters.subcategories {
        match &m.subcategory {
            Some(sub) => {
                if !subcategories.iter().any(|s| s.eq_ignore_ascii_case(sub)) {
                    return false;
                }
            }
            None => return false,
        }
    }
    if let Some(tags) = &filters.tags {
        let have: Vec<String> = m.tags.iter().map(|t| t.to_lowercase()).collect();
        if !tags.iter().any(|t| have.contains(&t.to_lowercase())) {
            return false;
        }
    }
    if let Some(stack) = &filters.tech_stack {
        if !stacks_overlap(stack, &m.tech_stack) {
            return false;
        }
    }

    if filters.date_from.is_some() || filters.date_to.is_some() {
        // Range filters need a date to compare; dateless candidates drop out,
        // but an unparsable date passes rather than silently hiding results.
        let Some(raw) = m.updated_at.as_deref().or(m.created_at.as_deref()) else {
            return false;
        };
        let Some(date) = parse_date(raw) else {
            return true;
        };
        if let Some(from) = filters.date_from.as_deref().and_then(parse_date) {
            if date < from {
                return false;
            }
        }
        if let Some(to) = filters.date_to.as_deref().and_then(parse_date) {
            if date > to {
                return false;
            }
        }
    }
    true
}

fn sort_matches(matches: &mut [DirectiveMatch], sort_by: SortBy) {
    matches.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::Score => b.score.partial_cmp(&a.score),
            SortBy::SuccessRate => b
                .quality_score
                .unwrap_or(0.0)
                .partial_cmp(&a.quality_score.unwrap_or(0.0)),
            SortBy::Downloads => {
                Some(b.download_count.unwrap_or(0).cmp(&a.download_count.unwrap_or(0)))
            }
            SortBy::Date => Some(compare_dates(b, a)),
        };
        ordering
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source.priority().cmp(&b.source.priority()))
    });
}

/// Date ordering key; unparsable or missing dates sort last.
fn compare_dates(a: &DirectiveMatch, b: &DirectiveMatch) -> std::cmp::Ordering {
    let key = |m: &DirectiveMatch| {
        m.updated_at
            .as_deref()
            .or(m.created_at.as_deref())
            .and_then(parse_date)
    };
    match (key(a), key(b)) {
        (Some(da), Some(db)) => da.cmp(&db),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(name: &str, source: Source, score: f64) -> DirectiveMatch {
        DirectiveMatch {
            name: name.to_string(),
            description: String::new(),
            version: "1.0.0".to_string(),
            source,
            score,
            tech_stack: vec![],
            category: "actions".to_string(),
            subcategory: None,
            path: None,
            quality_score: None,
            download_count: None,
            created_at: None,
            updated_at: None,
            tags: vec![],
        }
    }

    #[test]
    fn score_sort_with_priority_tiebreak() {
        let mut matches = vec![
            m("reg", Source::Registry, 80.0),
            m("proj", Source::Project, 80.0),
            m("user", Source::User, 90.0),
        ];
        sort_matches(&mut matches, SortBy::Score);
        let names: Vec<&str> = matches.iter().map(|x| x.name.as_str()).collect();
        assert_eq!(names, vec!["user", "proj", "reg"]);
    }

    #[test]
    fn date_sort_puts_dateless_last() {
        let mut with_date = m("dated", Source::Registry, 10.0);
        with_date.updated_at = Some("2026-02-01T00:00:00Z".to_string());
        let mut older = m("older", Source::Registry, 10.0);
        older.updated_at = Some("2025-01-01T00:00:00Z".to_string());
        let dateless = m("dateless", Source::Project, 10.0);

        let mut matches = vec![dateless, older, with_date];
        sort_matches(&mut matches, SortBy::Date);
        let names: Vec<&str> = matches.iter().map(|x| x.name.as_str()).collect();
        assert_eq!(names, vec!["dated", "older", "dateless"]);
    }

    #[test]
    fn date_filter_drops_dateless_but_passes_unparsable() {
        let filters = SearchFilters {
            date_from: Some("2026-01-01".to_string()),
            ..SearchFilters::default()
        };

        let dateless = m("dateless", Source::Project, 10.0);
        assert!(!passes_filters(&dateless, &filters));

        let mut garbled = m("garbled", Source::Registry, 10.0);
        garbled.updated_at = Some("last tuesday".to_string());
        assert!(passes_filters(&garbled, &filters));

        let mut old = m("old", Source::Registry, 10.0);
        old.updated_at = Some("2024-06-01T00:00:00Z".to_string());
        assert!(!passes_filters(&old, &filters));

        let mut fresh = m("fresh", Source::Registry, 10.0);
        fresh.updated_at = Some("2026-06-01T00:00:00Z".to_string());
        assert!(passes_filters(&fresh, &filters));
    }

    #[test]
    fn tag_and_category_filters() {
        let mut candidate = m("x", Source::User, 10.0);
        candidate.tags = vec!["Auth".to_string()];

        let by_tag = SearchFilters {
            tags: Some(vec!["auth".to_string()]),
            ..SearchFilters::default()
        };
        assert!(passes_filters(&candidate, &by_tag));

        let wrong_category = SearchFilters {
            categories: Some(vec!["patterns".to_string()]),
            ..SearchFilters::default()
        };
        assert!(!passes_filters(&candidate, &wrong_category));
    }

    #[test]
    fn subcategory_filter_requires_value() {
        let filters = SearchFilters {
            subcategories: Some(vec!["auth".to_string()]),
            ..SearchFilters::default()
        };
        let none = m("none", Source::User, 10.0);
        assert!(!passes_filters(&none, &filters));

        let mut tagged = m("tagged", Source::User, 10.0);
        tagged.subcategory = Some("Auth".to_string());
        assert!(passes_filters(&tagged, &filters));
    }

    #[test]
    fn stack_overlap_is_substring_both_ways() {
        assert!(stacks_overlap(
            &["react".to_string()],
            &["React 18+".to_string()]
        ));
        assert!(stacks_overlap(
            &["React 18+".to_string()],
            &["react".to_string()]
        ));
        assert!(!stacks_overlap(
            &["vue".to_string()],
            &["React 18+".to_string()]
        ));
    }
}
