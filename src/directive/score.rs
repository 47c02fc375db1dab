//! Keyword relevance scoring for local directives.
//!
//! Deliberately simple term matching over name, description, category, and
//! tech stack. Scores land on a 0-100 scale so local and registry results
//! merge onto one axis.

/// Score a directive against a free-text query.
///
/// Terms are the lowercased query words of at least two characters. Name
/// matching treats `_` and `-` as spaces, so the query "jwt auth zustand"
/// hits the directive named `jwt_auth_zustand` exactly.
pub fn score_directive(
    query: &str,
    name: &str,
    description: &str,
    category: &str,
    tech_stack: &[String],
) -> f64 {
    let terms: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.len() >= 2)
        .map(str::to_string)
        .collect();

    let name_lower = name.to_lowercase();
    let desc_lower = description.to_lowercase();

    if terms.is_empty() {
        return fallback_score(&query.to_lowercase(), &name_lower, &desc_lower);
    }

    // Exact match compares the space-joined surviving terms, so extra
    // whitespace or dropped one-char words never spoil it.
    let normalized_name = name_lower.replace(['_', '-'], " ");
    let joined_terms = terms.join(" ");
    if name_lower == joined_terms || normalized_name == joined_terms {
        return 100.0;
    }

    let mut score: f64 = 0.0;
    let total = terms.len() as f64;

    let in_name = terms.iter().filter(|t| name_lower.contains(*t) || normalized_name.contains(*t)).count();
    if in_name == terms.len() {
        score = 80.0;
    } else if in_name > 0 {
        score = 60.0 * in_name as f64 / total;
    }

    let in_desc = terms.iter().filter(|t| desc_lower.contains(*t)).count();
    if in_desc == terms.len() {
        score = score.max(40.0);
    } else if in_desc > 0 {
        score = score.max(20.0 * in_desc as f64 / total);
    }

    let category_lower = category.to_lowercase();
    let in_category = terms.iter().filter(|t| category_lower.contains(*t)).count();
    if in_category > 0 {
        score += 15.0 * in_category as f64 / total;
    }

    let stack_lower: Vec<String> = tech_stack.iter().map(|s| s.to_lowercase()).collect();
    let in_stack = terms
        .iter()
        .filter(|t| stack_lower.iter().any(|s| s.contains(*t)))
        .count();
    if in_stack > 0 {
        score += 10.0 * (in_stack as f64 / total).min(1.0);
    }

    score.min(100.0)
}

/// Degenerate queries (empty, or only one-character words) fall back to raw
/// substring checks. An empty query is a substring of every name, so it
/// matches everything at the name tier; callers gate empty queries upstream.
fn fallback_score(query_lower: &str, name_lower: &str, desc_lower: &str) -> f64 {
    if query_lower == name_lower {
        100.0
    } else if name_lower.contains(query_lower) {
        70.0
    } else if !desc_lower.is_empty() && desc_lower.contains(query_lower) {
        40.0
    } else {
        0.0
    }
}
