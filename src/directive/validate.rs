//! Structural validation for publish.
//!
//! Checks run against the escaped content and report every violation at
//! once, so an author fixes one round of feedback instead of five.

use crate::directive::parser::{self, DocValue};
use crate::error::DirigentError;
use crate::semver;

/// Reserved for curated content shipped with the tooling; publishes landing
/// here are rerouted to the default category.
const RESERVED_CATEGORY: &str = "core";
const DEFAULT_CATEGORY: &str = "actions";

/// Metadata pulled out of content that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedDirective {
    pub name: String,
    pub version: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub tags: Vec<String>,
    pub tech_stack: Vec<String>,
    /// Content with nested CDATA markers escaped; this is what gets stored.
    pub content: String,
}

/// Validate raw directive content for publication.
pub fn validate_for_publish(
    content: &str,
    max_content_bytes: usize,
) -> Result<ValidatedDirective, DirigentError> {
    if content.len() > max_content_bytes {
        return Err(DirigentError::InvalidInput(format!(
            "content is {} bytes, maximum is {max_content_bytes}",
            content.len()
        )));
    }

    let escaped = parser::escape_nested_cdata(content);
    let Some(parsed) = parser::parse_document(&escaped) else {
        return Err(DirigentError::ValidationFailed(vec![
            "content must contain a well-formed <directive> block".to_string(),
        ]));
    };

    let mut violations = Vec::new();

    let name = parsed.attr("name").unwrap_or_default().to_string();
    if name.is_empty() {
        violations.push("directive tag must declare a name attribute".to_string());
    }

    let version = parsed.attr("version").unwrap_or_default().to_string();
    if version.is_empty() {
        violations.push("directive tag must declare a version attribute".to_string());
    } else if semver::parse(&version).is_err() {
        violations.push(format!(
            "version '{version}' is not valid MAJOR.MINOR.PATCH"
        ));
    }

    if parsed.get("metadata").is_none() {
        violations.push("a metadata section is required".to_string());
    }
    let description = parser::description(&parsed);
    if description.is_empty() {
        violations.push("metadata must include a description".to_string());
    }

    if !has_process_steps(&parsed) && parsed.get("content").is_none() {
        violations.push(
            "a process section with at least one step, or a content section, is required"
                .to_string(),
        );
    }

    if !violations.is_empty() {
        return Err(DirigentError::ValidationFailed(violations));
    }

    let declared = parser::category(&parsed);
    let category = if declared.is_empty() || declared == RESERVED_CATEGORY {
        DEFAULT_CATEGORY.to_string()
    } else {
        declared
    };

    Ok(ValidatedDirective {
        name,
        version,
        description,
        category,
        subcategory: parser::subcategory(&parsed),
        tags: parser::tags(&parsed),
        tech_stack: parser::tech_stack(&parsed),
        content: escaped,
    })
}

fn has_process_steps(parsed: &DocValue) -> bool {
    match parsed.get("process").and_then(|p| p.get("step")) {
        Some(DocValue::List(items)) => !items.is_empty(),
        Some(_) => true,
        None => false,
    }
}
