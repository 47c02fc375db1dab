//! Semantic version parsing and constraint matching.
//!
//! Supports the constraint forms used by directive version pins: exact
//! (`1.2.3`), caret (`^1.2.3`), tilde (`~1.2.3`), and wildcard (`*` or
//! `latest`). Prerelease suffixes are parsed but ignored in comparisons.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static SEMVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-(.+))?$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SemverError {
    #[error("invalid semver: {0}")]
    InvalidVersion(String),
}

/// Parsed semantic version: `(major, minor, patch, prerelease)`.
pub type Parsed = (u64, u64, u64, Option<String>);

/// Parse a `MAJOR.MINOR.PATCH[-prerelease]` string.
pub fn parse(version: &str) -> Result<Parsed, SemverError> {
    let caps = SEMVER_RE
        .captures(version)
        .ok_or_else(|| SemverError::InvalidVersion(version.to_string()))?;
    let num = |i: usize| -> Result<u64, SemverError> {
        caps[i]
            .parse()
            .map_err(|_| SemverError::InvalidVersion(version.to_string()))
    };
    Ok((
        num(1)?,
        num(2)?,
        num(3)?,
        caps.get(4).map(|m| m.as_str().to_string()),
    ))
}

/// Sort key for picking the highest version out of a list. Unparsable
/// versions sort lowest.
pub fn sort_key(version: &str) -> (u64, u64, u64) {
    match parse(version) {
        Ok((major, minor, patch, _)) => (major, minor, patch),
        Err(_) => (0, 0, 0),
    }
}

/// Check whether `version` satisfies `constraint`.
///
/// - `*` / `latest`: always true.
/// - `^X.Y.Z`: same major, version >= constraint. Below 1.0.0 the caret
///   narrows to same minor with patch >= constraint's patch.
/// - `~X.Y.Z`: same major and minor, patch >= constraint's patch.
/// - otherwise: exact `major.minor.patch` equality.
///
/// Any parse failure (of version or constraint) returns `false` rather than
/// erroring — a bad pin should never take down a lookup.
pub fn satisfies(version: &str, constraint: &str) -> bool {
    if constraint == "*" || constraint == "latest" {
        return true;
    }

    let Ok((v_major, v_minor, v_patch, _)) = parse(version) else {
        return false;
    };

    if let Some(rest) = constraint.strip_prefix('^') {
        let Ok((c_major, c_minor, c_patch, _)) = parse(rest) else {
            return false;
        };
        if v_major != c_major {
            return false;
        }
        if v_major == 0 {
            return v_minor == c_minor && v_patch >= c_patch;
        }
        return v_minor > c_minor || (v_minor == c_minor && v_patch >= c_patch);
    }

    if let Some(rest) = constraint.strip_prefix('~') {
        let Ok((c_major, c_minor, c_patch, _)) = parse(rest) else {
            return false;
        };
        return v_major == c_major && v_minor == c_minor && v_patch >= c_patch;
    }

    match parse(constraint) {
        Ok((c_major, c_minor, c_patch, _)) => {
            v_major == c_major && v_minor == c_minor && v_patch == c_patch
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_version() {
        assert_eq!(parse("1.2.3").unwrap(), (1, 2, 3, None));
    }

    #[test]
    fn parse_prerelease() {
        assert_eq!(
            parse("2.0.0-beta.1").unwrap(),
            (2, 0, 0, Some("beta.1".to_string()))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("1.2").is_err());
        assert!(parse("v1.2.3").is_err());
        assert!(parse("1.2.3.4").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn wildcard_always_matches() {
        assert!(satisfies("0.0.1", "*"));
        assert!(satisfies("9.9.9", "latest"));
    }

    #[test]
    fn caret_reflexive() {
        assert!(satisfies("1.2.3", "^1.2.3"));
        assert!(satisfies("0.4.2", "^0.4.2"));
    }

    #[test]
    fn tilde_reflexive() {
        assert!(satisfies("1.2.3", "~1.2.3"));
    }

    #[test]
    fn caret_bounds() {
        assert!(satisfies("1.9.9", "^1.0.0"));
        assert!(!satisfies("2.0.0", "^1.0.0"));
        assert!(!satisfies("1.1.9", "^1.2.0"));
    }

    #[test]
    fn caret_below_one_requires_same_minor() {
        assert!(satisfies("0.2.5", "^0.2.1"));
        assert!(!satisfies("0.3.0", "^0.2.1"));
        assert!(!satisfies("0.2.0", "^0.2.1"));
    }

    #[test]
    fn tilde_bounds() {
        assert!(satisfies("1.2.9", "~1.2.0"));
        assert!(!satisfies("1.3.0", "~1.2.0"));
        assert!(!satisfies("2.2.0", "~1.2.0"));
    }

    #[test]
    fn exact_match_ignores_prerelease() {
        assert!(satisfies("1.0.0-rc.1", "1.0.0"));
        assert!(!satisfies("1.0.1", "1.0.0"));
    }

    #[test]
    fn bad_constraint_is_false_not_error() {
        assert!(!satisfies("1.0.0", "^garbage"));
        assert!(!satisfies("1.0.0", "one.two.three"));
        assert!(!satisfies("garbage", "1.0.0"));
    }

    #[test]
    fn sort_key_orders_versions() {
        let mut versions = vec!["1.0.0", "2.1.0", "1.10.0", "not-a-version"];
        versions.sort_by_key(|v| std::cmp::Reverse(sort_key(v)));
        assert_eq!(versions, vec!["2.1.0", "1.10.0", "1.0.0", "not-a-version"]);
    }
}
