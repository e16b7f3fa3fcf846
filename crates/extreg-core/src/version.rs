//! Version constraint parsing and checking.
//!
//! Constraints are a list of comparators that must all match. Comparators are
//! separated by commas or whitespace:
//!
//! - Exact: `1.2.3`, `=1.2.3`, `==1.2.3`
//! - Comparison: `>=1.0.0`, `>1.0.0`, `<=2.0.0`, `<2.0.0`, `!=1.4.0`
//! - Caret: `^1.2.3` (same as `>=1.2.3 <2.0.0`)
//! - Tilde: `~1.2.3` (same as `>=1.2.3 <1.3.0`)
//! - Wildcard: `*`
//!
//! Partial versions such as `1.2` are read with a zero patch component.
//!
//! # Examples
//!
//! ```
//! use extreg_core::version::{VersionConstraint, satisfies};
//! use semver::Version;
//!
//! let constraint = VersionConstraint::parse("^2.1.0").unwrap();
//! assert!(constraint.matches(&Version::new(2, 4, 0)));
//! assert!(!constraint.matches(&Version::new(3, 0, 0)));
//!
//! assert!(satisfies(&Version::new(1, 5, 0), ">=1.0.0, <2.0.0").unwrap());
//! assert!(satisfies(&Version::new(1, 5, 0), ">=banana").is_err());
//! ```

use semver::Version;

use crate::error::ConstraintError;

/// Check whether `version` satisfies the textual `constraint`.
///
/// A malformed constraint is an error, never a match.
pub fn satisfies(version: &Version, constraint: &str) -> Result<bool, ConstraintError> {
    Ok(VersionConstraint::parse(constraint)?.matches(version))
}

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `=` or `==`
    Eq,
    /// `!=`
    Ne,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone)]
struct Specifier {
    op: CompareOp,
    version: Version,
}

impl Specifier {
    fn new(op: CompareOp, version: Version) -> Self {
        Self { op, version }
    }

    fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
        }
    }
}

/// A parsed version constraint that can be checked against concrete versions.
///
/// All specifiers must match. An empty specifier list (from `*`) matches
/// every version.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    specifiers: Vec<Specifier>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    /// Parse a version constraint string.
    pub fn parse(constraint: &str) -> Result<Self, ConstraintError> {
        let raw = constraint.trim().to_string();
        if raw.is_empty() {
            return Err(ConstraintError::Empty);
        }

        let mut specifiers = Vec::new();
        let mut saw_wildcard = false;

        for token in tokenize(&raw) {
            if token == "*" {
                saw_wildcard = true;
                continue;
            }
            specifiers.extend(parse_comparator(&token)?);
        }

        if specifiers.is_empty() && !saw_wildcard {
            return Err(ConstraintError::Empty);
        }

        Ok(Self { specifiers, raw })
    }

    /// Check if a version satisfies this constraint.
    pub fn matches(&self, version: &Version) -> bool {
        self.specifiers.iter().all(|spec| spec.matches(version))
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn matches_str(&self, version: &str) -> bool {
        match normalize_version(version) {
            Ok(v) => self.matches(&v),
            Err(_) => false,
        }
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for VersionConstraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split a constraint into comparator tokens.
///
/// An operator separated from its version by whitespace (`>= 1.0.0`) is
/// glued back onto the version.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;

    for piece in s.split(|c: char| c == ',' || c.is_whitespace()) {
        if piece.is_empty() {
            continue;
        }
        if is_bare_operator(piece) {
            pending_op = Some(piece);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{op}{piece}")),
            None => tokens.push(piece.to_string()),
        }
    }

    // A dangling operator is kept so that parsing reports it.
    if let Some(op) = pending_op {
        tokens.push(op.to_string());
    }

    tokens
}

fn is_bare_operator(s: &str) -> bool {
    matches!(s, ">=" | "<=" | ">" | "<" | "=" | "==" | "!=" | "^" | "~")
}

/// Parse one comparator token into one or two specifiers.
fn parse_comparator(token: &str) -> Result<Vec<Specifier>, ConstraintError> {
    if let Some(rest) = token.strip_prefix('^') {
        let base = parse_version(token, rest)?;
        let upper = caret_upper_bound(&base).ok_or_else(|| overflow(token))?;
        return Ok(vec![
            Specifier::new(CompareOp::Lt, upper),
            Specifier::new(CompareOp::Gte, base),
        ]);
    }
    if let Some(rest) = token.strip_prefix('~') {
        let base = parse_version(token, rest)?;
        let minor = base.minor.checked_add(1).ok_or_else(|| overflow(token))?;
        let upper = Version::new(base.major, minor, 0);
        return Ok(vec![
            Specifier::new(CompareOp::Gte, base),
            Specifier::new(CompareOp::Lt, upper),
        ]);
    }

    let (op, version_str) = if let Some(rest) = token.strip_prefix(">=") {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = token.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = token.strip_prefix("==") {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else {
        // Bare version implies ==
        (CompareOp::Eq, token)
    };

    Ok(vec![Specifier::new(op, parse_version(token, version_str)?)])
}

/// First version excluded by a caret range.
///
/// The left-most non-zero component is the one that may not change:
/// `^1.2.3` stops at `2.0.0`, `^0.2.3` at `0.3.0`, `^0.0.3` at `0.0.4`.
/// `None` when that component is already `u64::MAX`.
fn caret_upper_bound(base: &Version) -> Option<Version> {
    if base.major > 0 {
        Some(Version::new(base.major.checked_add(1)?, 0, 0))
    } else if base.minor > 0 {
        Some(Version::new(0, base.minor.checked_add(1)?, 0))
    } else {
        Some(Version::new(0, 0, base.patch.checked_add(1)?))
    }
}

fn overflow(token: &str) -> ConstraintError {
    ConstraintError::Malformed {
        constraint: token.to_string(),
        reason: "version component overflow".to_string(),
    }
}

fn parse_version(token: &str, version_str: &str) -> Result<Version, ConstraintError> {
    let version_str = version_str.trim();
    if version_str.is_empty() {
        return Err(ConstraintError::Malformed {
            constraint: token.to_string(),
            reason: "missing version after operator".to_string(),
        });
    }
    normalize_version(version_str).map_err(|reason| ConstraintError::Malformed {
        constraint: token.to_string(),
        reason,
    })
}

/// Normalize a version string to semver by appending `.0` for missing patch.
///
/// - `"3.12"` -> `"3.12.0"`
/// - `"3.12.1"` -> `"3.12.1"`
/// - `"3"` -> error
fn normalize_version(s: &str) -> Result<Version, String> {
    let s = s.trim();

    // Try direct parse first
    if let Ok(v) = Version::parse(s) {
        return Ok(v);
    }

    // Try appending .0 for major.minor format
    let with_patch = format!("{s}.0");
    Version::parse(&with_patch).map_err(|e| format!("invalid version '{s}': {e}"))
}
