//! Project-version coordinates and version ordering.

use crate::error::{AppError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// The default mutable snapshot alias tracked for every project.
pub const MASTER_SNAPSHOT: &str = "master-SNAPSHOT";

/// Suffix identifying mutable, repeatedly-republished versions.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// (groupId, artifactId, versionId) triple identifying one published
/// project version. The primary key for almost everything in the depot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectVersionCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version_id: String,
}

impl ProjectVersionCoordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version_id: version_id.into(),
        }
    }

    /// Validate the coordinate syntax. Invalid coordinates are rejected
    /// before any claim attempt, never silently stored.
    pub fn validate(&self) -> Result<()> {
        validate_pair(&self.group_id, &self.artifact_id)?;
        if self.version_id.is_empty() || self.version_id.chars().any(char::is_whitespace) {
            return Err(AppError::InvalidCoordinate(format!(
                "invalid version id '{}'",
                self.version_id
            )));
        }
        Ok(())
    }

    /// Whether this coordinate names a mutable snapshot version.
    pub fn is_snapshot(&self) -> bool {
        self.version_id.ends_with(SNAPSHOT_SUFFIX)
    }
}

impl fmt::Display for ProjectVersionCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version_id)
    }
}

fn coordinate_segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"))
}

/// Validate a groupId/artifactId pair against the coordinate-syntax rule.
pub fn validate_pair(group_id: &str, artifact_id: &str) -> Result<()> {
    let re = coordinate_segment_re();
    if !re.is_match(group_id) {
        return Err(AppError::InvalidCoordinate(format!(
            "invalid group id '{group_id}'"
        )));
    }
    if !re.is_match(artifact_id) {
        return Err(AppError::InvalidCoordinate(format!(
            "invalid artifact id '{artifact_id}'"
        )));
    }
    Ok(())
}

/// Compare two version strings by semantic precedence, not string order.
///
/// Versions are split on `.` and `-`; numeric segments compare numerically
/// (so `1.9.0 < 1.10.0`), mixed segments fall back to string comparison.
/// When one version is a prefix of the other, a trailing numeric segment
/// sorts the longer version after (`1.0 < 1.0.1`) while a trailing
/// qualifier sorts it before (`1.0.0-alpha < 1.0.0`).
pub fn version_precedence(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.split(['.', '-']).map(str::to_string).collect()
    };
    let sa = split(a);
    let sb = split(b);

    for (x, y) in sa.iter().zip(sb.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(nx), Ok(ny)) => nx.cmp(&ny),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    let qualifier = |s: &String| s.parse::<u64>().is_err();
    match sa.len().cmp(&sb.len()) {
        Ordering::Less if qualifier(&sb[sa.len()]) => Ordering::Greater,
        Ordering::Greater if qualifier(&sa[sb.len()]) => Ordering::Less,
        ord => ord,
    }
}
