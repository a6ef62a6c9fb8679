//! Stored project-version metadata and transitive dependency reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::coordinate::ProjectVersionCoordinate;

/// Result of a transitive dependency-closure computation.
///
/// Invalidity is contagious: `valid` is false whenever any direct or
/// indirect dependency is missing from the store or itself reports
/// `valid = false`, and an invalid report always carries an empty set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitiveDependencyReport {
    pub valid: bool,
    pub transitive_dependencies: BTreeSet<ProjectVersionCoordinate>,
}

impl TransitiveDependencyReport {
    /// A valid report carrying the given closure.
    pub fn valid(transitive_dependencies: BTreeSet<ProjectVersionCoordinate>) -> Self {
        Self {
            valid: true,
            transitive_dependencies,
        }
    }

    /// An invalid report. The dependency set is always empty.
    pub fn invalid() -> Self {
        Self {
            valid: false,
            transitive_dependencies: BTreeSet::new(),
        }
    }
}

/// Persisted record for one project-version coordinate.
///
/// Created on the first successful refresh of a version, mutated on every
/// subsequent refresh, and logically deleted (flagged, not row-deleted) on
/// eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProjectVersionData {
    pub coordinate: ProjectVersionCoordinate,
    /// Ordered sequence of direct dependencies.
    pub direct_dependencies: Vec<ProjectVersionCoordinate>,
    /// Marked invalid/excluded: skipped as a closure subject, but still
    /// resolvable when depended upon.
    pub excluded: bool,
    /// Soft-deleted by an eviction workflow.
    pub evicted: bool,
    /// Flagged as deprecated; still served, never refreshed by sweeps.
    pub deprecated: bool,
    pub transitive_report: Option<TransitiveDependencyReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoreProjectVersionData {
    /// A fresh record for a coordinate with the given direct dependencies.
    pub fn new(
        coordinate: ProjectVersionCoordinate,
        direct_dependencies: Vec<ProjectVersionCoordinate>,
    ) -> Self {
        let now = Utc::now();
        Self {
            coordinate,
            direct_dependencies,
            excluded: false,
            evicted: false,
            deprecated: false,
            transitive_report: None,
            created_at: now,
            updated_at: now,
        }
    }
}
