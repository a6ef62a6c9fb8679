//! Transitive dependency-closure computation.
//!
//! Pure, recursive and memoized. Version graphs exhibit heavy
//! diamond-dependency reuse, so a coordinate's report is computed at most
//! once per memo table; without that the traversal is exponential.

use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

use crate::models::coordinate::ProjectVersionCoordinate;
use crate::models::project_version::TransitiveDependencyReport;
use crate::store::DependencyMap;

/// Memo table shared across one sweep.
pub type ReportMemo = HashMap<ProjectVersionCoordinate, TransitiveDependencyReport>;

/// Unexpected traversal failure. Aborts the computation for the subject
/// coordinate only; callers catch at the per-coordinate boundary so one bad
/// coordinate does not abort a fleet-wide sweep.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("dependency cycle detected at {0}")]
    Cycle(ProjectVersionCoordinate),
}

/// Compute the transitive closure report for one coordinate.
///
/// A dependency absent from the map fails the whole computation for the
/// subject: the result is `{valid: false, deps: {}}`, and that invalidity
/// propagates to every ancestor. Duplicates across diamond dependencies
/// collapse into the set.
pub fn compute_transitive_closure(
    coordinate: &ProjectVersionCoordinate,
    dependencies: &DependencyMap,
    memo: &mut ReportMemo,
) -> Result<TransitiveDependencyReport, ResolveError> {
    let mut visiting = HashSet::new();
    resolve(coordinate, dependencies, memo, &mut visiting)
}

fn resolve(
    coordinate: &ProjectVersionCoordinate,
    dependencies: &DependencyMap,
    memo: &mut ReportMemo,
    visiting: &mut HashSet<ProjectVersionCoordinate>,
) -> Result<TransitiveDependencyReport, ResolveError> {
    if let Some(report) = memo.get(coordinate) {
        return Ok(report.clone());
    }
    if !visiting.insert(coordinate.clone()) {
        return Err(ResolveError::Cycle(coordinate.clone()));
    }

    let report = match dependencies.get(coordinate) {
        // Subject not known to the store at all.
        None => TransitiveDependencyReport::invalid(),
        Some(direct) => {
            let mut closure = BTreeSet::new();
            let mut valid = true;
            for dep in direct {
                if !dependencies.contains_key(dep) {
                    // Missing dependency fails the whole computation for
                    // this subject, not just the one edge.
                    valid = false;
                    break;
                }
                let nested = resolve(dep, dependencies, memo, visiting)?;
                if !nested.valid {
                    valid = false;
                    break;
                }
                closure.insert(dep.clone());
                closure.extend(nested.transitive_dependencies);
            }
            if valid {
                TransitiveDependencyReport::valid(closure)
            } else {
                TransitiveDependencyReport::invalid()
            }
        }
    };

    visiting.remove(coordinate);
    memo.insert(coordinate.clone(), report.clone());
    Ok(report)
}

/// Resolve reports for every non-excluded coordinate in the map, sharing
/// one memo table.
///
/// Excluded coordinates are skipped as subjects but stay resolvable as
/// dependencies. A per-coordinate failure is logged and skipped.
pub fn compute_all(
    dependencies: &DependencyMap,
    excluded: &HashSet<ProjectVersionCoordinate>,
) -> HashMap<ProjectVersionCoordinate, TransitiveDependencyReport> {
    let mut memo = ReportMemo::new();
    let mut reports = HashMap::new();
    for coordinate in dependencies.keys() {
        if excluded.contains(coordinate) {
            continue;
        }
        match compute_transitive_closure(coordinate, dependencies, &mut memo) {
            Ok(report) => {
                reports.insert(coordinate.clone(), report);
            }
            Err(e) => {
                tracing::warn!(coordinate = %coordinate, "Skipping closure computation: {e}");
            }
        }
    }
    reports
}
