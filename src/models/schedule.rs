//! Recurring background job descriptions and single-instance leases.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Description of a recurring background job.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInfo {
    pub name: String,
    pub frequency_secs: u64,
    pub disabled: bool,
    /// When set, a live `ScheduleInstance` lease prevents two processes
    /// from running this job concurrently.
    pub single_instance: bool,
}

/// A live lease record for a named single-instance job.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInstance {
    pub name: String,
    pub expires: DateTime<Utc>,
}

impl ScheduleInstance {
    /// Expired instances are eligible for cleanup and replacement.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires
    }
}
