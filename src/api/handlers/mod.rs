//! HTTP handler modules.

pub mod health;
pub mod notifications;
pub mod purge;
pub mod reconciliation;
pub mod refresh;
pub mod refresh_status;
pub mod schedules;
