//! Domain models.

pub mod coordinate;
pub mod notification;
pub mod project_version;
pub mod refresh_status;
pub mod schedule;
