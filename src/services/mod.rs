//! Refresh and reconciliation services.

pub mod dependency_resolver;
pub mod notification_consumer;
pub mod notification_queue;
pub mod purge_service;
pub mod reconciliation_service;
pub mod refresh_orchestrator;
pub mod refresh_status_tracker;
pub mod scheduler;
