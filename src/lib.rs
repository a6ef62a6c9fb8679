//! Metadata Depot - Library
//!
//! Tracks published project versions and their artifacts, kept in sync with
//! a remote Maven-style repository through claimed refresh units, a
//! prioritized notification queue and recurring reconciliation sweeps.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
