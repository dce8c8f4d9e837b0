//! # Jobdesk Library
//!
//! Administrative control plane for a background-job engine: the cron entry
//! registry, the job state machine, operator actions on jobs and executions,
//! and the HTTP surface exposing them.

pub mod admin;
pub mod auth;
pub mod config;
pub mod cursor;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod status;
pub mod telemetry;
pub use migration;
