//! # Repository Layer
//!
//! Repositories encapsulate SeaORM access for cron entries, jobs and
//! executions. Mutations run in their own transaction and report failures
//! as [`crate::error::AdminError`].

pub mod cron_entry;
pub mod execution;
pub mod job;

pub use cron_entry::CronEntryRepository;
pub use execution::ExecutionRepository;
pub use job::JobRepository;
