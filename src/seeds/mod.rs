//! Database seeding functionality
//!
//! Populates the cron entry registry at startup and through `jobdesk seed`.

pub mod cron_entry;

pub use cron_entry::{SeedReport, seed_cron_entries, seed_cron_entries_from_file};
