//! Cron entry seeding
//!
//! Registers the cron definitions listed in a JSON file. Entries that already
//! exist are left untouched so an operator's toggle survives restarts.

use anyhow::{Context, Result};
use sea_orm::DatabaseConnection;
use std::path::Path;

use crate::repositories::CronEntryRepository;
use crate::repositories::cron_entry::CronEntryDefinition;

/// Summary of a seeding run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse a JSON array of cron definitions.
pub fn parse_cron_entries(raw: &str) -> Result<Vec<CronEntryDefinition>> {
    let definitions: Vec<CronEntryDefinition> =
        serde_json::from_str(raw).context("cron entries file must be a JSON array")?;

    let mut seen = std::collections::HashSet::new();
    for definition in &definitions {
        if definition.key.trim().is_empty() {
            anyhow::bail!("cron entry with empty key");
        }
        if !seen.insert(definition.key.trim()) {
            anyhow::bail!("duplicate cron entry key '{}'", definition.key);
        }
    }
    Ok(definitions)
}

/// Register every definition from `path`.
pub async fn seed_cron_entries_from_file(
    db: &DatabaseConnection,
    path: &Path,
) -> Result<SeedReport> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read cron entries file {}", path.display()))?;
    let definitions = parse_cron_entries(&raw)
        .with_context(|| format!("invalid cron entries file {}", path.display()))?;
    seed_cron_entries(db, definitions).await
}

pub async fn seed_cron_entries(
    db: &DatabaseConnection,
    definitions: Vec<CronEntryDefinition>,
) -> Result<SeedReport> {
    let repo = CronEntryRepository::new(db.clone());
    let mut report = SeedReport::default();

    for definition in definitions {
        let key = definition.key.clone();
        match repo.register(definition).await {
            Ok(true) => {
                log::info!("Registered cron entry: {}", key);
                report.inserted += 1;
            }
            Ok(false) => {
                log::info!("Cron entry '{}' already exists, skipping", key);
                report.skipped += 1;
            }
            Err(e) => {
                log::error!("Failed to register cron entry '{}': {}", key, e);
                return Err(e.into());
            }
        }
    }

    log::info!(
        "Cron entry seeding completed ({} inserted, {} skipped)",
        report.inserted,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_enabled_to_true() {
        let definitions = parse_cron_entries(
            r#"[{"key":"example","schedule":"*/5 * * * *","job_class":"ExampleJob"}]"#,
        )
        .unwrap();

        assert_eq!(definitions.len(), 1);
        assert!(definitions[0].enabled);
        assert!(definitions[0].arguments.is_none());
    }

    #[test]
    fn test_parse_rejects_duplicate_keys() {
        let err = parse_cron_entries(
            r#"[
                {"key":"a","schedule":"@daily","job_class":"A"},
                {"key":"a","schedule":"@hourly","job_class":"B"}
            ]"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_cron_entries(r#"{"key":"a"}"#).is_err());
    }
}
