//! # Admin Operations
//!
//! Operator-initiated mutations: retry, discard, delete an execution and
//! toggle a cron entry. Each runs as one transaction that locks the job row,
//! re-evaluates the precondition on the freshly loaded state, advances the
//! job's `lock_version` conditionally and then applies a conditional write.
//! A writer that lost a race therefore fails instead of double-applying.

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait, sea_query::Expr,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AdminError;
use crate::models::cron_entry;
use crate::models::execution::{self, Column, Entity as Execution};
use crate::repositories::CronEntryRepository;
use crate::repositories::execution::lock_for_update;
use crate::repositories::job::{bump_lock_version, live_executions, load_aggregate};
use crate::status::RetryPolicy;

/// Outcome of deleting an execution
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletedExecution {
    pub execution_id: Uuid,
    pub job_id: Uuid,
    /// `false` when the deleted execution was the job's last one
    pub job_visible: bool,
}

/// Mutation surface used by the HTTP handlers
#[derive(Debug, Clone)]
pub struct AdminService {
    db: DatabaseConnection,
    retry_policy: RetryPolicy,
    discard_message: String,
}

impl AdminService {
    pub fn new(db: DatabaseConnection, retry_policy: RetryPolicy, discard_message: String) -> Self {
        Self {
            db,
            retry_policy,
            discard_message,
        }
    }

    pub fn from_config(db: DatabaseConnection, config: &AppConfig) -> Self {
        Self::new(db, config.retry_policy(), config.discard_message.clone())
    }

    /// Append a fresh queued execution to a job whose head ended in a
    /// retryable terminal state.
    #[instrument(skip(self), fields(operation = "retry"))]
    pub async fn retry(&self, job_id: Uuid) -> Result<execution::Model, AdminError> {
        let result = self.retry_in_txn(job_id).await;
        record("retry", &result);
        let execution = result?;
        info!(
            job_id = %job_id,
            execution_id = %execution.id,
            "Job retried by operator"
        );
        Ok(execution)
    }

    async fn retry_in_txn(&self, job_id: Uuid) -> Result<execution::Model, AdminError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        let aggregate = load_aggregate(&txn, job_id, true)
            .await?
            .ok_or_else(|| AdminError::not_found("job", job_id))?;
        let (Some(status), Some(head)) = (aggregate.status(), aggregate.head()) else {
            return Err(AdminError::not_found("job", job_id));
        };
        if !status.can_retry(self.retry_policy) {
            return Err(AdminError::invalid_state(format!(
                "job {} is {} and cannot be retried",
                job_id, status
            )));
        }

        // Never schedule behind the current head, or the new attempt would not govern the job
        let scheduled_at = now.max(head.scheduled_at);

        bump_lock_version(&txn, &aggregate.job, now).await?;

        let execution = execution::ActiveModel {
            id: Set(Uuid::now_v7()),
            job_id: Set(job_id),
            scheduled_at: Set(scheduled_at),
            performed_at: Set(None),
            finished_at: Set(None),
            error: Set(None),
            created_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(execution)
    }

    /// Terminate a queued or running job by finishing its head execution
    /// with the discard message.
    #[instrument(skip(self), fields(operation = "discard"))]
    pub async fn discard(&self, job_id: Uuid) -> Result<execution::Model, AdminError> {
        let result = self.discard_in_txn(job_id).await;
        record("discard", &result);
        let execution = result?;
        info!(
            job_id = %job_id,
            execution_id = %execution.id,
            "Job discarded by operator"
        );
        Ok(execution)
    }

    async fn discard_in_txn(&self, job_id: Uuid) -> Result<execution::Model, AdminError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        let aggregate = load_aggregate(&txn, job_id, true)
            .await?
            .ok_or_else(|| AdminError::not_found("job", job_id))?;
        let (Some(status), Some(head)) = (aggregate.status(), aggregate.head()) else {
            return Err(AdminError::not_found("job", job_id));
        };
        if !status.can_discard() {
            return Err(AdminError::invalid_state(format!(
                "job {} is {} and cannot be discarded",
                job_id, status
            )));
        }

        bump_lock_version(&txn, &aggregate.job, now).await?;

        // A pending execution is finished without ever running; stamping
        // performed_at keeps finished_at => performed_at.
        let performed_at = head.performed_at.unwrap_or(now);
        let result = Execution::update_many()
            .col_expr(Column::PerformedAt, Expr::value(performed_at))
            .col_expr(Column::FinishedAt, Expr::value(now))
            .col_expr(Column::Error, Expr::value(self.discard_message.clone()))
            .filter(Column::Id.eq(head.id))
            .filter(Column::FinishedAt.is_null())
            .filter(Column::DeletedAt.is_null())
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AdminError::conflict("execution", head.id));
        }

        txn.commit().await?;

        Ok(execution::Model {
            performed_at: Some(performed_at),
            finished_at: Some(now),
            error: Some(self.discard_message.clone()),
            ..head.clone()
        })
    }

    /// Remove one execution from its job's history. The head is recomputed
    /// from what remains; a job left without executions disappears.
    #[instrument(skip(self), fields(operation = "delete_execution"))]
    pub async fn delete_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<DeletedExecution, AdminError> {
        let result = self.delete_in_txn(execution_id).await;
        record("delete_execution", &result);
        let deleted = result?;
        info!(
            execution_id = %execution_id,
            job_id = %deleted.job_id,
            job_visible = deleted.job_visible,
            "Execution deleted by operator"
        );
        Ok(deleted)
    }

    async fn delete_in_txn(&self, execution_id: Uuid) -> Result<DeletedExecution, AdminError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        let (job, _) = lock_for_update(&txn, execution_id).await?;

        bump_lock_version(&txn, &job, now).await?;

        let result = Execution::update_many()
            .col_expr(Column::DeletedAt, Expr::value(now))
            .filter(Column::Id.eq(execution_id))
            .filter(Column::DeletedAt.is_null())
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AdminError::conflict("execution", execution_id));
        }

        let job_visible = !live_executions(&txn, job.id).await?.is_empty();
        txn.commit().await?;

        Ok(DeletedExecution {
            execution_id,
            job_id: job.id,
            job_visible,
        })
    }

    /// Flip a cron entry's `enabled` flag.
    #[instrument(skip(self), fields(operation = "toggle_cron"))]
    pub async fn toggle_cron(&self, key: &str) -> Result<cron_entry::Model, AdminError> {
        let result = CronEntryRepository::new(self.db.clone()).toggle(key).await;
        record("toggle_cron", &result);
        let entry = result?;
        info!(cron_key = %key, enabled = entry.enabled, "Cron entry toggled");
        Ok(entry)
    }
}

fn record<T>(operation: &'static str, result: &Result<T, AdminError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(err) => {
            warn!(operation, outcome = err.kind(), error = %err, "Admin operation rejected");
            err.kind()
        }
    };
    counter!(
        "jobdesk_admin_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}
