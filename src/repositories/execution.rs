//! # Execution Repository
//!
//! Execution lookups and the worker-facing transitions (`start`, `finish`).
//! Workers follow the same store rules as operators: one transaction per
//! transition, the job row is locked and its `lock_version` bumped, and the
//! execution write is conditional on the state that was validated.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, sea_query::Expr,
};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cursor::{CursorData, encode_cursor};
use crate::error::AdminError;
use crate::models::execution::{self, Column, Entity as Execution};
use crate::models::job::{self, Entity as Job};
use crate::repositories::job::bump_lock_version;
use crate::status::{StateFilter, Status, execution_statuses};

/// Execution as exposed to operators, with its computed status
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExecutionView {
    pub id: Uuid,
    pub job_id: Uuid,
    pub status: Status,
    pub scheduled_at: DateTime<Utc>,
    pub performed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExecutionView {
    pub fn new(execution: &execution::Model, status: Status) -> Self {
        Self {
            id: execution.id,
            job_id: execution.job_id,
            status,
            scheduled_at: execution.scheduled_at.with_timezone(&Utc),
            performed_at: execution.performed_at.map(|t| t.with_timezone(&Utc)),
            finished_at: execution.finished_at.map(|t| t.with_timezone(&Utc)),
            error: execution.error.clone(),
            created_at: execution.created_at.with_timezone(&Utc),
        }
    }
}

/// Execution row enriched with the job it belongs to, for the executions listing
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExecutionListItem {
    #[serde(flatten)]
    pub execution: ExecutionView,
    pub job_class: String,
    pub queue_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionListQuery {
    pub state: StateFilter,
    pub query: Option<String>,
    pub limit: u64,
    pub cursor: Option<CursorData>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExecutionPage {
    pub executions: Vec<ExecutionListItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Repository for execution reads and worker transitions
pub struct ExecutionRepository {
    db: DatabaseConnection,
}

impl ExecutionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Find a live execution by id.
    pub async fn find(&self, execution_id: Uuid) -> Result<execution::Model, AdminError> {
        find_live(&self.db, execution_id, false).await
    }

    /// Mark a queued execution as picked up by a worker.
    pub async fn start(&self, execution_id: Uuid) -> Result<execution::Model, AdminError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        let (job, execution) = lock_for_update(&txn, execution_id).await?;
        if execution.performed_at.is_some() {
            return Err(AdminError::invalid_state(format!(
                "execution {} was already started",
                execution_id
            )));
        }

        bump_lock_version(&txn, &job, now).await?;

        let result = Execution::update_many()
            .col_expr(Column::PerformedAt, Expr::value(now))
            .filter(Column::Id.eq(execution_id))
            .filter(Column::PerformedAt.is_null())
            .filter(Column::DeletedAt.is_null())
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AdminError::conflict("execution", execution_id));
        }

        txn.commit().await?;

        tracing::debug!(execution_id = %execution_id, job_id = %job.id, "Execution started");
        Ok(execution::Model {
            performed_at: Some(now),
            ..execution
        })
    }

    /// Record the outcome of a running execution. `error` set means failure.
    pub async fn finish(
        &self,
        execution_id: Uuid,
        error: Option<String>,
    ) -> Result<execution::Model, AdminError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        let (job, execution) = lock_for_update(&txn, execution_id).await?;
        if execution.performed_at.is_none() {
            return Err(AdminError::invalid_state(format!(
                "execution {} has not been started",
                execution_id
            )));
        }
        if execution.finished_at.is_some() {
            return Err(AdminError::invalid_state(format!(
                "execution {} has already finished",
                execution_id
            )));
        }

        bump_lock_version(&txn, &job, now).await?;

        let result = Execution::update_many()
            .col_expr(Column::FinishedAt, Expr::value(now))
            .col_expr(Column::Error, Expr::value(error.clone()))
            .filter(Column::Id.eq(execution_id))
            .filter(Column::PerformedAt.is_not_null())
            .filter(Column::FinishedAt.is_null())
            .filter(Column::DeletedAt.is_null())
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AdminError::conflict("execution", execution_id));
        }

        txn.commit().await?;

        tracing::debug!(
            execution_id = %execution_id,
            job_id = %job.id,
            failed = error.is_some(),
            "Execution finished"
        );
        Ok(execution::Model {
            finished_at: Some(now),
            error,
            ..execution
        })
    }

    /// List live executions newest first, filtered by execution-level status
    /// and by a case-insensitive match on the owning job.
    pub async fn list(&self, query: ExecutionListQuery) -> Result<ExecutionPage, AdminError> {
        let txn = self.db.begin().await?;
        let limit = query.limit.max(1) as usize;
        let batch_size = (limit as u64 * 2).max(50);
        let needle = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut items: Vec<ExecutionListItem> = Vec::with_capacity(limit + 1);
        let mut position = query.cursor;

        'scan: loop {
            let mut select = Execution::find()
                .filter(Column::DeletedAt.is_null())
                .order_by_desc(Column::CreatedAt)
                .order_by_desc(Column::Id)
                .limit(batch_size);
            if let Some(after) = position {
                select = select.filter(keyset_before(after));
            }
            let batch = select.all(&txn).await?;
            if batch.is_empty() {
                break;
            }
            let exhausted = (batch.len() as u64) < batch_size;

            let job_ids: Vec<Uuid> = batch.iter().map(|e| e.job_id).collect();
            let jobs: HashMap<Uuid, job::Model> = Job::find()
                .filter(job::Column::Id.is_in(job_ids.clone()))
                .all(&txn)
                .await?
                .into_iter()
                .map(|job| (job.id, job))
                .collect();
            let mut siblings: HashMap<Uuid, Vec<execution::Model>> = HashMap::new();
            for sibling in Execution::find()
                .filter(Column::JobId.is_in(job_ids))
                .filter(Column::DeletedAt.is_null())
                .all(&txn)
                .await?
            {
                siblings.entry(sibling.job_id).or_default().push(sibling);
            }

            for candidate in batch {
                position = Some(CursorData {
                    created_at: candidate.created_at.with_timezone(&Utc),
                    id: candidate.id,
                });
                let Some(job) = jobs.get(&candidate.job_id) else {
                    continue;
                };
                let family = siblings.get(&candidate.job_id).map(Vec::as_slice).unwrap_or(&[]);
                let status = family
                    .iter()
                    .zip(execution_statuses(family))
                    .find(|(e, _)| e.id == candidate.id)
                    .map(|(_, status)| status);
                let Some(status) = status else {
                    continue;
                };
                if !query.state.matches(status) {
                    continue;
                }
                if let Some(needle) = &needle {
                    if !job_matches(job, needle) {
                        continue;
                    }
                }
                items.push(ExecutionListItem {
                    execution: ExecutionView::new(&candidate, status),
                    job_class: job.job_class.clone(),
                    queue_name: job.queue_name.clone(),
                });
                if items.len() > limit {
                    break 'scan;
                }
            }

            if exhausted {
                break;
            }
        }

        txn.commit().await?;

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items
                .last()
                .map(|item| encode_cursor(&item.execution.created_at, &item.execution.id))
        } else {
            None
        };

        Ok(ExecutionPage {
            executions: items,
            next_cursor,
        })
    }
}

/// Case-insensitive substring match over the job class and serialized arguments.
pub(crate) fn job_matches(job: &job::Model, needle_lower: &str) -> bool {
    job.job_class.to_lowercase().contains(needle_lower)
        || job
            .arguments
            .to_string()
            .to_lowercase()
            .contains(needle_lower)
}

/// Rows strictly after `cursor` in `created_at DESC, id DESC` order.
fn keyset_before(cursor: CursorData) -> sea_orm::Condition {
    let created_at = cursor.created_at.fixed_offset();
    sea_orm::Condition::any()
        .add(Column::CreatedAt.lt(created_at))
        .add(
            sea_orm::Condition::all()
                .add(Column::CreatedAt.eq(created_at))
                .add(Column::Id.lt(cursor.id)),
        )
}

/// Load an execution that has not been deleted. Unknown ids are `NotFound`,
/// deleted ones `InvalidState`.
pub(crate) async fn find_live<C: ConnectionTrait>(
    conn: &C,
    execution_id: Uuid,
    lock: bool,
) -> Result<execution::Model, AdminError> {
    let mut select = Execution::find_by_id(execution_id);
    if lock {
        select = select.lock_exclusive();
    }
    let execution = select
        .one(conn)
        .await?
        .ok_or_else(|| AdminError::not_found("execution", execution_id))?;

    if execution.deleted_at.is_some() {
        return Err(AdminError::invalid_state(format!(
            "execution {} has already been deleted",
            execution_id
        )));
    }
    Ok(execution)
}

/// Lock an execution together with its job for a write.
///
/// Every mutating transaction takes the job row first and the execution row
/// second, the same order `load_aggregate` uses, so two writers on one job
/// queue behind the job lock instead of deadlocking. The execution is read
/// again under its lock and re-validated.
pub(crate) async fn lock_for_update<C: ConnectionTrait>(
    conn: &C,
    execution_id: Uuid,
) -> Result<(job::Model, execution::Model), AdminError> {
    let unlocked = find_live(conn, execution_id, false).await?;
    let job = Job::find_by_id(unlocked.job_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AdminError::not_found("job", unlocked.job_id))?;
    let execution = find_live(conn, execution_id, true).await?;
    Ok((job, execution))
}
