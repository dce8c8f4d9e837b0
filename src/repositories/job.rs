//! # Job Repository
//!
//! Job loading, enqueueing and the job listing. A job is only visible while
//! it has at least one live execution; every read computes the status from
//! those executions inside a single transaction.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::DateTimeWithTimeZone,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cursor::{CursorData, encode_cursor};
use crate::error::AdminError;
use crate::models::cron_entry::Entity as CronEntry;
use crate::models::execution::{self, Entity as Execution};
use crate::models::job::{self, Column, Entity as Job};
use crate::repositories::execution::{ExecutionView, job_matches};
use crate::status::{
    StateFilter, Status, execution_status, execution_statuses, job_status, sort_newest_first,
};

/// A job with its live executions ordered head first
#[derive(Debug, Clone)]
pub struct JobAggregate {
    pub job: job::Model,
    pub executions: Vec<execution::Model>,
}

impl JobAggregate {
    pub fn new(job: job::Model, mut executions: Vec<execution::Model>) -> Self {
        sort_newest_first(&mut executions);
        Self { job, executions }
    }

    pub fn head(&self) -> Option<&execution::Model> {
        self.executions.first()
    }

    /// `None` when no live execution remains.
    pub fn status(&self) -> Option<Status> {
        job_status(&self.executions)
    }

    pub fn view(&self) -> Option<JobView> {
        let status = self.status()?;
        let head = self.head()?;
        Some(JobView {
            id: self.job.id,
            job_class: self.job.job_class.clone(),
            queue_name: self.job.queue_name.clone(),
            arguments: self.job.arguments.clone(),
            cron_key: self.job.cron_key.clone(),
            status,
            execution_count: self.executions.len() as u64,
            head: ExecutionView::new(head, execution_status(head, false)),
            created_at: self.job.created_at.with_timezone(&Utc),
        })
    }

    pub fn detail(&self) -> Option<JobDetail> {
        let job = self.view()?;
        let executions = self
            .executions
            .iter()
            .zip(execution_statuses(&self.executions))
            .map(|(execution, status)| ExecutionView::new(execution, status))
            .collect();
        Some(JobDetail { job, executions })
    }
}

/// Job summary row for listings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobView {
    pub id: Uuid,
    pub job_class: String,
    pub queue_name: String,
    #[schema(value_type = Object)]
    pub arguments: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_key: Option<String>,
    pub status: Status,
    pub execution_count: u64,
    pub head: ExecutionView,
    pub created_at: DateTime<Utc>,
}

/// Job with its full live execution history, head first
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: JobView,
    pub executions: Vec<ExecutionView>,
}

#[derive(Debug, Clone, Default)]
pub struct JobListQuery {
    pub state: StateFilter,
    pub query: Option<String>,
    pub limit: u64,
    pub cursor: Option<CursorData>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobPage {
    pub jobs: Vec<JobView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters for enqueueing a job together with its first execution
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewJob {
    pub job_class: String,
    #[serde(default)]
    pub queue_name: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub arguments: JsonValue,
    #[serde(default)]
    pub cron_key: Option<String>,
    /// Defaults to now
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewJob {
    pub fn new(job_class: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            job_class: job_class.into(),
            queue_name: None,
            arguments,
            cron_key: None,
            scheduled_at: None,
        }
    }
}

/// Repository for job reads and enqueueing
pub struct JobRepository {
    db: DatabaseConnection,
}

impl JobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Load a visible job with its executions.
    pub async fn find(&self, job_id: Uuid) -> Result<JobAggregate, AdminError> {
        let txn = self.db.begin().await?;
        let aggregate = load_aggregate(&txn, job_id, false).await?;
        txn.commit().await?;
        aggregate.ok_or_else(|| AdminError::not_found("job", job_id))
    }

    /// Create a job and its first execution atomically.
    pub async fn enqueue(&self, new_job: NewJob) -> Result<JobAggregate, AdminError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        if let Some(key) = &new_job.cron_key {
            if CronEntry::find_by_id(key.clone()).one(&txn).await?.is_none() {
                return Err(AdminError::not_found("cron entry", key));
            }
        }

        let job = job::ActiveModel {
            id: Set(Uuid::now_v7()),
            job_class: Set(new_job.job_class),
            queue_name: Set(new_job
                .queue_name
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| "default".to_string())),
            arguments: Set(new_job.arguments),
            cron_key: Set(new_job.cron_key),
            lock_version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let execution = execution::ActiveModel {
            id: Set(Uuid::now_v7()),
            job_id: Set(job.id),
            scheduled_at: Set(new_job
                .scheduled_at
                .map(|at| at.fixed_offset())
                .unwrap_or(now)),
            performed_at: Set(None),
            finished_at: Set(None),
            error: Set(None),
            created_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        tracing::info!(
            job_id = %job.id,
            job_class = %job.job_class,
            queue_name = %job.queue_name,
            "Job enqueued"
        );

        Ok(JobAggregate::new(job, vec![execution]))
    }

    /// List visible jobs newest first, filtered by computed status and a
    /// case-insensitive text match. Jobs are scanned in keyset batches until
    /// the page is full.
    pub async fn list(&self, query: JobListQuery) -> Result<JobPage, AdminError> {
        let txn = self.db.begin().await?;
        let limit = query.limit.max(1) as usize;
        let batch_size = (limit as u64 * 2).max(50);
        let needle = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut jobs: Vec<JobView> = Vec::with_capacity(limit + 1);
        let mut position = query.cursor;

        'scan: loop {
            let mut select = Job::find()
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

            let ids: Vec<Uuid> = batch.iter().map(|job| job.id).collect();
            let mut executions: HashMap<Uuid, Vec<execution::Model>> = HashMap::new();
            for execution in Execution::find()
                .filter(execution::Column::JobId.is_in(ids))
                .filter(execution::Column::DeletedAt.is_null())
                .all(&txn)
                .await?
            {
                executions.entry(execution.job_id).or_default().push(execution);
            }

            for job in batch {
                position = Some(CursorData {
                    created_at: job.created_at.with_timezone(&Utc),
                    id: job.id,
                });
                let Some(live) = executions.remove(&job.id) else {
                    continue;
                };
                if let Some(needle) = &needle {
                    if !job_matches(&job, needle) {
                        continue;
                    }
                }
                let aggregate = JobAggregate::new(job, live);
                let Some(view) = aggregate.view() else {
                    continue;
                };
                if !query.state.matches_job(view.status) {
                    continue;
                }
                jobs.push(view);
                if jobs.len() > limit {
                    break 'scan;
                }
            }

            if exhausted {
                break;
            }
        }

        txn.commit().await?;

        let next_cursor = if jobs.len() > limit {
            jobs.truncate(limit);
            jobs.last().map(|job| encode_cursor(&job.created_at, &job.id))
        } else {
            None
        };

        Ok(JobPage { jobs, next_cursor })
    }
}

/// Rows strictly after `cursor` in `created_at DESC, id DESC` order.
fn keyset_before(cursor: CursorData) -> Condition {
    let created_at = cursor.created_at.fixed_offset();
    Condition::any().add(Column::CreatedAt.lt(created_at)).add(
        Condition::all()
            .add(Column::CreatedAt.eq(created_at))
            .add(Column::Id.lt(cursor.id)),
    )
}

/// Live executions of a job, head first.
pub(crate) async fn live_executions<C: ConnectionTrait>(
    conn: &C,
    job_id: Uuid,
) -> Result<Vec<execution::Model>, AdminError> {
    let mut executions = Execution::find()
        .filter(execution::Column::JobId.eq(job_id))
        .filter(execution::Column::DeletedAt.is_null())
        .all(conn)
        .await?;
    sort_newest_first(&mut executions);
    Ok(executions)
}

/// Load a job and its live executions; `None` when the job does not exist
/// or has no live execution. With `lock` the job row is selected `FOR UPDATE`.
pub(crate) async fn load_aggregate<C: ConnectionTrait>(
    conn: &C,
    job_id: Uuid,
    lock: bool,
) -> Result<Option<JobAggregate>, AdminError> {
    let mut select = Job::find_by_id(job_id);
    if lock {
        select = select.lock_exclusive();
    }
    let Some(job) = select.one(conn).await? else {
        return Ok(None);
    };

    let executions = live_executions(conn, job_id).await?;
    if executions.is_empty() {
        return Ok(None);
    }
    Ok(Some(JobAggregate::new(job, executions)))
}

/// Advance the job's `lock_version` from the value observed by the caller.
/// Zero affected rows means another writer got there first.
pub(crate) async fn bump_lock_version<C: ConnectionTrait>(
    conn: &C,
    job: &job::Model,
    now: DateTimeWithTimeZone,
) -> Result<(), AdminError> {
    let result = Job::update_many()
        .col_expr(Column::LockVersion, Expr::col(Column::LockVersion).add(1))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(job.id))
        .filter(Column::LockVersion.eq(job.lock_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AdminError::conflict("job", job.id));
    }
    Ok(())
}
