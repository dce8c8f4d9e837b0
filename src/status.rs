//! # Job State Machine
//!
//! Pure functions that derive execution and job status from execution rows.
//! Status is never stored; every read path computes it from the timestamps
//! and error of the rows it loaded.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::execution;

/// Observable status of an execution or a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting for a worker (`performed_at` is null)
    Queued,
    /// Picked up by a worker and not finished
    Running,
    /// Finished without error
    Succeeded,
    /// Finished with error and nothing scheduled after it
    Discarded,
    /// Finished with error and followed by another attempt. At job level:
    /// a pending attempt that follows a failed one.
    Retried,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Queued => "queued",
            Status::Running => "running",
            Status::Succeeded => "succeeded",
            Status::Discarded => "discarded",
            Status::Retried => "retried",
        }
    }

    /// Whether the job may still be picked up or is being worked on.
    pub fn is_pending_or_running(&self) -> bool {
        matches!(self, Status::Queued | Status::Running | Status::Retried)
    }

    /// Whether an operator may create a new attempt for a job in this status.
    pub fn can_retry(&self, policy: RetryPolicy) -> bool {
        match self {
            Status::Discarded => true,
            Status::Succeeded => policy.allow_succeeded,
            Status::Queued | Status::Running | Status::Retried => false,
        }
    }

    /// Whether an operator may terminate a job in this status.
    pub fn can_discard(&self) -> bool {
        self.is_pending_or_running()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which terminal states qualify for an operator retry.
///
/// Discarded jobs are always retryable; succeeded jobs only when
/// `allow_succeeded` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    pub allow_succeeded: bool,
}

/// State filter accepted by the listing endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    #[default]
    All,
    Queued,
    Running,
    Succeeded,
    Discarded,
    Retried,
    /// Jobs that have not reached a terminal state: `queued`, `running`, or
    /// `retried` (a retry awaiting pickup). For executions, `queued` or `running`.
    Unfinished,
}

impl StateFilter {
    pub const VALUES: &'static str =
        "all, queued, running, succeeded, discarded, retried, unfinished";

    /// Match a job status. A `retried` job still has a pending head, so it
    /// counts as unfinished.
    pub fn matches_job(&self, status: Status) -> bool {
        match self {
            StateFilter::Unfinished => matches!(
                status,
                Status::Queued | Status::Running | Status::Retried
            ),
            _ => self.matches(status),
        }
    }

    /// Match an execution status. A `retried` execution has finished.
    pub fn matches(&self, status: Status) -> bool {
        match self {
            StateFilter::All => true,
            StateFilter::Queued => status == Status::Queued,
            StateFilter::Running => status == Status::Running,
            StateFilter::Succeeded => status == Status::Succeeded,
            StateFilter::Discarded => status == Status::Discarded,
            StateFilter::Retried => status == Status::Retried,
            StateFilter::Unfinished => matches!(status, Status::Queued | Status::Running),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateFilter::All => "all",
            StateFilter::Queued => "queued",
            StateFilter::Running => "running",
            StateFilter::Succeeded => "succeeded",
            StateFilter::Discarded => "discarded",
            StateFilter::Retried => "retried",
            StateFilter::Unfinished => "unfinished",
        }
    }
}

impl FromStr for StateFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StateFilter::All),
            "queued" => Ok(StateFilter::Queued),
            "running" => Ok(StateFilter::Running),
            "succeeded" => Ok(StateFilter::Succeeded),
            "discarded" => Ok(StateFilter::Discarded),
            "retried" => Ok(StateFilter::Retried),
            "unfinished" => Ok(StateFilter::Unfinished),
            other => Err(format!("unknown state '{}'", other)),
        }
    }
}

/// Total order used to pick the head execution: later `scheduled_at` wins,
/// then later `created_at`, then the higher (creation-ordered) id.
pub fn head_order(a: &execution::Model, b: &execution::Model) -> Ordering {
    a.scheduled_at
        .cmp(&b.scheduled_at)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// The execution currently governing a job's status.
pub fn head_execution(executions: &[execution::Model]) -> Option<&execution::Model> {
    executions.iter().max_by(|a, b| head_order(a, b))
}

/// Sorts a job's executions newest first, head at index 0.
pub fn sort_newest_first(executions: &mut [execution::Model]) {
    executions.sort_by(|a, b| head_order(b, a));
}

/// Status of a single execution. `has_successor` tells whether a later
/// attempt exists for the same job.
pub fn execution_status(execution: &execution::Model, has_successor: bool) -> Status {
    match (execution.performed_at, execution.finished_at) {
        (None, None) => Status::Queued,
        (_, None) => Status::Running,
        (_, Some(_)) => match (&execution.error, has_successor) {
            (None, _) => Status::Succeeded,
            (Some(_), true) => Status::Retried,
            (Some(_), false) => Status::Discarded,
        },
    }
}

/// Status of every execution of one job, in the given order.
pub fn execution_statuses(executions: &[execution::Model]) -> Vec<Status> {
    let head_id = head_execution(executions).map(|head| head.id);
    executions
        .iter()
        .map(|execution| {
            let has_successor = executions
                .iter()
                .any(|other| head_order(other, execution) == Ordering::Greater);
            debug_assert!(has_successor || head_id == Some(execution.id));
            execution_status(execution, has_successor)
        })
        .collect()
}

/// Status of a job from all of its live executions. `None` when the job has
/// no executions left, which makes it invisible to queries.
pub fn job_status(executions: &[execution::Model]) -> Option<Status> {
    let head = head_execution(executions)?;
    let status = match execution_status(head, false) {
        Status::Queued => {
            let follows_failure = executions.iter().any(|execution| {
                execution.id != head.id
                    && execution.finished_at.is_some()
                    && execution.error.is_some()
            });
            if follows_failure {
                Status::Retried
            } else {
                Status::Queued
            }
        }
        other => other,
    };
    Some(status)
}

/// `finished_at` implies `performed_at`, and `performed_at <= finished_at`.
pub fn timestamps_consistent(execution: &execution::Model) -> bool {
    match (execution.performed_at, execution.finished_at) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(performed_at), Some(finished_at)) => performed_at <= finished_at,
    }
}
