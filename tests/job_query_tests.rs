//! Job and execution listings: text search, state filters, ordering and
//! cursor pagination.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use jobdesk::cursor::decode_cursor;
use jobdesk::models::{execution, job};
use jobdesk::repositories::execution::ExecutionListQuery;
use jobdesk::repositories::job::{JobListQuery, NewJob};
use jobdesk::repositories::{ExecutionRepository, JobRepository};
use jobdesk::status::{StateFilter, Status};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::json;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{admin_service, failed_job, queued_job, running_job, setup_test_db, succeeded_job};

async fn list_ids(
    db: &DatabaseConnection,
    state: StateFilter,
    query: Option<&str>,
) -> Result<Vec<Uuid>> {
    let page = JobRepository::new(db.clone())
        .list(JobListQuery {
            state,
            query: query.map(str::to_string),
            limit: 50,
            cursor: None,
        })
        .await?;
    Ok(page.jobs.into_iter().map(|job| job.id).collect())
}

async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn text_search_narrows_to_matching_arguments() -> Result<()> {
    let db = setup_test_db().await?;
    let marked = queued_job(&db, json!({"payload": "DEAD", "attempt": 1})).await?;
    admin_service(&db, false).discard(marked.job.id).await?;
    tick().await;
    running_job(&db, json!({"payload": "alive"})).await?;

    assert_eq!(list_ids(&db, StateFilter::All, Some("")).await?.len(), 2);
    assert_eq!(list_ids(&db, StateFilter::All, None).await?.len(), 2);
    assert_eq!(
        list_ids(&db, StateFilter::All, Some("DEAD")).await?,
        vec![marked.job.id]
    );
    assert_eq!(
        list_ids(&db, StateFilter::All, Some("dead")).await?,
        vec![marked.job.id]
    );
    assert!(list_ids(&db, StateFilter::Unfinished, Some("DEAD")).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn text_search_matches_job_class() -> Result<()> {
    let db = setup_test_db().await?;
    let report = JobRepository::new(db.clone())
        .enqueue(NewJob::new("ReportMailer", json!({})))
        .await?;
    queued_job(&db, json!({})).await?;

    assert_eq!(
        list_ids(&db, StateFilter::All, Some("reportmail")).await?,
        vec![report.job.id]
    );
    Ok(())
}

#[tokio::test]
async fn state_filters_use_computed_status() -> Result<()> {
    let db = setup_test_db().await?;
    let queued = queued_job(&db, json!({})).await?;
    tick().await;
    let running = running_job(&db, json!({})).await?;
    tick().await;
    let succeeded = succeeded_job(&db, json!({})).await?;
    tick().await;
    let discarded = failed_job(&db, json!({})).await?;
    tick().await;
    let retried = failed_job(&db, json!({})).await?;
    admin_service(&db, false).retry(retried.job.id).await?;

    assert_eq!(list_ids(&db, StateFilter::Queued, None).await?, vec![queued.job.id]);
    assert_eq!(list_ids(&db, StateFilter::Running, None).await?, vec![running.job.id]);
    assert_eq!(
        list_ids(&db, StateFilter::Succeeded, None).await?,
        vec![succeeded.job.id]
    );
    assert_eq!(
        list_ids(&db, StateFilter::Discarded, None).await?,
        vec![discarded.job.id]
    );
    assert_eq!(list_ids(&db, StateFilter::Retried, None).await?, vec![retried.job.id]);
    assert_eq!(
        list_ids(&db, StateFilter::Unfinished, None).await?,
        vec![retried.job.id, running.job.id, queued.job.id]
    );
    assert_eq!(list_ids(&db, StateFilter::All, None).await?.len(), 5);
    Ok(())
}

#[tokio::test]
async fn jobs_are_listed_newest_first() -> Result<()> {
    let db = setup_test_db().await?;
    let mut created = Vec::new();
    for n in 0..4 {
        created.push(queued_job(&db, json!({"n": n})).await?.job.id);
        tick().await;
    }
    created.reverse();

    assert_eq!(list_ids(&db, StateFilter::All, None).await?, created);
    Ok(())
}

#[tokio::test]
async fn cursor_pages_through_filtered_jobs() -> Result<()> {
    let db = setup_test_db().await?;
    let admin = admin_service(&db, false);
    let mut expected = Vec::new();
    for n in 0..5 {
        let job = queued_job(&db, json!({"n": n})).await?;
        // Every other job is discarded so the filter has to skip rows
        if n % 2 == 1 {
            admin.discard(job.job.id).await?;
        } else {
            expected.push(job.job.id);
        }
        tick().await;
    }
    expected.reverse();

    let repo = JobRepository::new(db.clone());
    let first = repo
        .list(JobListQuery {
            state: StateFilter::Queued,
            limit: 2,
            ..Default::default()
        })
        .await?;
    assert_eq!(first.jobs.len(), 2);
    let cursor = decode_cursor(first.next_cursor.as_deref().expect("more pages"))
        .map_err(|err| anyhow::anyhow!(err.message))?;

    let second = repo
        .list(JobListQuery {
            state: StateFilter::Queued,
            limit: 2,
            cursor: Some(cursor),
            ..Default::default()
        })
        .await?;
    assert_eq!(second.jobs.len(), 1);
    assert!(second.next_cursor.is_none());

    let seen: Vec<Uuid> = first
        .jobs
        .iter()
        .chain(second.jobs.iter())
        .map(|job| job.id)
        .collect();
    assert_eq!(seen, expected);
    Ok(())
}

#[tokio::test]
async fn job_view_reports_head_and_count() -> Result<()> {
    let db = setup_test_db().await?;
    let job = failed_job(&db, json!({})).await?;
    let retry = admin_service(&db, false).retry(job.job.id).await?;

    let page = JobRepository::new(db.clone())
        .list(JobListQuery { limit: 10, ..Default::default() })
        .await?;
    let view = &page.jobs[0];
    assert_eq!(view.status, Status::Retried);
    assert_eq!(view.execution_count, 2);
    assert_eq!(view.head.id, retry.id);
    assert_eq!(view.head.status, Status::Queued);
    Ok(())
}

#[tokio::test]
async fn executions_listing_filters_by_execution_status() -> Result<()> {
    let db = setup_test_db().await?;
    let admin = admin_service(&db, false);
    let job = failed_job(&db, json!({"payload": "DEAD"})).await?;
    admin.retry(job.job.id).await?;
    tick().await;
    succeeded_job(&db, json!({})).await?;

    let repo = ExecutionRepository::new(db.clone());
    let all = repo
        .list(ExecutionListQuery { limit: 50, ..Default::default() })
        .await?;
    assert_eq!(all.executions.len(), 3);
    assert!(all
        .executions
        .windows(2)
        .all(|pair| pair[0].execution.created_at >= pair[1].execution.created_at));

    let retried = repo
        .list(ExecutionListQuery {
            state: StateFilter::Retried,
            limit: 50,
            ..Default::default()
        })
        .await?;
    assert_eq!(retried.executions.len(), 1);
    assert_eq!(retried.executions[0].execution.job_id, job.job.id);
    assert_eq!(retried.executions[0].job_class, "ExampleJob");

    let dead = repo
        .list(ExecutionListQuery {
            query: Some("dead".to_string()),
            limit: 50,
            ..Default::default()
        })
        .await?;
    assert_eq!(dead.executions.len(), 2);
    assert!(dead.executions.iter().all(|item| item.execution.job_id == job.job.id));
    Ok(())
}

#[tokio::test]
async fn executions_listing_paginates() -> Result<()> {
    let db = setup_test_db().await?;
    for n in 0..3 {
        queued_job(&db, json!({"n": n})).await?;
        tick().await;
    }

    let repo = ExecutionRepository::new(db.clone());
    let first = repo
        .list(ExecutionListQuery { limit: 2, ..Default::default() })
        .await?;
    assert_eq!(first.executions.len(), 2);
    let cursor = decode_cursor(first.next_cursor.as_deref().expect("more pages"))
        .map_err(|err| anyhow::anyhow!(err.message))?;

    let second = repo
        .list(ExecutionListQuery {
            limit: 2,
            cursor: Some(cursor),
            ..Default::default()
        })
        .await?;
    assert_eq!(second.executions.len(), 1);
    assert!(second.next_cursor.is_none());
    Ok(())
}

#[tokio::test]
async fn retried_job_stays_unfinished_until_it_runs() -> Result<()> {
    let db = setup_test_db().await?;
    let job = failed_job(&db, json!({})).await?;
    assert!(list_ids(&db, StateFilter::Unfinished, None).await?.is_empty());

    let retry = admin_service(&db, false).retry(job.job.id).await?;
    assert_eq!(list_ids(&db, StateFilter::Unfinished, None).await?, vec![job.job.id]);
    assert_eq!(list_ids(&db, StateFilter::Retried, None).await?, vec![job.job.id]);
    assert!(list_ids(&db, StateFilter::Queued, None).await?.is_empty());

    // The failed attempt itself is finished and is not listed as unfinished
    let unfinished = ExecutionRepository::new(db.clone())
        .list(ExecutionListQuery {
            state: StateFilter::Unfinished,
            limit: 50,
            ..Default::default()
        })
        .await?;
    let ids: Vec<Uuid> = unfinished.executions.iter().map(|item| item.execution.id).collect();
    assert_eq!(ids, vec![retry.id]);

    let worker = ExecutionRepository::new(db.clone());
    worker.start(retry.id).await?;
    assert_eq!(list_ids(&db, StateFilter::Unfinished, None).await?, vec![job.job.id]);
    worker.finish(retry.id, None).await?;
    assert!(list_ids(&db, StateFilter::Unfinished, None).await?.is_empty());
    Ok(())
}

fn fixed_instant() -> DateTime<FixedOffset> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0)
        .unwrap()
        .fixed_offset()
}

/// Insert a job with one pending execution, both stamped with `created_at`.
async fn insert_job_at(
    db: &DatabaseConnection,
    job_id: Uuid,
    execution_id: Uuid,
    created_at: DateTime<FixedOffset>,
) -> Result<()> {
    job::ActiveModel {
        id: Set(job_id),
        job_class: Set("ExampleJob".to_string()),
        queue_name: Set("default".to_string()),
        arguments: Set(json!({})),
        cron_key: Set(None),
        lock_version: Set(0),
        created_at: Set(created_at),
        updated_at: Set(created_at),
    }
    .insert(db)
    .await?;
    execution::ActiveModel {
        id: Set(execution_id),
        job_id: Set(job_id),
        scheduled_at: Set(created_at),
        performed_at: Set(None),
        finished_at: Set(None),
        error: Set(None),
        created_at: Set(created_at),
        deleted_at: Set(None),
    }
    .insert(db)
    .await?;
    Ok(())
}

#[tokio::test]
async fn created_at_ties_are_broken_by_id_across_pages() -> Result<()> {
    let db = setup_test_db().await?;
    let created_at = fixed_instant();
    for n in 1..=3u128 {
        insert_job_at(&db, Uuid::from_u128(n), Uuid::from_u128(100 + n), created_at).await?;
    }
    let later = created_at + chrono::Duration::seconds(1);
    insert_job_at(&db, Uuid::from_u128(4), Uuid::from_u128(104), later).await?;

    let expected: Vec<Uuid> = [4u128, 3, 2, 1].into_iter().map(Uuid::from_u128).collect();
    assert_eq!(list_ids(&db, StateFilter::All, None).await?, expected);

    let repo = JobRepository::new(db.clone());
    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = repo
            .list(JobListQuery {
                limit: 1,
                cursor,
                ..Default::default()
            })
            .await?;
        seen.extend(page.jobs.iter().map(|job| job.id));
        let Some(next) = page.next_cursor else {
            break;
        };
        cursor = Some(decode_cursor(&next).map_err(|err| anyhow::anyhow!(err.message))?);
    }
    assert_eq!(seen, expected);
    Ok(())
}

#[tokio::test]
async fn execution_created_at_ties_are_broken_by_id_across_pages() -> Result<()> {
    let db = setup_test_db().await?;
    let created_at = fixed_instant();
    for n in 1..=3u128 {
        insert_job_at(&db, Uuid::from_u128(n), Uuid::from_u128(100 + n), created_at).await?;
    }

    let repo = ExecutionRepository::new(db.clone());
    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = repo
            .list(ExecutionListQuery {
                limit: 2,
                cursor,
                ..Default::default()
            })
            .await?;
        seen.extend(page.executions.iter().map(|item| item.execution.id));
        let Some(next) = page.next_cursor else {
            break;
        };
        cursor = Some(decode_cursor(&next).map_err(|err| anyhow::anyhow!(err.message))?);
    }

    let expected: Vec<Uuid> = [103u128, 102, 101].into_iter().map(Uuid::from_u128).collect();
    assert_eq!(seen, expected);
    Ok(())
}
