//! Background analysis jobs and their status records.
//!
//! Jobs are pushed with LPUSH and popped with RPOP so the oldest job runs
//! first. Each job's status lives under its own key as JSON and walks
//! `PENDING → STARTED → SUCCESS | FAILURE`. Status records expire after a day.

use crate::analyzer::AnalysisReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, ErrorKind, RedisError, RedisResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;
use utoipa::ToSchema;

pub const JOBS_KEY: &str = "performance_analyzer:jobs";
const STATUS_KEY_PREFIX: &str = "performance_analyzer:job:";
const STATUS_TTL_SECS: u64 = 24 * 60 * 60;

pub const PENDING_MESSAGE: &str = "Waiting for the task to start...";
pub const RUNNING_MESSAGE: &str = "Searching for the most recommended and most polarized videos...";
pub const NO_RESULT_MESSAGE: &str =
    "No recommendations found, please try again with a different query or check the API quota.";

pub fn status_key(job_id: &str) -> String {
    format!("{}{}", STATUS_KEY_PREFIX, job_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: String,
    pub query: String,
    pub num_candidates: u32,
    pub min_duration_secs: u64,
    pub created_at: DateTime<Utc>,
}

impl AnalysisJob {
    pub fn new(query: &str, num_candidates: u32, min_duration_secs: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            num_candidates,
            min_duration_secs,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Started,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobStatus {
    pub state: JobState,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisReport>,
}

impl JobStatus {
    pub fn pending() -> Self {
        Self {
            state: JobState::Pending,
            status: PENDING_MESSAGE.to_string(),
            result: None,
        }
    }

    pub fn started() -> Self {
        Self {
            state: JobState::Started,
            status: RUNNING_MESSAGE.to_string(),
            result: None,
        }
    }

    /// A finished job. `None` means the search found nothing to recommend.
    pub fn success(report: Option<AnalysisReport>) -> Self {
        let status = if report.is_some() { RUNNING_MESSAGE } else { NO_RESULT_MESSAGE };
        Self {
            state: JobState::Success,
            status: status.to_string(),
            result: report,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            state: JobState::Failure,
            status: message.into(),
            result: None,
        }
    }
}

/// Storage for queued jobs and their status.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Records the job as pending and enqueues it.
    async fn push_job(&self, job: &AnalysisJob) -> RedisResult<()>;
    async fn pop_job(&self) -> RedisResult<Option<AnalysisJob>>;
    async fn set_status(&self, job_id: &str, status: &JobStatus) -> RedisResult<()>;
    /// Unknown ids read as pending.
    async fn get_status(&self, job_id: &str) -> RedisResult<JobStatus>;
}

fn json_error(e: serde_json::Error) -> RedisError {
    RedisError::from((ErrorKind::TypeError, "invalid job payload", e.to_string()))
}

/// Pops payloads until one decodes as a job or the queue is empty.
/// Malformed payloads are logged and discarded.
async fn next_valid_job<F, Fut>(mut pop: F) -> RedisResult<Option<AnalysisJob>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RedisResult<Option<String>>>,
{
    while let Some(payload) = pop().await? {
        match serde_json::from_str(&payload) {
            Ok(job) => return Ok(Some(job)),
            Err(e) => warn!("[Queue] Dropping malformed job payload: {}", e),
        }
    }
    Ok(None)
}

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
}

impl RedisJobQueue {
    pub async fn connect(redis_url: &str) -> RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl JobStore for RedisJobQueue {
    async fn push_job(&self, job: &AnalysisJob) -> RedisResult<()> {
        self.set_status(&job.id, &JobStatus::pending()).await?;
        let payload = serde_json::to_string(job).map_err(json_error)?;
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(JOBS_KEY, payload).await?;
        Ok(())
    }

    async fn pop_job(&self) -> RedisResult<Option<AnalysisJob>> {
        let conn = self.conn.clone();
        next_valid_job(|| {
            let mut conn = conn.clone();
            async move {
                let payload: Option<String> = conn.rpop(JOBS_KEY, None).await?;
                Ok::<_, RedisError>(payload)
            }
        })
        .await
    }

    async fn set_status(&self, job_id: &str, status: &JobStatus) -> RedisResult<()> {
        let payload = serde_json::to_string(status).map_err(json_error)?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(status_key(job_id))
            .arg(payload)
            .arg("EX")
            .arg(STATUS_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await
    }

    async fn get_status(&self, job_id: &str) -> RedisResult<JobStatus> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(status_key(job_id)).await?;
        match payload {
            Some(payload) => serde_json::from_str(&payload).map_err(json_error),
            None => Ok(JobStatus::pending()),
        }
    }
}
