use crate::api::AppState;
use crate::queue::{AnalysisJob, JobStatus};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

pub async fn start_worker(state: Arc<AppState>) {
    info!("[Worker] Started, polling the job queue...");

    loop {
        match state.jobs.pop_job().await {
            Ok(Some(job)) => {
                info!("[Worker] Picked up job: {} ({})", job.id, job.query);
                process_job(&state, job).await;
            }
            Ok(None) => {
                // Queue empty
                sleep(Duration::from_millis(1000)).await;
            }
            Err(e) => {
                error!("[Worker] Queue error: {}", e);
                sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Runs one job and records its final state.
pub async fn process_job(state: &AppState, job: AnalysisJob) {
    if let Err(e) = state.jobs.set_status(&job.id, &JobStatus::started()).await {
        warn!("[Worker] Could not mark job {} as started: {}", job.id, e);
    }

    let mut options = state.defaults;
    options.num_candidates = job.num_candidates;
    options.min_duration_secs = job.min_duration_secs;

    let status = match state.analyzer.get_recommendations(&job.query, &options).await {
        Ok(report) => {
            info!("[Worker] Job {} completed", job.id);
            JobStatus::success(report)
        }
        Err(e) => {
            error!("[Worker] Job {} failed: {:#}", job.id, e);
            JobStatus::failure(format!("{:#}", e))
        }
    };

    if let Err(e) = state.jobs.set_status(&job.id, &status).await {
        error!("[Worker] Could not store the result of job {}: {}", job.id, e);
    }
}
