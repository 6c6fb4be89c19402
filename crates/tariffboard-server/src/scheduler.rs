//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring collection jobs. All jobs share the orchestrator's cycle guard,
//! so an overlapping fire is skipped rather than queued.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use tariffboard_pipeline::{CycleError, Orchestrator};

/// Builds and starts the background job scheduler.
///
/// Registers the daily full cycle (04:00 UTC), the White House sub-cycle
/// (12:00 and 16:00 UTC), and the news sub-cycle (every 3 hours). Returns
/// the running [`JobScheduler`] handle, which must be kept alive for the
/// lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    orchestrator: Arc<Orchestrator>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_full_cycle_job(&scheduler, Arc::clone(&orchestrator)).await?;
    register_sub_cycle_job(
        &scheduler,
        Arc::clone(&orchestrator),
        "0 0 12,16 * * *",
        &["White House"],
    )
    .await?;
    register_sub_cycle_job(&scheduler, orchestrator, "0 0 */3 * * *", &["News API"]).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_full_cycle_job(
    scheduler: &JobScheduler,
    orchestrator: Arc<Orchestrator>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 0 4 * * *", move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);
        Box::pin(async move {
            tracing::info!("scheduler: starting daily full collection cycle");
            match orchestrator.run_full_cycle().await {
                Ok(report) => tracing::info!(
                    sources_ok = report.succeeded_sources().len(),
                    measures = report.measures_written,
                    "scheduler: daily cycle complete"
                ),
                Err(CycleError::AlreadyRunning) => {
                    tracing::info!("scheduler: daily cycle skipped, another cycle in flight");
                }
                Err(e) => tracing::error!(error = %e, "scheduler: daily cycle failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_sub_cycle_job(
    scheduler: &JobScheduler,
    orchestrator: Arc<Orchestrator>,
    cron: &str,
    sources: &'static [&'static str],
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);
        Box::pin(async move {
            tracing::info!(?sources, "scheduler: starting sub-cycle");
            match orchestrator.run_sources(sources).await {
                Ok(report) => tracing::info!(
                    ?sources,
                    measures = report.measures_written,
                    "scheduler: sub-cycle complete"
                ),
                Err(CycleError::AlreadyRunning) => {
                    tracing::info!(?sources, "scheduler: sub-cycle skipped, cycle in flight");
                }
                Err(e) => tracing::error!(?sources, error = %e, "scheduler: sub-cycle failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
