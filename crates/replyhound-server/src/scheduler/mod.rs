//! Background job scheduler.
//!
//! Registers the source pollers and the housekeeping sweep on a
//! [`JobScheduler`]. Each poller first fires after its own startup delay and
//! then repeats at its interval.

mod pollers;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use replyhound_core::AppConfig;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::state::AppState;
pub use pollers::{FeedSource, Poller};

/// When a poller starts and how often it repeats.
#[derive(Debug, Clone, Copy)]
struct Cadence {
    startup_delay: Duration,
    interval: Duration,
}

/// Builds and starts the background job scheduler.
///
/// The returned handle must be kept alive for the lifetime of the process;
/// dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    state: AppState,
    config: &AppConfig,
    sources: Vec<Arc<dyn FeedSource>>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let inter_target_delay = Duration::from_millis(config.inter_target_delay_ms);

    for source in sources {
        let cadence = cadence_for(config, source.name());
        let poller = Arc::new(Poller::new(source, state.clone(), inter_target_delay));
        register_poller(&scheduler, poller, cadence).await?;
    }
    register_sweep_job(
        &scheduler,
        state,
        Duration::from_secs(config.sweep_interval_secs),
    )
    .await?;

    scheduler.start().await?;
    Ok(scheduler)
}

fn cadence_for(config: &AppConfig, source: &str) -> Cadence {
    match source {
        "alerts" => Cadence {
            startup_delay: Duration::from_secs(config.alerts_startup_delay_secs),
            interval: Duration::from_secs(config.alerts_poll_interval_secs),
        },
        _ => Cadence {
            startup_delay: Duration::from_secs(config.reddit_startup_delay_secs),
            interval: Duration::from_secs(config.reddit_poll_interval_secs),
        },
    }
}

/// Register a one-shot job at the startup delay that runs the first tick and
/// then installs the repeating job.
async fn register_poller(
    scheduler: &JobScheduler,
    poller: Arc<Poller>,
    cadence: Cadence,
) -> Result<(), JobSchedulerError> {
    let name = poller.name();
    tracing::info!(
        source = name,
        startup_delay_secs = cadence.startup_delay.as_secs(),
        interval_secs = cadence.interval.as_secs(),
        "scheduler: registering poller"
    );

    let job = Job::new_one_shot_async(cadence.startup_delay, move |_uuid, scheduler| {
        let poller = Arc::clone(&poller);

        Box::pin(async move {
            poller.tick().await;

            let repeating = Arc::clone(&poller);
            let job = Job::new_repeated_async(cadence.interval, move |_uuid, _lock| {
                let poller = Arc::clone(&repeating);
                Box::pin(async move {
                    poller.tick().await;
                })
            });
            let added = match job {
                Ok(job) => scheduler.add(job).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = added {
                tracing::error!(
                    source = poller.name(),
                    error = %e,
                    "scheduler: failed to schedule repeating poll"
                );
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Register the periodic sweep of expired rate-limit buckets and idle
/// wizard sessions.
async fn register_sweep_job(
    scheduler: &JobScheduler,
    state: AppState,
    interval: Duration,
) -> Result<(), JobSchedulerError> {
    let state = Arc::new(state);

    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let state = Arc::clone(&state);

        Box::pin(async move {
            run_sweep(&state).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_sweep(state: &AppState) {
    let now = Utc::now();
    match state.limiter.sweep(now).await {
        Ok(removed) => tracing::debug!(removed, "scheduler: swept rate-limit buckets"),
        Err(e) => tracing::warn!(error = %e, "scheduler: rate-limit sweep failed"),
    }
    match state.wizard.sweep(now).await {
        Ok(removed) => tracing::debug!(removed, "scheduler: swept wizard sessions"),
        Err(e) => tracing::warn!(error = %e, "scheduler: wizard sweep failed"),
    }
}
