//! Background maintenance scheduler.
//!
//! One periodic job covering the housekeeping the hot paths deliberately
//! leave behind: expired unused holds are purged after a grace period, and
//! idle rate-limiter windows are evicted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use slotbook_common::resilience::SlidingWindowLimiter;
use slotbook_core::booking::ports::ReservationStore;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// Configuration for the maintenance scheduler.
#[derive(Debug, Clone)]
pub struct MaintenanceSchedulerConfig {
    /// Cron expression driving the maintenance job.
    pub cron_expression: String,
    /// Grace period before an expired, unused hold is purged.
    pub hold_grace_minutes: i64,
    /// Timeout applied to a single maintenance execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for MaintenanceSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */10 * * * *".into(), // every 10 minutes
            hold_grace_minutes: 30,
            job_timeout: Duration::from_secs(60),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Maintenance scheduler with explicit lifecycle management.
pub struct MaintenanceScheduler {
    scheduler: Option<JobScheduler>,
    config: MaintenanceSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    reservations: Arc<dyn ReservationStore>,
    limiter: Option<SlidingWindowLimiter>,
}

impl MaintenanceScheduler {
    /// Create a scheduler with the default configuration.
    pub fn new(reservations: Arc<dyn ReservationStore>) -> Self {
        Self::with_config(MaintenanceSchedulerConfig::default(), reservations)
    }

    /// Create a scheduler with a custom configuration.
    pub fn with_config(
        config: MaintenanceSchedulerConfig,
        reservations: Arc<dyn ReservationStore>,
    ) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            reservations,
            limiter: None,
        }
    }

    /// Also evict idle rate-limiter windows on each run.
    pub fn with_rate_limiter(mut self, limiter: SlidingWindowLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?
            .map_err(|source| SchedulerError::StartFailed(source.to_string()))?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!(scheduler = "maintenance", event = "monitor_cancelled", "monitor cancelled");
        });

        self.monitor_handle = Some(handle);
        info!(scheduler = "maintenance", event = "start", "maintenance scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?
            .map_err(|source| SchedulerError::StopFailed(source.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!(scheduler = "maintenance", event = "stop", "maintenance scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed(source.to_string()))?;

        let reservations = Arc::clone(&self.reservations);
        let limiter = self.limiter.clone();
        let grace = self.config.hold_grace_minutes;
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
            let reservations = Arc::clone(&reservations);
            let limiter = limiter.clone();

            Box::pin(async move {
                match tokio::time::timeout(
                    job_timeout,
                    Self::run_maintenance(reservations, limiter, grace),
                )
                .await
                {
                    Ok(()) => {}
                    Err(_) => {
                        warn!(
                            scheduler = "maintenance",
                            event = "job_timeout",
                            timeout_secs = job_timeout.as_secs(),
                            "maintenance run timed out"
                        );
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "registered maintenance job");
        Ok(scheduler)
    }

    async fn run_maintenance(
        reservations: Arc<dyn ReservationStore>,
        limiter: Option<SlidingWindowLimiter>,
        grace_minutes: i64,
    ) {
        let cutoff = Utc::now() - ChronoDuration::minutes(grace_minutes);
        match reservations.purge_expired_holds(cutoff).await {
            Ok(0) => {
                debug!(scheduler = "maintenance", event = "no_expired_holds", "nothing to purge");
            }
            Ok(purged) => {
                info!(scheduler = "maintenance", purged, "expired holds purged");
            }
            Err(err) => {
                error!(scheduler = "maintenance", error = %err, "expired hold purge failed");
            }
        }

        if let Some(limiter) = limiter {
            let evicted = limiter.evict_stale();
            if evicted > 0 {
                debug!(scheduler = "maintenance", evicted, "idle rate windows evicted");
            }
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(
                scheduler = "maintenance",
                event = "drop_cancel",
                "MaintenanceScheduler dropped while running; cancelling tasks"
            );
            self.cancellation.cancel();
        }
    }
}
