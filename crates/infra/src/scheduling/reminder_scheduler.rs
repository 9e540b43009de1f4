//! Reminder sweep scheduler.
//!
//! Runs the two reminder sweeps (24-hour and 3-hour) on their configured
//! cron schedules. Overlapping invocations are safe: the per-document lease
//! in the store is the synchronization point, not the schedule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use slotbook_core::ReminderService;
use slotbook_domain::{ReminderConfig, ReminderKind};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// Configuration for the reminder scheduler.
#[derive(Debug, Clone)]
pub struct ReminderSchedulerConfig {
    /// Sweep windows and cron expressions, one per reminder kind.
    pub reminders: ReminderConfig,
    /// Timeout applied to a single sweep execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for ReminderSchedulerConfig {
    fn default() -> Self {
        Self {
            reminders: ReminderConfig::default(),
            job_timeout: Duration::from_secs(120),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Reminder scheduler with explicit lifecycle management.
pub struct ReminderScheduler {
    scheduler: Option<JobScheduler>,
    config: ReminderSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    service: Arc<ReminderService>,
}

impl ReminderScheduler {
    /// Create a scheduler with the default configuration.
    pub fn new(service: Arc<ReminderService>) -> Self {
        Self::with_config(ReminderSchedulerConfig::default(), service)
    }

    /// Create a scheduler with a custom configuration.
    pub fn with_config(config: ReminderSchedulerConfig, service: Arc<ReminderService>) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            service,
        }
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
            Self::monitor_task(cancel).await;
        });

        self.monitor_handle = Some(handle);
        info!(scheduler = "reminder", event = "start", "reminder scheduler started");
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

        info!(scheduler = "reminder", event = "stop", "reminder scheduler stopped");
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

        let jobs = [
            (ReminderKind::TwentyFourHour, self.config.reminders.twenty_four_hour.cron_expression.clone()),
            (ReminderKind::ThreeHour, self.config.reminders.three_hour.cron_expression.clone()),
        ];

        for (kind, cron_expr) in jobs {
            let service = Arc::clone(&self.service);
            let job_timeout = self.config.job_timeout;

            let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
                let service = Arc::clone(&service);

                Box::pin(async move {
                    let started = Instant::now();

                    match tokio::time::timeout(job_timeout, service.run_sweep(kind)).await {
                        Ok(Ok(summary)) => {
                            debug!(
                                scheduler = "reminder",
                                kind = kind.label(),
                                event = "job_complete",
                                sent = summary.sent,
                                skipped = summary.skipped,
                                failed = summary.failed,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "reminder sweep finished"
                            );
                        }
                        Ok(Err(err)) => {
                            error!(
                                scheduler = "reminder",
                                kind = kind.label(),
                                error = %err,
                                "reminder sweep failed"
                            );
                        }
                        Err(_) => {
                            warn!(
                                scheduler = "reminder",
                                kind = kind.label(),
                                event = "job_timeout",
                                timeout_secs = job_timeout.as_secs(),
                                "reminder sweep timed out"
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

            debug!(
                cron = %cron_expr,
                kind = kind.label(),
                job_id = %job_id,
                "registered reminder sweep job"
            );
        }

        Ok(scheduler)
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!(scheduler = "reminder", event = "monitor_cancelled", "reminder scheduler monitor cancelled");
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(
                scheduler = "reminder",
                event = "drop_cancel",
                "ReminderScheduler dropped while running; cancelling tasks"
            );
            self.cancellation.cancel();
        }
    }
}
