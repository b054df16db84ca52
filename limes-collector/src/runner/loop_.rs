use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::runner::job::{CronJob, Job};
use crate::util::DISCOVER_IDLE_INTERVAL;

#[cfg(feature = "metrics")]
fn record_job_outcome(job: &'static str, outcome: &'static str) {
    crate::metrics::JOB_TASKS_TOTAL.with_label_values(&[job, outcome]).inc();
}

#[cfg(not(feature = "metrics"))]
fn record_job_outcome(_job: &'static str, _outcome: &'static str) {}

#[cfg(feature = "metrics")]
fn record_cron_outcome(job: &'static str, outcome: &'static str) {
    crate::metrics::CRON_RUNS_TOTAL.with_label_values(&[job, outcome]).inc();
}

#[cfg(not(feature = "metrics"))]
fn record_cron_outcome(_job: &'static str, _outcome: &'static str) {}

/// Drives one [`Job`] until cancelled (§4.1, §5). The runner enforces an
/// exit-only-on-cancel policy: any other error from `discover`/`process` is
/// logged and the loop continues, since per-task failure handling (error
/// message, reschedule, error count) is the job's own responsibility.
pub async fn run_job<J: Job>(job: J, cancel: CancellationToken) {
    info!(job = job.name(), "starting job loop");
    loop {
        if cancel.is_cancelled() {
            info!(job = job.name(), "job loop cancelled");
            return;
        }

        let task = tokio::select! {
            _ = cancel.cancelled() => {
                info!(job = job.name(), "job loop cancelled during discover");
                return;
            }
            result = job.discover() => result,
        };

        match task {
            Ok(Some(task)) => {
                if let Err(err) = job.process(task).await {
                    error!(job = job.name(), error = %err, "job task failed");
                    record_job_outcome(job.name(), "error");
                } else {
                    record_job_outcome(job.name(), "ok");
                }
            }
            Ok(None) => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(job = job.name(), "job loop cancelled while idle");
                        return;
                    }
                    _ = tokio::time::sleep(DISCOVER_IDLE_INTERVAL) => {}
                }
            }
            Err(err) => {
                warn!(job = job.name(), error = %err, "job discovery failed");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(DISCOVER_IDLE_INTERVAL) => {}
                }
            }
        }
    }
}

/// Drives one [`CronJob`]: waits `initial_delay`, then runs `run_once` every
/// `interval` until cancelled (§4.1, §4.3).
pub async fn run_cron<C: CronJob>(job: C, cancel: CancellationToken) {
    info!(job = job.name(), "starting cron job");

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(job.initial_delay()) => {}
    }

    loop {
        if cancel.is_cancelled() {
            return;
        }

        if let Err(err) = job.run_once().await {
            error!(job = job.name(), error = %err, "cron task failed");
            record_cron_outcome(job.name(), "error");
        } else {
            record_cron_outcome(job.name(), "ok");
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(job.interval()) => {}
        }
    }
}
