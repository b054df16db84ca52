use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use limes_common::clock::{Clock, SystemClock, jitter};
use limes_common::mail::{MailClient, MailOutcome};
use tokio_util::sync::CancellationToken;

/// Delay between polls when no mail notification is due.
const IDLE_INTERVAL: Duration = Duration::from_secs(3);

/// Base backoff applied after a transient delivery failure (§4.8), jittered
/// the same way the Collector jitters its scrape schedule.
const ERROR_INTERVAL: Duration = Duration::from_secs(180);

pub async fn run(args: crate::args::RunArgs) -> Result<()> {
    run_with_clock(args, Arc::new(SystemClock)).await
}

async fn run_with_clock(args: crate::args::RunArgs, clock: Arc<dyn Clock>) -> Result<()> {
    let pool = limes_common::pg::init_postgres(&args.postgres).await;
    let store = limes_db::Store::new(pool);
    let mail = MailClient::new(&args.mail);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        limes_common::shutdown::shutdown_signal().await;
        cancel_clone.cancel();
    });

    limes_common::log::signal_ready();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let due = tokio::select! {
            _ = cancel.cancelled() => break,
            result = store.mail().lock_next_due() => result?,
        };

        let Some(notification) = due else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(IDLE_INTERVAL) => {}
            }
            continue;
        };

        let Some(project) = store.projects().get(notification.project_id).await? else {
            // Project was deleted between enqueue and delivery; nothing left
            // to notify.
            store.mail().delete(notification.id).await?;
            continue;
        };

        match mail
            .send(&project.external_id, &notification.subject, &notification.body)
            .await
        {
            MailOutcome::Delivered => {
                store.mail().delete(notification.id).await?;
            }
            MailOutcome::Undeliverable => {
                tracing::warn!(notification_id = notification.id, project = %project.external_id, "mail endpoint rejected notification as undeliverable");
                store.mail().delete(notification.id).await?;
            }
            MailOutcome::Transient(err) => {
                let failed_submissions = notification.failed_submissions + 1;
                let next_submission_at = clock.now() + jitter(ERROR_INTERVAL);
                tracing::warn!(
                    notification_id = notification.id,
                    project = %project.external_id,
                    error = %err,
                    failed_submissions,
                    "mail delivery failed, rescheduling"
                );
                store
                    .mail()
                    .reschedule_after_failure(notification.id, failed_submissions, next_submission_at)
                    .await?;
            }
        }
    }

    Ok(())
}
