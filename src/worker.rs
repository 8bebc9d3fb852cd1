use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, tick, Receiver, Sender};
use crossbeam::select;
use eyre::Result;
use tokio::runtime::Handle;
use tracing::{debug, error, span, warn, Level};

use crate::notifier::{Notifier, PushNotification};
use crate::reminder_models::CustomReminder;
use crate::reminder_repo::ReminderRepository;

const REMINDER_TITLE: &str = "Reminder";

/// Polls for due reminders on its own thread until cancelled.
pub struct Worker {
    handle: Option<JoinHandle<()>>,
    shutdown: Sender<()>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub due: usize,
    pub sent: usize,
    /// Not delivered this pass; retried by a later sweep.
    pub failed: usize,
    /// Claimed by another poller between selection and claim.
    pub skipped: usize,
}

fn notification_for(reminder: &CustomReminder) -> PushNotification {
    PushNotification {
        to: reminder.expo_token.clone(),
        title: REMINDER_TITLE.to_string(),
        body: reminder.message.clone(),
    }
}

/// One pass: claim each due reminder, push it, then mark it sent or release the claim.
/// Per-reminder storage errors are logged and the pass moves on; a claim that
/// can't be released lapses after the lease and the reminder is retried then.
pub async fn sweep_due_reminders<S, N>(state: &S, notifier: &N, now: DateTime<Utc>) -> Result<SweepReport>
where
    S: ReminderRepository + ?Sized,
    N: Notifier + ?Sized,
{
    let due = state.due_reminders(now).await?;
    let mut report = SweepReport { due: due.len(), ..Default::default() };

    for reminder in due {
        let claimed = match state.claim_reminder(reminder.id, now).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                debug!("reminder {} already claimed", reminder.id);
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                error!("couldn't claim reminder {}: {e}", reminder.id);
                report.failed += 1;
                continue;
            }
        };
        match notifier.push(&notification_for(&claimed)).await {
            Ok(()) => {
                report.sent += 1;
                if let Err(e) = state.mark_reminder_sent(claimed.id, now).await {
                    error!("reminder {} delivered but not marked sent: {e}", claimed.id);
                }
            }
            Err(e) => {
                warn!("couldn't deliver reminder {}: {e}", claimed.id);
                report.failed += 1;
                if let Err(e) = state.release_reminder(claimed.id).await {
                    error!("couldn't release reminder {}, it waits out the claim lease: {e}", claimed.id);
                }
            }
        }
    }
    Ok(report)
}

fn consume_ticks<S, N>(runtime: Handle, state: Arc<S>, notifier: Arc<N>, ticker: Receiver<std::time::Instant>, stop: Receiver<()>)
where
    S: ReminderRepository + Send + Sync + 'static,
    N: Notifier + 'static,
{
    debug!("Starting reminder worker");
    loop {
        let span = span!(Level::DEBUG, "reminder sweep");
        let _enter = span.enter();
        select! {
            recv(ticker) -> _ => {
                match runtime.block_on(sweep_due_reminders(state.as_ref(), notifier.as_ref(), Utc::now())) {
                    Ok(report) if report.due > 0 => debug!("reminder sweep: {report:?}"),
                    Ok(_) => {},
                    Err(e) => error!("Error sweeping reminders {e}"),
                }
            },
            recv(stop) -> _ => {
                debug!("Stopping reminder worker");
                break;
            },
        }
    }
}

impl Worker {
    /// Must be called from within a tokio runtime.
    pub fn new<S, N>(state: Arc<S>, notifier: Arc<N>, poll: Duration) -> Self
    where
        S: ReminderRepository + Send + Sync + 'static,
        N: Notifier + 'static,
    {
        let runtime = Handle::current();
        let (shutdown, stop) = bounded(1);
        let handle = std::thread::spawn(move || consume_ticks(runtime, state, notifier, tick(poll), stop));
        Worker {
            handle: Some(handle),
            shutdown,
        }
    }

    pub fn cancel(&mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("reminder worker panicked");
            }
        }
    }
}
