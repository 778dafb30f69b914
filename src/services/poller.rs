//! Scan status poller: drives a scan job from unknown to a terminal state
//! by time-spaced queries against the Scan Service.
//!
//! Each monitored job is owned by one explicitly cancellable task (no
//! recursive self-rescheduling): one immediate query, then one query per
//! interval while the status stays non-terminal. Cancellation is observable
//! — after `cancel` returns, no further event for that job is delivered,
//! including from a query that was already in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::errors::GatewayError;
use crate::gateway::ScanGateway;
use crate::models::scan::ScanStatus;

/// Event emitted by the poller toward the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanEvent {
    /// The observed status changed (includes the first observation, with
    /// `previous: None`, and the final terminal observation).
    StatusChanged {
        job_ref: String,
        previous: Option<ScanStatus>,
        new: ScanStatus,
        progress_percent: u8,
    },
    /// Status unchanged and non-terminal; carries the current progress.
    Heartbeat {
        job_ref: String,
        status: ScanStatus,
        progress_percent: u8,
    },
    /// A status query failed; monitoring for this job has stopped and its
    /// derived state is cleared (the job is unknown again).
    MonitoringFailed { job_ref: String, reason: String },
}

struct JobHandle {
    /// Distinguishes this schedule from a replacement under the same
    /// job_ref, so a finished task only ever evicts its own entry.
    generation: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Events retained while nobody drains the stream. The channel is a ring:
/// when the backlog is full the oldest events are dropped first.
const DEFAULT_EVENT_BACKLOG: usize = 256;

struct PollerInner {
    gateway: Arc<dyn ScanGateway>,
    interval: Duration,
    events: broadcast::Sender<ScanEvent>,
    /// Jobs currently being monitored. Guarded so a job is never polled by
    /// two overlapping schedules. Entries are removed on cancel and by the
    /// monitoring task itself when it exits, so the table never retains
    /// finished jobs.
    jobs: Mutex<HashMap<String, JobHandle>>,
    generations: AtomicU64,
}

/// Monitors scan jobs and emits [`ScanEvent`]s on the channel returned by
/// [`ScanPoller::new`].
#[derive(Clone)]
pub struct ScanPoller {
    inner: Arc<PollerInner>,
}

impl ScanPoller {
    /// Create a poller with the given query interval and the receiving end
    /// of its event stream.
    pub fn new(
        gateway: Arc<dyn ScanGateway>,
        interval: Duration,
    ) -> (Self, broadcast::Receiver<ScanEvent>) {
        Self::with_backlog(gateway, interval, DEFAULT_EVENT_BACKLOG)
    }

    /// Like [`ScanPoller::new`] with an explicit backlog bound. Undrained
    /// events beyond the bound are dropped oldest-first.
    pub fn with_backlog(
        gateway: Arc<dyn ScanGateway>,
        interval: Duration,
        backlog: usize,
    ) -> (Self, broadcast::Receiver<ScanEvent>) {
        let (events, receiver) = broadcast::channel(backlog);
        let poller = Self {
            inner: Arc::new(PollerInner {
                gateway,
                interval,
                events,
                jobs: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        };
        (poller, receiver)
    }

    /// Start monitoring a job. A job already being monitored gets its
    /// schedule replaced: the old task is cancelled and awaited before the
    /// new one starts, so at most one query per job is ever in flight.
    pub async fn start_monitoring(&self, job_ref: &str) {
        let previous = self.inner.jobs.lock().await.remove(job_ref);
        if let Some(old) = previous {
            let _ = old.cancel.send(true);
            let _ = old.task.await;
        }

        tracing::debug!(job_ref, "Starting scan monitoring");
        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        // Hold the table lock across spawn+insert: the task's exit cleanup
        // takes the same lock, so it cannot run before its handle is in.
        let mut jobs = self.inner.jobs.lock().await;
        let task = tokio::spawn(monitor_job(
            self.inner.clone(),
            job_ref.to_string(),
            generation,
            cancel_rx,
        ));
        jobs.insert(
            job_ref.to_string(),
            JobHandle {
                generation,
                cancel: cancel_tx,
                task,
            },
        );
    }

    /// Stop monitoring a job. Any query already in flight is allowed to
    /// finish, but its event is suppressed at delivery; once this returns,
    /// no further event for the job will be observed.
    pub async fn cancel(&self, job_ref: &str) {
        let handle = self.inner.jobs.lock().await.remove(job_ref);
        if let Some(handle) = handle {
            let _ = handle.cancel.send(true);
            let _ = handle.task.await;
            tracing::debug!(job_ref, "Scan monitoring cancelled");
        }
    }

    /// Whether a job currently has a monitoring schedule.
    pub async fn is_monitoring(&self, job_ref: &str) -> bool {
        self.inner
            .jobs
            .lock()
            .await
            .get(job_ref)
            .is_some_and(|handle| !handle.task.is_finished())
    }
}

async fn monitor_job(
    inner: Arc<PollerInner>,
    job_ref: String,
    generation: u64,
    mut cancel: watch::Receiver<bool>,
) {
    poll_job(&inner, &job_ref, &mut cancel).await;

    // Drop this schedule's own entry so the table never retains finished
    // jobs; a replacement schedule carries a newer generation and stays.
    let mut jobs = inner.jobs.lock().await;
    if jobs
        .get(&job_ref)
        .is_some_and(|handle| handle.generation == generation)
    {
        jobs.remove(&job_ref);
    }
}

async fn poll_job(inner: &PollerInner, job_ref: &str, cancel: &mut watch::Receiver<bool>) {
    let mut last_status: Option<ScanStatus> = None;

    loop {
        if *cancel.borrow() {
            return;
        }

        let queried = inner.gateway.scan_status(job_ref).await;

        // Suppression at delivery: a cancellation racing the query above
        // must not let the result escape.
        if *cancel.borrow() {
            return;
        }

        match queried {
            Ok(job) => {
                let progress = job.progress_percent.min(100);
                match last_status {
                    Some(previous) if previous == job.status => {
                        emit(
                            inner,
                            ScanEvent::Heartbeat {
                                job_ref: job_ref.to_string(),
                                status: job.status,
                                progress_percent: progress,
                            },
                        );
                    }
                    Some(previous)
                        if !ScanStatus::is_valid_transition(&previous, &job.status) =>
                    {
                        // The Scan Service reported a regression; statuses
                        // are monotonic, so hold the last valid observation.
                        tracing::warn!(
                            job_ref,
                            from = %previous,
                            to = %job.status,
                            "Ignoring regressive status report"
                        );
                        emit(
                            inner,
                            ScanEvent::Heartbeat {
                                job_ref: job_ref.to_string(),
                                status: previous,
                                progress_percent: progress,
                            },
                        );
                    }
                    previous => {
                        emit(
                            inner,
                            ScanEvent::StatusChanged {
                                job_ref: job_ref.to_string(),
                                previous,
                                new: job.status,
                                progress_percent: progress,
                            },
                        );
                        last_status = Some(job.status);
                    }
                }

                if last_status.is_some_and(|s| s.is_terminal()) {
                    tracing::info!(job_ref, status = %job.status, "Scan reached terminal state");
                    return;
                }
            }
            Err(e) => {
                report_failure(inner, job_ref, &e);
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(inner.interval) => {}
            _ = cancel.changed() => return,
        }
    }
}

fn emit(inner: &PollerInner, event: ScanEvent) {
    if inner.events.send(event).is_err() {
        tracing::debug!("Poller event receiver dropped");
    }
}

/// A failed query clears all derived state for the job (it is unknown
/// again) and ends monitoring; callers may restart explicitly.
fn report_failure(inner: &PollerInner, job_ref: &str, error: &GatewayError) {
    tracing::warn!(job_ref, error = %error, "Scan status query failed, stopping monitor");
    emit(
        inner,
        ScanEvent::MonitoringFailed {
            job_ref: job_ref.to_string(),
            reason: error.to_string(),
        },
    );
}
