use crate::downloader::{spawn_worker, PlaylistWorker, WorkerHandle};
use crate::errors::{AppError, Result};
use crate::progress::{channel, Applied, ConsumerLink, Event, ProgressAggregator, Received, Snapshot};
use crate::utils::generate_session_id;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
}

/// Conditions the display surface reports to the user. Each fires at most
/// once per session, and the two are independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Percentage reached 100.
    Completed,
    /// The worker thread finished on its own and has been joined.
    WorkerExited,
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub source: String,
    pub started_at: DateTime<Utc>,
}

struct Session {
    info: SessionInfo,
    consumer: ConsumerLink,
    handle: WorkerHandle,
}

/// Owns the start/stop lifecycle of one download session at a time.
///
/// All display state lives here, on the foreground side; the worker only ever
/// sees its end of the channel.
pub struct LifecycleController {
    worker: Arc<dyn PlaylistWorker>,
    state: SessionState,
    session: Option<Session>,
    aggregator: Option<ProgressAggregator>,
    title_max_len: usize,
    stop_timeout: Option<Duration>,
}

impl LifecycleController {
    pub fn new(worker: Arc<dyn PlaylistWorker>, title_max_len: usize) -> Self {
        Self {
            worker,
            state: SessionState::Idle,
            session: None,
            aggregator: None,
            title_max_len,
            stop_timeout: None,
        }
    }

    /// Bounds how long [`stop`](Self::stop) waits before abandoning the worker.
    pub fn with_stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref().map(|s| &s.info)
    }

    /// Display state of the current session, or of the last one after it ended.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.aggregator.as_ref().map(|a| a.snapshot())
    }

    pub fn rejected_events(&self) -> u64 {
        self.aggregator.as_ref().map_or(0, |a| a.rejected_events())
    }

    pub fn start(&mut self, source: &str) -> Result<SessionInfo> {
        if self.state != SessionState::Idle {
            return Err(AppError::InvalidState(format!(
                "cannot start while {:?}",
                self.state
            )));
        }

        if !self.worker.validate(source) {
            warn!("Rejected playlist link: {}", source);
            return Err(AppError::InvalidSource(source.to_string()));
        }

        let task_start_time = Instant::now();
        let (link, consumer) = channel();
        let handle = spawn_worker(
            self.worker.clone(),
            link,
            consumer.cancel_token(),
            source.to_string(),
        )?;

        let info = SessionInfo {
            id: generate_session_id(),
            source: source.to_string(),
            started_at: Utc::now(),
        };
        info!(
            "Session {} started at {} with {} for {}",
            info.id,
            info.started_at.to_rfc3339(),
            self.worker.get_name(),
            info.source
        );

        self.aggregator = Some(ProgressAggregator::new(task_start_time, self.title_max_len));
        self.session = Some(Session {
            info: info.clone(),
            consumer,
            handle,
        });
        self.state = SessionState::Running;
        Ok(info)
    }

    /// Drains every pending event into the aggregator without blocking.
    ///
    /// Rejected events are counted and logged; they never surface here.
    pub fn poll(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();
        let (Some(session), Some(aggregator)) = (self.session.as_mut(), self.aggregator.as_mut()) else {
            return notifications;
        };

        // Sampled before draining so that every event the worker sent ahead of
        // exiting is applied before the exit is reported.
        let finished = session.handle.is_finished();

        loop {
            match session.consumer.try_receive() {
                Received::Event(event) => {
                    if event == Event::Terminate {
                        debug!("Worker for session {} signalled termination", session.info.id);
                    }
                    match aggregator.apply(event) {
                        Applied::Completed => {
                            info!("Session {} reached 100%", session.info.id);
                            notifications.push(Notification::Completed);
                        }
                        Applied::Rejected(e) => {
                            warn!("Session {}: ignoring event: {}", session.info.id, e);
                        }
                        Applied::Updated | Applied::Ignored => {}
                    }
                }
                Received::Empty | Received::Disconnected => break,
            }
        }

        if finished {
            if let Some(session) = self.session.take() {
                if let Err(e) = session.handle.join() {
                    log::error!("Session {}: {}", session.info.id, e);
                }
                if let Some(aggregator) = self.aggregator.as_ref() {
                    info!(
                        "Worker for session {} exited at {:.1}% (complete: {})",
                        session.info.id,
                        aggregator.percentage(),
                        aggregator.is_complete()
                    );
                }
            }
            self.state = SessionState::Idle;
            notifications.push(Notification::WorkerExited);
        }

        notifications
    }

    /// Recomputes time-derived display fields for `now`.
    pub fn tick(&mut self, now: Instant) {
        if let Some(aggregator) = self.aggregator.as_mut() {
            aggregator.tick(now);
        }
    }

    /// Sends the terminate signal and blocks until the worker thread has exited.
    ///
    /// No events are delivered once this returns. Calling it while idle does nothing.
    pub fn stop(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            debug!("Stop requested with no running session");
            self.state = SessionState::Idle;
            return Ok(());
        };

        self.state = SessionState::Stopping;
        let current_track = self.aggregator.as_ref().and_then(|a| a.track_title()).unwrap_or("-");
        info!("Stopping session {} during {}", session.info.id, current_track);
        let Session { info, consumer, handle } = session;
        if !consumer.send_terminate() {
            debug!("Worker for session {} already gone", info.id);
        }

        let result = match self.stop_timeout {
            None => handle.join(),
            Some(timeout) => match handle.join_timeout(timeout) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    warn!(
                        "Worker for session {} did not stop within {:?}, abandoning it",
                        info.id, timeout
                    );
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        // Anything still queued belongs to a session that no longer exists.
        drop(consumer);
        self.state = SessionState::Idle;
        info!("Session {} stopped", info.id);
        result
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if let Some(session) = self.session.as_ref() {
            session.handle.cancel();
        }
    }
}
