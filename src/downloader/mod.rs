pub mod manager;
pub mod strategies;

use crate::errors::{AppError, Result};
use crate::progress::{CancelToken, Event, WorkerLink};
use async_trait::async_trait;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Background job that turns a playlist link into downloaded tracks.
///
/// `run` executes on a dedicated thread with its own runtime. It reports
/// through the [`WorkerLink`] only, and must return promptly once
/// [`WorkerLink::terminate_requested`] turns true.
#[async_trait]
pub trait PlaylistWorker: Send + Sync {
    /// Pure check of the source identifier. No I/O.
    fn validate(&self, source: &str) -> bool;
    async fn run(&self, source: &str, link: &mut WorkerLink) -> Result<()>;
    fn get_name(&self) -> &str;
}

/// Starts `worker` on its own thread, bound to `link`.
pub fn spawn_worker(
    worker: Arc<dyn PlaylistWorker>,
    mut link: WorkerLink,
    cancel: CancelToken,
    source: String,
) -> Result<WorkerHandle> {
    let thread = std::thread::Builder::new()
        .name(format!("{}-worker", worker.get_name()))
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("Failed to start worker runtime: {}", e);
                    link.send(Event::Terminate);
                    return;
                }
            };

            if let Err(e) = runtime.block_on(worker.run(&source, &mut link)) {
                log::error!("{} failed: {}", worker.get_name(), e);
                // Lets the consumer know nothing more is coming.
                link.send(Event::Terminate);
            }
        })?;

    Ok(WorkerHandle { thread, cancel })
}

/// Owner's view of a running worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    thread: JoinHandle<()>,
    cancel: CancelToken,
}

impl WorkerHandle {
    /// Asks the worker to stop. Does not wait.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the worker thread has exited.
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| AppError::WorkerFailure("worker thread panicked".to_string()))
    }

    /// Waits at most `timeout` for the thread to exit. Returns `Ok(false)` and
    /// detaches the thread if it is still running at the deadline.
    pub fn join_timeout(self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        self.join().map(|_| true)
    }
}

#[cfg(test)]
pub(crate) mod test_workers {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Sends `events`, then either returns or waits for the terminate signal.
    pub struct ScriptedWorker {
        pub events: Vec<Event>,
        pub wait_for_terminate: bool,
        pub fail: bool,
        pub saw_terminate: Arc<AtomicBool>,
    }

    impl ScriptedWorker {
        pub fn new(events: Vec<Event>) -> Self {
            Self {
                events,
                wait_for_terminate: false,
                fail: false,
                saw_terminate: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn until_terminated(mut self) -> Self {
            self.wait_for_terminate = true;
            self
        }

        pub fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl PlaylistWorker for ScriptedWorker {
        fn validate(&self, source: &str) -> bool {
            source.starts_with("valid")
        }

        async fn run(&self, _source: &str, link: &mut WorkerLink) -> Result<()> {
            for event in &self.events {
                link.send(event.clone());
            }
            if self.wait_for_terminate {
                link.terminated().await;
                self.saw_terminate.store(true, Ordering::SeqCst);
            }
            if self.fail {
                return Err(AppError::WorkerFailure("scripted failure".to_string()));
            }
            Ok(())
        }

        fn get_name(&self) -> &str {
            "scripted"
        }
    }

    /// Ignores the terminate signal for `stall`.
    pub struct StubbornWorker {
        pub stall: Duration,
    }

    #[async_trait]
    impl PlaylistWorker for StubbornWorker {
        fn validate(&self, _source: &str) -> bool {
            true
        }

        async fn run(&self, _source: &str, _link: &mut WorkerLink) -> Result<()> {
            tokio::time::sleep(self.stall).await;
            Ok(())
        }

        fn get_name(&self) -> &str {
            "stubborn"
        }
    }
}
