//! Background session runtime.
//!
//! All remote I/O runs on one dedicated OS thread owning a current-thread
//! Tokio runtime. Callers stay synchronous: [`RuntimeHandle::run`] enqueues a
//! future and blocks on its result with a timeout. [`SessionRuntime::start`]
//! gates on the thread being ready to accept jobs before it returns.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

type RuntimeJob = Pin<Box<dyn Future<Output = ()> + Send>>;

enum JobMessage {
    Job(RuntimeJob),
    Shutdown,
}

/// A submitted job could not complete.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("session runtime is not running")]
    NotRunning,
    #[error("job timed out after {0:?}")]
    Timeout(Duration),
}

/// Cheap handle for submitting work to the runtime thread.
#[derive(Clone)]
pub struct RuntimeHandle {
    jobs: mpsc::UnboundedSender<JobMessage>,
}

impl RuntimeHandle {
    /// Run `fut` on the runtime thread and block for its result.
    ///
    /// The future itself is bounded by `timeout`; the blocking wait gets a
    /// second of slack on top so the in-runtime timeout fires first.
    pub fn run<F, T>(&self, timeout: Duration, fut: F) -> Result<T, RuntimeError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::channel();
        let job: RuntimeJob = Box::pin(async move {
            let outcome = tokio::time::timeout(timeout, fut).await;
            let _ = tx.send(outcome);
        });
        self.jobs
            .send(JobMessage::Job(job))
            .map_err(|_| RuntimeError::NotRunning)?;
        match rx.recv_timeout(timeout + Duration::from_secs(1)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_elapsed)) => Err(RuntimeError::Timeout(timeout)),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Err(RuntimeError::Timeout(timeout)),
            // The job was dropped unresolved: the runtime shut down with the
            // call still queued or in flight.
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Err(RuntimeError::NotRunning),
        }
    }
}

/// Owner of the runtime thread. Exactly one exists per running
/// [`SessionManager`](super::manager::SessionManager).
pub struct SessionRuntime {
    handle: RuntimeHandle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SessionRuntime {
    /// Boot the runtime thread. Returns once the thread is accepting jobs.
    pub fn start() -> Result<Self, String> {
        let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<JobMessage>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

        let thread = std::thread::Builder::new()
            .name("planwire-sessions".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => {
                        let _ = ready_tx.send(Ok(()));
                        rt
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                runtime.block_on(async move {
                    while let Some(message) = jobs_rx.recv().await {
                        match message {
                            JobMessage::Job(job) => {
                                tokio::spawn(job);
                            }
                            JobMessage::Shutdown => break,
                        }
                    }
                });
                debug!("session runtime thread exiting");
            })
            .map_err(|e| e.to_string())?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(Self {
                handle: RuntimeHandle { jobs: jobs_tx },
                thread: Some(thread),
            }),
            Ok(Err(reason)) => Err(reason),
            Err(_) => Err("timed out waiting for the runtime thread".into()),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Stop the thread. Pending spawned jobs are aborted; callers that still
    /// hold a [`RuntimeHandle`] get [`RuntimeError::NotRunning`] afterwards.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.jobs.send(JobMessage::Shutdown);
            let _ = thread.join();
        }
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_returns_the_future_output() {
        let runtime = SessionRuntime::start().unwrap();
        let value = runtime
            .handle()
            .run(Duration::from_secs(1), async { 6 * 7 })
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_timers_work_on_the_runtime_thread() {
        let runtime = SessionRuntime::start().unwrap();
        let handle = runtime.handle();
        let out = handle.run(Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "done"
        });
        assert_eq!(out.unwrap(), "done");
    }

    #[test]
    fn test_slow_job_times_out() {
        let runtime = SessionRuntime::start().unwrap();
        let out = runtime.handle().run(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        assert!(matches!(out, Err(RuntimeError::Timeout(_))));
    }

    #[test]
    fn test_job_dropped_by_shutdown_reports_not_running() {
        let mut runtime = SessionRuntime::start().unwrap();
        let handle = runtime.handle();
        let worker = std::thread::spawn(move || {
            handle.run(Duration::from_secs(10), async {
                tokio::time::sleep(Duration::from_secs(10)).await;
            })
        });
        // Let the job reach the runtime, then pull the rug out.
        std::thread::sleep(Duration::from_millis(100));
        runtime.shutdown();

        let out = worker.join().unwrap();
        assert!(matches!(out, Err(RuntimeError::NotRunning)));
    }

    #[test]
    fn test_run_after_shutdown_is_not_running() {
        let mut runtime = SessionRuntime::start().unwrap();
        let handle = runtime.handle();
        runtime.shutdown();
        runtime.shutdown(); // second shutdown is a no-op
        let out = handle.run(Duration::from_secs(1), async {});
        assert!(matches!(out, Err(RuntimeError::NotRunning)));
    }
}
