//! Poll-and-patch watcher
//!
//! Polls for a named job until it exists, then applies the mutation rules
//! and merge-patches its pod template. The watcher runs as a task owned by
//! a [`WatcherHandle`]; cancelling the handle interrupts the retry wait.

use crate::error::{PatchError, Result};
use crate::observability::{PatchSource, StructuredLogger};
use crate::platform::JobStore;
use crate::rules::{MutationReport, MutationRules};
use k8s_openapi::api::batch::v1::Job;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Maximum number of reads before giving up (default: 10)
    pub max_attempts: u32,
    /// Wait between reads while the job is missing (default: 5 seconds)
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Result of a successful watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The job was found on read number `attempts` and patched
    Patched {
        attempts: u32,
        report: MutationReport,
    },
}

/// Waits for a job to exist, then patches it in place
#[derive(Clone)]
pub struct JobWatcher<S> {
    store: S,
    rules: MutationRules,
    config: WatcherConfig,
    logger: StructuredLogger,
}

impl<S: JobStore + 'static> JobWatcher<S> {
    pub fn new(store: S, rules: MutationRules, config: WatcherConfig) -> Self {
        Self {
            store,
            rules,
            config,
            logger: StructuredLogger::new("watcher"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Poll for the job, patch it, and report how many reads it took
    ///
    /// Only a not-found read is retried; any other failure is returned
    /// immediately. A message on `shutdown` (or its sender closing) cancels
    /// the wait between reads.
    pub async fn run(
        &self,
        namespace: &str,
        name: &str,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<WatchOutcome> {
        info!(namespace = %namespace, job = %name, "Watching for job");

        let (mut job, attempts) = self.wait_for_job(namespace, name, shutdown).await?;
        let report = self.rules.apply(&mut job);
        self.store.patch_template(namespace, name, &job).await?;
        self.logger
            .log_job_patched(PatchSource::Watcher, namespace, name, &report);

        Ok(WatchOutcome::Patched { attempts, report })
    }

    async fn wait_for_job(
        &self,
        namespace: &str,
        name: &str,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(Job, u32)> {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            match self.store.get(namespace, name).await {
                Ok(job) => {
                    debug!(job = %name, attempt, "Found job");
                    return Ok((job, attempt));
                }
                Err(e) if e.is_not_found() => {
                    self.logger.log_watch_retry(name, attempt, max_attempts);
                    if attempt == max_attempts {
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.recv() => {
                            info!(job = %name, "Watch cancelled");
                            return Err(PatchError::Cancelled { name: name.to_string() });
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        self.logger.log_watch_timeout(name, max_attempts);
        Err(PatchError::Timeout {
            name: name.to_string(),
            attempts: max_attempts,
        })
    }

    /// Run the watcher as a task bound to the returned handle
    pub fn spawn(self, namespace: impl Into<String>, name: impl Into<String>) -> WatcherHandle {
        let namespace = namespace.into();
        let name = name.into();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let job = name.clone();
        let task = tokio::spawn(async move {
            let result = self.run(&namespace, &name, &mut shutdown_rx).await;
            if let Err(e) = &result {
                error!(job = %name, error = %e, "Watcher finished without patching");
            }
            result
        });

        WatcherHandle {
            job,
            shutdown_tx,
            task,
        }
    }
}

impl<S: JobStore + Clone + 'static> JobWatcher<S> {
    /// Spawn one watcher per job name
    pub fn spawn_each<I>(self, namespace: &str, names: I) -> Vec<WatcherHandle>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        names
            .into_iter()
            .map(|name| self.clone().spawn(namespace.to_string(), name))
            .collect()
    }
}

/// Handle to a spawned watcher task
///
/// Dropping the handle also cancels a pending wait.
pub struct WatcherHandle {
    job: String,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<Result<WatchOutcome>>,
}

impl WatcherHandle {
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Signal the watcher to stop at its next wait
    pub fn cancel(&self) {
        // no receiver means the task already finished
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for the watcher task to finish
    pub async fn join(self) -> Result<WatchOutcome> {
        self.task.await?
    }

    /// Cancel and wait, logging rather than returning the outcome
    pub async fn shutdown(self) {
        self.cancel();
        let job = self.job.clone();
        match self.join().await {
            Ok(WatchOutcome::Patched { attempts, .. }) => {
                info!(job = %job, attempts, "Watcher patched job")
            }
            Err(PatchError::Cancelled { .. }) => debug!(job = %job, "Watcher cancelled"),
            Err(e) => debug!(job = %job, error = %e, "Watcher ended with error"),
        }
    }
}
