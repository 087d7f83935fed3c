//! Structured logging for patching events
//!
//! Emits event-tagged records so a JSON log pipeline can follow a job
//! from interception or discovery through to the patch.

use crate::rules::MutationReport;
use tracing::{error, info, warn};

/// Where a patch was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSource {
    /// Patched before submission by the intercepting creator
    Interceptor,
    /// Patched after creation by the polling watcher
    Watcher,
}

impl PatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchSource::Interceptor => "interceptor",
            PatchSource::Watcher => "watcher",
        }
    }
}

/// Structured logger for patching events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Log process startup
    pub fn log_startup(&self, version: &str, namespace: &str, job_name: &str) {
        info!(
            event = "run_started",
            component = %self.component,
            version = %version,
            namespace = %namespace,
            job = %job_name,
            "Benchmark run starting"
        );
    }

    /// Log the end of the outer benchmark run
    pub fn log_run_finished(&self, job_name: &str, success: bool, elapsed_secs: f64) {
        if success {
            info!(
                event = "run_finished",
                component = %self.component,
                job = %job_name,
                success = true,
                elapsed_secs = elapsed_secs,
                "Benchmark run completed successfully"
            );
        } else {
            error!(
                event = "run_finished",
                component = %self.component,
                job = %job_name,
                success = false,
                elapsed_secs = elapsed_secs,
                "Benchmark run failed"
            );
        }
    }

    /// Log an intercepted job creation
    pub fn log_job_intercepted(&self, namespace: &str, job_name: &str) {
        info!(
            event = "job_intercepted",
            component = %self.component,
            namespace = %namespace,
            job = %job_name,
            "Intercepted job creation"
        );
    }

    /// Log a job that does not match the evaluation pattern
    pub fn log_job_skipped(&self, namespace: &str, job_name: &str) {
        info!(
            event = "job_skipped",
            component = %self.component,
            namespace = %namespace,
            job = %job_name,
            "Skipping job, not a benchmark evaluation job"
        );
    }

    /// Log a completed patch with what changed
    pub fn log_job_patched(
        &self,
        source: PatchSource,
        namespace: &str,
        job_name: &str,
        report: &MutationReport,
    ) {
        info!(
            event = "job_patched",
            component = %self.component,
            source = source.as_str(),
            namespace = %namespace,
            job = %job_name,
            changed = report.changed(),
            volumes_removed = report.volumes_removed,
            mounts_removed = report.mounts_removed,
            credentials_injected = report.credentials_injected,
            affinity_terms_added = report.affinity_terms_added,
            "Patched benchmark job"
        );
    }

    /// Log a polling attempt that found no job yet
    pub fn log_watch_retry(&self, job_name: &str, attempt: u32, max_attempts: u32) {
        info!(
            event = "watch_retry",
            component = %self.component,
            job = %job_name,
            attempt = attempt,
            max_attempts = max_attempts,
            "Job not found yet, waiting"
        );
    }

    /// Log an exhausted polling budget
    pub fn log_watch_timeout(&self, job_name: &str, attempts: u32) {
        warn!(
            event = "watch_timeout",
            component = %self.component,
            job = %job_name,
            attempts = attempts,
            "Timed out waiting for job to be created"
        );
    }

    /// Log process shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            component = %self.component,
            reason = %reason,
            "Shutting down"
        );
    }
}
