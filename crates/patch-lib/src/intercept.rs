//! Intercept-and-patch job submission
//!
//! [`PatchingCreator`] decorates any [`JobCreator`]: evaluation jobs are
//! run through the mutation rules before they reach the wrapped creator,
//! everything else is forwarded untouched. The decorator is an ordinary
//! value owned by the caller, so it can be nested or used concurrently.

use crate::error::Result;
use crate::manifest::{self, EVALUATION_JOB_PREFIX};
use crate::observability::{PatchSource, StructuredLogger};
use crate::platform::JobCreator;
use crate::rules::MutationRules;
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;

/// Job creator that patches evaluation jobs before submission
pub struct PatchingCreator<C> {
    inner: C,
    rules: MutationRules,
    name_prefix: String,
    logger: StructuredLogger,
}

impl<C: JobCreator> PatchingCreator<C> {
    pub fn new(inner: C, rules: MutationRules) -> Self {
        Self {
            inner,
            rules,
            name_prefix: EVALUATION_JOB_PREFIX.to_string(),
            logger: StructuredLogger::new("interceptor"),
        }
    }

    /// Override the job name prefix that selects jobs for patching
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Whether a job name selects the job for patching
    pub fn matches(&self, job_name: &str) -> bool {
        job_name.starts_with(&self.name_prefix)
    }
}

#[async_trait]
impl<C: JobCreator> JobCreator for PatchingCreator<C> {
    async fn create(&self, namespace: &str, mut job: Job) -> Result<Job> {
        let name = manifest::job_name(&job).unwrap_or_default().to_string();
        self.logger.log_job_intercepted(namespace, &name);

        if self.matches(&name) {
            let report = self.rules.apply(&mut job);
            self.logger
                .log_job_patched(PatchSource::Interceptor, namespace, &name, &report);
        } else {
            self.logger.log_job_skipped(namespace, &name);
        }

        self.inner.create(namespace, job).await
    }
}
