//! Manifest-based benchmark workload
//!
//! Loads the generated evaluation job manifest, stamps it with the run's
//! identity and tuning knobs, and submits it through a [`JobCreator`].
//! Callers hand in a patching creator so the manifest is fixed up on the
//! way to the cluster.

use crate::error::Result;
use crate::manifest::{self, evaluation_job_name, BENCHMARK_CONTAINER};
use crate::platform::JobCreator;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::EnvVar;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Optional workload tuning knobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadParams {
    pub batch_size: Option<u32>,
    pub sequence_length: Option<u32>,
    pub max_tokens: Option<u32>,
    pub num_users_warmup: Option<u32>,
    pub num_users: Option<u32>,
    pub num_rounds: Option<u32>,
    pub system_prompt: Option<u32>,
    pub chat_history: Option<u32>,
    pub answer_len: Option<u32>,
    pub test_duration: Option<u32>,
}

impl WorkloadParams {
    /// Env entries for the knobs that are set
    pub fn env_overrides(&self) -> Vec<(&'static str, u32)> {
        [
            ("FMPERF_BATCH_SIZE", self.batch_size),
            ("FMPERF_SEQUENCE_LENGTH", self.sequence_length),
            ("FMPERF_MAX_TOKENS", self.max_tokens),
            ("FMPERF_NUM_USERS_WARMUP", self.num_users_warmup),
            ("FMPERF_NUM_USERS", self.num_users),
            ("FMPERF_NUM_ROUNDS", self.num_rounds),
            ("FMPERF_SYSTEM_PROMPT", self.system_prompt),
            ("FMPERF_CHAT_HISTORY", self.chat_history),
            ("FMPERF_ANSWER_LEN", self.answer_len),
            ("FMPERF_TEST_DURATION", self.test_duration),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

/// Serving stack under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSpec {
    pub name: String,
    pub stack_type: String,
    pub endpoint_url: String,
}

/// Record of one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub job_id: String,
    pub namespace: String,
    pub stack: StackSpec,
    pub workload: WorkloadParams,
    pub jobs: Vec<SubmittedJob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub name: String,
    pub uid: Option<String>,
}

/// Workload backed by a job manifest template
#[derive(Debug, Clone)]
pub struct ManifestWorkload {
    template: Job,
    job_id: String,
    stack: StackSpec,
    params: WorkloadParams,
    repetition: u32,
}

impl ManifestWorkload {
    pub fn new(template: Job, job_id: impl Into<String>, stack: StackSpec) -> Self {
        Self {
            template,
            job_id: job_id.into(),
            stack,
            params: WorkloadParams::default(),
            repetition: 1,
        }
    }

    /// Load the template from a YAML manifest
    pub async fn load(path: &Path, job_id: impl Into<String>, stack: StackSpec) -> Result<Self> {
        info!(path = %path.display(), "Loading workload manifest");
        let template = manifest::load_manifest(path).await?;
        Ok(Self::new(template, job_id, stack))
    }

    pub fn with_params(mut self, params: WorkloadParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_repetition(mut self, repetition: u32) -> Self {
        self.repetition = repetition.max(1);
        self
    }

    /// Name of the job submitted for a repetition (1-based)
    pub fn job_name(&self, repetition: u32) -> String {
        let base = evaluation_job_name(&self.job_id);
        if self.repetition == 1 {
            base
        } else {
            format!("{}-{}", base, repetition)
        }
    }

    /// Names of every job `run` submits, in submission order
    pub fn job_names(&self) -> Vec<String> {
        (1..=self.repetition).map(|n| self.job_name(n)).collect()
    }

    /// Concrete job for one repetition
    pub fn build_job(&self, namespace: &str, repetition: u32) -> Job {
        let mut job = self.template.clone();
        job.metadata.name = Some(self.job_name(repetition));
        job.metadata.generate_name = None;
        job.metadata.namespace = Some(namespace.to_string());

        let mut overrides: Vec<(&str, String)> = vec![
            ("FMPERF_STACK_NAME", self.stack.name.clone()),
            ("FMPERF_STACK_TYPE", self.stack.stack_type.clone()),
            ("FMPERF_ENDPOINT_URL", self.stack.endpoint_url.clone()),
        ];
        overrides.extend(
            self.params
                .env_overrides()
                .into_iter()
                .map(|(name, v)| (name, v.to_string())),
        );

        if let Some(spec) = manifest::pod_spec_mut(&mut job) {
            for container in spec
                .containers
                .iter_mut()
                .filter(|c| c.name == BENCHMARK_CONTAINER)
            {
                let env = container.env.get_or_insert_with(Vec::new);
                for (name, value) in &overrides {
                    set_env(env, name, value);
                }
            }
        }
        job
    }

    /// Submit every repetition through `creator`
    pub async fn run(&self, namespace: &str, creator: &dyn JobCreator) -> Result<RunSummary> {
        let mut jobs = Vec::with_capacity(self.repetition as usize);
        for (repetition, name) in (1..=self.repetition).zip(self.job_names()) {
            let job = self.build_job(namespace, repetition);
            info!(namespace = %namespace, job = %name, repetition, "Submitting benchmark job");

            let created = creator.create(namespace, job).await?;
            jobs.push(SubmittedJob {
                name,
                uid: created.metadata.uid,
            });
        }

        Ok(RunSummary {
            job_id: self.job_id.clone(),
            namespace: namespace.to_string(),
            stack: self.stack.clone(),
            workload: self.params.clone(),
            jobs,
        })
    }
}

/// Set a literal env value, replacing the first entry of that name
fn set_env(env: &mut Vec<EnvVar>, name: &str, value: &str) {
    match env.iter_mut().find(|e| e.name == name) {
        Some(existing) => {
            existing.value = Some(value.to_string());
            existing.value_from = None;
        }
        None => env.push(EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            value_from: None,
        }),
    }
}
