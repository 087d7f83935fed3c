//! Runner configuration

use anyhow::{anyhow, Context, Result};
use patch_lib::{AffinityPolicy, RuleConfig, StackSpec, WatcherConfig, WorkloadParams};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the token secret, read without the prefix
const SECRET_ENV: &str = "HF_TOKEN_SECRET";

/// Runner configuration, sourced from `FMPERF_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Namespace the benchmark jobs run in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Job identifier; falls back to the stack name
    #[serde(default)]
    pub job_id: Option<String>,

    /// Secret holding the Hugging Face token
    #[serde(default)]
    pub hf_token_secret: Option<String>,

    /// Directory the benchmark jobs write results to
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    #[serde(default = "default_stack_name")]
    pub stack_name: String,

    #[serde(default = "default_stack_type")]
    pub stack_type: String,

    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    #[serde(default = "default_workload_dir")]
    pub workload_dir: PathBuf,

    #[serde(default = "default_workload_file")]
    pub workload_file: String,

    #[serde(default = "default_repetition")]
    pub repetition: u32,

    /// `append` or `deduplicate`
    #[serde(default = "default_affinity_policy")]
    pub affinity_policy: String,

    /// Seconds to wait after submission before stopping the watcher
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    // Workload tuning knobs
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub sequence_length: Option<u32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub num_users_warmup: Option<u32>,
    #[serde(default)]
    pub num_users: Option<u32>,
    #[serde(default)]
    pub num_rounds: Option<u32>,
    #[serde(default)]
    pub system_prompt: Option<u32>,
    #[serde(default)]
    pub chat_history: Option<u32>,
    #[serde(default)]
    pub answer_len: Option<u32>,
    #[serde(default)]
    pub test_duration: Option<u32>,
}

fn default_namespace() -> String {
    "fmperf".to_string()
}

fn default_results_dir() -> String {
    patch_lib::manifest::DEFAULT_RESULTS_DIR.to_string()
}

fn default_stack_name() -> String {
    "llm-d-32b-instruct".to_string()
}

fn default_stack_type() -> String {
    "llm-d".to_string()
}

fn default_endpoint_url() -> String {
    "inference-gateway".to_string()
}

fn default_workload_dir() -> PathBuf {
    PathBuf::from("/app/yamls")
}

fn default_workload_file() -> String {
    "lmbench_llama32b_instruct.yaml".to_string()
}

fn default_repetition() -> u32 {
    1
}

fn default_affinity_policy() -> String {
    AffinityPolicy::default().to_string()
}

fn default_settle_delay() -> u64 {
    10
}

impl RunnerConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    /// Load configuration from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::build(Some(vars))
    }

    fn build(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let secret = match &vars {
            Some(vars) => vars.get(SECRET_ENV).cloned(),
            None => std::env::var(SECRET_ENV).ok(),
        }
        .filter(|s| !s.trim().is_empty());

        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("FMPERF").source(vars))
            .set_override_option("hf_token_secret", secret)?
            .build()
            .context("failed to read runner configuration")?;

        let config: RunnerConfig = config
            .try_deserialize()
            .context("invalid runner configuration")?;
        config.affinity_policy()?;
        Ok(config)
    }

    pub fn job_id(&self) -> &str {
        self.job_id.as_deref().unwrap_or(&self.stack_name)
    }

    pub fn workload_path(&self) -> PathBuf {
        self.workload_dir.join(&self.workload_file)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn affinity_policy(&self) -> Result<AffinityPolicy> {
        self.affinity_policy.parse().map_err(|e: String| anyhow!(e))
    }

    pub fn rule_config(&self) -> Result<RuleConfig> {
        Ok(RuleConfig {
            secret_name: self.hf_token_secret.clone(),
            results_dir: self.results_dir.clone(),
            affinity_policy: self.affinity_policy()?,
            ..Default::default()
        })
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig::default()
    }

    pub fn stack(&self) -> StackSpec {
        StackSpec {
            name: self.stack_name.clone(),
            stack_type: self.stack_type.clone(),
            endpoint_url: self.endpoint_url.clone(),
        }
    }

    pub fn workload_params(&self) -> WorkloadParams {
        WorkloadParams {
            batch_size: self.batch_size,
            sequence_length: self.sequence_length,
            max_tokens: self.max_tokens,
            num_users_warmup: self.num_users_warmup,
            num_users: self.num_users,
            num_rounds: self.num_rounds,
            system_prompt: self.system_prompt,
            chat_history: self.chat_history,
            answer_len: self.answer_len,
            test_duration: self.test_duration,
        }
    }
}
