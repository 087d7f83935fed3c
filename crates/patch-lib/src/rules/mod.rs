//! Mutation rule set for generated benchmark jobs
//!
//! Every edit works on the in-memory pod template only and is idempotent,
//! except anti-affinity injection under [`AffinityPolicy::Append`]. Absent
//! optional fields are treated as empty sequences; no edit fails.
//!
//! Edits run in a fixed order:
//! 1. strip `chmod -R 777 /requests` from init container scripts
//! 2. normalize the `lmbenchmark` shell activation chain
//! 3. prune result claim volumes and their mounts
//! 4. remap `/requests` to an alternate results directory
//! 5. neutralize the cache-dirs init script once its volume is gone
//! 6. inject pod anti-affinity between evaluation jobs
//! 7. inject the Hugging Face token from a secret

mod affinity;
mod cache_dirs;
mod credentials;
mod paths;
mod shell;
mod volumes;

#[cfg(test)]
mod tests;

pub use affinity::evaluation_anti_affinity_term;
pub use cache_dirs::NEUTRAL_INIT_SCRIPT;
pub use credentials::{CREDENTIAL_ENV_NAME, DEFAULT_SECRET_KEY};
pub use shell::{ShellChain, ShellStep};

use crate::manifest::{self, DEFAULT_RESULTS_DIR};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::PodSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// How anti-affinity terms are added to a pod template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffinityPolicy {
    /// Always append a new term, even if an equal one is present
    Append,
    /// Append only if no structurally equal term is present
    #[default]
    Deduplicate,
}

impl FromStr for AffinityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(AffinityPolicy::Append),
            "deduplicate" | "dedup" => Ok(AffinityPolicy::Deduplicate),
            other => Err(format!("unknown affinity policy '{}'", other)),
        }
    }
}

impl fmt::Display for AffinityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffinityPolicy::Append => write!(f, "append"),
            AffinityPolicy::Deduplicate => write!(f, "deduplicate"),
        }
    }
}

/// Caller-supplied settings for the rule set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConfig {
    /// Secret holding the Hugging Face token; `None` disables injection
    pub secret_name: Option<String>,
    /// Key of the token inside the secret
    pub secret_key: String,
    /// Results directory the jobs should write to (default: `/requests`)
    pub results_dir: String,
    /// Anti-affinity append behavior
    pub affinity_policy: AffinityPolicy,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            secret_name: None,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
            affinity_policy: AffinityPolicy::default(),
        }
    }
}

/// What a single application of the rule set changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationReport {
    pub scripts_trimmed: usize,
    pub args_rewritten: usize,
    pub volumes_removed: usize,
    pub mounts_removed: usize,
    pub paths_remapped: usize,
    pub init_scripts_neutralized: usize,
    pub affinity_terms_added: usize,
    pub credentials_injected: usize,
    pub credential_duplicates_removed: usize,
}

impl MutationReport {
    /// Whether any edit modified the manifest
    pub fn changed(&self) -> bool {
        *self != MutationReport::default()
    }
}

/// The fixed, ordered set of manifest edits
#[derive(Debug, Clone, Default)]
pub struct MutationRules {
    config: RuleConfig,
}

impl MutationRules {
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Apply every edit to a job manifest
    ///
    /// A manifest without a pod template is passed through unchanged.
    pub fn apply(&self, job: &mut Job) -> MutationReport {
        let name = manifest::job_name(job).unwrap_or("<unnamed>").to_string();
        let Some(spec) = manifest::pod_spec_mut(job) else {
            debug!(job = %name, "Job has no pod template, nothing to patch");
            return MutationReport::default();
        };

        let report = self.apply_to_pod(spec);
        info!(
            job = %name,
            scripts_trimmed = report.scripts_trimmed,
            args_rewritten = report.args_rewritten,
            volumes_removed = report.volumes_removed,
            mounts_removed = report.mounts_removed,
            paths_remapped = report.paths_remapped,
            init_scripts_neutralized = report.init_scripts_neutralized,
            affinity_terms_added = report.affinity_terms_added,
            credentials_injected = report.credentials_injected,
            "Applied mutation rules"
        );
        report
    }

    /// Apply every edit to a pod spec
    pub fn apply_to_pod(&self, spec: &mut PodSpec) -> MutationReport {
        let mut report = MutationReport {
            scripts_trimmed: cache_dirs::strip_chmod(spec),
            args_rewritten: shell::fix_activation(spec),
            ..Default::default()
        };

        let pruned = volumes::prune_result_storage(spec);
        report.volumes_removed = pruned.volumes_removed;
        report.mounts_removed = pruned.mounts_removed;

        if self.config.results_dir != DEFAULT_RESULTS_DIR {
            report.paths_remapped = paths::remap(spec, &self.config.results_dir);
        }

        if pruned.volumes_removed > 0 {
            report.init_scripts_neutralized = cache_dirs::neutralize(spec);
        }

        if affinity::inject(spec, self.config.affinity_policy) {
            report.affinity_terms_added = 1;
        }

        if let Some(secret) = self.config.secret_name.as_deref() {
            let injected = credentials::inject(spec, secret, &self.config.secret_key);
            report.credentials_injected = injected.added;
            report.credential_duplicates_removed = injected.duplicates_removed;
        }

        report
    }
}
