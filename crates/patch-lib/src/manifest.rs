//! Job manifest access helpers
//!
//! The generated manifests leave most pod template fields optional; these
//! helpers treat an absent sequence as empty so the rules never have to.

use crate::error::{PatchError, Result};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Container, PodSpec};
use std::path::Path;

/// Default results directory used by the generated jobs
pub const DEFAULT_RESULTS_DIR: &str = "/requests";

/// Name prefix of the generated evaluation jobs
pub const EVALUATION_JOB_PREFIX: &str = "lmbenchmark-evaluate";

/// Init container that prepares the cache directories
pub const CACHE_DIRS_INIT_CONTAINER: &str = "init-cache-dirs";

/// Main benchmark container
pub const BENCHMARK_CONTAINER: &str = "lmbenchmark";

/// Persistent claims holding results that must not be attached by evaluation jobs
pub const RESULT_CLAIMS: [&str; 3] = [
    "baseline-results-pvc",
    "llm-d-results-pvc",
    "fmperf-results-pvc",
];

/// Mount paths of the result claims inside the generated containers
pub const RESULT_MOUNT_PATHS: [&str; 3] = ["/requests", "/baseline-requests", "/llmd-requests"];

/// Name of the evaluation job for a given job id
pub fn evaluation_job_name(job_id: &str) -> String {
    if job_id.is_empty() {
        EVALUATION_JOB_PREFIX.to_string()
    } else {
        format!("{}-{}", EVALUATION_JOB_PREFIX, job_id)
    }
}

/// Name of a job, falling back to `generateName`
pub fn job_name(job: &Job) -> Option<&str> {
    job.metadata
        .name
        .as_deref()
        .or(job.metadata.generate_name.as_deref())
}

/// Mutable pod spec of a job, if the manifest carries one
pub fn pod_spec_mut(job: &mut Job) -> Option<&mut PodSpec> {
    job.spec.as_mut()?.template.spec.as_mut()
}

/// Pod spec of a job, if the manifest carries one
pub fn pod_spec(job: &Job) -> Option<&PodSpec> {
    job.spec.as_ref()?.template.spec.as_ref()
}

/// Main and init containers of a pod, in that order
pub fn all_containers_mut(spec: &mut PodSpec) -> impl Iterator<Item = &mut Container> + '_ {
    spec.containers
        .iter_mut()
        .chain(spec.init_containers.iter_mut().flatten())
}

/// Index of the script in a `sh -c <script>` command, if present
pub fn shell_script_index(command: &[String]) -> Option<usize> {
    command
        .windows(3)
        .position(|w| is_shell(&w[0]) && w[1] == "-c")
        .map(|i| i + 2)
}

fn is_shell(program: &str) -> bool {
    matches!(program, "sh" | "/bin/sh" | "bash" | "/bin/bash")
}

/// Parse a job manifest from YAML text
pub fn parse_manifest(yaml: &str, origin: &Path) -> Result<Job> {
    serde_yaml::from_str(yaml).map_err(|source| PatchError::Manifest {
        path: origin.to_path_buf(),
        source,
    })
}

/// Load a job manifest from a YAML file
pub async fn load_manifest(path: &Path) -> Result<Job> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_manifest(&content, path)
}
