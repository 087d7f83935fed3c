//! Error types for the patching pipeline

use std::path::PathBuf;

pub type Result<T, E = PatchError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("job {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("timed out waiting for job {name} after {attempts} attempts")]
    Timeout { name: String, attempts: u32 },

    #[error("watch for job {name} cancelled")]
    Cancelled { name: String },

    #[error("watcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PatchError {
    /// Classify a kube error, turning API 404s into `NotFound`
    pub fn from_kube(err: kube::Error, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => PatchError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            other => PatchError::Kube(other),
        }
    }

    /// Whether the polling loop should keep waiting on this error
    pub fn is_not_found(&self) -> bool {
        matches!(self, PatchError::NotFound { .. })
    }
}
