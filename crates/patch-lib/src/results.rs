//! Results persistence
//!
//! One JSON document per run, stored as
//! `<results_dir>/run_<timestamp>_<run_id>/benchmark_results.json`.

use crate::error::{PatchError, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RESULTS_FILE_NAME: &str = "benchmark_results.json";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Timestamp-based run identifier
pub fn new_run_id() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Directory name for a run started at `at`
pub fn run_dir_name(at: DateTime<Local>, run_id: &str) -> String {
    format!("run_{}_{}", at.format(TIMESTAMP_FORMAT), run_id)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PatchError + '_ {
    move |source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write a results record and return the file path
pub async fn save_results<T: Serialize>(
    results_dir: &Path,
    run_id: &str,
    results: &T,
) -> Result<PathBuf> {
    let run_dir = results_dir.join(run_dir_name(Local::now(), run_id));
    tokio::fs::create_dir_all(&run_dir)
        .await
        .map_err(io_error(&run_dir))?;

    let file = run_dir.join(RESULTS_FILE_NAME);
    let body = serde_json::to_vec_pretty(results)?;
    tokio::fs::write(&file, body)
        .await
        .map_err(io_error(&file))?;

    info!(path = %file.display(), "Results saved");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_test::assert_err;

    #[test]
    fn test_run_dir_name() {
        let at = Local.with_ymd_and_hms(2025, 5, 18, 9, 30, 5).unwrap();
        assert_eq!(run_dir_name(at, "stack-a"), "run_20250518_093005_stack-a");
    }

    #[test]
    fn test_run_id_shape() {
        let id = new_run_id();
        assert_eq!(id.len(), 15);
        assert_eq!(&id[8..9], "_");
    }

    #[tokio::test]
    async fn test_save_results_layout() {
        let dir = TempDir::new().unwrap();
        let results = json!({ "job": "lmbenchmark-evaluate-run1", "repetitions": 1 });

        let path = save_results(dir.path(), "run1", &results).await.unwrap();

        assert_eq!(path.file_name().unwrap(), RESULTS_FILE_NAME);
        let run_dir = path.parent().unwrap();
        assert_eq!(run_dir.parent().unwrap(), dir.path());
        let dir_name = run_dir.file_name().unwrap().to_str().unwrap();
        assert!(dir_name.starts_with("run_"));
        assert!(dir_name.ends_with("_run1"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, results);
    }

    #[tokio::test]
    async fn test_save_results_unwritable_dir() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = assert_err!(save_results(&blocker, "run1", &json!({})).await);
        assert!(matches!(err, PatchError::Io { .. }));
    }
}
