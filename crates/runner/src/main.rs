//! Benchmark Runner - in-cluster entry point for a benchmark run
//!
//! Submits the evaluation job through the patching creator, with a
//! poll-and-patch watcher running alongside as a fallback, then records
//! the run.

use anyhow::{Context, Result};
use chrono::Local;
use patch_lib::{
    manifest::evaluation_job_name,
    results::{self, save_results},
    JobWatcher, KubeJobs, ManifestWorkload, MutationRules, PatchingCreator, StructuredLogger,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const RUNNER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::RunnerConfig::load()?;
    let job_name = evaluation_job_name(config.job_id());

    let logger = StructuredLogger::new("benchmark-runner");
    logger.log_startup(RUNNER_VERSION, &config.namespace, &job_name);

    let started = Instant::now();
    let result = run(&config, &logger).await;
    logger.log_run_finished(&job_name, result.is_ok(), started.elapsed().as_secs_f64());

    if let Err(e) = &result {
        error!(error = %format!("{:#}", e), "Benchmark run failed");
    }
    result
}

async fn run(config: &config::RunnerConfig, logger: &StructuredLogger) -> Result<()> {
    let rules = MutationRules::new(config.rule_config()?);
    let jobs = KubeJobs::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let path = config.workload_path();
    let workload = ManifestWorkload::load(&path, config.job_id(), config.stack())
        .await
        .with_context(|| format!("failed to load workload from {}", path.display()))?
        .with_params(config.workload_params())
        .with_repetition(config.repetition);

    // The watchers need a secret to be worth running
    let watchers = match &config.hf_token_secret {
        Some(secret) => {
            let names = workload.job_names();
            info!(jobs = ?names, secret = %secret, "Starting job watchers");
            JobWatcher::new(jobs.clone(), rules.clone(), config.watcher_config())
                .with_logger(logger.clone())
                .spawn_each(&config.namespace, names)
        }
        None => {
            warn!("HF_TOKEN_SECRET not set, credential injection disabled");
            Vec::new()
        }
    };

    let outcome = submit(config, &workload, jobs, rules, logger).await;

    for watcher in watchers {
        watcher.shutdown().await;
    }
    logger.log_shutdown("benchmark run finished");
    outcome
}

async fn submit(
    config: &config::RunnerConfig,
    workload: &ManifestWorkload,
    jobs: KubeJobs,
    rules: MutationRules,
    logger: &StructuredLogger,
) -> Result<()> {
    let creator = PatchingCreator::new(jobs, rules).with_logger(logger.clone());
    let summary = workload
        .run(&config.namespace, &creator)
        .await
        .context("failed to submit benchmark job")?;

    // This process has no results volume; the jobs themselves write there
    let run_id = results::new_run_id();
    let placeholder = PathBuf::from(format!(
        "/tmp/fmperf_placeholder_{}_{}",
        config.job_id(),
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    info!(
        results_dir = %config.results_dir,
        placeholder = %placeholder.display(),
        "Recording run outside the results volume"
    );
    save_results(&placeholder, &run_id, &summary)
        .await
        .context("failed to save results")?;

    info!(
        delay_secs = config.settle_delay_secs,
        "Waiting for submitted jobs to settle"
    );
    tokio::time::sleep(config.settle_delay()).await;
    Ok(())
}
