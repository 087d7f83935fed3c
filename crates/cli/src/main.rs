//! Benchmark job patcher CLI
//!
//! Applies the benchmark job mutation rules to a manifest offline, or
//! injects them into a job already running in the cluster.

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use patch_lib::{
    manifest::{self, evaluation_job_name},
    AffinityPolicy, JobWatcher, KubeJobs, MutationRules, PatchError, RuleConfig, WatchOutcome,
    WatcherConfig,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Benchmark job patcher CLI
#[derive(Parser)]
#[command(name = "jobpatch")]
#[command(author, version, about = "CLI for patching benchmark evaluation jobs", long_about = None)]
pub struct Cli {
    /// Secret holding the Hugging Face token (can also be set via HF_TOKEN_SECRET)
    #[arg(long, global = true, env = "HF_TOKEN_SECRET")]
    pub secret: Option<String>,

    /// Key of the token inside the secret
    #[arg(long, global = true, default_value = patch_lib::rules::DEFAULT_SECRET_KEY)]
    pub secret_key: String,

    /// Alternate results directory
    #[arg(long, global = true, env = "FMPERF_RESULTS_DIR", default_value = manifest::DEFAULT_RESULTS_DIR)]
    pub results_dir: String,

    /// Anti-affinity policy (append or deduplicate)
    #[arg(long, global = true, env = "FMPERF_AFFINITY_POLICY", default_value = "deduplicate")]
    pub affinity_policy: AffinityPolicy,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply the mutation rules to a manifest file and print the result
    Render {
        /// Job manifest (YAML)
        #[arg(long, short)]
        manifest: PathBuf,

        /// Output format
        #[arg(long, short, default_value = "yaml")]
        format: output::OutputFormat,
    },

    /// Wait for an evaluation job in the cluster and patch it in place
    Inject {
        /// Namespace of the job
        #[arg(long, short, env = "FMPERF_NAMESPACE", default_value = "fmperf")]
        namespace: String,

        /// Job identifier (job name is lmbenchmark-evaluate-<id>)
        #[arg(long, env = "FMPERF_JOB_ID")]
        job_id: String,

        /// Maximum number of reads before giving up
        #[arg(long, default_value_t = 10)]
        max_attempts: u32,

        /// Seconds between reads while the job is missing
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,
    },
}

impl Cli {
    fn rule_config(&self) -> RuleConfig {
        RuleConfig {
            secret_name: self.secret.clone().filter(|s| !s.trim().is_empty()),
            secret_key: self.secret_key.clone(),
            results_dir: self.results_dir.clone(),
            affinity_policy: self.affinity_policy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let rules = MutationRules::new(cli.rule_config());

    match &cli.command {
        Commands::Render { manifest, format } => render(&rules, manifest, *format).await,
        Commands::Inject {
            namespace,
            job_id,
            max_attempts,
            poll_interval,
        } => {
            let config = WatcherConfig {
                max_attempts: *max_attempts,
                poll_interval: Duration::from_secs(*poll_interval),
            };
            inject(rules, namespace, job_id, config).await
        }
    }
}

async fn render(rules: &MutationRules, path: &Path, format: output::OutputFormat) -> Result<()> {
    let mut job = manifest::load_manifest(path).await?;
    if rules.config().secret_name.is_none() {
        output::print_warning("No secret given, credential injection disabled");
    }

    let report = rules.apply(&mut job);
    print!("{}", output::render_job(&job, format)?);
    output::print_report(&report);
    Ok(())
}

async fn inject(rules: MutationRules, namespace: &str, job_id: &str, config: WatcherConfig) -> Result<()> {
    let name = evaluation_job_name(job_id);
    if rules.config().secret_name.is_none() {
        output::print_warning("No secret given, only structural fixes will be applied");
    }

    let jobs = KubeJobs::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    let watcher = JobWatcher::new(jobs, rules, config);

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    output::print_info(&format!("Waiting for job {}/{}", namespace, name));
    match watcher.run(namespace, &name, &mut shutdown_rx).await {
        Ok(WatchOutcome::Patched { attempts, report }) => {
            output::print_success(&format!("Patched {} after {} read(s)", name, attempts));
            output::print_report(&report);
            Ok(())
        }
        Err(PatchError::Cancelled { .. }) => {
            output::print_warning("Interrupted before the job appeared");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to patch job {}", name)),
    }
}
