//! Output formatting utilities
//!
//! Manifests go to stdout; status lines go to stderr so output can be piped.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use k8s_openapi::api::batch::v1::Job;
use patch_lib::MutationReport;

/// Output format for rendered manifests
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// YAML format (default)
    #[default]
    Yaml,
    /// JSON format
    Json,
}

/// Serialize a job in the requested format
pub fn render_job(job: &Job, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(job)?,
        OutputFormat::Json => serde_json::to_string_pretty(job)?,
    })
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// Print the non-zero counters of a mutation report
pub fn print_report(report: &MutationReport) {
    if !report.changed() {
        print_info("Manifest already patched, nothing changed");
        return;
    }
    for (label, count) in report_lines(report) {
        print_info(&format!("{}: {}", label, count.to_string().bold()));
    }
}

fn report_lines(report: &MutationReport) -> Vec<(&'static str, usize)> {
    [
        ("chmod steps stripped", report.scripts_trimmed),
        ("shell args rewritten", report.args_rewritten),
        ("result volumes removed", report.volumes_removed),
        ("result mounts removed", report.mounts_removed),
        ("paths remapped", report.paths_remapped),
        ("init scripts neutralized", report.init_scripts_neutralized),
        ("anti-affinity terms added", report.affinity_terms_added),
        ("credentials injected", report.credentials_injected),
        ("duplicate credentials removed", report.credential_duplicates_removed),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lines_skip_zero_counters() {
        let report = MutationReport {
            volumes_removed: 2,
            credentials_injected: 1,
            ..Default::default()
        };
        let lines = report_lines(&report);
        assert_eq!(
            lines,
            vec![("result volumes removed", 2), ("credentials injected", 1)]
        );
    }

    #[test]
    fn test_render_job_formats() {
        let job = Job::default();
        let json = render_job(&job, OutputFormat::Json).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&json).is_ok());
        let yaml = render_job(&job, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("apiVersion: batch/v1"));
    }
}
