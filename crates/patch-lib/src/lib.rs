//! Patching library for auto-generated benchmark jobs
//!
//! This crate provides the core functionality for:
//! - The mutation rule set applied to benchmark job manifests
//! - Intercepting job creation so manifests are patched before submission
//! - Polling for an already-created job and merge-patching it
//! - Loading and submitting the workload manifest
//! - Results persistence and structured logging

pub mod error;
pub mod intercept;
pub mod manifest;
pub mod observability;
pub mod platform;
pub mod results;
pub mod rules;
pub mod watcher;
pub mod workload;

pub use error::{PatchError, Result};
pub use intercept::PatchingCreator;
pub use observability::StructuredLogger;
pub use platform::{JobCreator, JobStore, KubeJobs};
pub use rules::{AffinityPolicy, MutationReport, MutationRules, RuleConfig};
pub use watcher::{JobWatcher, WatchOutcome, WatcherConfig, WatcherHandle};
pub use workload::{ManifestWorkload, RunSummary, StackSpec, WorkloadParams};
