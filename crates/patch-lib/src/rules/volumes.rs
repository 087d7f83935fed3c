//! Result storage pruning
//!
//! The result claims are single-writer volumes; concurrently scheduled
//! evaluation jobs on different nodes cannot all attach them, so the jobs
//! drop them entirely.

use crate::manifest::{all_containers_mut, RESULT_CLAIMS, RESULT_MOUNT_PATHS};
use k8s_openapi::api::core::v1::{PodSpec, Volume};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PruneOutcome {
    pub volumes_removed: usize,
    pub mounts_removed: usize,
}

fn is_result_claim(volume: &Volume) -> bool {
    volume
        .persistent_volume_claim
        .as_ref()
        .is_some_and(|pvc| RESULT_CLAIMS.contains(&pvc.claim_name.as_str()))
}

/// Remove result claim volumes and every mount at a result path
pub(crate) fn prune_result_storage(spec: &mut PodSpec) -> PruneOutcome {
    let mut outcome = PruneOutcome::default();

    if let Some(volumes) = spec.volumes.as_mut() {
        let before = volumes.len();
        volumes.retain(|v| !is_result_claim(v));
        outcome.volumes_removed = before - volumes.len();
        if outcome.volumes_removed > 0 {
            debug!(
                removed = outcome.volumes_removed,
                kept = volumes.len(),
                "Removed result claim volumes"
            );
        }
    }

    for container in all_containers_mut(spec) {
        let Some(mounts) = container.volume_mounts.as_mut() else {
            continue;
        };
        let before = mounts.len();
        mounts.retain(|m| !RESULT_MOUNT_PATHS.contains(&m.mount_path.as_str()));
        let removed = before - mounts.len();
        if removed > 0 {
            debug!(container = %container.name, removed, "Removed result volume mounts");
            outcome.mounts_removed += removed;
        }
    }

    outcome
}
