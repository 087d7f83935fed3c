//! Init container script fixes

use crate::manifest::{shell_script_index, CACHE_DIRS_INIT_CONTAINER};
use k8s_openapi::api::core::v1::{Container, PodSpec};
use tracing::debug;

/// Permission-widening step appended by the workload generator
const CHMOD_STEP: &str = " && chmod -R 777 /requests";

/// Script used once the results volume has been removed from the job
pub const NEUTRAL_INIT_SCRIPT: &str = "mkdir -p /tmp/benchmark && echo 'Init complete'";

fn script_mut(container: &mut Container) -> Option<&mut String> {
    let command = container.command.as_mut()?;
    let idx = shell_script_index(command)?;
    command.get_mut(idx)
}

/// Remove the recursive chmod from every init container script
pub(crate) fn strip_chmod(spec: &mut PodSpec) -> usize {
    let mut trimmed = 0;
    for init in spec.init_containers.iter_mut().flatten() {
        let name = init.name.clone();
        let Some(script) = script_mut(init) else {
            continue;
        };
        if script.contains(CHMOD_STEP) {
            let updated = script.replace(CHMOD_STEP, "");
            debug!(container = %name, original = %script, updated = %updated, "Removed chmod from init script");
            *script = updated;
            trimmed += 1;
        }
    }
    trimmed
}

/// Replace the cache-dirs init script with a no-op placeholder
pub(crate) fn neutralize(spec: &mut PodSpec) -> usize {
    let mut neutralized = 0;
    for init in spec.init_containers.iter_mut().flatten() {
        if init.name != CACHE_DIRS_INIT_CONTAINER {
            continue;
        }
        if let Some(script) = script_mut(init) {
            if script.as_str() != NEUTRAL_INIT_SCRIPT {
                debug!(original = %script, "Neutralizing cache-dirs init script");
                *script = NEUTRAL_INIT_SCRIPT.to_string();
                neutralized += 1;
            }
        }
    }
    neutralized
}
