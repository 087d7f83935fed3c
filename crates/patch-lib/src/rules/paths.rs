//! Results directory remapping

use crate::manifest::{all_containers_mut, DEFAULT_RESULTS_DIR};
use k8s_openapi::api::core::v1::PodSpec;
use tracing::debug;

/// Replace `/requests` in `text`, skipping occurrences that already start
/// `results_dir`
///
/// Returns `None` when nothing was replaced.
fn remap_text(text: &str, results_dir: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut replaced = false;
    for (idx, _) in text.match_indices(DEFAULT_RESULTS_DIR) {
        if text[idx..].starts_with(results_dir) {
            continue;
        }
        out.push_str(&text[last..idx]);
        out.push_str(results_dir);
        last = idx + DEFAULT_RESULTS_DIR.len();
        replaced = true;
    }
    if !replaced {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}

/// Point every `/requests` reference at `results_dir`
///
/// Mounts are matched by exact path in both container sequences; arguments
/// and literal env values of the main containers by substring.
pub(crate) fn remap(spec: &mut PodSpec, results_dir: &str) -> usize {
    if results_dir == DEFAULT_RESULTS_DIR {
        return 0;
    }
    let mut remapped = 0;

    for container in all_containers_mut(spec) {
        for mount in container.volume_mounts.iter_mut().flatten() {
            if mount.mount_path == DEFAULT_RESULTS_DIR {
                debug!(container = %container.name, to = %results_dir, "Remapped volume mount");
                mount.mount_path = results_dir.to_string();
                remapped += 1;
            }
        }
    }

    for container in spec.containers.iter_mut() {
        for arg in container.args.iter_mut().flatten() {
            if let Some(updated) = remap_text(arg, results_dir) {
                debug!(container = %container.name, arg = %updated, "Remapped path in argument");
                *arg = updated;
                remapped += 1;
            }
        }

        for env in container.env.iter_mut().flatten() {
            let Some(value) = env.value.as_mut() else {
                continue;
            };
            if let Some(updated) = remap_text(value, results_dir) {
                debug!(env = %env.name, from = %value, to = %updated, "Remapped env value");
                *value = updated;
                remapped += 1;
            }
        }
    }

    remapped
}
