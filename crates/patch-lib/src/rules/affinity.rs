//! Pod anti-affinity between evaluation jobs

use super::AffinityPolicy;
use k8s_openapi::api::core::v1::{
    Affinity, PodAffinityTerm, PodAntiAffinity, PodSpec, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use tracing::debug;

const TERM_WEIGHT: i32 = 100;
const JOB_NAME_LABEL: &str = "job-name";
const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

/// Preference against sharing a node with any pod owned by a job
pub fn evaluation_anti_affinity_term() -> WeightedPodAffinityTerm {
    WeightedPodAffinityTerm {
        weight: TERM_WEIGHT,
        pod_affinity_term: PodAffinityTerm {
            label_selector: Some(LabelSelector {
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: JOB_NAME_LABEL.to_string(),
                    operator: "Exists".to_string(),
                    values: None,
                }]),
                match_labels: None,
            }),
            topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
            ..Default::default()
        },
    }
}

/// Add the evaluation anti-affinity term; returns whether a term was added
pub(crate) fn inject(spec: &mut PodSpec, policy: AffinityPolicy) -> bool {
    let terms = spec
        .affinity
        .get_or_insert_with(Affinity::default)
        .pod_anti_affinity
        .get_or_insert_with(PodAntiAffinity::default)
        .preferred_during_scheduling_ignored_during_execution
        .get_or_insert_with(Vec::new);

    let term = evaluation_anti_affinity_term();
    if policy == AffinityPolicy::Deduplicate && terms.contains(&term) {
        debug!("Anti-affinity term already present");
        return false;
    }
    terms.push(term);
    debug!(terms = terms.len(), "Added pod anti-affinity term");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::NodeAffinity;

    fn preferred(spec: &PodSpec) -> &Vec<WeightedPodAffinityTerm> {
        spec.affinity
            .as_ref()
            .unwrap()
            .pod_anti_affinity
            .as_ref()
            .unwrap()
            .preferred_during_scheduling_ignored_during_execution
            .as_ref()
            .unwrap()
    }

    #[test]
    fn test_creates_affinity_structure() {
        let mut spec = PodSpec::default();
        assert!(inject(&mut spec, AffinityPolicy::Deduplicate));

        let terms = preferred(&spec);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].weight, 100);
        assert_eq!(terms[0].pod_affinity_term.topology_key, "kubernetes.io/hostname");
        let expr = &terms[0]
            .pod_affinity_term
            .label_selector
            .as_ref()
            .unwrap()
            .match_expressions
            .as_ref()
            .unwrap()[0];
        assert_eq!(expr.key, "job-name");
        assert_eq!(expr.operator, "Exists");
    }

    #[test]
    fn test_deduplicate_skips_equal_term() {
        let mut spec = PodSpec::default();
        assert!(inject(&mut spec, AffinityPolicy::Deduplicate));
        assert!(!inject(&mut spec, AffinityPolicy::Deduplicate));
        assert_eq!(preferred(&spec).len(), 1);
    }

    #[test]
    fn test_append_accumulates_terms() {
        let mut spec = PodSpec::default();
        assert!(inject(&mut spec, AffinityPolicy::Append));
        assert!(inject(&mut spec, AffinityPolicy::Append));
        assert_eq!(preferred(&spec).len(), 2);
    }

    #[test]
    fn test_existing_affinity_is_preserved() {
        let mut spec = PodSpec {
            affinity: Some(Affinity {
                node_affinity: Some(NodeAffinity::default()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(inject(&mut spec, AffinityPolicy::Deduplicate));
        assert!(spec.affinity.as_ref().unwrap().node_affinity.is_some());
    }
}
