//! Tests for the full rule set applied to generated manifests

use super::*;
use crate::manifest::{parse_manifest, pod_spec, RESULT_MOUNT_PATHS};
use k8s_openapi::api::core::v1::Container;
use std::path::Path;

const GENERATED_JOB: &str = r#"
apiVersion: batch/v1
kind: Job
metadata:
  name: lmbenchmark-evaluate-run1
  namespace: fmperf
  labels:
    app: lmbenchmark
spec:
  backoffLimit: 0
  template:
    spec:
      restartPolicy: Never
      nodeSelector:
        gpu: "true"
      initContainers:
        - name: init-cache-dirs
          image: busybox
          command:
            - sh
            - -c
            - mkdir -p /requests/hf_cache/datasets && chmod -R 777 /requests && ls -la /requests
          volumeMounts:
            - name: results
              mountPath: /requests
      containers:
        - name: lmbenchmark
          image: lmbench:latest
          command: ["/bin/bash", "-c"]
          args:
            - ". ~/.bashrc && . .venv/bin/activate && . .venv/bin/activate && python3 run.py --save /requests/out"
          env:
            - name: SAVE_FILE_KEY
              value: /requests/LMBench
          volumeMounts:
            - name: results
              mountPath: /requests
            - name: shm
              mountPath: /dev/shm
      volumes:
        - name: results
          persistentVolumeClaim:
            claimName: fmperf-results-pvc
        - name: shm
          emptyDir:
            medium: Memory
"#;

fn generated_job() -> Job {
    parse_manifest(GENERATED_JOB, Path::new("generated.yaml")).unwrap()
}

fn rules(secret: Option<&str>, results_dir: &str, policy: AffinityPolicy) -> MutationRules {
    MutationRules::new(RuleConfig {
        secret_name: secret.map(String::from),
        results_dir: results_dir.to_string(),
        affinity_policy: policy,
        ..Default::default()
    })
}

fn anti_affinity_len(job: &Job) -> usize {
    pod_spec(job)
        .and_then(|s| s.affinity.as_ref())
        .and_then(|a| a.pod_anti_affinity.as_ref())
        .and_then(|p| p.preferred_during_scheduling_ignored_during_execution.as_ref())
        .map_or(0, Vec::len)
}

#[test]
fn test_end_to_end_minimal_manifest() {
    let mut spec = PodSpec {
        init_containers: Some(vec![Container {
            name: "init-cache-dirs".to_string(),
            command: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                "mkdir -p /x && chmod -R 777 /requests && ls -la /requests".to_string(),
            ]),
            ..Default::default()
        }]),
        containers: vec![Container {
            name: "lmbenchmark".to_string(),
            args: Some(vec![
                ". ~/.bashrc && . .venv/bin/activate && . .venv/bin/activate".to_string(),
            ]),
            ..Default::default()
        }],
        ..Default::default()
    };

    let report = rules(Some("hf-secret"), "/requests", AffinityPolicy::Append).apply_to_pod(&mut spec);
    assert_eq!(report.scripts_trimmed, 1);
    assert_eq!(report.args_rewritten, 1);
    assert_eq!(report.init_scripts_neutralized, 0);
    assert_eq!(report.credentials_injected, 1);

    assert_eq!(
        spec.init_containers.as_ref().unwrap()[0].command.as_ref().unwrap()[2],
        "mkdir -p /x && ls -la /requests"
    );
    assert_eq!(
        spec.containers[0].args.as_ref().unwrap()[0],
        ". .venv/bin/activate"
    );

    let env = spec.containers[0].env.as_ref().unwrap();
    assert_eq!(env.len(), 1);
    assert_eq!(env[0].name, "HF_TOKEN");
    let selector = env[0]
        .value_from
        .as_ref()
        .unwrap()
        .secret_key_ref
        .as_ref()
        .unwrap();
    assert_eq!(selector.name.as_deref(), Some("hf-secret"));
}

#[test]
fn test_generated_job_is_fully_patched() {
    let mut job = generated_job();
    let report = rules(Some("hf-secret"), "/requests", AffinityPolicy::Deduplicate).apply(&mut job);

    assert_eq!(report.volumes_removed, 1);
    assert_eq!(report.mounts_removed, 2);
    assert_eq!(report.init_scripts_neutralized, 1);
    assert_eq!(report.affinity_terms_added, 1);

    let spec = pod_spec(&job).unwrap();
    let volumes: Vec<_> = spec.volumes.as_ref().unwrap().iter().map(|v| v.name.as_str()).collect();
    assert_eq!(volumes, vec!["shm"]);

    for container in spec.containers.iter().chain(spec.init_containers.iter().flatten()) {
        for mount in container.volume_mounts.iter().flatten() {
            assert!(!RESULT_MOUNT_PATHS.contains(&mount.mount_path.as_str()));
        }
    }

    let init = &spec.init_containers.as_ref().unwrap()[0];
    assert_eq!(init.command.as_ref().unwrap()[2], NEUTRAL_INIT_SCRIPT);
    assert_eq!(
        spec.containers[0].args.as_ref().unwrap()[0],
        ". .venv/bin/activate && python3 run.py --save /requests/out"
    );
}

#[test]
fn test_untargeted_fields_pass_through() {
    let mut job = generated_job();
    rules(Some("hf-secret"), "/results", AffinityPolicy::Deduplicate).apply(&mut job);

    assert_eq!(job.metadata.name.as_deref(), Some("lmbenchmark-evaluate-run1"));
    assert_eq!(job.metadata.labels.as_ref().unwrap()["app"], "lmbenchmark");
    assert_eq!(job.spec.as_ref().unwrap().backoff_limit, Some(0));

    let spec = pod_spec(&job).unwrap();
    assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
    assert_eq!(spec.node_selector.as_ref().unwrap()["gpu"], "true");
    assert_eq!(spec.containers[0].command.as_ref().unwrap(), &vec!["/bin/bash".to_string(), "-c".to_string()]);
    assert_eq!(spec.containers[0].image.as_deref(), Some("lmbench:latest"));

    let shm = &spec.containers[0].volume_mounts.as_ref().unwrap()[0];
    assert_eq!(shm.mount_path, "/dev/shm");
}

#[test]
fn test_remap_with_alternate_results_dir() {
    let mut job = generated_job();
    let report = rules(None, "/results", AffinityPolicy::Deduplicate).apply(&mut job);
    assert_eq!(report.paths_remapped, 2);

    let container = &pod_spec(&job).unwrap().containers[0];
    assert_eq!(
        container.args.as_ref().unwrap()[0],
        ". .venv/bin/activate && python3 run.py --save /results/out"
    );
    assert_eq!(
        container.env.as_ref().unwrap()[0].value.as_deref(),
        Some("/results/LMBench")
    );
    // no secret configured, no token injected
    assert_eq!(container.env.as_ref().unwrap().len(), 1);
}

#[test]
fn test_apply_twice_deduplicate_is_idempotent() {
    let rules = rules(Some("hf-secret"), "/results", AffinityPolicy::Deduplicate);
    let mut once = generated_job();
    rules.apply(&mut once);

    let mut twice = once.clone();
    let second = rules.apply(&mut twice);

    assert!(!second.changed(), "second pass changed: {:?}", second);
    assert_eq!(once, twice);
}

#[test]
fn test_apply_twice_append_only_grows_affinity() {
    let rules = rules(Some("hf-secret"), "/results", AffinityPolicy::Append);
    let mut once = generated_job();
    rules.apply(&mut once);

    let mut twice = once.clone();
    let second = rules.apply(&mut twice);
    assert_eq!(second, MutationReport { affinity_terms_added: 1, ..Default::default() });
    assert_eq!(anti_affinity_len(&once), 1);
    assert_eq!(anti_affinity_len(&twice), 2);

    // identical apart from the affinity list
    for job in [&mut once, &mut twice] {
        job.spec.as_mut().unwrap().template.spec.as_mut().unwrap().affinity = None;
    }
    assert_eq!(once, twice);
}

#[test]
fn test_job_without_pod_template_passes_through() {
    let mut job = Job::default();
    let report = MutationRules::default().apply(&mut job);
    assert!(!report.changed());
    assert_eq!(job, Job::default());
}

#[test]
fn test_affinity_policy_parsing() {
    assert_eq!("append".parse::<AffinityPolicy>().unwrap(), AffinityPolicy::Append);
    assert_eq!(" Deduplicate ".parse::<AffinityPolicy>().unwrap(), AffinityPolicy::Deduplicate);
    assert!("merge".parse::<AffinityPolicy>().is_err());
    assert_eq!(AffinityPolicy::default().to_string(), "deduplicate");
}

#[test]
fn test_results_dir_under_requests_is_idempotent() {
    let rules = rules(Some("hf-secret"), "/requests/llmd", AffinityPolicy::Deduplicate);
    let mut once = generated_job();
    let first = rules.apply(&mut once);
    assert_eq!(first.paths_remapped, 2);

    let container = &pod_spec(&once).unwrap().containers[0];
    assert_eq!(
        container.args.as_ref().unwrap()[0],
        ". .venv/bin/activate && python3 run.py --save /requests/llmd/out"
    );
    assert_eq!(
        container.env.as_ref().unwrap()[0].value.as_deref(),
        Some("/requests/llmd/LMBench")
    );

    let mut twice = once.clone();
    let second = rules.apply(&mut twice);
    assert!(!second.changed(), "second pass changed: {:?}", second);
    assert_eq!(once, twice);
}
