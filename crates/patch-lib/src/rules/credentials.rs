//! Hugging Face token injection

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, PodSpec, SecretKeySelector};
use tracing::debug;

/// Env var the benchmark reads the token from
pub const CREDENTIAL_ENV_NAME: &str = "HF_TOKEN";

/// Default key of the token inside the secret
pub const DEFAULT_SECRET_KEY: &str = "HF_TOKEN";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InjectOutcome {
    pub added: usize,
    pub duplicates_removed: usize,
}

fn is_secret_sourced_token(env: &EnvVar) -> bool {
    env.name == CREDENTIAL_ENV_NAME
        && env
            .value_from
            .as_ref()
            .is_some_and(|src| src.secret_key_ref.is_some())
}

fn token_from_secret(secret_name: &str, secret_key: &str) -> EnvVar {
    EnvVar {
        name: CREDENTIAL_ENV_NAME.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: Some(secret_name.to_string()),
                key: secret_key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
    }
}

/// Ensure every main container has exactly one secret-sourced token entry
///
/// The first existing entry is authoritative; later secret-sourced
/// duplicates are dropped.
pub(crate) fn inject(spec: &mut PodSpec, secret_name: &str, secret_key: &str) -> InjectOutcome {
    let mut outcome = InjectOutcome::default();

    for container in spec.containers.iter_mut() {
        let env = container.env.get_or_insert_with(Vec::new);

        let mut seen = false;
        let before = env.len();
        env.retain(|e| {
            if !is_secret_sourced_token(e) {
                return true;
            }
            let keep = !seen;
            seen = true;
            keep
        });
        outcome.duplicates_removed += before - env.len();

        if seen {
            debug!(container = %container.name, "HF_TOKEN already injected");
            continue;
        }

        env.push(token_from_secret(secret_name, secret_key));
        debug!(container = %container.name, secret = %secret_name, "Added HF_TOKEN from secret");
        outcome.added += 1;
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Container;

    fn secret_token(secret: &str) -> EnvVar {
        token_from_secret(secret, DEFAULT_SECRET_KEY)
    }

    fn literal(name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            value_from: None,
        }
    }

    fn spec_with_env(env: Option<Vec<EnvVar>>) -> PodSpec {
        PodSpec {
            containers: vec![Container {
                name: "lmbenchmark".to_string(),
                env,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn token_count(spec: &PodSpec) -> usize {
        spec.containers[0]
            .env
            .as_ref()
            .unwrap()
            .iter()
            .filter(|e| is_secret_sourced_token(e))
            .count()
    }

    #[test]
    fn test_injects_into_missing_env() {
        let mut spec = spec_with_env(None);
        let outcome = inject(&mut spec, "hf-secret", DEFAULT_SECRET_KEY);
        assert_eq!(outcome.added, 1);

        let env = &spec.containers[0].env.as_ref().unwrap()[0];
        assert_eq!(env.name, "HF_TOKEN");
        let selector = env
            .value_from
            .as_ref()
            .unwrap()
            .secret_key_ref
            .as_ref()
            .unwrap();
        assert_eq!(selector.name.as_deref(), Some("hf-secret"));
        assert_eq!(selector.key, "HF_TOKEN");
    }

    #[test]
    fn test_leaves_exactly_one_token() {
        for existing in 0..=2 {
            let env = (0..existing).map(|_| secret_token("hf-secret")).collect();
            let mut spec = spec_with_env(Some(env));
            inject(&mut spec, "hf-secret", DEFAULT_SECRET_KEY);
            assert_eq!(token_count(&spec), 1, "started with {existing} entries");
        }
    }

    #[test]
    fn test_first_entry_is_authoritative() {
        let mut spec = spec_with_env(Some(vec![
            literal("MODEL", "llama"),
            secret_token("team-secret"),
            secret_token("other-secret"),
        ]));
        let outcome = inject(&mut spec, "hf-secret", DEFAULT_SECRET_KEY);
        assert_eq!(outcome, InjectOutcome { added: 0, duplicates_removed: 1 });

        let env = spec.containers[0].env.as_ref().unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env[1], secret_token("team-secret"));
    }

    #[test]
    fn test_literal_token_does_not_count() {
        let mut spec = spec_with_env(Some(vec![literal("HF_TOKEN", "plain")]));
        assert_eq!(inject(&mut spec, "hf-secret", DEFAULT_SECRET_KEY).added, 1);
        assert_eq!(spec.containers[0].env.as_ref().unwrap().len(), 2);
    }
}
