//! Shell activation chain normalization
//!
//! The benchmark container runs a single `&&`-chained shell string. It is
//! modelled as an ordered list of steps so the fix can drop the profile
//! sourcing and collapse repeated activations without touching the rest of
//! the command text.

use crate::manifest::BENCHMARK_CONTAINER;
use k8s_openapi::api::core::v1::PodSpec;
use std::fmt;
use tracing::debug;

const STEP_SEPARATOR: &str = " && ";
const SOURCE_PROFILE: &str = ". ~/.bashrc";
const ACTIVATE_ENV: &str = ". .venv/bin/activate";

/// One step of a `&&`-chained shell command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellStep<'a> {
    /// `. ~/.bashrc`
    SourceProfile,
    /// `. .venv/bin/activate`
    ActivateEnv,
    /// Any other step, kept verbatim
    Run(&'a str),
}

impl<'a> ShellStep<'a> {
    fn parse(segment: &'a str) -> Self {
        match segment {
            SOURCE_PROFILE => ShellStep::SourceProfile,
            ACTIVATE_ENV => ShellStep::ActivateEnv,
            other => ShellStep::Run(other),
        }
    }

    fn as_str(&self) -> &'a str {
        match self {
            ShellStep::SourceProfile => SOURCE_PROFILE,
            ShellStep::ActivateEnv => ACTIVATE_ENV,
            ShellStep::Run(text) => *text,
        }
    }
}

/// Parsed `&&` chain of shell steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellChain<'a> {
    steps: Vec<ShellStep<'a>>,
}

impl<'a> ShellChain<'a> {
    pub fn parse(command: &'a str) -> Self {
        Self {
            steps: command.split(STEP_SEPARATOR).map(ShellStep::parse).collect(),
        }
    }

    pub fn steps(&self) -> &[ShellStep<'a>] {
        &self.steps
    }

    /// Drop profile sourcing and collapse back-to-back activations
    pub fn normalized(&self) -> Self {
        let mut steps: Vec<ShellStep<'a>> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step {
                ShellStep::SourceProfile => {}
                ShellStep::ActivateEnv if steps.last() == Some(&ShellStep::ActivateEnv) => {}
                other => steps.push(*other),
            }
        }
        Self { steps }
    }

    pub fn activates_env(&self) -> bool {
        self.steps.contains(&ShellStep::ActivateEnv)
    }
}

impl fmt::Display for ShellChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(STEP_SEPARATOR)?;
            }
            f.write_str(step.as_str())?;
        }
        Ok(())
    }
}

/// Normalize an argument if it activates the virtualenv
///
/// Returns `None` when the argument does not need rewriting.
pub(crate) fn normalize_arg(arg: &str) -> Option<String> {
    if !arg.contains(ACTIVATE_ENV) {
        return None;
    }
    let chain = ShellChain::parse(arg);
    if !chain.activates_env() {
        return None;
    }
    let rendered = chain.normalized().to_string();
    (rendered != arg).then_some(rendered)
}

/// Rewrite the activation chain in every `lmbenchmark` container argument
pub(crate) fn fix_activation(spec: &mut PodSpec) -> usize {
    let mut rewritten = 0;
    for container in spec
        .containers
        .iter_mut()
        .filter(|c| c.name == BENCHMARK_CONTAINER)
    {
        for arg in container.args.iter_mut().flatten() {
            if let Some(updated) = normalize_arg(arg) {
                debug!(original = %arg, updated = %updated, "Rewrote shell activation");
                *arg = updated;
                rewritten += 1;
            }
        }
    }
    rewritten
}
