//! Inference step evaluator with ranked fallback.
//!
//! A candidate skill's operations run strictly in declared order. Each
//! successful operation copies the previous thought, applies its observations
//! with the branching rule, and thinks the result into the skill's
//! [`Argument`]. A failing operation abandons only that skill; the next ranked
//! candidate is tried until one concludes or the list is exhausted.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::argument::Argument;
use crate::lookup::{LookupRegistry, LookupRequest};
use crate::matcher::Candidate;
use crate::render::{Unbound, instantiate};
use crate::skills::{Operation, Predicate, Skill, SkillId};
use crate::thought::Thought;

/// Why one operation could not produce a thought.
///
/// Step failures are ordinary outcomes: they end the current skill and are
/// kept in the attempt trace, never surfaced as errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    #[error("placeholder ${{{placeholder}}} is unbound")]
    Unbound { placeholder: String },

    #[error("\"{text}\" does not match /{pattern}/")]
    NoMatch { text: String, pattern: String },

    #[error("invalid regex /{pattern}/: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("unknown lookup service \"{service}\"")]
    UnknownService { service: String },

    #[error("lookup \"{service}\" failed: {message}")]
    LookupFailed { service: String, message: String },

    #[error("lookup \"{service}\" took {elapsed_ms} ms, over its timeout")]
    LookupTimeout { service: String, elapsed_ms: u64 },

    #[error("condition {predicate} is false")]
    ConditionFailed { predicate: String },
}

impl From<Unbound> for StepFailure {
    fn from(Unbound(placeholder): Unbound) -> Self {
        Self::Unbound { placeholder }
    }
}

/// Evaluator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Time budget for each lookup call, in milliseconds.
    pub lookup_timeout_ms: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: 2000,
        }
    }
}

impl EvaluatorConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

/// How one candidate's evaluation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Every operation succeeded.
    Concluded,
    /// Operation `step` (0-based) failed.
    Failed {
        step: usize,
        operation: String,
        failure: StepFailure,
    },
}

/// One entry of the fallback trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillAttempt {
    pub skill: SkillId,
    pub outcome: AttemptOutcome,
}

impl SkillAttempt {
    pub fn failure(&self) -> Option<&StepFailure> {
        match &self.outcome {
            AttemptOutcome::Failed { failure, .. } => Some(failure),
            AttemptOutcome::Concluded => None,
        }
    }
}

/// The concluding skill and its reasoning chain.
#[derive(Debug, Clone)]
pub struct Conclusion<'a> {
    pub skill: &'a Skill,
    pub argument: Argument,
}

/// Result of evaluating a ranked candidate list.
#[derive(Debug, Clone)]
pub struct Deliberation<'a> {
    /// `None` when every candidate failed or there were none.
    pub conclusion: Option<Conclusion<'a>>,
    /// Every candidate tried, in order.
    pub attempts: Vec<SkillAttempt>,
}

/// Runs skill operations against thoughts.
pub struct Evaluator<'r> {
    lookups: &'r LookupRegistry,
    config: EvaluatorConfig,
}

impl<'r> Evaluator<'r> {
    pub fn new(lookups: &'r LookupRegistry, config: EvaluatorConfig) -> Self {
        Self { lookups, config }
    }

    /// Try candidates in rank order until one concludes.
    pub fn evaluate<'a>(&self, candidates: Vec<Candidate<'a>>) -> Deliberation<'a> {
        let mut attempts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let skill = candidate.skill;
            match self.run_skill(skill, candidate.seed) {
                Ok(argument) => {
                    attempts.push(SkillAttempt {
                        skill: skill.id().clone(),
                        outcome: AttemptOutcome::Concluded,
                    });
                    return Deliberation {
                        conclusion: Some(Conclusion { skill, argument }),
                        attempts,
                    };
                }
                Err(outcome) => {
                    if let AttemptOutcome::Failed { step, failure, .. } = &outcome {
                        tracing::warn!(
                            skill = %skill.id(),
                            step,
                            %failure,
                            "skill failed, falling back to next candidate"
                        );
                    }
                    attempts.push(SkillAttempt {
                        skill: skill.id().clone(),
                        outcome,
                    });
                }
            }
        }

        Deliberation {
            conclusion: None,
            attempts,
        }
    }

    /// Run every operation of `skill` starting from `seed`.
    ///
    /// The seed is the argument's first thought; each operation adds one.
    pub fn run_skill(&self, skill: &Skill, seed: Thought) -> Result<Argument, AttemptOutcome> {
        let mut argument = Argument::for_skill(skill.id().clone());
        let mut state = seed;

        for (step, operation) in skill.operations().iter().enumerate() {
            let view = argument.mindmeld_with(&state);
            let next = self
                .apply(operation, &state, &view)
                .map_err(|failure| AttemptOutcome::Failed {
                    step,
                    operation: operation.kind().to_string(),
                    failure,
                })?;
            tracing::debug!(skill = %skill.id(), step, op = operation.kind(), rows = next.count(), "step");
            argument.think(std::mem::replace(&mut state, next));
        }
        argument.think(state);

        Ok(argument)
    }

    /// Execute one operation against `state`, producing the next thought.
    ///
    /// `state` is taken as the whole reasoning so far; placeholders and
    /// predicates read its first row.
    pub fn step(&self, operation: &Operation, state: &Thought) -> Result<Thought, StepFailure> {
        self.apply(operation, state, state)
    }

    /// Execute one operation. Observations branch `state`; placeholders and
    /// predicates read `view`, the mindmeld of the argument up to `state`.
    fn apply(
        &self,
        operation: &Operation,
        state: &Thought,
        view: &Thought,
    ) -> Result<Thought, StepFailure> {
        match operation {
            Operation::Bind {
                name,
                expression,
                matching,
            } => {
                let text = instantiate(expression, view.first_row())?;
                let value = match matching {
                    Some(pattern) => extract(pattern, &text)?,
                    None => text,
                };
                let mut next = state.clone();
                next.add_observation(name.clone(), value);
                Ok(next)
            }
            Operation::Lookup { service, params } => {
                let row = view.first_row();
                let params = params
                    .iter()
                    .map(|(k, v)| instantiate(v, row).map(|value| (k.clone(), value)))
                    .collect::<Result<BTreeMap<_, _>, _>>()?;

                let lookup = self
                    .lookups
                    .get(service)
                    .ok_or_else(|| StepFailure::UnknownService {
                        service: service.clone(),
                    })?;

                let timeout = self.config.lookup_timeout();
                let request = LookupRequest::new(params, timeout);
                let started = Instant::now();
                let result = lookup.lookup(&request);
                let elapsed = started.elapsed();

                if elapsed > timeout {
                    return Err(StepFailure::LookupTimeout {
                        service: service.clone(),
                        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    });
                }
                let bindings = result.map_err(|e| StepFailure::LookupFailed {
                    service: service.clone(),
                    message: e.to_string(),
                })?;

                let mut next = state.clone();
                for binding in bindings {
                    next.add_observation(binding.name, binding.value);
                }
                Ok(next)
            }
            Operation::Condition { predicate } => {
                if holds(predicate, view)? {
                    Ok(state.clone())
                } else {
                    Err(StepFailure::ConditionFailed {
                        predicate: predicate.to_string(),
                    })
                }
            }
        }
    }
}

impl std::fmt::Debug for Evaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("lookups", &self.lookups.names())
            .field("config", &self.config)
            .finish()
    }
}

fn holds(predicate: &Predicate, view: &Thought) -> Result<bool, StepFailure> {
    Ok(match predicate {
        Predicate::Present { name } => !view.has_empty_observation(name),
        Predicate::Absent { name } => view.has_empty_observation(name),
        Predicate::Equals { name, value } => {
            let expected = instantiate(value, view.first_row())?;
            view.observation(name) == Some(expected.as_str())
        }
        Predicate::Matches { name, pattern } => {
            let re = full_match(pattern)?;
            view.observation(name).is_some_and(|v| re.is_match(v))
        }
    })
}

/// Compile `pattern` anchored at both ends.
fn full_match(pattern: &str) -> Result<Regex, StepFailure> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| StepFailure::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Capture group 1 of a full match, or the whole match without groups.
fn extract(pattern: &str, text: &str) -> Result<String, StepFailure> {
    let re = full_match(pattern)?;
    let caps = re.captures(text).ok_or_else(|| StepFailure::NoMatch {
        text: text.to_string(),
        pattern: pattern.to_string(),
    })?;
    let value = caps.get(1).or_else(|| caps.get(0)).map_or("", |m| m.as_str());
    Ok(value.to_string())
}
