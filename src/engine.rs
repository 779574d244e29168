//! Engine facade: top-level API for answering utterances.
//!
//! The `Engine` owns the configuration, the swappable corpus handle and the
//! lookup collaborators. One call to [`Engine::answer`] runs the whole
//! pipeline: match, evaluate with fallback, mindmeld, render.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::argument::Argument;
use crate::error::{CorpusError, MindResult};
use crate::evaluator::{Evaluator, EvaluatorConfig, SkillAttempt};
use crate::lookup::LookupRegistry;
use crate::matcher::{Matcher, MatcherConfig};
use crate::render::{Action, render};
use crate::skills::SkillId;
use crate::skills::corpus::{CorpusHandle, SkillCorpus};
use crate::thought::Thought;

/// Configuration for the mindmeld engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    pub evaluator: EvaluatorConfig,
}

/// Opaque caller identity, passed through to the outcome untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A rendered answer and everything that led to it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub identity: ClientIdentity,
    pub skill: SkillId,
    pub actions: Vec<Action>,
    /// The merged thought the actions were rendered from.
    pub mindmeld: Thought,
    pub argument: Argument,
    /// Candidates tried, ending with the concluding skill.
    pub attempts: Vec<SkillAttempt>,
}

/// Result of answering one utterance.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Answered(Answer),
    /// No candidate concluded. With no attempts, nothing matched at all.
    NoAnswer {
        identity: ClientIdentity,
        attempts: Vec<SkillAttempt>,
    },
}

impl Outcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered(_))
    }

    /// True when no skill matched the utterance.
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoAnswer { attempts, .. } if attempts.is_empty())
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Self::Answered(answer) => Some(answer),
            Self::NoAnswer { .. } => None,
        }
    }

    /// Rendered actions; empty without an answer.
    pub fn actions(&self) -> &[Action] {
        match self {
            Self::Answered(answer) => &answer.actions,
            Self::NoAnswer { .. } => &[],
        }
    }

    pub fn attempts(&self) -> &[SkillAttempt] {
        match self {
            Self::Answered(answer) => &answer.attempts,
            Self::NoAnswer { attempts, .. } => attempts,
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        match self {
            Self::Answered(answer) => &answer.identity,
            Self::NoAnswer { identity, .. } => identity,
        }
    }
}

/// The mindmeld reasoning engine.
pub struct Engine {
    config: EngineConfig,
    matcher: Matcher,
    corpus: CorpusHandle,
    lookups: LookupRegistry,
}

impl Engine {
    /// Create an engine over `corpus` with the given lookup collaborators.
    pub fn new(config: EngineConfig, corpus: SkillCorpus, lookups: LookupRegistry) -> Self {
        tracing::info!(
            skills = corpus.len(),
            lookups = lookups.len(),
            policy = ?config.matcher.policy,
            greediness = ?config.matcher.greediness,
            timeout_ms = config.evaluator.lookup_timeout_ms,
            "initializing mindmeld engine"
        );
        Self {
            matcher: Matcher::new(config.matcher.clone()),
            config,
            corpus: CorpusHandle::new(corpus),
            lookups,
        }
    }

    /// Answer one utterance.
    ///
    /// "No answer" is an ordinary [`Outcome`]; only a template referring to an
    /// unbound placeholder is an error.
    pub fn answer(&self, utterance: &str, identity: ClientIdentity) -> MindResult<Outcome> {
        let corpus = self.corpus.snapshot();
        let candidates = self.matcher.rank(utterance, &corpus);
        tracing::debug!(%identity, utterance, candidates = candidates.len(), "matched utterance");

        let evaluator = Evaluator::new(&self.lookups, self.config.evaluator.clone());
        let deliberation = evaluator.evaluate(candidates);

        let Some(conclusion) = deliberation.conclusion else {
            return Ok(Outcome::NoAnswer {
                identity,
                attempts: deliberation.attempts,
            });
        };

        let mindmeld = conclusion.argument.mindmeld(true);
        let actions = render(conclusion.skill, &mindmeld)?;

        Ok(Outcome::Answered(Answer {
            identity,
            skill: conclusion.skill.id().clone(),
            actions,
            mindmeld,
            argument: conclusion.argument,
            attempts: deliberation.attempts,
        }))
    }

    /// Answer many utterances in parallel. Results keep input order.
    pub fn answer_batch(&self, requests: &[(String, ClientIdentity)]) -> Vec<MindResult<Outcome>> {
        use rayon::prelude::*;

        requests
            .par_iter()
            .map(|(utterance, identity)| self.answer(utterance, identity.clone()))
            .collect()
    }

    /// Swap in a new corpus. Answers already in flight keep their snapshot.
    pub fn reload(&self, corpus: SkillCorpus) {
        let skills = corpus.len();
        let previous = self.corpus.replace(corpus);
        tracing::info!(skills, previous = previous.len(), "reloaded skill corpus");
    }

    /// Load a corpus from `path` and swap it in. Returns the new skill count.
    pub fn reload_from(&self, path: &Path) -> MindResult<usize> {
        let corpus = SkillCorpus::load(path)?;
        let skills = corpus.len();
        self.reload(corpus);
        Ok(skills)
    }

    /// Replay every skill example against the current corpus.
    ///
    /// An example passes when its own skill answers it and, with `expect`
    /// set, the first rendered action reads exactly `expect`. Returns one
    /// diagnostic per failing example, in declaration order.
    pub fn check_examples(&self) -> Vec<CorpusError> {
        let corpus = self.corpus.snapshot();
        let mut mismatches = Vec::new();

        for skill in corpus.skills() {
            for example in skill.examples() {
                let identity = ClientIdentity::new(format!("example:{}", skill.id()));
                let problem = match self.answer(&example.utterance, identity) {
                    Ok(Outcome::Answered(answer)) if answer.skill != *skill.id() => {
                        Some(format!("answered by skill \"{}\" instead", answer.skill))
                    }
                    Ok(Outcome::Answered(answer)) => {
                        let text = answer.actions.first().map_or("", |a| a.expression.as_str());
                        match &example.expect {
                            Some(expect) if expect != text => {
                                Some(format!("expected \"{expect}\", got \"{text}\""))
                            }
                            _ => None,
                        }
                    }
                    Ok(Outcome::NoAnswer { attempts, .. }) if attempts.is_empty() => {
                        Some("no skill matches".to_string())
                    }
                    Ok(Outcome::NoAnswer { .. }) => Some("no skill concluded".to_string()),
                    Err(e) => Some(e.to_string()),
                };

                if let Some(problem) = problem {
                    tracing::warn!(
                        skill = %skill.id(),
                        utterance = %example.utterance,
                        %problem,
                        "example failed"
                    );
                    mismatches.push(CorpusError::ExampleMismatch {
                        skill: skill.id().to_string(),
                        utterance: example.utterance.clone(),
                        problem,
                    });
                }
            }
        }

        mismatches
    }

    /// The current corpus snapshot.
    pub fn corpus(&self) -> Arc<SkillCorpus> {
        self.corpus.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lookups(&self) -> &LookupRegistry {
        &self.lookups
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            skill_count: self.corpus.snapshot().len(),
            lookups: self.lookups.names().into_iter().map(String::from).collect(),
            policy: format!("{:?}", self.config.matcher.policy).to_lowercase(),
            greediness: format!("{:?}", self.config.matcher.greediness).to_lowercase(),
            lookup_timeout_ms: self.config.evaluator.lookup_timeout_ms,
        }
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub skill_count: usize,
    pub lookups: Vec<String>,
    pub policy: String,
    pub greediness: String,
    pub lookup_timeout_ms: u64,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "mindmeld engine info")?;
        writeln!(f, "  skills:       {}", self.skill_count)?;
        writeln!(f, "  lookups:      {}", self.lookups.join(", "))?;
        writeln!(f, "  policy:       {}", self.policy)?;
        writeln!(f, "  greediness:   {}", self.greediness)?;
        writeln!(f, "  timeout (ms): {}", self.lookup_timeout_ms)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("corpus", &self.corpus)
            .field("lookups", &self.lookups)
            .finish()
    }
}
