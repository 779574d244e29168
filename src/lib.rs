// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # mindmeld
//!
//! A skill-matching reasoning core for conversational agents. An utterance is
//! matched against a corpus of skills; the best skill's inference steps run
//! over branching binding tables, the chain of tables is merged, and the
//! result is rendered into output actions.
//!
//! ## Architecture
//!
//! - **Thoughts** (`thought`): branching tables of variable bindings
//! - **Arguments** (`argument`): chains of thoughts and the mindmeld merge
//! - **Skills** (`skills`): trigger patterns, operations, templates, corpus loading
//! - **Matcher** (`matcher`): normalization, wildcard matching, deterministic ranking
//! - **Evaluator** (`evaluator`): ordered inference steps with ranked fallback
//! - **Lookups** (`lookup`): external collaborators consulted by steps
//! - **Renderer** (`render`): `${name}` template substitution
//! - **Engine** (`engine`): the facade tying it together
//!
//! ## Library usage
//!
//! ```no_run
//! use mindmeld::engine::{ClientIdentity, Engine, EngineConfig};
//! use mindmeld::lookup::LookupRegistry;
//! use mindmeld::skills::corpus::SkillCorpus;
//!
//! let corpus = SkillCorpus::from_toml_str(r#"
//!     [[skill]]
//!     id = "roses"
//!     triggers = ["roses are red"]
//!     actions = [{ type = "answer", expression = "skynet is back" }]
//! "#).unwrap();
//! let engine = Engine::new(EngineConfig::default(), corpus, LookupRegistry::new());
//! let outcome = engine.answer("Roses are red", ClientIdentity::new("me")).unwrap();
//! assert_eq!(outcome.actions()[0].expression, "skynet is back");
//! ```

pub mod argument;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod lookup;
pub mod matcher;
pub mod render;
pub mod skills;
pub mod thought;
