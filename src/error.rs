//! Rich diagnostic error types for the mindmeld reasoning core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so corpus authors and operators know
//! exactly what went wrong and how to fix it.
//!
//! Step failures and "no answer" outcomes are deliberately *not* errors: they
//! are ordinary results of evaluation (see [`crate::evaluator::StepFailure`]
//! and [`crate::engine::Outcome`]).

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the mindmeld engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum MindError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Corpus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CorpusError {
    #[error("failed to read skill file: {path}")]
    #[diagnostic(
        code(mindmeld::corpus::io),
        help("Ensure the corpus path exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse skill file {path}: {message}")]
    #[diagnostic(
        code(mindmeld::corpus::parse),
        help(
            "Skill files are TOML (`[[skill]]` tables) or JSON (`{{\"skill\": [...]}}`). \
             Check the syntax and the field names of every skill."
        )
    )]
    Parse { path: String, message: String },

    #[error("unsupported skill file format: {path}")]
    #[diagnostic(
        code(mindmeld::corpus::format),
        help("Skill files must have a `.toml` or `.json` extension.")
    )]
    UnsupportedFormat { path: String },

    #[error("invalid trigger pattern \"{pattern}\": {message}")]
    #[diagnostic(
        code(mindmeld::corpus::pattern),
        help(
            "A trigger is a sequence of literal words and wildcards. \
             Use `*` for a positional wildcard (bound as 1, 2, ...) or `*name` \
             for a named one; names are letters, digits and underscores."
        )
    )]
    InvalidPattern { pattern: String, message: String },

    #[error("duplicate skill id: {id}")]
    #[diagnostic(
        code(mindmeld::corpus::duplicate),
        help("Every skill in a corpus needs a unique id. Rename one of the skills.")
    )]
    DuplicateSkill { id: String },

    #[error("invalid skill \"{id}\": {message}")]
    #[diagnostic(
        code(mindmeld::corpus::invalid_skill),
        help("A skill needs a non-empty id, at least one trigger and at least one action.")
    )]
    InvalidSkill { id: String, message: String },

    #[error("example \"{utterance}\" of skill \"{skill}\": {problem}")]
    #[diagnostic(
        code(mindmeld::corpus::example),
        help(
            "Replay the utterance with `mindmeld ask --json` to see which skills \
             were tried and why they failed, then fix the skill or its `expect`."
        )
    )]
    ExampleMismatch {
        skill: String,
        utterance: String,
        problem: String,
    },
}

pub type CorpusResult<T> = std::result::Result<T, CorpusError>;

// ---------------------------------------------------------------------------
// Render errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("skill \"{skill}\": placeholder ${{{placeholder}}} has no binding in \"{template}\"")]
    #[diagnostic(
        code(mindmeld::render::unbound),
        help(
            "The template refers to a variable that no trigger wildcard or \
             inference step binds. This is a defect in the skill definition; \
             bind the variable in an earlier step or fix the placeholder name."
        )
    )]
    UnboundPlaceholder {
        skill: String,
        placeholder: String,
        template: String,
    },
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(mindmeld::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(mindmeld::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(mindmeld::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias for functions returning mindmeld results.
pub type MindResult<T> = std::result::Result<T, MindError>;
