//! mindmeld CLI: answer utterances against a skill corpus.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use mindmeld::config::ConfigFile;
use mindmeld::engine::{ClientIdentity, Engine, Outcome};
use mindmeld::evaluator::AttemptOutcome;
use mindmeld::skills::corpus::SkillCorpus;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "mindmeld.toml";

#[derive(Parser)]
#[command(name = "mindmeld", version, about = "Skill-matching reasoning engine")]
struct Cli {
    /// Config file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skill file or directory of skill files. Overrides `corpus` in the config.
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer an utterance.
    Ask {
        utterance: String,

        /// Opaque caller identity passed through to the outcome.
        #[arg(long, default_value = "cli")]
        identity: String,

        /// Print the full outcome as JSON, including the reasoning trace.
        #[arg(long)]
        json: bool,
    },

    /// Inspect the skill corpus.
    Skills {
        #[command(subcommand)]
        action: SkillsAction,
    },

    /// Load and validate the corpus, then replay every skill example.
    Check,

    /// Show engine info.
    Info,
}

#[derive(Subcommand)]
enum SkillsAction {
    /// List skills in declaration order.
    List,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let corpus_path = match cli.corpus.clone().or_else(|| config.corpus.clone()) {
        Some(path) => path,
        None => miette::bail!("no corpus given; pass --corpus or set `corpus` in {DEFAULT_CONFIG}"),
    };

    match cli.command {
        Commands::Ask {
            utterance,
            identity,
            json,
        } => {
            let corpus = SkillCorpus::load(&corpus_path)?;
            let engine = Engine::new(config.engine.clone(), corpus, config.lookup_registry());
            let outcome = engine.answer(&utterance, ClientIdentity::new(identity))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome).into_diagnostic()?);
            } else {
                print_outcome(&outcome);
            }
        }

        Commands::Skills {
            action: SkillsAction::List,
        } => {
            let corpus = SkillCorpus::load(&corpus_path)?;
            if corpus.is_empty() {
                println!("No skills.");
            }
            for skill in corpus.skills() {
                let triggers: Vec<&str> = skill.triggers().iter().map(|t| t.as_str()).collect();
                println!(
                    "  {:<24} {} step(s), {} action(s)  [{}]",
                    skill.id().as_str(),
                    skill.operations().len(),
                    skill.actions().len(),
                    triggers.join(" | ")
                );
            }
        }

        Commands::Check => {
            let corpus = SkillCorpus::load(&corpus_path)?;
            let skills = corpus.len();
            let examples: usize = corpus.skills().iter().map(|s| s.examples().len()).sum();
            let engine = Engine::new(config.engine.clone(), corpus, config.lookup_registry());

            let mismatches = engine.check_examples();
            let failed = mismatches.len();
            for mismatch in mismatches {
                eprintln!("{:?}", miette::Report::new(mismatch));
            }
            if failed > 0 {
                miette::bail!("{failed} of {examples} example(s) failed");
            }
            println!(
                "{}: {skills} skill(s), {examples} example(s) OK",
                corpus_path.display()
            );
        }

        Commands::Info => {
            let corpus = SkillCorpus::load(&corpus_path)?;
            let engine = Engine::new(config.engine.clone(), corpus, config.lookup_registry());
            println!("{}", engine.info());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => Ok(ConfigFile::load(path)?),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.is_file() {
                Ok(ConfigFile::load(default)?)
            } else {
                Ok(ConfigFile::default())
            }
        }
    }
}

fn print_outcome(outcome: &Outcome) {
    for attempt in outcome.attempts() {
        if let AttemptOutcome::Failed {
            step,
            operation,
            failure,
        } = &attempt.outcome
        {
            eprintln!("  skipped {} (step {step}, {operation}): {failure}", attempt.skill);
        }
    }

    match outcome {
        Outcome::Answered(answer) => {
            for action in &answer.actions {
                println!("[{}] {}", action.kind, action.expression);
            }
        }
        Outcome::NoAnswer { attempts, .. } if attempts.is_empty() => {
            println!("No skill matches.");
        }
        Outcome::NoAnswer { .. } => {
            println!("No answer found.");
        }
    }
}
