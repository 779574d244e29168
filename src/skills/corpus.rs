//! Skill corpus: validated skill snapshots and the swappable handle.
//!
//! A [`SkillCorpus`] is built from skill files (TOML or JSON) or from
//! definitions in code, and is immutable afterwards. The engine holds it in a
//! [`CorpusHandle`]; readers take an `Arc` snapshot and evaluate against it
//! without holding any lock, while a reload swaps in a new snapshot.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;

use crate::error::{CorpusError, CorpusResult};

use super::{Skill, SkillDefinition, SkillId};

/// On-disk layout of a skill file: a list of `[[skill]]` tables.
#[derive(Debug, Deserialize)]
struct CorpusFile {
    #[serde(default, rename = "skill", alias = "skills")]
    skills: Vec<SkillDefinition>,
}

/// An immutable, validated set of skills in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SkillCorpus {
    skills: Vec<Skill>,
}

impl SkillCorpus {
    /// Validate definitions into a corpus. Declaration order is kept.
    pub fn new(definitions: impl IntoIterator<Item = SkillDefinition>) -> CorpusResult<Self> {
        let mut seen = HashSet::new();
        let mut skills = Vec::new();

        for (index, definition) in definitions.into_iter().enumerate() {
            if !seen.insert(definition.id.clone()) {
                return Err(CorpusError::DuplicateSkill { id: definition.id });
            }
            skills.push(Skill::build(definition, index)?);
        }

        Ok(Self { skills })
    }

    /// Parse a TOML document of `[[skill]]` tables.
    pub fn from_toml_str(source: &str) -> CorpusResult<Self> {
        Self::new(parse_toml(source, "<inline>")?)
    }

    /// Parse a JSON document `{"skill": [...]}`.
    pub fn from_json_str(source: &str) -> CorpusResult<Self> {
        Self::new(parse_json(source, "<inline>")?)
    }

    /// Load a corpus from a skill file or a directory of skill files.
    ///
    /// Directories are read non-recursively; `*.toml` and `*.json` files are
    /// loaded in file name order and other files are skipped.
    pub fn load(path: &Path) -> CorpusResult<Self> {
        let definitions = if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|e| CorpusError::Io {
                path: path.display().to_string(),
                source: e,
            })?;

            let mut files = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| CorpusError::Io {
                    path: path.display().to_string(),
                    source: e,
                })?;
                let file = entry.path();
                if !file.is_file() {
                    continue;
                }
                if is_skill_file(&file) {
                    files.push(file);
                } else {
                    tracing::warn!(file = %file.display(), "skipping non-skill file in corpus directory");
                }
            }
            files.sort();

            let mut definitions = Vec::new();
            for file in &files {
                definitions.extend(read_file(file)?);
            }
            definitions
        } else {
            read_file(path)?
        };

        let corpus = Self::new(definitions)?;
        tracing::info!(path = %path.display(), skills = corpus.len(), "loaded skill corpus");
        Ok(corpus)
    }

    /// Skills in declaration order.
    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn get(&self, id: &SkillId) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

fn is_skill_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("toml") | Some("json")
    )
}

fn read_file(path: &Path) -> CorpusResult<Vec<SkillDefinition>> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| CorpusError::Io {
        path: display.clone(),
        source: e,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_toml(&content, &display),
        Some("json") => parse_json(&content, &display),
        _ => Err(CorpusError::UnsupportedFormat { path: display }),
    }
}

fn parse_toml(source: &str, path: &str) -> CorpusResult<Vec<SkillDefinition>> {
    let file: CorpusFile = toml::from_str(source).map_err(|e| CorpusError::Parse {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(file.skills)
}

fn parse_json(source: &str, path: &str) -> CorpusResult<Vec<SkillDefinition>> {
    let file: CorpusFile = serde_json::from_str(source).map_err(|e| CorpusError::Parse {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(file.skills)
}

/// Shared, atomically swappable reference to the current corpus.
pub struct CorpusHandle {
    current: RwLock<Arc<SkillCorpus>>,
}

impl CorpusHandle {
    pub fn new(corpus: SkillCorpus) -> Self {
        Self {
            current: RwLock::new(Arc::new(corpus)),
        }
    }

    /// The current snapshot. Later reloads do not affect it.
    pub fn snapshot(&self) -> Arc<SkillCorpus> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new corpus, returning the previous snapshot.
    pub fn replace(&self, corpus: SkillCorpus) -> Arc<SkillCorpus> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(corpus))
    }
}

impl std::fmt::Debug for CorpusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusHandle")
            .field("skills", &self.snapshot().len())
            .finish()
    }
}
