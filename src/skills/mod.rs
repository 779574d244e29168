//! Skills: the unit of reasoning the matcher selects.
//!
//! A [`Skill`] is immutable once its corpus is built: one or more trigger
//! [`Pattern`]s, an ordered list of [`Operation`]s, and one or more output
//! [`Template`]s. Skills are defined as [`SkillDefinition`]s (deserialized from
//! skill files or built in code) and validated into a [`corpus::SkillCorpus`].

pub mod corpus;

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CorpusError;
use crate::matcher::tokenize;

/// Unique identifier of a skill within a corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(String);

impl SkillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Trigger patterns
// ---------------------------------------------------------------------------

/// One token of a trigger pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    /// Must equal the utterance token (stored lowercased).
    Literal(String),
    /// Matches one or more utterance tokens and binds them under this name.
    Wildcard(String),
}

/// A trigger pattern: literal words and named wildcards.
///
/// In text form `*` is a positional wildcard named `1`, `2`, ... by its order
/// among the wildcards, and `*name` is a named wildcard. The name `0` is
/// reserved for the whole utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct Pattern {
    source: String,
    tokens: Vec<PatternToken>,
}

impl Pattern {
    pub fn tokens(&self) -> &[PatternToken] {
        &self.tokens
    }

    /// Number of literal tokens, the pattern's specificity.
    pub fn literal_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, PatternToken::Literal(_)))
            .count()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Pattern {
    type Err = CorpusError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let invalid = |message: String| CorpusError::InvalidPattern {
            pattern: source.to_string(),
            message,
        };

        let mut tokens = Vec::new();
        let mut names = HashSet::new();
        let mut positional = 0usize;

        for word in tokenize(source) {
            let Some(name) = word.strip_prefix('*') else {
                tokens.push(PatternToken::Literal(word.to_lowercase()));
                continue;
            };

            positional += 1;
            let name = if name.is_empty() {
                positional.to_string()
            } else {
                name.to_string()
            };
            if name == "0" {
                return Err(invalid("wildcard name `0` is reserved".into()));
            }
            if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(invalid(format!("invalid wildcard name `{name}`")));
            }
            if !names.insert(name.clone()) {
                return Err(invalid(format!("wildcard `{name}` appears twice")));
            }
            tokens.push(PatternToken::Wildcard(name));
        }

        if tokens.is_empty() {
            return Err(invalid("pattern has no tokens".into()));
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.source
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// One inference step of a skill.
///
/// Text fields may contain `${name}` placeholders which are filled from the
/// current thought's first row before the step runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    /// Bind `name` to the instantiated `expression`. With `matching`, the text
    /// must fully match the regex and the value is its first capture group.
    Bind {
        name: String,
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        matching: Option<String>,
    },
    /// Ask a named lookup collaborator; its result bindings are observed in order.
    Lookup {
        service: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
    },
    /// Continue only if the predicate holds.
    Condition { predicate: Predicate },
}

impl Operation {
    /// Short name of the variant, for traces.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "bind",
            Self::Lookup { .. } => "lookup",
            Self::Condition { .. } => "condition",
        }
    }
}

/// A test over the current thought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Predicate {
    /// `name` is bound to a non-empty value.
    Present { name: String },
    /// `name` is unbound or empty.
    Absent { name: String },
    /// The first observation of `name` equals the instantiated `value`.
    Equals { name: String, value: String },
    /// The first observation of `name` fully matches the regex `pattern`.
    Matches { name: String, pattern: String },
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present { name } => write!(f, "present({name})"),
            Self::Absent { name } => write!(f, "absent({name})"),
            Self::Equals { name, value } => write!(f, "{name} = {value:?}"),
            Self::Matches { name, pattern } => write!(f, "{name} ~ /{pattern}/"),
        }
    }
}

// ---------------------------------------------------------------------------
// Output templates
// ---------------------------------------------------------------------------

/// How a client should present an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Show or say a text.
    Answer,
    /// Show a table.
    Table,
    /// Show a pie chart.
    Piechart,
    /// Show a link list with descriptions.
    Rss,
    /// Run a web search on the client.
    Websearch,
    /// Show or say a link.
    Anchor,
    /// Show a map.
    Map,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Answer => "answer",
            Self::Table => "table",
            Self::Piechart => "piechart",
            Self::Rss => "rss",
            Self::Websearch => "websearch",
            Self::Anchor => "anchor",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

/// An output template: an action type plus an expression with `${name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub expression: String,
}

impl Template {
    pub fn new(kind: ActionType, expression: impl Into<String>) -> Self {
        Self {
            kind,
            expression: expression.into(),
        }
    }
}

/// A sample utterance a skill should answer, with the answer text it should
/// give. Replayed by corpus checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillExample {
    pub utterance: String,
    /// Expected expression of the first rendered action. Without it, the
    /// example only has to be answered by its own skill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,
}

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// A skill as written by a corpus author, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub id: String,
    /// Trigger patterns in text form; any one matching selects the skill.
    pub triggers: Vec<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    pub actions: Vec<Template>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<SkillExample>,
}

impl SkillDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            triggers: Vec::new(),
            operations: Vec::new(),
            actions: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn trigger(mut self, pattern: impl Into<String>) -> Self {
        self.triggers.push(pattern.into());
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn action(mut self, kind: ActionType, expression: impl Into<String>) -> Self {
        self.actions.push(Template::new(kind, expression));
        self
    }

    pub fn example(mut self, utterance: impl Into<String>, expect: Option<&str>) -> Self {
        self.examples.push(SkillExample {
            utterance: utterance.into(),
            expect: expect.map(str::to_string),
        });
        self
    }
}

/// A validated, immutable skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skill {
    id: SkillId,
    triggers: Vec<Pattern>,
    operations: Vec<Operation>,
    actions: Vec<Template>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    examples: Vec<SkillExample>,
    /// Declaration order within the corpus.
    #[serde(skip)]
    index: usize,
}

impl Skill {
    /// Validate a definition. `index` is its declaration position.
    pub(crate) fn build(definition: SkillDefinition, index: usize) -> Result<Self, CorpusError> {
        let invalid = |message: &str| CorpusError::InvalidSkill {
            id: definition.id.clone(),
            message: message.to_string(),
        };

        if definition.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if definition.triggers.is_empty() {
            return Err(invalid("no triggers"));
        }
        if definition.actions.is_empty() {
            return Err(invalid("no actions"));
        }
        if definition.examples.iter().any(|e| tokenize(&e.utterance).is_empty()) {
            return Err(invalid("empty example utterance"));
        }

        let triggers = definition
            .triggers
            .iter()
            .map(|t| t.parse::<Pattern>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: SkillId::new(definition.id),
            triggers,
            operations: definition.operations,
            actions: definition.actions,
            examples: definition.examples,
            index,
        })
    }

    pub fn id(&self) -> &SkillId {
        &self.id
    }

    pub fn triggers(&self) -> &[Pattern] {
        &self.triggers
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn actions(&self) -> &[Template] {
        &self.actions
    }

    pub fn examples(&self) -> &[SkillExample] {
        &self.examples
    }

    /// Declaration order within the corpus.
    pub fn index(&self) -> usize {
        self.index
    }
}
