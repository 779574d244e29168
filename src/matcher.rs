//! Skill matcher: trigger patterns against utterances.
//!
//! Utterances are normalized into tokens, every skill's triggers are matched
//! with backtracking over wildcard spans, and the matching skills are ranked
//! deterministically. Each candidate carries the seed [`Thought`] built from
//! the whole utterance (bound as `0`) and its wildcard captures.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::skills::corpus::SkillCorpus;
use crate::skills::{Pattern, PatternToken, Skill};
use crate::thought::Thought;

/// Sentence punctuation stripped from both ends of every token.
const EDGE_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\''];

/// Binding name of the whole normalized utterance in seed thoughts.
pub const UTTERANCE_BINDING: &str = "0";

/// Split text into normalized tokens.
///
/// NFKC normalization, whitespace split, edge punctuation stripped, empty
/// tokens dropped. Case is preserved; literal comparison lowercases.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.nfkc().collect();
    normalized
        .split_whitespace()
        .map(|word| word.trim_matches(EDGE_PUNCTUATION))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// How candidates are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Most literal tokens first, declaration order on ties.
    #[default]
    Specificity,
    /// Declaration order only.
    Declaration,
}

/// How much of the utterance a wildcard takes when several splits match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Greediness {
    /// Leftmost wildcard takes the longest span that still matches.
    #[default]
    Longest,
    /// Leftmost wildcard takes the shortest span that still matches.
    Shortest,
}

/// Matcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub policy: MatchPolicy,
    pub greediness: Greediness,
    /// Cap on the ranked list; 0 means unlimited.
    pub max_candidates: usize,
}

/// A matching skill and its seed thought.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub skill: &'a Skill,
    pub seed: Thought,
    /// Literal tokens of the matching trigger.
    pub literal_count: usize,
    /// Index of the matching trigger within the skill.
    pub trigger: usize,
}

/// Matches utterances against a corpus.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Ranked candidates for `utterance`. Empty when nothing matches.
    pub fn rank<'a>(&self, utterance: &str, corpus: &'a SkillCorpus) -> Vec<Candidate<'a>> {
        let words = tokenize(utterance);
        if words.is_empty() {
            return Vec::new();
        }
        let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

        let mut candidates: Vec<Candidate<'a>> = corpus
            .skills()
            .iter()
            .filter_map(|skill| self.best_trigger(skill, &words, &lowered))
            .collect();

        match self.config.policy {
            MatchPolicy::Specificity => candidates.sort_by(|a, b| {
                b.literal_count
                    .cmp(&a.literal_count)
                    .then(a.skill.index().cmp(&b.skill.index()))
            }),
            MatchPolicy::Declaration => candidates.sort_by_key(|c| c.skill.index()),
        }

        if self.config.max_candidates > 0 {
            candidates.truncate(self.config.max_candidates);
        }

        for (rank, c) in candidates.iter().enumerate() {
            tracing::debug!(
                rank,
                skill = %c.skill.id(),
                trigger = %c.skill.triggers()[c.trigger],
                literals = c.literal_count,
                "candidate"
            );
        }

        candidates
    }

    /// The skill's most specific matching trigger, earliest on ties.
    fn best_trigger<'a>(
        &self,
        skill: &'a Skill,
        words: &[String],
        lowered: &[String],
    ) -> Option<Candidate<'a>> {
        let mut best: Option<(usize, usize, Vec<(String, String)>)> = None;

        for (i, pattern) in skill.triggers().iter().enumerate() {
            let literals = pattern.literal_count();
            if best.as_ref().is_some_and(|(_, l, _)| *l >= literals) {
                continue;
            }
            if let Some(captures) = self.match_pattern(pattern, words, lowered) {
                best = Some((i, literals, captures));
            }
        }

        best.map(|(trigger, literal_count, captures)| {
            let mut seed = Thought::new().with_observation(UTTERANCE_BINDING, words.join(" "));
            for (name, value) in captures {
                seed.add_observation(name, value);
            }
            Candidate {
                skill,
                seed,
                literal_count,
                trigger,
            }
        })
    }

    /// Wildcard captures in pattern order, or `None` if the pattern does not
    /// consume the whole utterance.
    fn match_pattern(
        &self,
        pattern: &Pattern,
        words: &[String],
        lowered: &[String],
    ) -> Option<Vec<(String, String)>> {
        let tokens = pattern.tokens();
        let mut search = SpanSearch {
            tokens,
            lowered,
            greediness: self.config.greediness,
            failed: vec![false; (tokens.len() + 1) * (lowered.len() + 1)],
            spans: Vec::new(),
        };
        if !search.consume(0, 0) {
            return None;
        }

        let names = tokens.iter().filter_map(|token| match token {
            PatternToken::Wildcard(name) => Some(name),
            PatternToken::Literal(_) => None,
        });
        Some(
            names
                .zip(search.spans)
                .map(|(name, (start, end))| (name.clone(), words[start..end].join(" ")))
                .collect(),
        )
    }
}

/// Backtracking search for wildcard spans.
///
/// Whether the pattern suffix from token `t` matches the words from `w`
/// depends on `(t, w)` alone, so each failing pair is recorded and never
/// explored twice. This bounds the search by tokens × words².
struct SpanSearch<'p> {
    tokens: &'p [PatternToken],
    lowered: &'p [String],
    greediness: Greediness,
    /// Failed `(token, word)` pairs, indexed `t * (words + 1) + w`.
    failed: Vec<bool>,
    /// Word spans of the wildcards matched so far.
    spans: Vec<(usize, usize)>,
}

impl SpanSearch<'_> {
    fn consume(&mut self, t: usize, w: usize) -> bool {
        let remaining_tokens = self.tokens.len() - t;
        let remaining_words = self.lowered.len() - w;
        if remaining_tokens == 0 {
            return remaining_words == 0;
        }
        // Every remaining pattern token needs at least one word.
        if remaining_words < remaining_tokens {
            return false;
        }
        let key = t * (self.lowered.len() + 1) + w;
        if self.failed[key] {
            return false;
        }

        let tokens = self.tokens;
        let greediness = self.greediness;
        let matched = match &tokens[t] {
            PatternToken::Literal(literal) => {
                self.lowered[w] == *literal && self.consume(t + 1, w + 1)
            }
            PatternToken::Wildcard(_) => {
                let longest = remaining_words - (remaining_tokens - 1);
                let mut attempt = |span: usize| {
                    self.spans.push((w, w + span));
                    if self.consume(t + 1, w + span) {
                        return true;
                    }
                    self.spans.pop();
                    false
                };
                match greediness {
                    Greediness::Longest => (1..=longest).rev().any(&mut attempt),
                    Greediness::Shortest => (1..=longest).any(&mut attempt),
                }
            }
        };

        if !matched {
            self.failed[key] = true;
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::{ActionType, SkillDefinition};

    fn corpus(defs: Vec<SkillDefinition>) -> SkillCorpus {
        SkillCorpus::new(defs).unwrap()
    }

    fn skill(id: &str, triggers: &[&str]) -> SkillDefinition {
        triggers
            .iter()
            .fold(SkillDefinition::new(id), |d, t| d.trigger(*t))
            .action(ActionType::Answer, id)
    }

    fn ids<'a>(candidates: &[Candidate<'a>]) -> Vec<&'a str> {
        candidates.iter().map(|c| c.skill.id().as_str()).collect()
    }

    #[test]
    fn tokenize_normalizes() {
        assert_eq!(tokenize("  Roses, are RED!  "), vec!["Roses", "are", "RED"]);
        assert_eq!(tokenize("\"quoted\" ... words?"), vec!["quoted", "words"]);
        // NFKC folds the full-width letters.
        assert_eq!(tokenize("ｈｅｌｌｏ"), vec!["hello"]);
        assert!(tokenize(" ?! ").is_empty());
    }

    #[test]
    fn literal_match_is_case_insensitive() {
        let c = corpus(vec![skill("roses", &["roses are red"])]);
        let ranked = Matcher::default().rank("Roses ARE red.", &c);
        assert_eq!(ids(&ranked), vec!["roses"]);
        assert_eq!(ranked[0].seed.count(), 1);
        assert_eq!(ranked[0].seed.observation("0"), Some("Roses ARE red"));
        assert_eq!(ranked[0].literal_count, 3);
    }

    #[test]
    fn pattern_must_consume_whole_utterance() {
        let c = corpus(vec![skill("roses", &["roses are red"])]);
        let m = Matcher::default();
        assert!(m.rank("roses are red and violets are blue", &c).is_empty());
        assert!(m.rank("roses are", &c).is_empty());
        assert!(m.rank("", &c).is_empty());
    }

    #[test]
    fn wildcards_bind_original_tokens() {
        let c = corpus(vec![skill("capital", &["what is the capital of *country"])]);
        let ranked = Matcher::default().rank("What is the capital of New Zealand?", &c);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].seed.observation("country"), Some("New Zealand"));
        assert_eq!(ranked[0].literal_count, 5);
    }

    #[test]
    fn positional_wildcards_are_numbered() {
        let c = corpus(vec![skill("swap", &["* loves *"])]);
        let ranked = Matcher::default().rank("alice loves bob", &c);
        assert_eq!(ranked[0].seed.observation("1"), Some("alice"));
        assert_eq!(ranked[0].seed.observation("2"), Some("bob"));
    }

    #[test]
    fn greediness_is_configurable() {
        let c = corpus(vec![skill("split", &["*a and *b"])]);
        let text = "salt and pepper and vinegar";

        let longest = Matcher::default().rank(text, &c);
        assert_eq!(longest[0].seed.observation("a"), Some("salt and pepper"));
        assert_eq!(longest[0].seed.observation("b"), Some("vinegar"));

        let shortest = Matcher::new(MatcherConfig {
            greediness: Greediness::Shortest,
            ..MatcherConfig::default()
        })
        .rank(text, &c);
        assert_eq!(shortest[0].seed.observation("a"), Some("salt"));
        assert_eq!(shortest[0].seed.observation("b"), Some("pepper and vinegar"));
    }

    #[test]
    fn ranks_by_specificity_then_declaration() {
        let c = corpus(vec![
            skill("catchall", &["*"]),
            skill("weather_any", &["weather in *"]),
            skill("weather_city", &["weather in *city"]),
            skill("weather_paris", &["weather in paris"]),
        ]);
        let ranked = Matcher::default().rank("weather in Paris", &c);
        assert_eq!(
            ids(&ranked),
            vec!["weather_paris", "weather_any", "weather_city", "catchall"]
        );
    }

    #[test]
    fn declaration_policy_ignores_specificity() {
        let c = corpus(vec![skill("catchall", &["*"]), skill("hello", &["hello"])]);
        let m = Matcher::new(MatcherConfig {
            policy: MatchPolicy::Declaration,
            ..MatcherConfig::default()
        });
        assert_eq!(ids(&m.rank("hello", &c)), vec!["catchall", "hello"]);
    }

    #[test]
    fn max_candidates_truncates() {
        let c = corpus(vec![skill("a", &["*"]), skill("b", &["hi *"]), skill("c", &["hi there"])]);
        let m = Matcher::new(MatcherConfig {
            max_candidates: 2,
            ..MatcherConfig::default()
        });
        assert_eq!(ids(&m.rank("hi there", &c)), vec!["c", "b"]);
    }

    #[test]
    fn best_trigger_represents_the_skill() {
        let c = corpus(vec![skill("capital", &["*x", "capital of *country"])]);
        let ranked = Matcher::default().rank("capital of France", &c);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].trigger, 1);
        assert_eq!(ranked[0].literal_count, 2);
        assert_eq!(ranked[0].seed.observation("country"), Some("France"));
        assert_eq!(ranked[0].seed.observation("x"), None);
    }

    #[test]
    fn failing_long_utterance_returns_quickly() {
        let c = corpus(vec![skill("tail", &["* * * * * end"])]);
        let text = vec!["w"; 400].join(" ");

        let started = std::time::Instant::now();
        assert!(Matcher::default().rank(&text, &c).is_empty());
        assert!(
            Matcher::new(MatcherConfig {
                greediness: Greediness::Shortest,
                ..MatcherConfig::default()
            })
            .rank(&text, &c)
            .is_empty()
        );
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        let ranked = Matcher::default().rank(&format!("{text} end"), &c);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].seed.observation("1"), Some(vec!["w"; 396].join(" ").as_str()));
        assert_eq!(ranked[0].seed.observation("5"), Some("w"));
    }

    #[test]
    fn ranking_is_deterministic() {
        let c = corpus(vec![
            skill("a", &["* is *"]),
            skill("b", &["sky is *"]),
            skill("c", &["* is blue"]),
        ]);
        let m = Matcher::default();
        let first = ids(&m.rank("sky is blue", &c));
        for _ in 0..10 {
            assert_eq!(ids(&m.rank("sky is blue", &c)), first);
        }
        assert_eq!(first, vec!["b", "c", "a"]);
    }
}
