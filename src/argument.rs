//! Arguments: ordered chains of thoughts and the mindmeld merge.
//!
//! An [`Argument`] is the reasoning trace of one skill evaluation, the
//! short-term memory of thinking. Each inference step "thinks" one new
//! [`Thought`] onto the chain; [`Argument::mindmeld`] squashes the chain into a
//! single thought where later steps overwrite earlier bindings.

use serde::Serialize;

use crate::skills::SkillId;
use crate::thought::Thought;

/// An ordered chain of thoughts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Argument {
    #[serde(skip_serializing_if = "Option::is_none")]
    skill: Option<SkillId>,
    recall: Vec<Thought>,
}

impl Argument {
    /// Create an empty argument.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty argument for evaluating the given skill.
    pub fn for_skill(skill: SkillId) -> Self {
        Self {
            skill: Some(skill),
            recall: Vec::new(),
        }
    }

    /// The skill this argument was built for, if any.
    pub fn skill(&self) -> Option<&SkillId> {
        self.skill.as_ref()
    }

    /// Append a thought to the chain.
    pub fn think(&mut self, thought: Thought) {
        self.recall.push(thought);
    }

    /// Number of thoughts in the chain.
    pub fn times(&self) -> usize {
        self.recall.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recall.is_empty()
    }

    /// The latest thought.
    pub fn mindstate(&self) -> Option<&Thought> {
        self.recall.last()
    }

    /// The thought `times_back` steps before the latest one.
    pub fn remember(&self, times_back: usize) -> Option<&Thought> {
        let len = self.recall.len();
        if times_back >= len {
            return None;
        }
        self.recall.get(len - times_back - 1)
    }

    /// Pop the latest thought off the chain.
    pub fn rethink(&mut self) -> Option<Thought> {
        self.recall.pop()
    }

    /// Forget every thought.
    pub fn amnesia(&mut self) {
        self.recall.clear();
    }

    /// Thoughts in insertion order.
    pub fn thoughts(&self) -> &[Thought] {
        &self.recall
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Thought> {
        self.recall.iter()
    }

    /// Fold the chain into one thought.
    ///
    /// With `merge_all` the whole chain is folded left to right; otherwise
    /// only the final thought is considered. The result keeps the rows of the
    /// first non-empty thought in the fold. Every later row is aligned to the
    /// accumulator row it descends from and overwrites that row's bindings, so
    /// the newest step wins and no rows are ever added.
    pub fn mindmeld(&self, merge_all: bool) -> Thought {
        if merge_all {
            meld(&self.recall)
        } else {
            meld(self.recall.last())
        }
    }

    /// The full mindmeld as it would be after thinking `latest`.
    ///
    /// Inference steps read their placeholders from this view, the same one
    /// the renderer uses, so derived bindings and rendered bindings agree.
    pub fn mindmeld_with(&self, latest: &Thought) -> Thought {
        meld(self.recall.iter().chain(std::iter::once(latest)))
    }
}

impl<'a> IntoIterator for &'a Argument {
    type Item = &'a Thought;
    type IntoIter = std::slice::Iter<'a, Thought>;

    fn into_iter(self) -> Self::IntoIter {
        self.recall.iter()
    }
}

fn meld<'a>(chain: impl IntoIterator<Item = &'a Thought>) -> Thought {
    let mut thoughts = chain.into_iter().skip_while(|t| t.is_empty());
    let Some(first) = thoughts.next() else {
        return Thought::new();
    };

    let mut melded = first.clone();
    let limit = melded.count();
    for thought in thoughts {
        for (position, row) in thought.rows().iter().enumerate() {
            let target = anchor(thought, position, limit);
            for (name, value) in row.iter() {
                melded.overwrite(target, name, value);
            }
        }
    }
    melded
}

/// Accumulator position for the row at `position`.
///
/// Rows inside the accumulator's range keep their position. Rows beyond it
/// were branched later; follow their origins back until one lands in range.
fn anchor(thought: &Thought, mut position: usize, limit: usize) -> usize {
    let rows = thought.rows();
    while position >= limit {
        let origin = rows[position].origin();
        if origin >= position {
            return limit - 1;
        }
        position = origin;
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(thoughts: Vec<Thought>) -> Argument {
        let mut argument = Argument::new();
        for t in thoughts {
            argument.think(t);
        }
        argument
    }

    #[test]
    fn think_preserves_order() {
        let a = chain(vec![
            Thought::new().with_observation("a", "1"),
            Thought::new().with_observation("a", "2"),
        ]);
        assert_eq!(a.times(), 2);
        assert_eq!(a.mindstate().unwrap().observation("a"), Some("2"));
        assert_eq!(a.remember(1).unwrap().observation("a"), Some("1"));
        assert!(a.remember(2).is_none());
    }

    #[test]
    fn later_steps_overwrite_earlier_ones() {
        let a = chain(vec![
            Thought::new().with_observation("b", "33"),
            Thought::new().with_observation("b", "44"),
        ]);
        let melded = a.mindmeld(true);
        assert_eq!(melded.observations("b")[0], "44");
        assert_eq!(melded.count(), 1);
    }

    #[test]
    fn derived_chain_does_not_branch_when_melded() {
        // Each step copies its predecessor, as the evaluator does.
        let seed = Thought::new().with_observation("0", "hi").with_observation("b", "33");
        let mut step = seed.clone();
        step.add_observation("b", "44");
        assert_eq!(step.count(), 2);

        let a = chain(vec![seed, step]);
        let melded = a.mindmeld(true);
        assert_eq!(melded.count(), 1);
        assert_eq!(melded.observation("b"), Some("44"));
        assert_eq!(melded.observation("0"), Some("hi"));
    }

    #[test]
    fn first_step_branches_survive_the_fold() {
        let seed = Thought::from_bindings([("a", "1"), ("a", "2")]);
        let mut step = seed.clone();
        step.add_observation("c", "5");
        let mut rebind = step.clone();
        rebind.add_observation("a", "3");

        let melded = chain(vec![seed, step, rebind]).mindmeld(true);
        assert_eq!(melded.count(), 2);
        assert_eq!(melded.observations("c"), vec!["5", "5"]);
        assert_eq!(melded.observations("a"), vec!["3", "3"]);
    }

    #[test]
    fn unrelated_names_keep_their_values() {
        let a = chain(vec![
            Thought::new().with_observation("x", "1").with_observation("y", "1"),
            Thought::new().with_observation("y", "2"),
        ]);
        let melded = a.mindmeld(true);
        assert_eq!(melded.observation("x"), Some("1"));
        assert_eq!(melded.observation("y"), Some("2"));
    }

    #[test]
    fn appending_a_step_only_changes_what_it_touches() {
        let mut a = chain(vec![
            Thought::new().with_observation("x", "1").with_observation("y", "1"),
        ]);
        let before = a.mindmeld(true);
        a.think(Thought::new().with_observation("y", "9"));
        let after = a.mindmeld(true);

        assert_eq!(before.observation("x"), after.observation("x"));
        assert_eq!(after.observation("y"), Some("9"));
    }

    #[test]
    fn mindmeld_is_deterministic_and_pure() {
        let a = chain(vec![
            Thought::from_bindings([("a", "1"), ("a", "2")]),
            Thought::new().with_observation("b", "x"),
        ]);
        let snapshot = a.clone();
        let first = a.mindmeld(true);
        let second = a.mindmeld(true);
        assert_eq!(first, second);
        assert_eq!(a, snapshot);
    }

    #[test]
    fn last_only_ignores_history() {
        let a = chain(vec![
            Thought::new().with_observation("x", "1"),
            Thought::new().with_observation("y", "2"),
        ]);
        let melded = a.mindmeld(false);
        assert_eq!(melded.observation("x"), None);
        assert_eq!(melded.observation("y"), Some("2"));
    }

    #[test]
    fn empty_argument_melds_to_empty_thought() {
        let a = Argument::new();
        assert!(a.mindmeld(true).is_empty());
        assert!(a.mindmeld(false).is_empty());
    }

    #[test]
    fn leading_empty_thoughts_are_skipped() {
        let a = chain(vec![Thought::new(), Thought::new().with_observation("a", "1")]);
        assert_eq!(a.mindmeld(true).observation("a"), Some("1"));
    }

    #[test]
    fn later_branches_fold_into_their_origin_row() {
        let a = chain(vec![
            Thought::new().with_observation("a", "1"),
            Thought::from_bindings([("b", "1"), ("b", "2")]),
        ]);
        let melded = a.mindmeld(true);
        assert_eq!(melded.count(), 1);
        assert_eq!(melded.observation("b"), Some("2"));
    }

    #[test]
    fn mindmeld_with_matches_thinking_first() {
        let seed = Thought::new().with_observation("country", "Bolivia");
        let mut looked_up = seed.clone();
        looked_up.add_observation("capital", "Sucre");
        looked_up.add_observation("capital", "La Paz");

        let mut a = chain(vec![seed]);
        let view = a.mindmeld_with(&looked_up);
        assert_eq!(view.observation("capital"), Some("La Paz"));

        a.think(looked_up);
        assert_eq!(view, a.mindmeld(true));
        assert_eq!(a.times(), 2);
    }

    #[test]
    fn rethink_and_amnesia() {
        let mut a = chain(vec![
            Thought::new().with_observation("a", "1"),
            Thought::new().with_observation("a", "2"),
        ]);
        let popped = a.rethink().unwrap();
        assert_eq!(popped.observation("a"), Some("2"));
        assert_eq!(a.times(), 1);

        a.amnesia();
        assert!(a.is_empty());
        assert!(a.rethink().is_none());
    }
}
