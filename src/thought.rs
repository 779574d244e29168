//! Thoughts: branching tables of variable bindings.
//!
//! A [`Thought`] is a hypothesis set. Each [`Row`] is one hypothesis, a
//! mapping from binding name to value. Observing a name that a row already
//! binds to a *different* value never overwrites: the row is duplicated and the
//! duplicate carries the new value as an alternative (an OR-branch). Overwrite
//! semantics only exist across thoughts, in [`crate::argument::Argument::mindmeld`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde::ser::SerializeStruct;

/// A name bound to a canonical string value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Binding {
    pub name: String,
    pub value: String,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Bind a JSON value, converting it to its canonical string form.
    pub fn from_json(name: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::new(name, canonical_value(value))
    }
}

/// Canonical string form of a JSON value.
///
/// Strings are taken verbatim, `null` becomes the empty string, everything
/// else (numbers, booleans, arrays, objects) uses its compact JSON text.
pub fn canonical_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One hypothesis: a set of bindings with unique names.
///
/// Equality compares bindings only.
#[derive(Debug, Clone, Eq, Serialize)]
#[serde(transparent)]
pub struct Row {
    bindings: BTreeMap<String, String>,
    /// Position of the row this one was branched from, or its own position.
    #[serde(skip)]
    origin: usize,
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.bindings == other.bindings
    }
}

impl Row {
    fn at(origin: usize) -> Self {
        Self {
            bindings: BTreeMap::new(),
            origin,
        }
    }

    /// Value bound to `name` in this row.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// Whether this row binds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Iterate bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of bindings in this row.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn origin(&self) -> usize {
        self.origin
    }

    pub(crate) fn set(&mut self, name: &str, value: &str) {
        match self.bindings.get_mut(name) {
            Some(existing) => {
                existing.clear();
                existing.push_str(value);
            }
            None => {
                self.bindings.insert(name.to_string(), value.to_string());
            }
        }
    }
}

/// A branching binding table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thought {
    rows: Vec<Row>,
}

impl Thought {
    /// Create an empty thought (`count() == 0`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a thought by observing each binding in order.
    pub fn from_bindings<I, N, V>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut thought = Self::new();
        for (name, value) in bindings {
            thought.add_observation(name, value);
        }
        thought
    }

    /// Builder form of [`Thought::add_observation`].
    pub fn with_observation(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_observation(name, value);
        self
    }

    /// Observe `name = value`, branching on conflict.
    ///
    /// - empty thought: one new row is created;
    /// - no row binds `name`: the binding is broadcast to every row;
    /// - some row already binds `name` to `value`: nothing changes;
    /// - otherwise every row binding `name` differently is duplicated with the
    ///   new value, duplicates appended after all existing rows in order.
    ///   Rows that do not bind `name` take the binding in place.
    pub fn add_observation(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        if self.rows.is_empty() {
            let mut row = Row::at(0);
            row.bindings.insert(name, value);
            self.rows.push(row);
            return;
        }

        if self.rows.iter().any(|row| row.get(&name) == Some(value.as_str())) {
            return;
        }

        let mut branches = Vec::new();
        for (position, row) in self.rows.iter_mut().enumerate() {
            if row.contains(&name) {
                let mut branch = row.clone();
                branch.origin = position;
                branch.set(&name, &value);
                branches.push(branch);
            } else {
                row.bindings.insert(name.clone(), value.clone());
            }
        }
        self.rows.extend(branches);
    }

    /// Add a binding to the given row position with overwrite semantics.
    ///
    /// Out-of-range positions are ignored; this never adds rows.
    pub(crate) fn overwrite(&mut self, position: usize, name: &str, value: &str) {
        if let Some(row) = self.rows.get_mut(position) {
            row.set(name, value);
        }
    }

    /// Number of rows (hypotheses).
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values bound to `name`, one per binding row, in row order.
    pub fn observations(&self, name: &str) -> Vec<&str> {
        self.rows.iter().filter_map(|row| row.get(name)).collect()
    }

    /// First value bound to `name` in row order.
    pub fn observation(&self, name: &str) -> Option<&str> {
        self.rows.iter().find_map(|row| row.get(name))
    }

    /// True when `name` is unbound or its first observation is empty.
    pub fn has_empty_observation(&self, name: &str) -> bool {
        self.observation(name).is_none_or(str::is_empty)
    }

    /// Rows in order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The primary hypothesis.
    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }
}

impl Serialize for Thought {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Thought", 2)?;
        state.serialize_field("count", &self.count())?;
        state.serialize_field("data", &self.rows)?;
        state.end()
    }
}

impl std::fmt::Display for Thought {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            write!(f, "{i}:")?;
            for (name, value) in row.iter() {
                write!(f, " {name}={value:?}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_thought_has_no_rows() {
        let t = Thought::new();
        assert_eq!(t.count(), 0);
        assert!(t.is_empty());
        assert!(t.observations("a").is_empty());
        assert!(t.first_row().is_none());
    }

    #[test]
    fn first_observation_creates_a_row() {
        let t = Thought::new().with_observation("a", "1");
        assert_eq!(t.count(), 1);
        assert_eq!(t.observations("a"), vec!["1"]);
    }

    #[test]
    fn unseen_name_is_broadcast_to_every_row() {
        let mut t = Thought::from_bindings([("a", "1"), ("a", "2")]);
        assert_eq!(t.count(), 2);

        t.add_observation("b", "7");
        assert_eq!(t.count(), 2);
        assert!(t.rows().iter().all(|row| row.get("b") == Some("7")));
    }

    #[test]
    fn conflicting_value_branches() {
        let mut t = Thought::new().with_observation("n", "v1").with_observation("x", "y");
        t.add_observation("n", "v2");

        assert_eq!(t.count(), 2);
        assert_eq!(t.observations("n"), vec!["v1", "v2"]);
        // The branch keeps the other bindings of its original.
        assert_eq!(t.rows()[1].get("x"), Some("y"));
    }

    #[test]
    fn branching_grows_by_number_of_conflicting_rows() {
        let mut t = Thought::from_bindings([("n", "a"), ("n", "b")]);
        t.add_observation("m", "1");
        assert_eq!(t.count(), 2);

        t.add_observation("n", "c");
        assert_eq!(t.count(), 4);
        assert_eq!(t.observations("n"), vec!["a", "b", "c", "c"]);
        // Duplicates are appended in the order of their originals.
        assert_eq!(t.rows()[2].origin(), 0);
        assert_eq!(t.rows()[3].origin(), 1);
    }

    #[test]
    fn observing_an_existing_value_is_idempotent() {
        let mut t = Thought::from_bindings([("n", "v1"), ("n", "v2")]);
        let before = t.clone();

        t.add_observation("n", "v1");
        t.add_observation("n", "v2");
        assert_eq!(t, before);
    }

    #[test]
    fn rows_without_the_name_take_it_in_place() {
        // Row 1 lacks `n` because it was branched on `m` before `n` existed.
        let mut t = Thought::from_bindings([("m", "1"), ("m", "2")]);
        t.overwrite(0, "n", "a");

        t.add_observation("n", "b");
        assert_eq!(t.count(), 3);
        assert_eq!(t.rows()[1].get("n"), Some("b"));
        assert_eq!(t.rows()[2].get("n"), Some("b"));
        assert_eq!(t.rows()[2].get("m"), Some("1"));
    }

    #[test]
    fn equality_ignores_branch_origins() {
        let branched = Thought::from_bindings([("a", "1"), ("a", "2")]);
        assert_eq!(branched.rows()[1].origin(), 0);

        let mut second = Row::at(1);
        second.set("a", "2");
        let mut first = Row::at(0);
        first.set("a", "1");
        let built = Thought {
            rows: vec![first, second],
        };
        assert_eq!(built.rows()[1].origin(), 1);
        assert_eq!(built, branched);
    }

    #[test]
    fn empty_observation_checks() {
        let t = Thought::new().with_observation("a", "").with_observation("b", "x");
        assert!(t.has_empty_observation("a"));
        assert!(!t.has_empty_observation("b"));
        assert!(t.has_empty_observation("missing"));
    }

    #[test]
    fn overwrite_never_adds_rows() {
        let mut t = Thought::new().with_observation("a", "1");
        t.overwrite(0, "a", "2");
        t.overwrite(5, "a", "3");
        assert_eq!(t.count(), 1);
        assert_eq!(t.observation("a"), Some("2"));
    }

    #[test]
    fn canonical_values() {
        use serde_json::json;
        assert_eq!(canonical_value(&json!("Paris")), "Paris");
        assert_eq!(canonical_value(&json!(42)), "42");
        assert_eq!(canonical_value(&json!(2.5)), "2.5");
        assert_eq!(canonical_value(&json!(true)), "true");
        assert_eq!(canonical_value(&json!(null)), "");
        assert_eq!(Binding::from_json("n", &json!([1, 2])).value, "[1,2]");
    }

    #[test]
    fn serializes_count_and_rows() {
        let t = Thought::from_bindings([("a", "1"), ("a", "2")]);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["data"][0]["a"], "1");
        assert_eq!(json["data"][1]["a"], "2");
    }
}
