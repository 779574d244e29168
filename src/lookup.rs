//! Lookup collaborators: external services consulted by `lookup` operations.
//!
//! A lookup receives the instantiated parameters of the operation and returns
//! an ordered list of [`Binding`]s, which the evaluator observes in order
//! (repeated names therefore branch into alternatives). Lookups are registered
//! by name in a [`LookupRegistry`].

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::thought::{Binding, canonical_value};

/// Why a lookup produced no result.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum LookupFailure {
    #[error("service unavailable: {message}")]
    #[diagnostic(code(mindmeld::lookup::unavailable))]
    Unavailable { message: String },

    #[error("no result for {key}")]
    #[diagnostic(code(mindmeld::lookup::not_found))]
    NotFound { key: String },

    #[error("invalid request: {message}")]
    #[diagnostic(
        code(mindmeld::lookup::invalid_request),
        help("Check the `params` of the lookup operation in the skill.")
    )]
    InvalidRequest { message: String },
}

/// Input to a lookup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// Instantiated parameters.
    pub params: BTreeMap<String, String>,
    /// Time budget for the call. The evaluator rejects late results.
    pub timeout: Duration,
}

impl LookupRequest {
    pub fn new(params: BTreeMap<String, String>, timeout: Duration) -> Self {
        Self { params, timeout }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Get a required parameter, failing with `InvalidRequest` if missing.
    pub fn require(&self, name: &str) -> Result<&str, LookupFailure> {
        self.get(name).ok_or_else(|| LookupFailure::InvalidRequest {
            message: format!("missing required parameter: {name}"),
        })
    }
}

/// An external service the evaluator can consult.
pub trait Lookup: Send + Sync {
    /// Service name referenced by `lookup` operations.
    fn name(&self) -> &str;

    /// Perform the lookup. Blocking; should honour `request.timeout`.
    fn lookup(&self, request: &LookupRequest) -> Result<Vec<Binding>, LookupFailure>;
}

/// Registry of lookup collaborators by service name.
pub struct LookupRegistry {
    lookups: HashMap<String, Box<dyn Lookup>>,
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self {
            lookups: HashMap::new(),
        }
    }

    /// Register a lookup. A lookup with the same name is replaced.
    pub fn register(&mut self, lookup: Box<dyn Lookup>) {
        self.lookups.insert(lookup.name().to_string(), lookup);
    }

    /// Builder form of [`LookupRegistry::register`].
    pub fn with(mut self, lookup: impl Lookup + 'static) -> Self {
        self.register(Box::new(lookup));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Lookup> {
        self.lookups.get(name).map(|b| b.as_ref())
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.lookups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }
}

impl Default for LookupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LookupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupRegistry")
            .field("lookups", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Stock lookups
// ---------------------------------------------------------------------------

/// Configuration of a [`StaticLookup`].
///
/// ```toml
/// [lookups.capital]
/// key = "country"
/// [lookups.capital.entries.france]
/// capital = "Paris"
/// population = 2102650
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticLookupConfig {
    /// Request parameter used as the table key.
    pub key: String,
    /// Key value → result bindings. Non-string values are canonicalized.
    #[serde(default)]
    pub entries: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// A fixed table keyed by one request parameter, matched case-insensitively.
#[derive(Debug, Clone)]
pub struct StaticLookup {
    name: String,
    key: String,
    entries: HashMap<String, Vec<Binding>>,
}

impl StaticLookup {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            entries: HashMap::new(),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &StaticLookupConfig) -> Self {
        let mut lookup = Self::new(name, config.key.clone());
        for (key, bindings) in &config.entries {
            let bindings = bindings
                .iter()
                .map(|(n, v)| Binding::from_json(n.clone(), v))
                .collect();
            lookup.entries.insert(key.to_lowercase(), bindings);
        }
        lookup
    }

    /// Add an entry; later bindings with the same name become alternatives.
    pub fn entry<I, N, V>(mut self, key: &str, bindings: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let bindings = bindings.into_iter().map(|(n, v)| Binding::new(n, v)).collect();
        self.entries.insert(key.to_lowercase(), bindings);
        self
    }
}

impl Lookup for StaticLookup {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, request: &LookupRequest) -> Result<Vec<Binding>, LookupFailure> {
        let key = request.require(&self.key)?;
        self.entries
            .get(&key.to_lowercase())
            .cloned()
            .ok_or_else(|| LookupFailure::NotFound {
                key: key.to_string(),
            })
    }
}

/// A lookup backed by a closure.
pub struct FnLookup<F> {
    name: String,
    f: F,
}

impl<F> FnLookup<F>
where
    F: Fn(&LookupRequest) -> Result<Vec<Binding>, LookupFailure> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Lookup for FnLookup<F>
where
    F: Fn(&LookupRequest) -> Result<Vec<Binding>, LookupFailure> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, request: &LookupRequest) -> Result<Vec<Binding>, LookupFailure> {
        (self.f)(request)
    }
}

/// Canonicalize a JSON object's fields into bindings, in key order.
pub fn bindings_from_json(object: &serde_json::Map<String, serde_json::Value>) -> Vec<Binding> {
    object
        .iter()
        .map(|(name, value)| Binding::new(name.clone(), canonical_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(params: &[(&str, &str)]) -> LookupRequest {
        LookupRequest::new(
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn register_and_get() {
        let reg = LookupRegistry::new()
            .with(StaticLookup::new("capital", "country"))
            .with(FnLookup::new("echo", |r: &LookupRequest| {
                Ok(vec![Binding::new("echo", r.require("text")?)])
            }));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.names(), vec!["capital", "echo"]);
        assert!(reg.get("missing").is_none());

        let out = reg.get("echo").unwrap().lookup(&request(&[("text", "hi")])).unwrap();
        assert_eq!(out, vec![Binding::new("echo", "hi")]);
    }

    #[test]
    fn static_lookup_matches_case_insensitively() {
        let lookup = StaticLookup::new("capital", "country").entry("France", [("capital", "Paris")]);
        let out = lookup.lookup(&request(&[("country", "FRANCE")])).unwrap();
        assert_eq!(out, vec![Binding::new("capital", "Paris")]);

        assert!(matches!(
            lookup.lookup(&request(&[("country", "Atlantis")])),
            Err(LookupFailure::NotFound { .. })
        ));
        assert!(matches!(
            lookup.lookup(&request(&[])),
            Err(LookupFailure::InvalidRequest { .. })
        ));
    }

    #[test]
    fn static_lookup_from_toml_config() {
        let config: StaticLookupConfig = toml::from_str(
            r#"
            key = "country"
            [entries.france]
            capital = "Paris"
            population = 2102650
            "#,
        )
        .unwrap();
        let lookup = StaticLookup::from_config("capital", &config);
        let out = lookup.lookup(&request(&[("country", "france")])).unwrap();
        assert_eq!(
            out,
            vec![
                Binding::new("capital", "Paris"),
                Binding::new("population", "2102650"),
            ]
        );
    }

    #[test]
    fn json_objects_become_bindings() {
        let value = serde_json::json!({"lat": 48.85, "name": "Paris", "capital": true});
        let bindings = bindings_from_json(value.as_object().unwrap());
        assert_eq!(
            bindings,
            vec![
                Binding::new("capital", "true"),
                Binding::new("lat", "48.85"),
                Binding::new("name", "Paris"),
            ]
        );
    }
}
