//! Path Matching
//!
//! Resolves a concrete tree path against a resolver's match rule and
//! extracts the named captures used by fetch and listen implementations.
//!
//! Route patterns are slash-delimited. `:name` captures one segment, a bare `*`
//! matches one segment without capturing, and a trailing `*` captures the
//! remaining segments under `rest`.

use crate::resolver::PathOptions;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name of the capture holding a trailing wildcard's tail
pub const REST: &str = "rest";

const WILDCARD: &str = "*";

/// Captured path fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Tail captured by a trailing wildcard, absent when nothing remained
    pub fn rest(&self) -> Option<&str> {
        self.get(REST)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

type MatchPredicate = dyn Fn(&str, &PathOptions) -> Option<PathParams> + Send + Sync;

/// How a resolver decides which paths it serves
#[derive(Clone)]
pub enum MatchSpec {
    /// A single route pattern
    Literal(String),
    /// Route patterns tried in order; the first match wins
    AnyOf(Vec<String>),
    /// A regular expression applied to the whole path
    Pattern(Regex),
    /// Arbitrary matching logic
    Predicate(Arc<MatchPredicate>),
}

impl MatchSpec {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &PathOptions) -> Option<PathParams> + Send + Sync + 'static,
    {
        MatchSpec::Predicate(Arc::new(f))
    }

    /// Match `path`, returning its captures or `None` when it does not match
    pub fn matches(&self, path: &str, options: &PathOptions) -> Option<PathParams> {
        match self {
            MatchSpec::Literal(pattern) => match_route(path, pattern),
            MatchSpec::AnyOf(patterns) => patterns
                .iter()
                .find_map(|pattern| match_route(path, pattern)),
            MatchSpec::Pattern(regex) => match_regex(path, regex),
            MatchSpec::Predicate(predicate) => predicate(path, options),
        }
    }
}

impl fmt::Debug for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSpec::Literal(pattern) => f.debug_tuple("Literal").field(pattern).finish(),
            MatchSpec::AnyOf(patterns) => f.debug_tuple("AnyOf").field(patterns).finish(),
            MatchSpec::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            MatchSpec::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for MatchSpec {
    fn from(pattern: &str) -> Self {
        MatchSpec::Literal(pattern.to_string())
    }
}

impl From<String> for MatchSpec {
    fn from(pattern: String) -> Self {
        MatchSpec::Literal(pattern)
    }
}

impl From<Vec<&str>> for MatchSpec {
    fn from(patterns: Vec<&str>) -> Self {
        MatchSpec::AnyOf(patterns.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for MatchSpec {
    fn from(patterns: Vec<String>) -> Self {
        MatchSpec::AnyOf(patterns)
    }
}

impl From<Regex> for MatchSpec {
    fn from(regex: Regex) -> Self {
        MatchSpec::Pattern(regex)
    }
}

/// Match a path against a single route pattern.
pub fn match_route(path: &str, pattern: &str) -> Option<PathParams> {
    let path_parts: Vec<&str> = path.split('/').collect();
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let trailing_wildcard = pattern_parts.last() == Some(&WILDCARD);

    if path_parts.len() > pattern_parts.len() && !trailing_wildcard {
        return None;
    }

    let mut params = PathParams::new();
    let last = pattern_parts.len() - 1;
    for (i, segment) in pattern_parts.iter().enumerate() {
        if i == last && trailing_wildcard {
            if path_parts.len() > i {
                let rest = path_parts[i..].join("/");
                if !rest.is_empty() {
                    params.insert(REST, rest);
                }
            }
            break;
        }

        let value = path_parts.get(i)?;
        if let Some(name) = segment.strip_prefix(':') {
            params.insert(name, *value);
        } else if *segment != WILDCARD && segment != value {
            return None;
        }
    }

    Some(params)
}

fn match_regex(path: &str, regex: &Regex) -> Option<PathParams> {
    let captures = regex.captures(path)?;
    let mut params = PathParams::new();
    for (i, name) in regex.capture_names().enumerate().skip(1) {
        if let Some(value) = captures.get(i) {
            match name {
                Some(name) => params.insert(name, value.as_str()),
                None => params.insert(i.to_string(), value.as_str()),
            }
        }
    }
    Some(params)
}
