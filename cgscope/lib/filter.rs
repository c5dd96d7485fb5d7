//! Namespace selection.
//!
//! A run either targets one explicit namespace or every namespace minus those matching a set of
//! `*` glob patterns. The two modes never combine: an explicit namespace disables exclusion.

use regex::Regex;

use crate::{CgscopeError, CgscopeResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An ordered set of namespace exclusion patterns.
///
/// `*` matches zero or more characters and every other character matches itself. A pattern must
/// match the whole namespace name.
#[derive(Debug, Clone, Default)]
pub struct NamespaceFilter {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
}

/// Which namespaces a run collects from.
#[derive(Debug, Clone)]
pub enum NamespaceScope {
    /// Every namespace not excluded by the filter.
    All(NamespaceFilter),

    /// Exactly this namespace.
    Single(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NamespaceFilter {
    /// Compiles the given patterns. Blank patterns are ignored.
    pub fn new<I, S>(patterns: I) -> CgscopeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }

            let compiled = Regex::new(&glob_to_regex(pattern)).map_err(|source| {
                CgscopeError::InvalidNamespacePattern {
                    pattern: pattern.to_string(),
                    source,
                }
            })?;

            filter.patterns.push(pattern.to_string());
            filter.compiled.push(compiled);
        }

        Ok(filter)
    }

    /// Returns true if `namespace` matches none of the exclusion patterns.
    pub fn should_include(&self, namespace: &str) -> bool {
        !self.compiled.iter().any(|re| re.is_match(namespace))
    }

    /// The patterns in the order they were given.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl NamespaceScope {
    /// Builds the scope from an optional explicit namespace and the exclusion patterns.
    ///
    /// An explicit namespace takes precedence; the patterns are then ignored.
    pub fn from_parts<I, S>(namespace: Option<String>, exclude: I) -> CgscopeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match namespace.filter(|ns| !ns.trim().is_empty()) {
            Some(namespace) => Ok(NamespaceScope::Single(namespace.trim().to_string())),
            None => Ok(NamespaceScope::All(NamespaceFilter::new(exclude)?)),
        }
    }

    /// The explicit namespace, if the scope is limited to one.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            NamespaceScope::Single(namespace) => Some(namespace),
            NamespaceScope::All(_) => None,
        }
    }

    /// Returns true if objects in `namespace` take part in collection.
    pub fn includes(&self, namespace: &str) -> bool {
        match self {
            NamespaceScope::Single(selected) => selected == namespace,
            NamespaceScope::All(filter) => filter.should_include(namespace),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Translates a `*` glob into an anchored regular expression.
pub fn glob_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{}$", body)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
