//! Permission keys, resolved permission sets and route requirements.
//!
//! Keys are `resource:action` strings with optional extra qualifiers
//! (`trip:view:internal`). A final `*` segment grants everything under the
//! prefix (`trip:*`), and the bare `*` key grants everything.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The key that grants every permission.
pub const WILDCARD: &str = "*";

static KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|[a-z0-9_-]+(:[a-z0-9_-]+)*:([a-z0-9_-]+|\*))$").expect("valid regex")
});

/// The key does not follow the `resource:action` format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid permission key: {0:?}")]
pub struct InvalidPermissionKey(pub String);

/// A validated permission key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKey(String);

impl PermissionKey {
    /// Parse and validate a key.
    pub fn parse(raw: &str) -> Result<Self, InvalidPermissionKey> {
        let trimmed = raw.trim();
        if KEY_REGEX.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidPermissionKey(raw.to_string()))
        }
    }

    /// Wrap a key that is already known to be well-formed.
    ///
    /// Used for compile-time constants and rows read back from the
    /// `permissions` table, which only ever receives parsed keys.
    pub fn from_trusted(key: impl Into<String>) -> Self {
        let key = key.into();
        debug_assert!(KEY_REGEX.is_match(&key), "malformed permission key {key:?}");
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading segment (`trip` for `trip:edit`). `*` for the global wildcard.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    /// Whether this key grants a family of permissions rather than one.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD || self.0.ends_with(":*")
    }

    /// Whether holding `self` grants `required`.
    #[must_use]
    pub fn grants(&self, required: &Self) -> bool {
        if self == required || self.0 == WILDCARD {
            return true;
        }

        // "trip:*" covers "trip:edit" and "trip:view:internal", not "trips:edit"
        self.0.strip_suffix('*').is_some_and(|prefix| {
            required.0.len() > prefix.len() && required.0.starts_with(prefix)
        })
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PermissionKey {
    type Err = InvalidPermissionKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = InvalidPermissionKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionKey> for String {
    fn from(key: PermissionKey) -> Self {
        key.0
    }
}

/// A user's effective, deduplicated permission keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionKey>);

impl PermissionSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a key. Returns `false` if it was already present.
    pub fn insert(&mut self, key: PermissionKey) -> bool {
        self.0.insert(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact membership, ignoring wildcards.
    #[must_use]
    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.0.contains(key)
    }

    /// Whether the set grants `key`, directly or through a wildcard.
    #[must_use]
    pub fn has(&self, key: &PermissionKey) -> bool {
        self.0.contains(key) || self.0.iter().any(|held| held.grants(key))
    }

    #[must_use]
    pub fn has_all(&self, keys: &[PermissionKey]) -> bool {
        keys.iter().all(|k| self.has(k))
    }

    #[must_use]
    pub fn has_any(&self, keys: &[PermissionKey]) -> bool {
        keys.iter().any(|k| self.has(k))
    }

    #[must_use]
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        match requirement {
            Requirement::AllOf(keys) => self.has_all(keys),
            Requirement::AnyOf(keys) => self.has_any(keys),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionKey> {
        self.0.iter()
    }

    /// Keys as plain strings, sorted.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|k| k.as_str().to_string()).collect()
    }
}

impl FromIterator<PermissionKey> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<PermissionKey> for PermissionSet {
    fn extend<I: IntoIterator<Item = PermissionKey>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a PermissionKey;
    type IntoIter = std::collections::btree_set::Iter<'a, PermissionKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Permission policy declared by a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Every key must be held. An empty list is always satisfied.
    AllOf(Vec<PermissionKey>),
    /// At least one key must be held. An empty list is never satisfied.
    AnyOf(Vec<PermissionKey>),
}

impl Requirement {
    /// Require a single key.
    #[must_use]
    pub fn one(key: &'static str) -> Self {
        Self::AllOf(vec![PermissionKey::from_trusted(key)])
    }

    #[must_use]
    pub fn all_of(keys: &[&'static str]) -> Self {
        Self::AllOf(keys.iter().map(|k| PermissionKey::from_trusted(*k)).collect())
    }

    #[must_use]
    pub fn any_of(keys: &[&'static str]) -> Self {
        Self::AnyOf(keys.iter().map(|k| PermissionKey::from_trusted(*k)).collect())
    }

    #[must_use]
    pub fn keys(&self) -> &[PermissionKey] {
        match self {
            Self::AllOf(keys) | Self::AnyOf(keys) => keys,
        }
    }

    /// Keys that keep `held` from satisfying this requirement.
    ///
    /// Empty when satisfied. For `AnyOf` this is every listed key.
    #[must_use]
    pub fn missing(&self, held: &PermissionSet) -> Vec<PermissionKey> {
        match self {
            Self::AllOf(keys) => keys.iter().filter(|k| !held.has(k)).cloned().collect(),
            Self::AnyOf(keys) if held.has_any(keys) => Vec::new(),
            Self::AnyOf(keys) => keys.clone(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, keys) = match self {
            Self::AllOf(keys) => ("all of", keys),
            Self::AnyOf(keys) => ("any of", keys),
        };
        let joined: Vec<&str> = keys.iter().map(PermissionKey::as_str).collect();
        write!(f, "{label} [{}]", joined.join(", "))
    }
}
