use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Ordered, de-duplicated set of scope strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(scopes.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn covers(&self, other: &ScopeSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl From<&[&str]> for ScopeSet {
    fn from(scopes: &[&str]) -> Self {
        Self::new(scopes.iter().copied())
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(" "))
    }
}

/// Credentials of an API client provisioned by a test case.
#[derive(Debug, Clone)]
pub struct ApiClientCredentials {
    pub client_id: String,
    pub client_name: String,
    pub secret: String,
    pub scopes: ScopeSet,
    pub lifetime: u64,
}

/// Per test case cache of provisioned clients and, optionally, their tokens.
///
/// Clients are keyed by the exact scope set they were created with. A lookup is
/// satisfied by any client whose scopes cover the requested ones.
#[derive(Debug, Default)]
pub struct ClientCache {
    clients: BTreeMap<ScopeSet, ApiClientCredentials>,
    tokens: HashMap<ScopeSet, String>,
}

impl ClientCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, credentials: ApiClientCredentials) {
        self.clients.insert(credentials.scopes.clone(), credentials);
    }

    /// The client created for exactly `scopes`, else the first one covering them.
    #[must_use]
    pub fn find_covering(&self, scopes: &ScopeSet) -> Option<&ApiClientCredentials> {
        self.clients.get(scopes).or_else(|| {
            self.clients
                .values()
                .find(|credentials| credentials.scopes.covers(scopes))
        })
    }

    #[must_use]
    pub fn token(&self, scopes: &ScopeSet) -> Option<&str> {
        self.tokens.get(scopes).map(String::as_str)
    }

    pub fn store_token(&mut self, scopes: ScopeSet, token: String) {
        self.tokens.insert(scopes, token);
    }

    pub fn clear(&mut self) {
        self.clients.clear();
        self.tokens.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiClientCredentials> {
        self.clients.values()
    }
}
