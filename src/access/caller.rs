//! Request-scoped caller model: identities, their claims, and caller-scoped session storage.
//!
//! The host pipeline builds a [CallerContext] per request from whatever authentication and
//! session middleware it runs; this crate only reads and rewrites permission claims and one
//! session entry.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, sync::Arc};

use super::CaseSensitivity;

/// Session entry holding the delimited permission list of callers without an authenticated
/// identity.
pub const PERMISSION_SESSION_KEY: &str = "sitegate/security/permissions";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClaimKind {
    Permission,
    Role,
    Name,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Claim {
    pub kind: ClaimKind,
    pub value: String,
}

impl Claim {
    pub fn new<V: Into<String>>(kind: ClaimKind, value: V) -> Self {
        Claim {
            kind,
            value: value.into(),
        }
    }

    pub fn permission<V: Into<String>>(value: V) -> Self {
        Claim::new(ClaimKind::Permission, value)
    }

    pub fn role<V: Into<String>>(value: V) -> Self {
        Claim::new(ClaimKind::Role, value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: Option<String>,
    authenticated: bool,
    claims: Vec<Claim>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Identity::default()
    }

    pub fn authenticated<N: Into<String>>(name: N) -> Self {
        Identity {
            name: Some(name.into()),
            authenticated: true,
            claims: Vec::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn claim_values<'a>(&'a self, kind: &'a ClaimKind) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |claim| &claim.kind == kind)
            .map(|claim| claim.value.as_str())
    }

    pub fn has_claim(&self, kind: &ClaimKind, value: &str) -> bool {
        self.has_claim_with(kind, value, CaseSensitivity::Sensitive)
    }

    pub fn has_claim_with(&self, kind: &ClaimKind, value: &str, case: CaseSensitivity) -> bool {
        self.claim_values(kind).any(|v| case.matches(v, value))
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    pub fn add_claims<I: IntoIterator<Item = Claim>>(&mut self, claims: I) {
        self.claims.extend(claims);
    }

    /// Removes every claim of `kind`, returning how many were dropped.
    pub fn remove_claims(&mut self, kind: &ClaimKind) -> usize {
        let before = self.claims.len();
        self.claims.retain(|claim| &claim.kind != kind);
        before - self.claims.len()
    }
}

/// Named string values scoped to the current caller.
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Whether a session exists for this request.
    fn is_available(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    fn remove(&self, key: &str);
}

/// In-memory [SessionStore], used when the host keeps sessions in process and in tests.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: Mutex<BTreeMap<String, String>>,
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

/// Everything the authorization engine knows about the current caller.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    identities: Vec<Identity>,
    session: Option<Arc<dyn SessionStore>>,
}

impl CallerContext {
    /// A caller with no identity and no session.
    pub fn anonymous() -> Self {
        CallerContext::default()
    }

    pub fn new(identities: Vec<Identity>) -> Self {
        CallerContext {
            identities,
            session: None,
        }
    }

    pub fn with_session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn add_identity(&mut self, identity: Identity) {
        self.identities.push(identity);
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn identities_mut(&mut self) -> &mut [Identity] {
        &mut self.identities
    }

    pub fn authenticated_identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter().filter(|i| i.is_authenticated())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated_identities().next().is_some()
    }

    /// The caller's session, only if one is available for this request.
    pub fn session(&self) -> Option<&dyn SessionStore> {
        self.session
            .as_deref()
            .filter(|session| session.is_available())
    }

    /// Role claim values across authenticated identities, first occurrence order.
    pub fn role_names(&self) -> Vec<String> {
        let mut roles: Vec<String> = Vec::new();
        for role in self
            .authenticated_identities()
            .flat_map(|i| i.claim_values(&ClaimKind::Role))
        {
            if !roles.iter().any(|r| r == role) {
                roles.push(role.to_string());
            }
        }
        roles
    }
}
