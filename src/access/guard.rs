//! Allow/deny decisions invoked by the host pipeline before a protected action runs.

use serde::{Deserialize, Serialize};
use std::{fmt, marker::PhantomData};

use crate::{
    error::SitegateError,
    properties::{ActionMapPayload, NodePayload, PermissionPayload, SiteMapPayload},
    registry::{Registry, SharedRegistry},
};

use super::{CallerContext, CaseSensitivity, PermissionAccessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), SitegateError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(SitegateError::PermissionDenied),
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
        }
    }
}

/// Requires every listed permission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGuard {
    permissions: Vec<String>,
    #[serde(default)]
    case: CaseSensitivity,
    #[serde(default)]
    allow_anonymous: bool,
}

impl PermissionGuard {
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PermissionGuard {
            permissions: permissions.into_iter().map(Into::into).collect(),
            case: CaseSensitivity::Sensitive,
            allow_anonymous: false,
        }
    }

    pub fn case(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    /// Marks the guarded action as public; the check always allows.
    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn check(&self, accessor: &PermissionAccessor, ctx: &CallerContext) -> Decision {
        if self.allow_anonymous {
            return Decision::Allow;
        }
        let decision = Decision::from(accessor.has_permissions_with(
            ctx,
            self.permissions.iter(),
            self.case,
        ));
        if !decision.is_allowed() {
            tracing::warn!("denied: caller lacks one of {:?}", self.permissions);
        }
        decision
    }
}

/// Guards an action by the permission its registry node requires.
///
/// The node is looked up on every check, so registry mutations take effect on the next request.
/// A key with no node, or a node with no requirement, allows.
pub struct NodeGuard<P> {
    key: String,
    case: CaseSensitivity,
    allow_anonymous: bool,
    flavor: PhantomData<fn() -> P>,
}

pub type SiteMapNodeGuard = NodeGuard<SiteMapPayload>;
pub type ActionMapNodeGuard = NodeGuard<ActionMapPayload>;
pub type PermissionNodeGuard = NodeGuard<PermissionPayload>;

impl<P> Clone for NodeGuard<P> {
    fn clone(&self) -> Self {
        NodeGuard {
            key: self.key.clone(),
            case: self.case,
            allow_anonymous: self.allow_anonymous,
            flavor: PhantomData,
        }
    }
}

impl<P: NodePayload> fmt::Debug for NodeGuard<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGuard")
            .field("flavor", &P::FLAVOR)
            .field("key", &self.key)
            .field("case", &self.case)
            .field("allow_anonymous", &self.allow_anonymous)
            .finish()
    }
}

impl<P: NodePayload> NodeGuard<P> {
    /// Node requirements compare case-insensitively unless told otherwise.
    pub fn new<K: Into<String>>(key: K) -> Self {
        NodeGuard {
            key: key.into(),
            case: CaseSensitivity::Insensitive,
            allow_anonymous: false,
            flavor: PhantomData,
        }
    }

    pub fn case(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Checks against a registry the caller already holds. Lookup failures such as duplicate keys
    /// are configuration errors and are returned rather than turned into a decision.
    pub fn check_in(
        &self,
        registry: &Registry<P>,
        accessor: &PermissionAccessor,
        ctx: &CallerContext,
    ) -> Result<Decision, SitegateError> {
        if self.allow_anonymous {
            return Ok(Decision::Allow);
        }
        let required = match registry.find_node(&self.key)? {
            Some(id) => registry.node(id)?.required_permission().map(str::to_string),
            None => {
                tracing::debug!("no {} node '{}'; nothing to enforce", P::FLAVOR, self.key);
                None
            }
        };
        Ok(self.decide(required, accessor, ctx))
    }

    pub fn check(
        &self,
        registry: &SharedRegistry<P>,
        accessor: &PermissionAccessor,
        ctx: &CallerContext,
    ) -> Result<Decision, SitegateError> {
        if self.allow_anonymous {
            return Ok(Decision::Allow);
        }
        let required = registry.required_permission(&self.key)?;
        Ok(self.decide(required, accessor, ctx))
    }

    fn decide(
        &self,
        required: Option<String>,
        accessor: &PermissionAccessor,
        ctx: &CallerContext,
    ) -> Decision {
        let Some(required) = required else {
            return Decision::Allow;
        };
        let decision = Decision::from(accessor.has_permissions_with(ctx, [&required], self.case));
        if !decision.is_allowed() {
            tracing::warn!(
                "denied: {} node '{}' requires '{}'",
                P::FLAVOR,
                self.key,
                required
            );
        }
        decision
    }
}
