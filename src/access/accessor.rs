use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

use crate::error::SitegateError;

use super::{
    expand_roles_to_permissions, CallerContext, Claim, ClaimKind, RoleProvider,
    PERMISSION_SESSION_KEY,
};

/// How permission names are compared when deciding access.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    pub fn matches(&self, granted: &str, required: &str) -> bool {
        match self {
            CaseSensitivity::Sensitive => granted == required,
            CaseSensitivity::Insensitive => {
                granted == required || granted.to_lowercase() == required.to_lowercase()
            }
        }
    }
}

/// Computes and rewrites the caller's effective permission set.
///
/// Permissions live in two places: permission claims on the caller's authenticated identities,
/// and a delimited list under [PERMISSION_SESSION_KEY] in the caller's session (for callers that
/// have no authenticated identity yet). Every read unions both; nothing is cached between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionAccessor {
    session_key: String,
}

impl Default for PermissionAccessor {
    fn default() -> Self {
        PermissionAccessor {
            session_key: PERMISSION_SESSION_KEY.to_string(),
        }
    }
}

impl PermissionAccessor {
    pub fn new() -> Self {
        PermissionAccessor::default()
    }

    pub fn with_session_key<K: Into<String>>(key: K) -> Self {
        PermissionAccessor {
            session_key: key.into(),
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Permissions stored in the caller's session. Entries are split on `,` or `;`, trimmed, and
    /// empty entries are dropped.
    pub fn session_permissions(&self, ctx: &CallerContext) -> BTreeSet<String> {
        let Some(stored) = ctx.session().and_then(|s| s.get(&self.session_key)) else {
            return BTreeSet::new();
        };
        stored
            .split([',', ';'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Permission claims across every authenticated identity.
    pub fn claim_permissions(&self, ctx: &CallerContext) -> BTreeSet<String> {
        ctx.authenticated_identities()
            .flat_map(|identity| identity.claim_values(&ClaimKind::Permission))
            .map(str::to_string)
            .collect()
    }

    pub fn effective_permissions(&self, ctx: &CallerContext) -> BTreeSet<String> {
        let mut permissions = self.claim_permissions(ctx);
        permissions.extend(self.session_permissions(ctx));
        permissions
    }

    /// True iff every required permission is held, either as a claim on some authenticated
    /// identity or in the session list. An empty requirement is satisfied by any caller.
    pub fn has_permissions<I, S>(&self, ctx: &CallerContext, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.has_permissions_with(ctx, required, CaseSensitivity::Sensitive)
    }

    pub fn has_permissions_with<I, S>(
        &self,
        ctx: &CallerContext,
        required: I,
        case: CaseSensitivity,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // The session list is only parsed if some permission is missing from the claims.
        let mut session: Option<BTreeSet<String>> = None;
        required.into_iter().all(|permission| {
            let permission = permission.as_ref();
            ctx.authenticated_identities()
                .any(|identity| identity.has_claim_with(&ClaimKind::Permission, permission, case))
                || session
                    .get_or_insert_with(|| self.session_permissions(ctx))
                    .iter()
                    .any(|granted| case.matches(granted, permission))
        })
    }

    /// Replaces the caller's permissions. The new set goes onto the first authenticated identity
    /// when there is one, otherwise into the session. With neither available the set is dropped.
    pub fn set_permissions<I, S>(&self, ctx: &mut CallerContext, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clear_permissions(ctx);
        let permissions = dedup(permissions);

        let target = ctx.identities().iter().position(|i| i.is_authenticated());
        if let Some(index) = target {
            ctx.identities_mut()[index].add_claims(permissions.into_iter().map(Claim::permission));
        } else if let Some(session) = ctx.session() {
            session.set(&self.session_key, permissions.join(";"));
        } else {
            tracing::warn!(
                "caller has neither an authenticated identity nor a session; {} permission(s) dropped",
                permissions.len()
            );
        }
    }

    /// Like [PermissionAccessor::set_permissions] but claims only: the session is left alone and
    /// nothing is stored when no identity is authenticated.
    pub fn set_principal_permissions<I, S>(&self, ctx: &mut CallerContext, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for identity in ctx.identities_mut() {
            identity.remove_claims(&ClaimKind::Permission);
        }
        let permissions = dedup(permissions);
        if let Some(identity) = ctx
            .identities_mut()
            .iter_mut()
            .find(|i| i.is_authenticated())
        {
            identity.add_claims(permissions.into_iter().map(Claim::permission));
        }
    }

    /// Removes permission claims from every identity and the session entry, if any.
    pub fn clear_permissions(&self, ctx: &mut CallerContext) {
        for identity in ctx.identities_mut() {
            identity.remove_claims(&ClaimKind::Permission);
        }
        if let Some(session) = ctx.session() {
            session.remove(&self.session_key);
        }
    }

    /// Login composition: expands `roles` through `provider` and makes the result the caller's
    /// permission set. A provider failure leaves the caller's permissions untouched.
    pub async fn sign_in<R, I, S>(
        &self,
        ctx: &mut CallerContext,
        roles: I,
        provider: &R,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<String>, SitegateError>
    where
        R: RoleProvider,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let permissions = expand_roles_to_permissions(roles, provider, cancel).await?;
        self.set_permissions(ctx, permissions.iter().cloned());
        Ok(permissions)
    }

    /// [PermissionAccessor::sign_in] with the roles read from the caller's role claims.
    pub async fn sign_in_from_claims<R: RoleProvider>(
        &self,
        ctx: &mut CallerContext,
        provider: &R,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<String>, SitegateError> {
        let roles = ctx.role_names();
        self.sign_in(ctx, roles, provider, cancel).await
    }
}

fn dedup<I, S>(permissions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = BTreeSet::new();
    permissions
        .into_iter()
        .map(Into::into)
        .filter(|p| seen.insert(p.clone()))
        .collect()
}
