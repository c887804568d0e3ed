use futures::future::try_join_all;
use parking_lot::RwLock;
use std::{collections::BTreeMap, collections::BTreeSet, future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;

use crate::error::SitegateError;

/// Role to permission mapping owned by an external store.
///
/// Implementations must be cheap to share between requests; calls are expected to do I/O and
/// should observe `cancel`.
pub trait RoleProvider: Sync {
    fn get_role_permissions(
        &self,
        role: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<String>, SitegateError>> + Send;

    fn authorize_role(
        &self,
        role: &str,
        permissions: Vec<String>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), SitegateError>> + Send;
}

impl<R: RoleProvider + Send> RoleProvider for Arc<R> {
    fn get_role_permissions(
        &self,
        role: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<String>, SitegateError>> + Send {
        self.as_ref().get_role_permissions(role, cancel)
    }

    fn authorize_role(
        &self,
        role: &str,
        permissions: Vec<String>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), SitegateError>> + Send {
        self.as_ref().authorize_role(role, permissions, cancel)
    }
}

/// Process-local [RoleProvider]. Unknown roles grant nothing; `authorize_role` replaces the
/// role's previous grant.
#[derive(Debug, Default)]
pub struct InMemoryRoleProvider {
    grants: RwLock<BTreeMap<String, Vec<String>>>,
}

impl InMemoryRoleProvider {
    pub fn new() -> Self {
        InMemoryRoleProvider::default()
    }

    /// Synchronous form of `authorize_role` for startup wiring.
    pub fn grant<R, I, S>(&self, role: R, permissions: I)
    where
        R: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants.write().insert(
            role.into(),
            permissions.into_iter().map(Into::into).collect(),
        );
    }

    pub fn roles(&self) -> Vec<String> {
        self.grants.read().keys().cloned().collect()
    }

    pub fn grants(&self) -> BTreeMap<String, Vec<String>> {
        self.grants.read().clone()
    }
}

impl RoleProvider for InMemoryRoleProvider {
    async fn get_role_permissions(
        &self,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SitegateError> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        Ok(self.grants.read().get(role).cloned().unwrap_or_default())
    }

    async fn authorize_role(
        &self,
        role: &str,
        permissions: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<(), SitegateError> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        if role.trim().is_empty() {
            return Err(SitegateError::InvalidArgument(
                "role name must not be blank".to_string(),
            ));
        }
        self.grants.write().insert(role.to_string(), permissions);
        Ok(())
    }
}

fn cancelled() -> SitegateError {
    SitegateError::ProviderFailure("role permission lookup cancelled".to_string())
}

/// Expands role names into the distinct set of permissions granted to any of them.
///
/// Role names reach the provider exactly as given; only repeated names are collapsed. Every
/// distinct role is looked up concurrently. The first failing lookup, or cancellation of `cancel`,
/// fails the whole expansion with [SitegateError::ProviderFailure]; there is no partial result.
#[tracing::instrument(skip_all)]
pub async fn expand_roles_to_permissions<R, I, S>(
    roles: I,
    provider: &R,
    cancel: &CancellationToken,
) -> Result<BTreeSet<String>, SitegateError>
where
    R: RoleProvider,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    let roles: Vec<String> = roles
        .into_iter()
        .map(|role| role.as_ref().to_string())
        .filter(|role| seen.insert(role.clone()))
        .collect();

    if cancel.is_cancelled() {
        return Err(cancelled());
    }

    let lookups = try_join_all(roles.iter().map(|role| async move {
        provider
            .get_role_permissions(role, cancel)
            .await
            .map_err(|err| match err {
                failure @ SitegateError::ProviderFailure(_) => failure,
                other => SitegateError::ProviderFailure(format!("role '{role}': {other}")),
            })
    }));

    let grants = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled()),
        grants = lookups => grants,
    };
    let grants = match grants {
        Ok(grants) => grants,
        Err(err) => {
            tracing::warn!("role expansion failed: {err}");
            return Err(err);
        }
    };

    let permissions: BTreeSet<String> = grants.into_iter().flatten().collect();
    tracing::info!(
        "expanded {} role(s) into {} permission(s)",
        roles.len(),
        permissions.len()
    );
    Ok(permissions)
}
