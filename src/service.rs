//! axum middleware exposing the guards to a host request pipeline.
//!
//! The host's authentication layer is expected to put a [CallerContext] into the request
//! extensions; a request without one is evaluated as an anonymous caller. A denied request is
//! short-circuited with `401 Unauthorized` before the protected handler runs.
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use sitegate_core::{
//!     access::{PermissionAccessor, SiteMapNodeGuard},
//!     service::{require_site_map_node, NodeRequirement},
//!     sitemap::SharedSiteMap,
//! };
//!
//! let site_map = SharedSiteMap::new();
//! let users = NodeRequirement::new(
//!     PermissionAccessor::new(),
//!     site_map.clone(),
//!     SiteMapNodeGuard::new("admin.users"),
//! );
//! let app: Router = Router::new()
//!     .route("/admin/users", get(|| async { "users" }))
//!     .layer(middleware::from_fn_with_state(users, require_site_map_node));
//! ```

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    access::{CallerContext, Decision, NodeGuard, PermissionAccessor, PermissionGuard},
    error::SitegateError,
    properties::{ActionMapPayload, NodePayload, SiteMapPayload},
    registry::SharedRegistry,
};

impl IntoResponse for SitegateError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// State for [require_permissions].
#[derive(Debug, Clone)]
pub struct PermissionRequirement {
    pub accessor: PermissionAccessor,
    pub guard: PermissionGuard,
}

impl PermissionRequirement {
    pub fn new(accessor: PermissionAccessor, guard: PermissionGuard) -> Self {
        PermissionRequirement { accessor, guard }
    }
}

/// State for [require_node] and its flavor shorthands.
#[derive(Debug, Clone)]
pub struct NodeRequirement<P: NodePayload> {
    pub accessor: PermissionAccessor,
    pub registry: SharedRegistry<P>,
    pub guard: NodeGuard<P>,
}

impl<P: NodePayload> NodeRequirement<P> {
    pub fn new(
        accessor: PermissionAccessor,
        registry: SharedRegistry<P>,
        guard: NodeGuard<P>,
    ) -> Self {
        NodeRequirement {
            accessor,
            registry,
            guard,
        }
    }
}

fn caller(request: &Request) -> CallerContext {
    request
        .extensions()
        .get::<CallerContext>()
        .cloned()
        .unwrap_or_default()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        SitegateError::PermissionDenied.to_string(),
    )
        .into_response()
}

pub async fn require_permissions(
    State(requirement): State<PermissionRequirement>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = caller(&request);
    match requirement.guard.check(&requirement.accessor, &ctx) {
        Decision::Allow => next.run(request).await,
        Decision::Deny => unauthorized(),
    }
}

pub async fn require_node<P: NodePayload>(
    State(requirement): State<NodeRequirement<P>>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = caller(&request);
    let decision = requirement
        .guard
        .check(&requirement.registry, &requirement.accessor, &ctx);
    match decision {
        Ok(Decision::Allow) => next.run(request).await,
        Ok(Decision::Deny) => unauthorized(),
        Err(err) => {
            tracing::error!(
                "cannot evaluate {} guard for '{}': {err}",
                P::FLAVOR,
                requirement.guard.key()
            );
            err.into_response()
        }
    }
}

pub async fn require_site_map_node(
    state: State<NodeRequirement<SiteMapPayload>>,
    request: Request,
    next: Next,
) -> Response {
    require_node(state, request, next).await
}

pub async fn require_action_map_node(
    state: State<NodeRequirement<ActionMapPayload>>,
    request: Request,
    next: Next,
) -> Response {
    require_node(state, request, next).await
}
