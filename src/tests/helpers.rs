//! Shared test utilities for registry and access testing

use std::sync::Arc;

use crate::{
    access::{CallerContext, Claim, Identity, MemorySession},
    properties::{NodeSpec, SiteMapPayload},
    sitemap::SiteMapRegistry,
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Two roots, "home" and "admin", with "admin" holding a guarded "admin.users" page and an open
/// "admin.help" page.
pub fn create_test_site_map() -> SiteMapRegistry {
    init_logging();

    let mut site_map = SiteMapRegistry::new();
    site_map
        .add_root_node("home", NodeSpec::new("Home").payload(SiteMapPayload::new("/")))
        .expect("empty registry accepts a root");
    site_map
        .add_root_node(
            "admin",
            NodeSpec::new("Administration").payload(SiteMapPayload::new("/admin")),
        )
        .expect("distinct key");
    site_map
        .add_node(
            "admin",
            "admin.users",
            NodeSpec::new("Users").payload(
                SiteMapPayload::new("/admin/users").with_required_permission("users.manage"),
            ),
        )
        .expect("admin resolves");
    site_map
        .add_node(
            "admin",
            "admin.help",
            NodeSpec::new("Help").payload(SiteMapPayload::new("/admin/help")),
        )
        .expect("admin resolves");
    site_map
}

/// An authenticated identity carrying the given permission claims.
pub fn authenticated(name: &str, permissions: &[&str]) -> Identity {
    let mut identity = Identity::authenticated(name);
    for permission in permissions {
        identity.add_claim(Claim::permission(*permission));
    }
    identity
}

/// Caller with one authenticated identity and a session.
pub fn caller_with_session(permissions: &[&str]) -> (CallerContext, Arc<MemorySession>) {
    let session = Arc::new(MemorySession::default());
    let ctx = CallerContext::new(vec![authenticated("alice", permissions)])
        .with_session(session.clone());
    (ctx, session)
}
