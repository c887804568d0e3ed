//! End-to-end authorization tests
//!
//! These tests wire the public API the way a host application does:
//! - Load a declaration file into registries and role grants
//! - Sign callers in by expanding their roles into permissions
//! - Evaluate site-map, action-map and permission-list guards per request
//! - Mutate the shared site map while requests are being checked

mod common;

use std::sync::Arc;

use sitegate_core::{
    access::{
        ActionMapNodeGuard, CallerContext, Claim, Decision, Identity, MemorySession,
        PermissionAccessor, PermissionGuard, SessionStore, SiteMapNodeGuard,
        PERMISSION_SESSION_KEY,
    },
    config::{ConfigProvider, Security, SecurityConfig, TomlConfigProvider},
    event::RegistryEvent,
    properties::{NodeSpec, SiteMapPayload},
    sitemap::SharedSiteMap,
    SitegateError,
};
use tempfile::TempDir;
use test_log::test;
use tokio_util::sync::CancellationToken;

fn load() -> (TempDir, Security) {
    common::init_logging();
    let temp_dir = TempDir::new().unwrap();
    let path = common::write_sample_declaration(&temp_dir);
    let security = TomlConfigProvider::new(path)
        .get_config()
        .unwrap()
        .build()
        .unwrap();
    (temp_dir, security)
}

fn session_caller() -> (CallerContext, Arc<MemorySession>) {
    let session = Arc::new(MemorySession::default());
    let ctx = CallerContext::new(vec![Identity::anonymous()]).with_session(session.clone());
    (ctx, session)
}

#[test]
fn session_permission_reaches_guarded_page() {
    let (_dir, security) = load();
    let accessor = PermissionAccessor::new();
    let guard = SiteMapNodeGuard::new("admin.users");

    let (granted, session) = session_caller();
    session.set(PERMISSION_SESSION_KEY, "users.manage".to_string());
    assert_eq!(
        guard.check(&security.site_map, &accessor, &granted).unwrap(),
        Decision::Allow
    );

    let (nobody, _) = session_caller();
    assert_eq!(
        guard.check(&security.site_map, &accessor, &nobody).unwrap(),
        Decision::Deny
    );
}

#[test(tokio::test)]
async fn editor_and_viewer_expand_to_both_post_permissions() {
    let (_dir, security) = load();
    let accessor = PermissionAccessor::new();
    let cancel = CancellationToken::new();

    let mut identity = Identity::authenticated("dana");
    identity.add_claim(Claim::role("editor"));
    identity.add_claim(Claim::role("viewer"));
    let mut ctx = CallerContext::new(vec![identity]);

    let granted = accessor
        .sign_in_from_claims(&mut ctx, &security.roles, &cancel)
        .await
        .unwrap();
    assert_eq!(
        granted.into_iter().collect::<Vec<_>>(),
        vec!["posts.read", "posts.write"]
    );
    assert!(accessor.has_permissions(&ctx, ["posts.write", "posts.read"]));

    let compose = SiteMapNodeGuard::new("blog.compose");
    assert!(compose
        .check(&security.site_map, &accessor, &ctx)
        .unwrap()
        .is_allowed());
    let users = SiteMapNodeGuard::new("admin.users");
    assert!(!users
        .check(&security.site_map, &accessor, &ctx)
        .unwrap()
        .is_allowed());
}

#[test(tokio::test)]
async fn anonymous_sign_in_lands_in_the_session() {
    let (_dir, security) = load();
    let accessor = PermissionAccessor::new();
    let cancel = CancellationToken::new();

    let (mut ctx, session) = session_caller();
    accessor
        .sign_in(&mut ctx, ["admin"], &security.roles, &cancel)
        .await
        .unwrap();
    let stored = session.get(PERMISSION_SESSION_KEY).unwrap();
    assert!(stored.contains("users.manage"));
    assert!(stored.contains("orders.refund"));

    let refund = ActionMapNodeGuard::new("orders.refund");
    assert!(refund
        .check(&security.action_map, &accessor, &ctx)
        .unwrap()
        .is_allowed());
}

#[test]
fn set_clear_round_trip() {
    let accessor = PermissionAccessor::new();
    let (mut ctx, _session) = session_caller();
    ctx.add_identity(Identity::authenticated("erin"));

    accessor.set_permissions(&mut ctx, ["x", "y"]);
    assert!(accessor.has_permissions(&ctx, ["x", "y"]));
    accessor.clear_permissions(&mut ctx);
    assert!(accessor.effective_permissions(&ctx).is_empty());
}

#[test]
fn permission_guard_into_result() {
    let accessor = PermissionAccessor::new();
    let ctx = CallerContext::anonymous();
    let err = PermissionGuard::new(["reports.read"])
        .check(&accessor, &ctx)
        .into_result()
        .unwrap_err();
    assert_eq!(err, SitegateError::PermissionDenied);
    assert_eq!(err.status_code(), http::StatusCode::UNAUTHORIZED);
}

#[test]
fn dynamic_site_map_edits_take_effect_on_the_next_check() {
    let (_dir, security) = load();
    let accessor = PermissionAccessor::new();
    let (ctx, _) = session_caller();
    let guard = SiteMapNodeGuard::new("admin.audit");

    // Unknown node: nothing to enforce.
    assert!(guard
        .check(&security.site_map, &accessor, &ctx)
        .unwrap()
        .is_allowed());

    security
        .site_map
        .add_node_after(
            "admin.users",
            "admin.audit",
            NodeSpec::new("Audit log").payload(
                SiteMapPayload::new("/admin/audit").with_required_permission("audit.read"),
            ),
        )
        .unwrap();
    assert!(!guard
        .check(&security.site_map, &accessor, &ctx)
        .unwrap()
        .is_allowed());

    assert!(security.site_map.remove_node("admin.audit").unwrap());
    assert!(guard
        .check(&security.site_map, &accessor, &ctx)
        .unwrap()
        .is_allowed());
}

#[test]
fn concurrent_readers_see_whole_mutations() {
    let (_dir, security) = load();
    let site_map: SharedSiteMap = security.site_map.clone();

    let writer = {
        let site_map = site_map.clone();
        std::thread::spawn(move || {
            for i in 0..100 {
                let key = format!("blog.post{i}");
                site_map
                    .add_node("blog", &key, NodeSpec::new(format!("Post {i}")))
                    .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let site_map = site_map.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let compose = site_map.find_node("blog.compose").unwrap().unwrap();
                    assert_eq!(compose.required_permission(), Some("posts.write"));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    let blog = site_map.find_node("blog").unwrap().unwrap();
    assert_eq!(blog.children.len(), 101);
}

#[test]
fn events_mirror_admin_edits() {
    common::init_logging();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let config: SecurityConfig = common::SAMPLE_DECLARATION.parse().unwrap();
    let security = config.build().unwrap();

    // Attach an event sink to a copy of the site map built from the captured declaration.
    let mut site_map = sitegate_core::sitemap::SiteMapRegistry::new().with_events(tx);
    for entry in SecurityConfig::capture(&security).unwrap().site_map {
        let spec = NodeSpec::new(entry.title.unwrap_or_default());
        match entry.parent {
            Some(parent) => site_map.add_node(&parent, &entry.key, spec).unwrap(),
            None => site_map.add_root_node(&entry.key, spec).unwrap(),
        };
    }

    let mut added = Vec::new();
    while let Ok(event) = rx.try_recv() {
        added.push(event.key().to_string());
    }
    assert_eq!(
        added,
        vec!["home", "admin", "admin.users", "blog", "blog.compose"]
    );

    site_map.remove_node("blog").unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        RegistryEvent::NodeRemoved {
            key: "blog".to_string(),
            parent: None
        }
    );
}

#[test]
fn duplicate_declarations_fail_lookups() {
    let (_dir, security) = load();
    {
        let mut site_map = security.site_map.write();
        let copy = site_map
            .create_node("admin.users", NodeSpec::untitled())
            .unwrap();
        let blog = site_map.find_node("blog").unwrap().unwrap();
        site_map.children_mut(blog).unwrap().add(copy).unwrap();
    }
    let accessor = PermissionAccessor::new();
    let result = SiteMapNodeGuard::new("admin.users").check(
        &security.site_map,
        &accessor,
        &CallerContext::anonymous(),
    );
    match result {
        Err(err) => assert!(err.is_configuration_error()),
        Ok(decision) => panic!("expected a duplicate key error, got {decision}"),
    }
}
