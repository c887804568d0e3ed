//! Access module: the authorization resolution engine.
//!
//! # Module Organization
//!
//! - [`caller`]: Identities, claims and session storage making up a [`CallerContext`]
//! - [`accessor`]: [`PermissionAccessor`], the effective permission set and its all-must-match rule
//! - [`roles`]: Role to permission expansion through a [`RoleProvider`]
//! - [`guard`]: Allow/deny guards over permission lists and registry nodes
//!
//! ```rust
//! use sitegate_core::access::{
//!     CallerContext, Claim, Identity, PermissionAccessor, PermissionGuard,
//! };
//!
//! let mut alice = Identity::authenticated("alice");
//! alice.add_claim(Claim::permission("posts.read"));
//! let ctx = CallerContext::new(vec![alice]);
//!
//! let accessor = PermissionAccessor::new();
//! assert!(accessor.has_permissions(&ctx, ["posts.read"]));
//! assert!(!PermissionGuard::new(["posts.write"]).check(&accessor, &ctx).is_allowed());
//! ```

mod accessor;
mod caller;
mod guard;
mod roles;


pub use accessor::{CaseSensitivity, PermissionAccessor};
pub use caller::{
    CallerContext, Claim, ClaimKind, Identity, MemorySession, SessionStore,
    PERMISSION_SESSION_KEY,
};
pub use guard::{
    ActionMapNodeGuard, Decision, NodeGuard, PermissionGuard, PermissionNodeGuard,
    SiteMapNodeGuard,
};
pub use roles::{expand_roles_to_permissions, InMemoryRoleProvider, RoleProvider};
