//! # sitegate-core
//!
//! Authorization for web request pipelines: hierarchical registries of navigation pages,
//! controller actions and permissions, and an engine that decides whether the current caller
//! holds the permissions a page or action requires.
//!
//! ## Overview
//!
//! Application code declares its site map, action map and permission hierarchy once at startup
//! (in code or in a TOML file, see [`config`]). At login the caller's roles are expanded into
//! permissions through a [`access::RoleProvider`] and attached to the caller's identity or
//! session. Per request a guard looks up the node being reached, reads the permission it
//! requires and asks the [`access::PermissionAccessor`] whether the caller holds it.
//!
//! ### Key Features
//!
//! - **One generic hierarchy**: site map, action map and permission map share a single arena
//!   backed [`registry::Registry`], parameterized by a [`properties::NodePayload`]
//! - **Fail-fast lookups**: a key that resolves to more than one node is an error, never a
//!   first match
//! - **Union of sources**: effective permissions are claims on authenticated identities plus a
//!   session-stored list
//! - **Cancellable role expansion**: provider lookups run concurrently and honor a
//!   [`tokio_util::sync::CancellationToken`]
//! - **Event streaming**: registry mutations can be mirrored through [`event::RegistryEvent`]
//!
//! ## Architecture
//!
//! - **[`registry`]**: Nodes, ordered parent-linked collections, hierarchy-wide algorithms and the
//!   lock-protected [`registry::SharedRegistry`]
//! - **[`properties`]**: Flavor payloads, attribute bags and node construction records
//! - **[`sitemap`]**, **[`actionmap`]**, **[`permission`]**: Flavor aliases and flavor-only operations
//! - **[`access`]**: Caller model, permission accessor, role expansion and guards
//! - **[`config`]**: TOML declaration of the hierarchies and role grants
//! - **[`event`]**: Registry mutation events
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use sitegate_core::{
//!     access::{CallerContext, Identity, MemorySession, PermissionAccessor, SiteMapNodeGuard},
//!     config::SecurityConfig,
//! };
//!
//! let security = r#"
//!     [[site_map]]
//!     key = "admin"
//!     title = "Administration"
//!
//!     [[site_map]]
//!     key = "admin.users"
//!     parent = "admin"
//!     required_permission = "users.manage"
//! "#
//! .parse::<SecurityConfig>()?
//! .build()?;
//!
//! let accessor = PermissionAccessor::new();
//! let session = Arc::new(MemorySession::default());
//! let mut caller = CallerContext::new(vec![Identity::anonymous()]).with_session(session);
//! let guard = SiteMapNodeGuard::new("admin.users");
//!
//! assert!(!guard.check(&security.site_map, &accessor, &caller)?.is_allowed());
//! accessor.set_permissions(&mut caller, ["users.manage"]);
//! assert!(guard.check(&security.site_map, &accessor, &caller)?.is_allowed());
//! # Ok::<(), sitegate_core::SitegateError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `service`: axum middleware exposing the guards to a host pipeline ([`service`])
//! - `bin`: the `sitegate` command line tool

pub mod access;
pub mod actionmap;
pub mod config;
pub mod error;
pub mod event;
pub mod permission;
pub mod properties;
pub mod registry;
#[cfg(feature = "service")]
pub mod service;
pub mod sitemap;
#[cfg(test)]
mod tests;

pub use error::*;
