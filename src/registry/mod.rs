//! Registry module: the generic keyed node hierarchy.
//!
//! One implementation serves the site map, the action map and the permission map; the flavors
//! differ only in their [crate::properties::NodePayload].
//!
//! # Module Organization
//!
//! - [`node`]: Node handles, nodes and owned snapshots
//! - [`collection`]: Ordered parent-linked collections (read and write views)
//! - [`base`]: The [`Registry`] aggregate and the hierarchy-wide algorithms
//! - [`shared`]: [`SharedRegistry`], the lock-protected process-wide handle
//!
//! ```rust
//! use sitegate_core::{
//!     properties::{NodeSpec, SiteMapPayload},
//!     registry::Registry,
//! };
//!
//! let mut site_map = Registry::<SiteMapPayload>::new();
//! site_map.add_root_node("admin", NodeSpec::new("Administration"))?;
//! let users = site_map.add_node(
//!     "admin",
//!     "admin.users",
//!     NodeSpec::new("Users")
//!         .payload(SiteMapPayload::new("/admin/users").with_required_permission("users.manage")),
//! )?;
//! assert_eq!(site_map.find_node("admin.users")?, Some(users));
//! # Ok::<(), sitegate_core::SitegateError>(())
//! ```

mod base;
mod collection;
mod node;
mod shared;


pub use base::{PreOrder, Registry};
pub use collection::{Collection, CollectionMut};
pub use node::{CollectionOwner, Node, NodeId, NodeSnapshot};
pub use shared::SharedRegistry;
