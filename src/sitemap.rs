//! Site-map flavor: navigation pages with a url and an optional required permission.
//!
//! Besides the shared registry algorithms, site-map pages can be positioned relative to an
//! existing sibling with [Registry::add_node_before] and [Registry::add_node_after].

use crate::{
    error::SitegateError,
    properties::{NodeSpec, SiteMapPayload},
    registry::{NodeId, Registry, SharedRegistry},
};

pub type SiteMapRegistry = Registry<SiteMapPayload>;
pub type SharedSiteMap = SharedRegistry<SiteMapPayload>;
pub type SiteMapNode = crate::registry::Node<SiteMapPayload>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Before,
    After,
}

impl Registry<SiteMapPayload> {
    /// Create-or-get `key`, placed immediately before `sibling_key` in the sibling's collection.
    pub fn add_node_before(
        &mut self,
        sibling_key: &str,
        key: &str,
        spec: NodeSpec<SiteMapPayload>,
    ) -> Result<NodeId, SitegateError> {
        self.add_node_beside(sibling_key, key, spec, Placement::Before)
    }

    /// Create-or-get `key`, placed immediately after `sibling_key` in the sibling's collection.
    pub fn add_node_after(
        &mut self,
        sibling_key: &str,
        key: &str,
        spec: NodeSpec<SiteMapPayload>,
    ) -> Result<NodeId, SitegateError> {
        self.add_node_beside(sibling_key, key, spec, Placement::After)
    }

    fn add_node_beside(
        &mut self,
        sibling_key: &str,
        key: &str,
        spec: NodeSpec<SiteMapPayload>,
        placement: Placement,
    ) -> Result<NodeId, SitegateError> {
        if let Some(existing) = self.find_node(key)? {
            tracing::debug!("[site map] '{}' already registered", key.trim());
            return Ok(existing);
        }
        let sibling = self.resolve(sibling_key)?;
        let (owner, index) = self.position_of(sibling)?;
        let index = match placement {
            Placement::Before => index,
            Placement::After => index + 1,
        };
        let id = self.create_node(key, spec)?;
        self.collection_mut(owner)?.insert(index, id)?;
        Ok(id)
    }
}

impl SharedRegistry<SiteMapPayload> {
    pub fn add_node_before(
        &self,
        sibling_key: &str,
        key: &str,
        spec: NodeSpec<SiteMapPayload>,
    ) -> Result<NodeId, SitegateError> {
        self.write().add_node_before(sibling_key, key, spec)
    }

    pub fn add_node_after(
        &self,
        sibling_key: &str,
        key: &str,
        spec: NodeSpec<SiteMapPayload>,
    ) -> Result<NodeId, SitegateError> {
        self.write().add_node_after(sibling_key, key, spec)
    }
}
