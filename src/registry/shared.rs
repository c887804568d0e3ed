//! Process-wide registry handle.
//!
//! Registries are populated at startup and read by every request afterwards, with occasional
//! dynamic mutation. [SharedRegistry] puts the whole hierarchy behind one read-write lock: lookups
//! take the read side for the full traversal and mutations take the write side for the full
//! create-or-get/remove sequence, so a lookup never observes a partially applied mutation.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::{fmt, sync::Arc};

use crate::{
    error::SitegateError,
    properties::{NodePayload, NodeSpec},
};

use super::{NodeId, NodeSnapshot, Registry};

pub struct SharedRegistry<P>(Arc<RwLock<Registry<P>>>);

impl<P> Clone for SharedRegistry<P> {
    fn clone(&self) -> Self {
        SharedRegistry(self.0.clone())
    }
}

impl<P: NodePayload> Default for SharedRegistry<P> {
    fn default() -> Self {
        SharedRegistry::from(Registry::default())
    }
}

impl<P: NodePayload> From<Registry<P>> for SharedRegistry<P> {
    fn from(registry: Registry<P>) -> Self {
        SharedRegistry(Arc::new(RwLock::new(registry)))
    }
}

impl<P: NodePayload> fmt::Debug for SharedRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedRegistry({})", *self.read())
    }
}

impl<P: NodePayload> SharedRegistry<P> {
    pub fn new() -> Self {
        SharedRegistry::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Registry<P>> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Registry<P>> {
        self.0.write()
    }

    pub fn find_node(&self, key: &str) -> Result<Option<NodeSnapshot<P>>, SitegateError> {
        let registry = self.read();
        registry
            .find_node(key)?
            .map(|id| registry.snapshot(id))
            .transpose()
    }

    /// The non-empty permission guarding the node with `key`, `None` if the node is absent or
    /// unguarded.
    pub fn required_permission(&self, key: &str) -> Result<Option<String>, SitegateError> {
        let registry = self.read();
        let Some(id) = registry.find_node(key)? else {
            return Ok(None);
        };
        Ok(registry.node(id)?.required_permission().map(str::to_string))
    }

    pub fn add_root_node(&self, key: &str, spec: NodeSpec<P>) -> Result<NodeId, SitegateError> {
        self.write().add_root_node(key, spec)
    }

    pub fn add_node(
        &self,
        parent_key: &str,
        key: &str,
        spec: NodeSpec<P>,
    ) -> Result<NodeId, SitegateError> {
        self.write().add_node(parent_key, key, spec)
    }

    pub fn remove_node(&self, key: &str) -> Result<bool, SitegateError> {
        self.write().remove_node(key)
    }

    /// Frees the nodes that earlier removals left detached.
    pub fn purge_detached(&self) -> usize {
        self.write().purge_detached()
    }
}
