//! Ordered, parent-linked node collections.
//!
//! A collection is addressed by its [CollectionOwner] and viewed through [Collection] (read) or
//! [CollectionMut] (write). Every member `n` of the collection owned by `o` satisfies
//! `n.membership == Some(o)`; the mutations below are the only code that changes membership.
//!
//! Membership tests compare keys, not handles: see [super::Node].

use crate::{error::SitegateError, event::RegistryEvent, properties::NodePayload};

use super::{CollectionOwner, Node, NodeId, Registry};

/// Read view over one collection.
pub struct Collection<'a, P> {
    pub(super) registry: &'a Registry<P>,
    pub(super) owner: CollectionOwner,
}

impl<'a, P: NodePayload> Collection<'a, P> {
    pub fn owner(&self) -> CollectionOwner {
        self.owner
    }

    /// Member handles in order. Empty, without allocating, if nothing was ever added.
    pub fn ids(&self) -> &'a [NodeId] {
        self.registry.members(self.owner)
    }

    pub fn count(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    /// True once backing storage exists for this collection.
    pub fn is_allocated(&self) -> bool {
        match self.owner {
            CollectionOwner::Roots => self.registry.roots.is_some(),
            CollectionOwner::Node(id) => self
                .registry
                .get(id)
                .is_some_and(|node| node.children.is_some()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &'a Node<P>)> + 'a {
        let registry = self.registry;
        self.ids()
            .iter()
            .filter_map(move |id| registry.get(*id).map(|node| (*id, node)))
    }

    pub fn get(&self, index: usize) -> Result<NodeId, SitegateError> {
        let ids = self.ids();
        ids.get(index)
            .copied()
            .ok_or(SitegateError::IndexOutOfRange {
                index,
                len: ids.len(),
            })
    }

    /// Position of the first member whose key equals the key of `id`.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let key = self.registry.get(id)?.key();
        self.ids().iter().position(|member| {
            self.registry
                .get(*member)
                .is_some_and(|node| node.key() == key)
        })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index_of(id).is_some()
    }
}

/// Write view over one collection.
pub struct CollectionMut<'a, P> {
    pub(super) registry: &'a mut Registry<P>,
    pub(super) owner: CollectionOwner,
}

impl<P: NodePayload> CollectionMut<'_, P> {
    pub fn as_collection(&self) -> Collection<'_, P> {
        Collection {
            registry: self.registry,
            owner: self.owner,
        }
    }

    pub fn count(&self) -> usize {
        self.registry.members(self.owner).len()
    }

    pub fn add(&mut self, id: NodeId) -> Result<(), SitegateError> {
        let index = self.count();
        self.insert(index, id)
    }

    pub fn add_range<I: IntoIterator<Item = NodeId>>(&mut self, ids: I) -> Result<(), SitegateError> {
        let index = self.count();
        self.insert_range(index, ids)
    }

    /// Inserts `id` at `index`, which must lie in `[0, count]`.
    pub fn insert(&mut self, index: usize, id: NodeId) -> Result<(), SitegateError> {
        let len = self.count();
        if index > len {
            return Err(SitegateError::IndexOutOfRange { index, len });
        }
        self.registry.check_attachable(self.owner, id)?;
        self.registry.members_mut(self.owner)?.insert(index, id);
        self.registry.attach(self.owner, id, index);
        Ok(())
    }

    /// Inserts all of `ids`, in order, starting at `index`. Nothing is inserted if any of them
    /// cannot be attached.
    pub fn insert_range<I: IntoIterator<Item = NodeId>>(
        &mut self,
        index: usize,
        ids: I,
    ) -> Result<(), SitegateError> {
        let len = self.count();
        if index > len {
            return Err(SitegateError::IndexOutOfRange { index, len });
        }
        let ids = ids.into_iter().collect::<Vec<_>>();
        for (pos, id) in ids.iter().enumerate() {
            self.registry.check_attachable(self.owner, *id)?;
            if ids[..pos].contains(id) {
                return Err(SitegateError::InvalidArgument(format!(
                    "node {id} appears more than once in the inserted range"
                )));
            }
        }
        for (offset, id) in ids.into_iter().enumerate() {
            self.registry.members_mut(self.owner)?.insert(index + offset, id);
            self.registry.attach(self.owner, id, index + offset);
        }
        Ok(())
    }

    /// Removes the member matching `id` by key. Returns false, with no side effects, when the
    /// collection holds no such member.
    pub fn remove(&mut self, id: NodeId) -> Result<bool, SitegateError> {
        self.registry.node(id)?;
        match self.as_collection().index_of(id) {
            Some(index) => {
                self.remove_at(index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Detaches and removes the member at `index`, returning its handle.
    pub fn remove_at(&mut self, index: usize) -> Result<NodeId, SitegateError> {
        let len = self.count();
        if index >= len {
            return Err(SitegateError::IndexOutOfRange { index, len });
        }
        let id = self.registry.members_mut(self.owner)?.remove(index);
        self.registry.detach(self.owner, id);
        Ok(id)
    }

    /// Detaches every member.
    pub fn clear(&mut self) {
        let ids = match self.owner {
            CollectionOwner::Roots => self.registry.roots.as_mut().map(std::mem::take),
            CollectionOwner::Node(owner) => self
                .registry
                .get_mut(owner)
                .and_then(|node| node.children.as_mut())
                .map(std::mem::take),
        };
        for id in ids.unwrap_or_default() {
            self.registry.detach(self.owner, id);
        }
    }

    /// Replaces the member at `index` with `id`, detaching and returning the previous member.
    pub fn set(&mut self, index: usize, id: NodeId) -> Result<NodeId, SitegateError> {
        let len = self.count();
        if index >= len {
            return Err(SitegateError::IndexOutOfRange { index, len });
        }
        self.registry.check_attachable(self.owner, id)?;
        let previous = std::mem::replace(&mut self.registry.members_mut(self.owner)?[index], id);
        self.registry.detach(self.owner, previous);
        self.registry.attach(self.owner, id, index);
        Ok(previous)
    }
}

impl<P: NodePayload> Registry<P> {
    pub(super) fn members(&self, owner: CollectionOwner) -> &[NodeId] {
        match owner {
            CollectionOwner::Roots => self.roots.as_deref().unwrap_or(&[]),
            CollectionOwner::Node(id) => self.get(id).map(|node| node.child_ids()).unwrap_or(&[]),
        }
    }

    /// Allocates the backing storage on first use.
    pub(super) fn members_mut(
        &mut self,
        owner: CollectionOwner,
    ) -> Result<&mut Vec<NodeId>, SitegateError> {
        Ok(match owner {
            CollectionOwner::Roots => self.roots.get_or_insert_with(Vec::new),
            CollectionOwner::Node(id) => self.node_mut(id)?.children.get_or_insert_with(Vec::new),
        })
    }

    /// A node may join a collection only while detached, and never below itself.
    pub(super) fn check_attachable(
        &self,
        owner: CollectionOwner,
        id: NodeId,
    ) -> Result<(), SitegateError> {
        let node = self.node(id)?;
        if let Some(current) = node.membership {
            return Err(SitegateError::InvalidArgument(format!(
                "node '{}' already belongs to {:?}; remove it before adding it elsewhere",
                node.key(),
                current
            )));
        }
        if let CollectionOwner::Node(owner_id) = owner {
            self.node(owner_id)?;
            let mut cursor = Some(owner_id);
            while let Some(ancestor) = cursor {
                if ancestor == id {
                    return Err(SitegateError::InvalidArgument(format!(
                        "node '{}' cannot become a descendant of itself",
                        node.key()
                    )));
                }
                cursor = self.parent_of(ancestor);
            }
        }
        Ok(())
    }

    pub(super) fn attach(&mut self, owner: CollectionOwner, id: NodeId, index: usize) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        node.membership = Some(owner);
        let key = node.key().to_string();
        self.invalidate_roots(id);
        let event = RegistryEvent::NodeAdded {
            key,
            parent: self.owner_key(owner),
            index,
        };
        tracing::debug!("[{}] {event}", P::FLAVOR);
        self.emit(event);
    }

    pub(super) fn detach(&mut self, owner: CollectionOwner, id: NodeId) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        node.membership = None;
        let key = node.key().to_string();
        self.invalidate_roots(id);
        let event = RegistryEvent::NodeRemoved {
            key,
            parent: self.owner_key(owner),
        };
        tracing::debug!("[{}] {event}", P::FLAVOR);
        self.emit(event);
    }

    /// Clears the cached root of `id` and its whole subtree.
    fn invalidate_roots(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get_mut(current) {
                node.root.take();
                stack.extend(node.child_ids().iter().copied());
            }
        }
    }

    fn owner_key(&self, owner: CollectionOwner) -> Option<String> {
        owner
            .node()
            .and_then(|parent| self.get(parent))
            .map(|node| node.key().to_string())
    }
}
