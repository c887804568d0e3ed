//! Registry: the aggregate root of one hierarchy.
//!
//! A [Registry] owns an arena of [Node]s plus the root [super::Collection]. Nodes are addressed
//! by [NodeId]; the parent/child links stored on each node are the only structure. The
//! hierarchy-wide algorithms (lookup by key, create-or-get insertion, removal) live here and are
//! shared by every payload flavor.
//!
//! Removing a node only detaches it. Its slot is returned to the arena by [Registry::delete_node]
//! or [Registry::purge_detached]; the slot's generation is bumped so old handles go stale.

use std::fmt::{self, Write as _};

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    error::SitegateError,
    event::RegistryEvent,
    properties::{NodePayload, NodeSpec},
};

use super::{Collection, CollectionMut, CollectionOwner, Node, NodeId, NodeSnapshot};

#[derive(Debug)]
pub(super) struct Slot<P> {
    pub(super) generation: u32,
    pub(super) node: Option<Node<P>>,
}

#[derive(Debug)]
pub struct Registry<P> {
    pub(super) nodes: Vec<Slot<P>>,
    /// Indexes of vacant slots, reused before the arena grows.
    pub(super) free: Vec<usize>,
    /// Allocated on the first root insertion.
    pub(super) roots: Option<Vec<NodeId>>,
    events: Option<UnboundedSender<RegistryEvent>>,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Registry {
            nodes: Vec::new(),
            free: Vec::new(),
            roots: None,
            events: None,
        }
    }
}

impl<P: NodePayload> fmt::Display for Registry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Registry<{}>({} roots, {} nodes)",
            P::FLAVOR,
            self.roots().count(),
            self.traverse().count()
        )
    }
}

impl<P: NodePayload> Registry<P> {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Publish every membership change to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<RegistryEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub(super) fn emit(&mut self, event: RegistryEvent) {
        if let Some(tx) = self.events.as_ref() {
            if tx.send(event).is_err() {
                tracing::debug!("[{}] registry event receiver closed, dropping sender", P::FLAVOR);
                self.events = None;
            }
        }
    }

    /// Creates a detached node. It joins the hierarchy once added to a collection.
    pub fn create_node(&mut self, key: &str, spec: NodeSpec<P>) -> Result<NodeId, SitegateError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SitegateError::InvalidArgument(format!(
                "{} node key must not be empty",
                P::FLAVOR
            )));
        }
        let node = Node::new(
            key.to_string(),
            spec.title,
            spec.description,
            spec.attributes,
            spec.payload,
        );
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.nodes.get_mut(index) {
                slot.node = Some(node);
                return Ok(NodeId {
                    index,
                    generation: slot.generation,
                });
            }
        }
        let index = self.nodes.len();
        self.nodes.push(Slot {
            generation: 0,
            node: Some(node),
        });
        Ok(NodeId {
            index,
            generation: 0,
        })
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<P>> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<P>> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Like [Registry::get], but a deleted node or a handle from another registry is an
    /// `InvalidArgument`.
    pub fn node(&self, id: NodeId) -> Result<&Node<P>, SitegateError> {
        self.get(id).ok_or_else(|| Self::unknown_handle(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<P>, SitegateError> {
        self.get_mut(id).ok_or_else(|| Self::unknown_handle(id))
    }

    fn unknown_handle(id: NodeId) -> SitegateError {
        SitegateError::InvalidArgument(format!(
            "node handle {id} is stale or does not belong to this {} registry",
            P::FLAVOR
        ))
    }

    /// Number of live nodes in the arena, attached or not.
    pub fn allocated_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Frees a detached node together with its whole subtree and returns how many nodes were
    /// freed. Handles to any of them go stale. An attached node is an `InvalidArgument`.
    pub fn delete_node(&mut self, id: NodeId) -> Result<usize, SitegateError> {
        let node = self.node(id)?;
        if node.membership.is_some() {
            return Err(SitegateError::InvalidArgument(format!(
                "{} node '{}' must be removed from its collection before it is deleted",
                P::FLAVOR,
                node.key()
            )));
        }
        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self
                .nodes
                .get_mut(current.index)
                .filter(|slot| slot.generation == current.generation)
            else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            stack.extend(node.child_ids().iter().copied());
            freed += 1;
        }
        tracing::debug!("[{}] freed {freed} node(s) from {id}", P::FLAVOR);
        Ok(freed)
    }

    /// Frees every node not reachable from the roots. Returns how many nodes were freed.
    pub fn purge_detached(&mut self) -> usize {
        let detached = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let node = slot.node.as_ref()?;
                node.membership.is_none().then_some(NodeId {
                    index,
                    generation: slot.generation,
                })
            })
            .collect::<Vec<_>>();
        let mut freed = 0;
        for id in detached {
            // A detached top node frees its subtree; every node below it has a membership.
            match self.delete_node(id) {
                Ok(count) => freed += count,
                Err(err) => tracing::warn!("[{}] cannot free {id}: {err}", P::FLAVOR),
            }
        }
        freed
    }

    pub fn snapshot(&self, id: NodeId) -> Result<NodeSnapshot<P>, SitegateError> {
        self.node(id).map(|node| NodeSnapshot::new(id, node))
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent())
    }

    /// Walks parent links to the top of the hierarchy. The result is cached per node and cleared
    /// whenever the node or one of its ancestors changes collection.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id)?;
        Some(*node.root.get_or_init(|| match node.parent() {
            Some(parent) => self.root_of(parent).unwrap_or(parent),
            None => id,
        }))
    }

    pub fn roots(&self) -> Collection<'_, P> {
        Collection {
            registry: self,
            owner: CollectionOwner::Roots,
        }
    }

    pub fn roots_mut(&mut self) -> CollectionMut<'_, P> {
        CollectionMut {
            registry: self,
            owner: CollectionOwner::Roots,
        }
    }

    pub fn children(&self, id: NodeId) -> Result<Collection<'_, P>, SitegateError> {
        self.collection(CollectionOwner::Node(id))
    }

    pub fn children_mut(&mut self, id: NodeId) -> Result<CollectionMut<'_, P>, SitegateError> {
        self.collection_mut(CollectionOwner::Node(id))
    }

    pub fn collection(&self, owner: CollectionOwner) -> Result<Collection<'_, P>, SitegateError> {
        if let CollectionOwner::Node(id) = owner {
            self.node(id)?;
        }
        Ok(Collection {
            registry: self,
            owner,
        })
    }

    pub fn collection_mut(
        &mut self,
        owner: CollectionOwner,
    ) -> Result<CollectionMut<'_, P>, SitegateError> {
        if let CollectionOwner::Node(id) = owner {
            self.node(id)?;
        }
        Ok(CollectionMut {
            registry: self,
            owner,
        })
    }

    /// Pre-order walk of everything reachable from the roots: a node is visited before its
    /// children, siblings in collection order.
    pub fn traverse(&self) -> PreOrder<'_, P> {
        let mut stack = self.members(CollectionOwner::Roots).to_vec();
        stack.reverse();
        PreOrder {
            registry: self,
            stack,
        }
    }

    /// Number of nodes reachable from the roots.
    pub fn node_count(&self) -> usize {
        self.traverse().count()
    }

    /// Hierarchy-wide lookup. The key is trimmed; an empty key finds nothing. More than one
    /// reachable node with the key is a `DuplicateKey` error, never a first-match.
    pub fn find_node(&self, key: &str) -> Result<Option<NodeId>, SitegateError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }
        let mut found = None;
        for (id, node) in self.traverse() {
            if node.key() == key {
                if found.is_some() {
                    return Err(SitegateError::DuplicateKey(format!(
                        "{} node '{key}'",
                        P::FLAVOR
                    )));
                }
                found = Some(id);
            }
        }
        Ok(found)
    }

    /// Create-or-get a root node. An existing node with `key` is returned unchanged, wherever it
    /// sits and whatever metadata `spec` carries.
    pub fn add_root_node(&mut self, key: &str, spec: NodeSpec<P>) -> Result<NodeId, SitegateError> {
        if let Some(existing) = self.find_node(key)? {
            tracing::debug!("[{}] '{}' already registered", P::FLAVOR, key.trim());
            return Ok(existing);
        }
        let id = self.create_node(key, spec)?;
        self.roots_mut().add(id)?;
        Ok(id)
    }

    /// Create-or-get a node under `parent_key`. An existing node with `key` is returned unchanged;
    /// otherwise the parent must resolve or the call fails with `NotFound`.
    pub fn add_node(
        &mut self,
        parent_key: &str,
        key: &str,
        spec: NodeSpec<P>,
    ) -> Result<NodeId, SitegateError> {
        if let Some(existing) = self.find_node(key)? {
            tracing::debug!("[{}] '{}' already registered", P::FLAVOR, key.trim());
            return Ok(existing);
        }
        let parent = self.resolve(parent_key)?;
        let id = self.create_node(key, spec)?;
        self.children_mut(parent)?.add(id)?;
        Ok(id)
    }

    /// Detaches the node with `key` from its collection. Its own subtree stays intact below it.
    /// Returns false if no node has the key.
    pub fn remove_node(&mut self, key: &str) -> Result<bool, SitegateError> {
        let Some(id) = self.find_node(key)? else {
            return Ok(false);
        };
        let owner = self.node(id)?.membership.unwrap_or(CollectionOwner::Roots);
        self.collection_mut(owner)?.remove(id)
    }

    /// The collection holding `id` and the node's position in it.
    pub fn position_of(&self, id: NodeId) -> Result<(CollectionOwner, usize), SitegateError> {
        let node = self.node(id)?;
        let owner = node.membership.ok_or_else(|| {
            SitegateError::InvalidArgument(format!(
                "{} node '{}' is not attached to the hierarchy",
                P::FLAVOR,
                node.key()
            ))
        })?;
        let index = self.collection(owner)?.index_of(id).ok_or_else(|| {
            SitegateError::NotFound(format!(
                "{} node '{}' is missing from its collection",
                P::FLAVOR,
                node.key()
            ))
        })?;
        Ok((owner, index))
    }

    /// `find_node` that treats a miss as `NotFound`.
    pub(crate) fn resolve(&self, key: &str) -> Result<NodeId, SitegateError> {
        self.find_node(key)?.ok_or_else(|| {
            SitegateError::NotFound(format!(
                "The {} node '{}' cannot be found.",
                P::FLAVOR,
                key.trim()
            ))
        })
    }

    /// Indented outline of the hierarchy, one node per line.
    pub fn render_tree(&self) -> Result<String, SitegateError> {
        let mut out = String::new();
        let mut stack = self
            .members(CollectionOwner::Roots)
            .iter()
            .rev()
            .map(|id| (*id, 0usize))
            .collect::<Vec<_>>();
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id)?;
            write!(out, "{:indent$}{}", "", node.key(), indent = depth * 2)?;
            if let Some(title) = node.title() {
                write!(out, " \"{title}\"")?;
            }
            if let Some(permission) = node.required_permission() {
                write!(out, " [{permission}]")?;
            }
            writeln!(out)?;
            stack.extend(node.child_ids().iter().rev().map(|child| (*child, depth + 1)));
        }
        Ok(out)
    }
}

/// Iterator returned by [Registry::traverse].
pub struct PreOrder<'a, P> {
    registry: &'a Registry<P>,
    stack: Vec<NodeId>,
}

impl<'a, P: NodePayload> Iterator for PreOrder<'a, P> {
    type Item = (NodeId, &'a Node<P>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.registry.get(id)?;
        self.stack.extend(node.child_ids().iter().rev().copied());
        Some((id, node))
    }
}
