//! Node types stored in a [super::Registry] arena.
//!
//! Nodes never hold references to each other. A node records which collection currently owns it
//! ([CollectionOwner]) and the handles of its children; every link is a [NodeId] into the owning
//! registry, so reparenting is a handle update.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::OnceLock,
};

use crate::properties::{Attributes, NodePayload};

/// Handle of a node inside one [super::Registry]: an arena slot plus the slot's generation.
///
/// Deleting a node frees its slot and bumps the generation, so a later node may reuse the slot
/// but a stale handle never resolves to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Identifies a node collection: either the registry's root collection or the child collection
/// of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionOwner {
    Roots,
    Node(NodeId),
}

impl CollectionOwner {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            CollectionOwner::Roots => None,
            CollectionOwner::Node(id) => Some(*id),
        }
    }
}

/// A single entry in a hierarchy.
///
/// Equality and hashing are defined by `key` alone: two distinct nodes with the same key compare
/// equal. Collections rely on this for `contains`/`index_of`/`remove`, which lets them detect a
/// duplicate key across different node instances.
#[derive(Debug)]
pub struct Node<P> {
    key: String,
    title: Option<String>,
    description: Option<String>,
    attributes: Attributes,
    payload: P,
    /// Set exclusively by collection mutations. `None` while detached.
    pub(super) membership: Option<CollectionOwner>,
    /// Allocated on the first child insertion.
    pub(super) children: Option<Vec<NodeId>>,
    /// Derived root, cleared whenever this node or one of its ancestors is reparented.
    pub(super) root: OnceLock<NodeId>,
}

impl<P: NodePayload> Node<P> {
    pub(super) fn new(
        key: String,
        title: Option<String>,
        description: Option<String>,
        attributes: Attributes,
        payload: P,
    ) -> Self {
        Node {
            key,
            title,
            description,
            attributes,
            payload,
            membership: None,
            children: None,
            root: OnceLock::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }

    pub fn set_attribute<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.attributes.set(name, value);
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// The parent node, `None` for roots and detached nodes.
    pub fn parent(&self) -> Option<NodeId> {
        self.membership.and_then(|owner| owner.node())
    }

    /// The collection currently holding this node, `None` if detached.
    pub fn membership(&self) -> Option<CollectionOwner> {
        self.membership
    }

    pub fn is_attached(&self) -> bool {
        self.membership.is_some()
    }

    /// Does not allocate the child collection.
    pub fn has_children(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn child_ids(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// The permission guarding this node, ignoring empty requirements.
    pub fn required_permission(&self) -> Option<&str> {
        self.payload
            .required_permission(&self.key)
            .filter(|p| !p.trim().is_empty())
    }
}

impl<P> PartialEq for Node<P> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<P> Eq for Node<P> {}

impl<P> Hash for Node<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Owned copy of a node's data, handed out by [super::SharedRegistry] so callers never hold the
/// hierarchy lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot<P> {
    pub id: NodeId,
    pub key: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub attributes: Attributes,
    pub payload: P,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl<P: NodePayload> NodeSnapshot<P> {
    pub(super) fn new(id: NodeId, node: &Node<P>) -> Self {
        NodeSnapshot {
            id,
            key: node.key.clone(),
            title: node.title.clone(),
            description: node.description.clone(),
            attributes: node.attributes.clone(),
            payload: node.payload.clone(),
            parent: node.parent(),
            children: node.child_ids().to_vec(),
        }
    }

    pub fn required_permission(&self) -> Option<&str> {
        self.payload
            .required_permission(&self.key)
            .filter(|p| !p.trim().is_empty())
    }
}
