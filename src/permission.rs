//! Permission flavor: the hierarchy of permission names an administrator can grant to roles.

use std::collections::BTreeSet;

use crate::{
    error::SitegateError,
    properties::PermissionPayload,
    registry::{Node, Registry, SharedRegistry},
};

pub type PermissionRegistry = Registry<PermissionPayload>;
pub type SharedPermissionMap = SharedRegistry<PermissionPayload>;
pub type PermissionNode = Node<PermissionPayload>;

impl Registry<PermissionPayload> {
    /// Every permission key in the subtree rooted at `key`, the node itself included. Granting a
    /// permission group grants its members.
    pub fn permission_closure(&self, key: &str) -> Result<BTreeSet<String>, SitegateError> {
        let root = self.resolve(key)?;
        let mut closure = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            closure.insert(node.key().to_string());
            stack.extend(node.child_ids().iter().copied());
        }
        Ok(closure)
    }
}
