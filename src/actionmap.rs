//! Action-map flavor: the catalog of guarded controller actions. Entry keys are the action names
//! granted to roles, so an entry guards itself.

use crate::{
    properties::ActionMapPayload,
    registry::{Node, Registry, SharedRegistry},
};

pub type ActionMapRegistry = Registry<ActionMapPayload>;
pub type SharedActionMap = SharedRegistry<ActionMapPayload>;
pub type ActionMapNode = Node<ActionMapPayload>;
