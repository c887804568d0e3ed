use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Membership changes published by a [crate::registry::Registry] created with
/// [crate::registry::Registry::with_events]. Admin surfaces use these to mirror dynamic edits
/// into an external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// Node key, parent key (`None` for the root collection), position in the collection
    NodeAdded {
        key: String,
        parent: Option<String>,
        index: usize,
    },
    /// Node key, key of the parent it was detached from
    NodeRemoved { key: String, parent: Option<String> },
}

impl RegistryEvent {
    pub fn key(&self) -> &str {
        match self {
            RegistryEvent::NodeAdded { key, .. } => key,
            RegistryEvent::NodeRemoved { key, .. } => key,
        }
    }
}

impl Display for RegistryEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RegistryEvent::NodeAdded { key, parent, index } => write!(
                f,
                "NodeAdded({key} -> {}[{index}])",
                parent.as_deref().unwrap_or("<root>")
            ),
            RegistryEvent::NodeRemoved { key, parent } => write!(
                f,
                "NodeRemoved({key} <- {})",
                parent.as_deref().unwrap_or("<root>")
            ),
        }
    }
}
