/// [crate::properties] contains the per-node building blocks shared by every
/// [crate::registry::Registry] flavor: the payload trait, the flavor payloads and the lazily
/// allocated attribute bag.
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Hierarchy-specific data carried by a [crate::registry::Node].
///
/// The registry algorithms are written once against this trait; a flavor only decides what extra
/// fields its nodes hold and which permission (if any) guards them.
pub trait NodePayload: Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// Short name used in log output and error messages.
    const FLAVOR: &'static str;

    /// The permission a caller must hold to reach a node with this payload and `key`. `None` or an
    /// empty string means the node is unguarded.
    fn required_permission<'a>(&'a self, key: &'a str) -> Option<&'a str>;
}

/// Site-map pages carry a url and an optional required permission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMapPayload {
    pub url: Option<String>,
    pub required_permission: Option<String>,
}

impl SiteMapPayload {
    pub fn new<U: Into<String>>(url: U) -> Self {
        SiteMapPayload {
            url: Some(url.into()),
            required_permission: None,
        }
    }

    pub fn with_required_permission<S: Into<String>>(mut self, permission: S) -> Self {
        self.required_permission = Some(permission.into());
        self
    }
}

impl NodePayload for SiteMapPayload {
    const FLAVOR: &'static str = "site map";

    fn required_permission<'a>(&'a self, _key: &'a str) -> Option<&'a str> {
        self.required_permission.as_deref()
    }
}

/// Action-map entries are pure hierarchy + metadata. The entry key names the action a role has to
/// be granted, so it doubles as the required permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMapPayload;

impl NodePayload for ActionMapPayload {
    const FLAVOR: &'static str = "action map";

    fn required_permission<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        Some(key)
    }
}

/// Permission entries are pure hierarchy + metadata; the key is the permission itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPayload;

impl NodePayload for PermissionPayload {
    const FLAVOR: &'static str = "permission";

    fn required_permission<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        Some(key)
    }
}

/// Open string-keyed extension bag. Storage is only allocated by the first write and released
/// again when the last entry is removed; reads against an unallocated bag behave as if it were
/// empty. Equality compares entries only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Option<BTreeMap<String, String>>);

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Attributes {}

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.as_ref().and_then(|map| map.get(name)).map(String::as_str)
    }

    /// Last write wins.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let removed = self.0.as_mut().and_then(|map| map.remove(name));
        if self.0.as_ref().is_some_and(BTreeMap::is_empty) {
            self.0 = None;
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|map| map.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.as_ref().map(BTreeMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once backing storage exists.
    pub fn is_allocated(&self) -> bool {
        self.0.is_some()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0.clone().unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::default();
        for (k, v) in iter {
            attributes.set(k, v);
        }
        attributes
    }
}

/// Construction record for a new node: display metadata, attribute bag and flavor payload.
///
/// ```rust
/// use sitegate_core::properties::{NodeSpec, SiteMapPayload};
///
/// let spec = NodeSpec::new("Users")
///     .description("Manage accounts")
///     .attribute("icon", "people")
///     .payload(SiteMapPayload::new("/admin/users").with_required_permission("users.manage"));
/// assert_eq!(spec.title.as_deref(), Some("Users"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSpec<P> {
    pub title: Option<String>,
    pub description: Option<String>,
    pub attributes: Attributes,
    pub payload: P,
}

impl<P: NodePayload> NodeSpec<P> {
    pub fn new<T: Into<String>>(title: T) -> Self {
        NodeSpec {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn untitled() -> Self {
        NodeSpec::default()
    }

    pub fn description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn attribute<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.attributes.set(name, value);
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn payload(mut self, payload: P) -> Self {
        self.payload = payload;
        self
    }
}
