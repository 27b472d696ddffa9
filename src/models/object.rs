use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a governed object. Kinds form a containment hierarchy
/// (bitstream < bundle < item < collection < community) walked via
/// `archive_objects.parent_id`, not via the type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Community,
    Collection,
    Item,
    Bundle,
    Bitstream,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Community => "community",
            ResourceKind::Collection => "collection",
            ResourceKind::Item => "item",
            ResourceKind::Bundle => "bundle",
            ResourceKind::Bitstream => "bitstream",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "community" => Some(ResourceKind::Community),
            "collection" => Some(ResourceKind::Collection),
            "item" => Some(ResourceKind::Item),
            "bundle" => Some(ResourceKind::Bundle),
            "bitstream" => Some(ResourceKind::Bitstream),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a governed object: what a policy attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ResourceKind,
    pub id: Uuid,
}

impl ObjectRef {
    pub fn new(kind: ResourceKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn community(id: Uuid) -> Self {
        Self::new(ResourceKind::Community, id)
    }

    pub fn collection(id: Uuid) -> Self {
        Self::new(ResourceKind::Collection, id)
    }

    pub fn item(id: Uuid) -> Self {
        Self::new(ResourceKind::Item, id)
    }

    pub fn bundle(id: Uuid) -> Self {
        Self::new(ResourceKind::Bundle, id)
    }

    pub fn bitstream(id: Uuid) -> Self {
        Self::new(ResourceKind::Bitstream, id)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}
