// Wire-level inventory model shared by the endpoint surfaces.

use serde::{Deserialize, Serialize};

/// The kind of a managed inventory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Host,
    Datacenter,
    Folder,
}

/// Opaque reference to a managed inventory object.
///
/// Equality is by `(kind, id)`. A ref is immutable once obtained, but
/// the object behind it may disappear between discovery and use --
/// consumers must treat a 404 on a stored ref as a stale ref to skip,
/// never as a fatal condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// The inventory root folder. Event queries against it cover the
    /// whole deployment recursively.
    pub fn root() -> Self {
        Self::new(EntityKind::Folder, "root")
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.id)
    }
}

/// An inventory listing entry: the entity ref plus the display
/// metadata the server pre-resolves (name and full inventory path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryObject {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    /// Human-readable inventory path (e.g. `/dc0/host/esx01`).
    pub path: String,
}

impl InventoryObject {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn entity_ref_equality_is_by_kind_and_id() {
        let a = EntityRef::new(EntityKind::Host, "host-1");
        let b = EntityRef::new(EntityKind::Host, "host-1");
        let c = EntityRef::new(EntityKind::Datacenter, "host-1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn inventory_object_deserializes_from_wire_shape() {
        let obj: InventoryObject = serde_json::from_str(
            r#"{"kind":"host","id":"host-1021","name":"esx01","path":"/dc0/host/esx01"}"#,
        )
        .unwrap();
        assert_eq!(obj.kind, EntityKind::Host);
        assert_eq!(obj.entity_ref(), EntityRef::new(EntityKind::Host, "host-1021"));
    }
}
