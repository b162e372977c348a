//! `vifir hosts` / `vifir datacenters` -- inventory listings, plus the
//! id-to-ref selection helper the collection commands share.

use vifir_core::{EntityRef, InventoryObject, Session};

use crate::error::CliError;

pub async fn hosts(session: &Session) -> Result<(), CliError> {
    let hosts = session.discover_hosts().await?;
    print_listing(&hosts);
    Ok(())
}

pub async fn datacenters(session: &Session) -> Result<(), CliError> {
    let datacenters = session.discover_datacenters().await?;
    print_listing(&datacenters);
    Ok(())
}

fn print_listing(objects: &[InventoryObject]) {
    for obj in objects {
        println!("{:<16} {}", obj.id, obj.path);
    }
    if objects.is_empty() {
        println!("(inventory is empty)");
    }
}

/// Map user-supplied ids onto discovered inventory objects. Every id
/// must resolve; a stale or mistyped id is reported with the listing
/// command that shows the live inventory.
pub fn select(
    objects: &[InventoryObject],
    ids: &[String],
    kind: &'static str,
    list_command: &'static str,
) -> Result<Vec<EntityRef>, CliError> {
    ids.iter()
        .map(|id| {
            objects
                .iter()
                .find(|obj| obj.id == *id)
                .map(InventoryObject::entity_ref)
                .ok_or_else(|| CliError::UnknownEntity {
                    kind,
                    id: id.clone(),
                    list_command,
                })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vifir_core::EntityKind;

    fn inv(id: &str) -> InventoryObject {
        InventoryObject {
            kind: EntityKind::Datacenter,
            id: id.to_owned(),
            name: id.to_owned(),
            path: format!("/{id}"),
        }
    }

    #[test]
    fn select_maps_ids_in_request_order() {
        let objects = vec![inv("dc-1"), inv("dc-2")];
        let refs = select(
            &objects,
            &["dc-2".into(), "dc-1".into()],
            "datacenter",
            "datacenters",
        )
        .unwrap();
        assert_eq!(refs[0], EntityRef::new(EntityKind::Datacenter, "dc-2"));
        assert_eq!(refs[1], EntityRef::new(EntityKind::Datacenter, "dc-1"));
    }

    #[test]
    fn select_rejects_unknown_ids() {
        let objects = vec![inv("dc-1")];
        let result = select(&objects, &["dc-9".into()], "datacenter", "datacenters");
        assert!(matches!(result, Err(CliError::UnknownEntity { .. })));
    }
}
