//! `vifir events` -- audit/event history collection.

use std::path::Path;

use vifir_core::{Session, events};

use crate::commands::inventory;
use crate::error::CliError;

pub async fn run(
    session: &Session,
    light: bool,
    datacenter_ids: &[String],
    output_dir: &Path,
) -> Result<(), CliError> {
    // Discovery always runs so the listing is cached for this session;
    // the engine itself scopes to the root when nothing is selected.
    // Collecting at the root is the recommended mode -- cross-entity
    // event streams only exist there.
    let discovered = session.discover_datacenters().await?;

    let targets = if datacenter_ids.is_empty() {
        Vec::new()
    } else {
        inventory::select(&discovered, datacenter_ids, "datacenter", "datacenters")?
    };

    let report = events::retrieve_events(session, light, &targets, output_dir).await?;
    println!("event report written to {}", report.display());
    Ok(())
}
