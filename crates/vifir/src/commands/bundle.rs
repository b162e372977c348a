//! `vifir bundle` -- diagnostic bundle generation and download.

use std::path::Path;

use vifir_core::{Session, bundle};

use crate::commands::inventory;
use crate::error::CliError;

pub async fn run(
    session: &Session,
    host_ids: &[String],
    output_dir: &Path,
) -> Result<(), CliError> {
    let discovered = session.discover_hosts().await?;

    let hosts = if host_ids.is_empty() {
        discovered.iter().map(|h| h.entity_ref()).collect()
    } else {
        inventory::select(&discovered, host_ids, "host", "hosts")?
    };

    let outcomes = bundle::request_bundle(session, &hosts, output_dir).await?;

    let succeeded = outcomes.iter().filter(|t| t.succeeded()).count();
    println!(
        "bundles downloaded: {succeeded}/{} into {}",
        outcomes.len(),
        output_dir.display()
    );
    for task in outcomes.iter().filter(|t| !t.succeeded()) {
        println!("  failed: {} ({})", task.file_name, task.url);
    }
    Ok(())
}
