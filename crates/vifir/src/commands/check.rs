//! `vifir check` -- session, identity, and clock-sync verification.

use vifir_core::Session;

use crate::error::CliError;

pub async fn run(session: &Session) -> Result<(), CliError> {
    if let Some(about) = session.server_about() {
        println!(
            "connected: {} {} ({})",
            about.product, about.version, about.deployment
        );
    }
    println!(
        "management controller: {}",
        session.is_management_controller()
    );

    session.check_time_skew().await?;
    println!("clock skew: within tolerance");
    Ok(())
}
