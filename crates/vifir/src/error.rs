//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable
//! help text.

use miette::Diagnostic;
use thiserror::Error;

use vifir_core::CoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("could not connect to the endpoint")]
    #[diagnostic(
        code(vifir::connect_failed),
        help("Check that the endpoint is reachable. Self-signed certificate? Try --insecure (-k).")
    )]
    Connect(#[source] CoreError),

    #[error("authentication failed")]
    #[diagnostic(
        code(vifir::auth_failed),
        help("Verify the username and the password in VIFIR_PASSWORD (or at the prompt).")
    )]
    Auth(#[source] CoreError),

    #[error("configuration problem")]
    #[diagnostic(
        code(vifir::config),
        help("Set the endpoint/username in the config file, VIFIR_* environment, or flags.")
    )]
    Config(#[from] vifir_config::ConfigError),

    #[error("no {kind} with id '{id}' in the inventory")]
    #[diagnostic(
        code(vifir::unknown_entity),
        help("Run `vifir {list_command}` to see what the endpoint currently reports.")
    )]
    UnknownEntity {
        kind: &'static str,
        id: String,
        list_command: &'static str,
    },

    #[error(transparent)]
    #[diagnostic(code(vifir::operation))]
    Operation(CoreError),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectFailed(_) => Self::Connect(err),
            CoreError::AuthenticationFailed { .. } => Self::Auth(err),
            other => Self::Operation(other),
        }
    }
}
