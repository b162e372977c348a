use thiserror::Error;

/// Operation-level error type for the collection engine.
///
/// Three broad classes: precondition errors (`SessionInvalid`,
/// `KeyNotFound`, `InvalidEndpoint`) that indicate caller/sequencing
/// mistakes and are never retried; environment errors
/// (`RetentionAgeUnknown`, `ClockSkewExceeded`) that abort the
/// requested operation outright; and wrapped remote/IO failures.
/// Per-item failures inside a batch (one event, one entity, one
/// download) are handled by skipping at that granularity and never
/// surface here unless they invalidate the whole operation.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Preconditions ───────────────────────────────────────────────
    /// The endpoint URL is not a bare https origin.
    #[error("invalid endpoint URL: {reason}")]
    InvalidEndpoint { reason: String },

    /// No active authenticated session for the requested operation.
    #[error("no active authenticated session")]
    SessionInvalid,

    /// A context-store key was absent. Normal and recoverable: the
    /// discovery step was skipped or returned nothing.
    #[error("no data cached under context key '{key}'")]
    KeyNotFound { key: String },

    /// A context-store key held a value of a different type than the
    /// caller asked for.
    #[error("context key '{key}' holds a value of an unexpected type")]
    WrongType { key: String },

    // ── Session ─────────────────────────────────────────────────────
    /// Credential-based login was rejected.
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The endpoint could not be reached at all.
    #[error("could not connect to the endpoint: {0}")]
    ConnectFailed(#[source] vifir_api::Error),

    /// Local and server clocks differ by 29 seconds or more. Fatal to
    /// time-windowed queries, harmless to the session itself.
    #[error("server clock is {delta_secs}s away from the local clock")]
    ClockSkewExceeded { delta_secs: i64 },

    // ── Collection environment ──────────────────────────────────────
    /// The server's event retention age could not be determined, so no
    /// safe time-window filter can be built.
    #[error("cannot determine the server's event retention age: {reason}")]
    RetentionAgeUnknown { reason: String },

    // ── Bundles ─────────────────────────────────────────────────────
    /// The server-side generation job failed (or could not be created).
    #[error("bundle generation failed: {message}")]
    BundleGenerationFailed { message: String },

    /// A single download task got a non-200 response. Task-local: the
    /// pipeline records it and keeps the sibling downloads running.
    #[error("download of {url} failed with HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Wrapped ─────────────────────────────────────────────────────
    /// Error from the wire protocol layer.
    #[error(transparent)]
    Api(#[from] vifir_api::Error),

    /// Local filesystem error while writing an output artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding error while writing the event report.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}
