//! Concurrent forensic-collection engine over `vifir-api`.
//!
//! This crate owns the session lifecycle and the two evidence
//! pipelines:
//!
//! - **[`Session`]** — the authenticated connection and its state
//!   machine: configure, build a client, log in, run, log out.
//!   Reconnecting always rebuilds the client; a logged-out instance is
//!   terminal. Owns the session-scoped [`ContextStore`] that hands
//!   discovered entity lists from one step to the next.
//!
//! - **[`events`]** — audit/event history collection: one paginated
//!   collector per target entity fanned out on the runtime, pages
//!   fanned back in over a bounded channel to a single normalizing
//!   consumer, sorted by event id, exported as CSV.
//!
//! - **[`bundle`]** — diagnostic bundle delivery: drives the
//!   server-side generation job to completion with progress feedback,
//!   then downloads every produced file concurrently with per-file
//!   failure isolation.
//!
//! Both pipelines are synchronous from the caller's point of view but
//! built to run on a background task while an interactive surface
//! stays responsive; they guarantee termination and observable
//! progress, not cancellation.

pub mod bundle;
pub mod error;
pub mod events;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bundle::{DownloadStatus, DownloadTask};
pub use error::CoreError;
pub use events::{EventRecord, LIGHT_EVENT_TYPE_IDS};
pub use session::{DATACENTER_LIST_KEY, HOST_LIST_KEY, Session, SessionState};
pub use store::ContextStore;

// Re-export the wire-level types callers hold on to.
pub use vifir_api::{About, BundleDescriptor, EntityKind, EntityRef, InventoryObject};
