//! Async client for a virtualization management endpoint.
//!
//! Wraps `reqwest::Client` with session-token handling and typed
//! wrappers for the endpoint surfaces the collection engine needs:
//!
//! - **[`ApiClient`]** — transport mechanics: URL construction, the
//!   `X-Api-Session` header, JSON envelope parsing, status-to-error
//!   mapping. Endpoint groups (system, inventory, events, bundles) are
//!   inherent methods implemented in separate files.
//! - **[`EventCursor`]** — server-side paginated handle over an event
//!   query; pages are pulled explicitly and the cursor must be
//!   released when exhausted.
//! - **Support bundles** — job submission and polling, plus the
//!   descriptors the download pipeline consumes.
//!
//! Lifecycle policy (who may call what, when) lives one level up in
//! `vifir-core`; this crate only talks the wire protocol.

pub mod bundle;
pub mod client;
pub mod error;
pub mod events;
pub mod inventory;
pub mod model;
pub mod system;
pub mod transport;

pub use bundle::{BundleDescriptor, BundleJobState, BundleJobStatus};
pub use client::ApiClient;
pub use error::Error;
pub use events::{EventCursor, EventFilter, RawEvent};
pub use model::{EntityKind, EntityRef, InventoryObject};
pub use system::{About, SettingValue};
pub use transport::{TlsMode, TransportConfig};

/// Product identifier sent as the `User-Agent` on every request,
/// including bundle downloads.
pub const USER_AGENT: &str = concat!("vifir/", env!("CARGO_PKG_VERSION"));
