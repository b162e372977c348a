// Session lifecycle management.
//
// Owns the authenticated connection and gates every other operation on
// its validity. The lifecycle is a one-way state machine; a logged-out
// instance is terminal and reconnecting means building a fresh client.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tracing::{debug, info, warn};
use url::Url;

use vifir_api::{About, ApiClient, InventoryObject, TlsMode, TransportConfig};

use crate::error::CoreError;
use crate::store::ContextStore;

/// Context-store key for the host list cached by discovery.
pub const HOST_LIST_KEY: &str = "host-list";
/// Context-store key for the datacenter list cached by discovery.
pub const DATACENTER_LIST_KEY: &str = "datacenter-list";

/// Clock skew at or above this many seconds fails the sync check,
/// leaving a 1 s margin under the server's 30 s tolerance.
const MAX_CLOCK_SKEW_SECS: i64 = 29;

/// Lifecycle states of a [`Session`].
///
/// `LoggedOut` is terminal for the built client; reconnecting requires
/// another [`build_client`](Session::build_client) transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Configured,
    ClientBuilt,
    Authenticated,
    LoggedOut,
}

/// The authenticated connection and its session-scoped state.
///
/// All collection operations require a live session; they fail with
/// [`CoreError::SessionInvalid`] -- before any network I/O -- when one
/// is not present. The underlying connection is safe to query from
/// many tasks at once, but tearing it down (`logout`/`build_client`)
/// while operations are in flight is the caller's responsibility to
/// serialize; this type only guarantees the authenticated flag flips
/// off first.
pub struct Session {
    endpoint: Option<Url>,
    transport: TransportConfig,
    client: Option<ApiClient>,
    store: Option<ContextStore>,
    state: SessionState,
    /// Mirrors `state == Authenticated`; kept atomic so concurrent
    /// collectors can check it without blocking.
    authenticated: AtomicBool,
    about: Option<About>,
    post_init_done: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            transport: TransportConfig::default(),
            client: None,
            store: None,
            state: SessionState::Uninitialized,
            authenticated: AtomicBool::new(false),
            about: None,
            post_init_done: false,
        }
    }

    /// Build a session around a pre-built client.
    ///
    /// Skips endpoint validation -- the caller owns the transport
    /// settings. Starts in the client-built state, ready for
    /// [`login`](Self::login). Used when embedding the engine behind
    /// an existing client (and by the test suites, where the mock
    /// endpoint is plain HTTP).
    pub fn from_client(client: ApiClient) -> Self {
        let mut session = Self::new();
        session.client = Some(client);
        session.store = Some(ContextStore::new());
        session.state = SessionState::ClientBuilt;
        session
    }

    // ── Configuration ───────────────────────────────────────────────

    /// Capture connection parameters.
    ///
    /// Pure configuration: nothing is allocated and no network is
    /// touched. The endpoint must be a bare https origin -- any other
    /// scheme, or a path/query component, is rejected with
    /// [`CoreError::InvalidEndpoint`]. Reconfiguring discards any
    /// previously built client.
    pub fn configure(
        &mut self,
        endpoint: Url,
        skip_tls_verify: bool,
        proxy: Option<Url>,
    ) -> Result<(), CoreError> {
        validate_endpoint(&endpoint)?;
        self.endpoint = Some(endpoint);
        self.transport = TransportConfig {
            tls: if skip_tls_verify {
                TlsMode::DangerAcceptInvalid
            } else {
                TlsMode::System
            },
            proxy,
            ..TransportConfig::default()
        };
        self.client = None;
        self.store = None;
        self.about = None;
        self.post_init_done = false;
        self.authenticated.store(false, Ordering::SeqCst);
        self.state = SessionState::Configured;
        Ok(())
    }

    /// (Re)allocate the transport and a fresh context store.
    ///
    /// Callable repeatedly to support reconnects; every call discards
    /// the previous transport and all cached context. The underlying
    /// connection cannot be reset in place, so reuse is never
    /// attempted.
    pub fn build_client(&mut self) -> Result<(), CoreError> {
        let Some(endpoint) = self.endpoint.clone() else {
            return Err(CoreError::SessionInvalid);
        };
        self.authenticated.store(false, Ordering::SeqCst);
        self.post_init_done = false;
        self.about = None;
        self.client = Some(ApiClient::new(endpoint, self.transport.clone())?);
        self.store = Some(ContextStore::new());
        self.state = SessionState::ClientBuilt;
        debug!("client rebuilt; context store reset");
        Ok(())
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Authenticate with username/password, then run post-login
    /// initialization (deployment-kind resolution).
    ///
    /// Fails with [`CoreError::AuthenticationFailed`] on bad
    /// credentials and [`CoreError::ConnectFailed`] on transport
    /// errors. The session only becomes usable once the whole sequence
    /// succeeds.
    pub async fn login(
        &mut self,
        username: &str,
        password: &SecretString,
    ) -> Result<(), CoreError> {
        if self.state != SessionState::ClientBuilt {
            return Err(CoreError::SessionInvalid);
        }
        let client = self.client.as_ref().ok_or(CoreError::SessionInvalid)?;

        client.login(username, password).await.map_err(|e| match e {
            vifir_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            transport @ vifir_api::Error::Transport(_) => CoreError::ConnectFailed(transport),
            other => CoreError::Api(other),
        })?;
        self.authenticated.store(true, Ordering::SeqCst);
        debug!("login successfully finished");

        // Post-login initialization: resolve what kind of deployment
        // we are talking to before anything else may run.
        let about = client.about().await.map_err(|e| {
            self.authenticated.store(false, Ordering::SeqCst);
            CoreError::Api(e)
        })?;
        info!(
            product = %about.product,
            version = %about.version,
            management_controller = about.is_management_controller(),
            "connected"
        );
        self.about = Some(about);
        self.post_init_done = true;
        self.authenticated.store(true, Ordering::SeqCst);
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// End the session, best-effort.
    ///
    /// The local authenticated flag is cleared before the server-side
    /// invalidation is attempted, so no component can begin new work
    /// against a half-closed session. Network failures during logout
    /// are logged, never propagated -- local state is already clean.
    pub async fn logout(&mut self) {
        self.authenticated.store(false, Ordering::SeqCst);
        if let Some(client) = &self.client {
            if let Err(e) = client.logout().await {
                warn!(error = %e, "server-side session invalidation failed");
            }
        }
        self.state = SessionState::LoggedOut;
        debug!("session logged out");
    }

    // ── State queries ───────────────────────────────────────────────

    /// Whether there is an active logged-in session. Never blocks.
    pub fn is_logged_in(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Whether the endpoint is a management controller coordinating
    /// many hosts (vs a single standalone managed node). Never blocks;
    /// `false` until post-login initialization has run.
    pub fn is_management_controller(&self) -> bool {
        self.is_logged_in()
            && self.post_init_done
            && self.about.as_ref().is_some_and(About::is_management_controller)
    }

    /// Deployment identity resolved at login, if any.
    pub fn server_about(&self) -> Option<&About> {
        self.about.as_ref()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for issuing authenticated queries.
    ///
    /// Fails with [`CoreError::SessionInvalid`] outside the
    /// authenticated state -- callers get this before any network I/O
    /// happens.
    pub fn client(&self) -> Result<&ApiClient, CoreError> {
        if !self.is_logged_in() {
            return Err(CoreError::SessionInvalid);
        }
        self.client.as_ref().ok_or(CoreError::SessionInvalid)
    }

    /// The session's volatile context store.
    ///
    /// # Panics
    ///
    /// Panics if called before login completes post-login
    /// initialization: reading or writing session context without a
    /// session is a sequencing bug in the caller, not a runtime
    /// condition to recover from.
    pub fn store(&self) -> &ContextStore {
        assert!(
            self.post_init_done,
            "context store accessed before post-login initialization"
        );
        self.store
            .as_ref()
            .expect("context store missing after post-login initialization")
    }

    // ── Clock sync ──────────────────────────────────────────────────

    /// Compare local and server clocks.
    ///
    /// Fails with [`CoreError::ClockSkewExceeded`] when the absolute
    /// delta reaches [`MAX_CLOCK_SKEW_SECS`]. A skew failure is fatal
    /// to time-windowed queries but not to the session itself.
    pub async fn check_time_skew(&self) -> Result<(), CoreError> {
        let client = self.client()?;
        let server_now = client.server_time().await?;
        let client_now = Utc::now();

        if let Some(delta_secs) = skew_excess(client_now, server_now) {
            warn!(delta_secs, "server and client clocks are out of sync");
            return Err(CoreError::ClockSkewExceeded { delta_secs });
        }
        info!(
            server = %server_now.to_rfc3339(),
            client = %client_now.to_rfc3339(),
            "clocks are in sync"
        );
        Ok(())
    }

    // ── Discovery ───────────────────────────────────────────────────

    /// Enumerate all hosts and cache the listing under
    /// [`HOST_LIST_KEY`] for later steps in this session.
    pub async fn discover_hosts(&self) -> Result<Vec<InventoryObject>, CoreError> {
        let hosts = self.client()?.list_hosts().await?;
        if hosts.is_empty() {
            warn!("host discovery returned an empty inventory");
        }
        self.store().set(HOST_LIST_KEY, hosts.clone());
        Ok(hosts)
    }

    /// Enumerate all datacenters and cache the listing under
    /// [`DATACENTER_LIST_KEY`].
    pub async fn discover_datacenters(&self) -> Result<Vec<InventoryObject>, CoreError> {
        let datacenters = self.client()?.list_datacenters().await?;
        if datacenters.is_empty() {
            warn!("datacenter discovery returned an empty inventory");
        }
        self.store().set(DATACENTER_LIST_KEY, datacenters.clone());
        Ok(datacenters)
    }
}

/// Reject anything that is not a bare https origin.
fn validate_endpoint(endpoint: &Url) -> Result<(), CoreError> {
    if endpoint.scheme() != "https" {
        return Err(CoreError::InvalidEndpoint {
            reason: format!("scheme must be https, got '{}'", endpoint.scheme()),
        });
    }
    if !matches!(endpoint.path(), "" | "/") {
        return Err(CoreError::InvalidEndpoint {
            reason: format!("endpoint must not carry a path, got '{}'", endpoint.path()),
        });
    }
    if endpoint.query().is_some() {
        return Err(CoreError::InvalidEndpoint {
            reason: "endpoint must not carry a query string".into(),
        });
    }
    Ok(())
}

/// Returns the absolute clock delta in seconds when it is at or beyond
/// the tolerated skew, `None` while within tolerance. Pure so the
/// boundary is testable for both signs of the delta.
fn skew_excess(client_now: DateTime<Utc>, server_now: DateTime<Utc>) -> Option<i64> {
    let delta_secs = (client_now - server_now).num_seconds().abs();
    (delta_secs >= MAX_CLOCK_SKEW_SECS).then_some(delta_secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn endpoint_must_be_bare_https_origin() {
        assert!(validate_endpoint(&url("https://vc.example.org")).is_ok());
        assert!(validate_endpoint(&url("https://vc.example.org:8443/")).is_ok());

        for bad in [
            "http://vc.example.org",
            "https://vc.example.org/sdk",
            "https://vc.example.org/?insecure=1",
        ] {
            let result = validate_endpoint(&url(bad));
            assert!(
                matches!(result, Err(CoreError::InvalidEndpoint { .. })),
                "expected InvalidEndpoint for {bad}, got {result:?}"
            );
        }
    }

    #[test]
    fn skew_boundary_is_29_seconds_for_both_signs() {
        let base = Utc::now();

        assert_eq!(skew_excess(base, base), None);
        assert_eq!(skew_excess(base, base + Duration::seconds(28)), None);
        assert_eq!(skew_excess(base, base - Duration::seconds(28)), None);
        assert_eq!(skew_excess(base, base + Duration::seconds(29)), Some(29));
        assert_eq!(skew_excess(base, base - Duration::seconds(29)), Some(29));
        assert_eq!(skew_excess(base, base - Duration::seconds(120)), Some(120));
    }

    #[test]
    fn lifecycle_enforces_ordering() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Uninitialized);

        // NewClient before Init is a sequencing mistake.
        assert!(matches!(
            session.build_client(),
            Err(CoreError::SessionInvalid)
        ));

        session
            .configure(url("https://vc.example.org"), true, None)
            .unwrap();
        assert_eq!(session.state(), SessionState::Configured);

        session.build_client().unwrap();
        assert_eq!(session.state(), SessionState::ClientBuilt);
        assert!(!session.is_logged_in());
        assert!(!session.is_management_controller());

        // Rebuild is allowed and resets the session-scoped state.
        session.build_client().unwrap();
        assert_eq!(session.state(), SessionState::ClientBuilt);
    }

    #[test]
    fn client_handle_requires_authentication() {
        let mut session = Session::new();
        session
            .configure(url("https://vc.example.org"), false, None)
            .unwrap();
        session.build_client().unwrap();

        assert!(matches!(session.client(), Err(CoreError::SessionInvalid)));
    }

    #[test]
    #[should_panic(expected = "context store accessed before post-login initialization")]
    fn store_access_before_login_panics() {
        let mut session = Session::new();
        session
            .configure(url("https://vc.example.org"), false, None)
            .unwrap();
        session.build_client().unwrap();
        let _ = session.store();
    }
}
