// Endpoint HTTP client
//
// Wraps `reqwest::Client` with API URL construction, the session-token
// header, and status-to-error mapping. All endpoint groups (system,
// inventory, events, bundles) are implemented as inherent methods via
// separate files to keep this module focused on transport mechanics.

use std::sync::{Arc, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Header carrying the session token on every authenticated request.
const SESSION_HEADER: &str = "X-Api-Session";

#[derive(serde::Deserialize)]
struct SessionToken {
    token: String,
}

/// Raw HTTP client for the management endpoint.
///
/// Cheap to clone; clones share the HTTP connection pool and the
/// session token, so concurrent collectors can issue queries against
/// the same authenticated session.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    /// Session token captured at login and rotated on re-login.
    /// `None` until `login` succeeds or after `logout`.
    token: Arc<RwLock<Option<String>>>,
    transport: TransportConfig,
}

impl ApiClient {
    /// Create a new client against the endpoint root (e.g.
    /// `https://vc.example.org`). Allocates a fresh transport; no state
    /// is carried over from any previous client instance.
    pub fn new(base_url: Url, transport: TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            token: Arc::new(RwLock::new(None)),
            transport,
        })
    }

    /// The endpoint base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The transport settings this client was built with (the bundle
    /// downloader reuses them for its own connections).
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Authenticate with username/password.
    ///
    /// `POST /api/session` with HTTP basic auth. On success the
    /// returned token is stored and attached to every later request.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.api_url("session");
        debug!("logging in at {}", url);

        let resp = self
            .http
            .post(url)
            .basic_auth(username, Some(password.expose_secret()))
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "invalid credentials".into(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let session: SessionToken = serde_json::from_str(&body).map_err(|e| {
            Error::Deserialization {
                message: format!("login response: {e}"),
                body,
            }
        })?;

        *self.token.write().expect("session token lock poisoned") = Some(session.token);
        debug!("login successful");
        Ok(())
    }

    /// Invalidate the server-side session.
    ///
    /// `DELETE /api/session`. The local token is dropped before the
    /// request goes out, so no new work can ride a half-closed session.
    pub async fn logout(&self) -> Result<(), Error> {
        let token = self
            .token
            .write()
            .expect("session token lock poisoned")
            .take();

        let Some(token) = token else {
            debug!("logout with no active token; nothing to invalidate");
            return Ok(());
        };

        let url = self.api_url("session");
        debug!("logging out at {}", url);
        let resp = self
            .http
            .delete(url)
            .header(SESSION_HEADER, token)
            .send()
            .await
            .map_err(Error::Transport)?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "server-side session invalidation failed");
        }
        Ok(())
    }

    /// Whether a session token is currently held.
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .expect("session token lock poisoned")
            .is_some()
    }

    // ── URL / request helpers ───────────────────────────────────────

    /// Build a full URL for an API path: `{base}/api/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Url {
        let base = self.base_url.as_str().trim_end_matches('/');
        let full = format!("{base}/api/{path}");
        Url::parse(&full).expect("invalid API URL")
    }

    /// Attach the session token, if any, to a request builder.
    fn with_token(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.token.read().expect("session token lock poisoned");
        match guard.as_deref() {
            Some(token) => builder.header(SESSION_HEADER, token),
            None => builder,
        }
    }

    /// Send a GET request and decode the JSON response.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self
            .with_token(self.http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;
        self.parse_response(resp).await
    }

    /// Send a POST request with a JSON body and decode the response.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self
            .with_token(self.http.post(url).json(body))
            .send()
            .await
            .map_err(Error::Transport)?;
        self.parse_response(resp).await
    }

    /// Send a DELETE request, expecting no meaningful body.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);
        let resp = self
            .with_token(self.http.delete(url))
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body[..body.len().min(200)].to_owned(),
            });
        }
        Ok(())
    }

    /// Map the response status and decode the JSON body.
    async fn parse_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body[..body.len().min(200)].to_owned(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| {
            let preview = &body[..body.len().min(200)];
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}
