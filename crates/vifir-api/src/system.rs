// System endpoints
//
// Deployment identity, server clock, and advanced settings queries.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;

/// Deployment identity returned by `/api/system/about`.
#[derive(Debug, Clone, Deserialize)]
pub struct About {
    pub product: String,
    pub version: String,
    /// `"controller"` for a management controller coordinating many
    /// hosts, `"standalone"` for a single managed node.
    pub deployment: String,
}

impl About {
    /// Whether the endpoint is a management controller (vs a single
    /// standalone managed node).
    pub fn is_management_controller(&self) -> bool {
        self.deployment == "controller"
    }
}

#[derive(Debug, Deserialize)]
struct ServerTime {
    now: DateTime<Utc>,
}

/// An advanced-settings entry. `value` is loosely typed because the
/// settings namespace mixes integers, strings, and booleans.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingValue {
    pub key: String,
    pub value: serde_json::Value,
}

impl SettingValue {
    /// The value as an integer, if it is one (or a stringified one).
    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl ApiClient {
    /// Get product, version, and deployment kind.
    ///
    /// `GET /api/system/about`
    pub async fn about(&self) -> Result<About, Error> {
        let url = self.api_url("system/about");
        debug!("fetching deployment identity");
        self.get(url).await
    }

    /// Get the server's current clock reading.
    ///
    /// `GET /api/system/time`
    pub async fn server_time(&self) -> Result<DateTime<Utc>, Error> {
        let url = self.api_url("system/time");
        debug!("fetching server time");
        let t: ServerTime = self.get(url).await?;
        Ok(t.now)
    }

    /// Query a single advanced setting by key.
    ///
    /// `GET /api/settings/{key}` -- 404 if the key is not configured.
    pub async fn setting(&self, key: &str) -> Result<SettingValue, Error> {
        let url = self.api_url(&format!("settings/{key}"));
        debug!(key, "querying setting");
        self.get(url).await
    }
}
