//! Configuration for the vifir CLI.
//!
//! TOML profiles merged with `VIFIR_*` environment overrides. A
//! profile carries everything needed to reach one management endpoint:
//! URL, TLS posture, optional proxy, username, and where collected
//! artifacts land. Passwords deliberately never live here -- the CLI
//! takes them from `VIFIR_PASSWORD` or an interactive prompt.

use std::collections::HashMap;
use std::path::PathBuf;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}' in the config file")]
    UnknownProfile { profile: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    /// Named endpoint profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// One endpoint profile as written in the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Endpoint origin (e.g. `https://vc.example.org`).
    pub endpoint: Option<String>,

    pub username: Option<String>,

    /// Accept self-signed certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Optional HTTP proxy for every request, downloads included.
    pub proxy: Option<String>,

    /// Directory collected artifacts are written into.
    pub output_dir: Option<PathBuf>,
}

/// Fully resolved connection settings handed to the CLI.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Url,
    pub username: String,
    pub insecure: bool,
    pub proxy: Option<Url>,
    pub output_dir: PathBuf,
}

/// Default config file path: `<config dir>/vifir/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "vifir").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load the TOML config (if the file exists) with `VIFIR_*`
/// environment overrides applied on top of the selected profile.
pub fn load_config(path: Option<&PathBuf>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    let path = path.cloned().or_else(default_config_path);
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    Ok(figment.extract()?)
}

impl Config {
    /// Resolve one profile into ready-to-use [`Settings`].
    ///
    /// Resolution order: profile values, then `VIFIR_ENDPOINT`,
    /// `VIFIR_USERNAME`, `VIFIR_INSECURE`, `VIFIR_PROXY`,
    /// `VIFIR_OUTPUT_DIR` environment overrides.
    pub fn resolve(&self, profile_name: Option<&str>) -> Result<Settings, ConfigError> {
        self.resolve_with(profile_name, &Profile::default())
    }

    /// [`resolve`](Self::resolve) with caller-supplied overrides
    /// (command-line flags) applied on top of profile and environment.
    pub fn resolve_with(
        &self,
        profile_name: Option<&str>,
        overrides: &Profile,
    ) -> Result<Settings, ConfigError> {
        let name = profile_name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");

        let base = match self.profiles.get(name) {
            Some(profile) => profile.clone(),
            // An unnamed, unconfigured "default" profile may be filled
            // entirely from the environment; any other name must exist.
            None if name == "default" => Profile::default(),
            None => {
                return Err(ConfigError::UnknownProfile {
                    profile: name.to_owned(),
                });
            }
        };

        let mut profile: Profile = Figment::from(Serialized::defaults(base))
            .merge(Env::prefixed("VIFIR_"))
            .extract()?;

        if overrides.endpoint.is_some() {
            profile.endpoint.clone_from(&overrides.endpoint);
        }
        if overrides.username.is_some() {
            profile.username.clone_from(&overrides.username);
        }
        if overrides.insecure {
            profile.insecure = true;
        }
        if overrides.proxy.is_some() {
            profile.proxy.clone_from(&overrides.proxy);
        }
        if overrides.output_dir.is_some() {
            profile.output_dir.clone_from(&overrides.output_dir);
        }

        let endpoint = profile
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::Validation {
                field: "endpoint".into(),
                reason: "not set in profile or VIFIR_ENDPOINT".into(),
            })?;
        let endpoint = Url::parse(endpoint).map_err(|e| ConfigError::Validation {
            field: "endpoint".into(),
            reason: e.to_string(),
        })?;

        let username = profile
            .username
            .clone()
            .ok_or_else(|| ConfigError::Validation {
                field: "username".into(),
                reason: "not set in profile or VIFIR_USERNAME".into(),
            })?;

        let proxy = profile
            .proxy
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| ConfigError::Validation {
                field: "proxy".into(),
                reason: e.to_string(),
            })?;

        Ok(Settings {
            endpoint,
            username,
            insecure: profile.insecure,
            proxy,
            output_dir: profile
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn profile_resolves_with_defaults() {
        let (_dir, path) = write_config(
            r#"
            default_profile = "lab"

            [profiles.lab]
            endpoint = "https://vc.lab.example"
            username = "forensics"
            insecure = true
            "#,
        );

        let config = load_config(Some(&path)).unwrap();
        let settings = config.resolve(None).unwrap();

        assert_eq!(settings.endpoint.as_str(), "https://vc.lab.example/");
        assert_eq!(settings.username, "forensics");
        assert!(settings.insecure);
        assert!(settings.proxy.is_none());
        assert_eq!(settings.output_dir, PathBuf::from("."));
    }

    #[test]
    fn flag_overrides_beat_the_profile() {
        let (_dir, path) = write_config(
            r#"
            [profiles.default]
            endpoint = "https://vc.lab.example"
            username = "forensics"
            "#,
        );
        let config = load_config(Some(&path)).unwrap();

        let overrides = Profile {
            endpoint: Some("https://vc.prod.example".into()),
            insecure: true,
            ..Profile::default()
        };
        let settings = config.resolve_with(None, &overrides).unwrap();

        assert_eq!(settings.endpoint.as_str(), "https://vc.prod.example/");
        assert_eq!(settings.username, "forensics");
        assert!(settings.insecure);
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let (_dir, path) = write_config("");
        let config = load_config(Some(&path)).unwrap();
        assert!(matches!(
            config.resolve(Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn missing_endpoint_is_a_validation_error() {
        let (_dir, path) = write_config(
            r#"
            [profiles.bare]
            username = "forensics"
            "#,
        );
        let config = load_config(Some(&path)).unwrap();
        let result = config.resolve(Some("bare"));
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "endpoint"
        ));
    }

    #[test]
    fn invalid_proxy_url_is_rejected() {
        let (_dir, path) = write_config(
            r#"
            [profiles.lab]
            endpoint = "https://vc.lab.example"
            username = "forensics"
            proxy = "not a proxy"
            "#,
        );
        let config = load_config(Some(&path)).unwrap();
        assert!(matches!(
            config.resolve(Some("lab")),
            Err(ConfigError::Validation { ref field, .. }) if field == "proxy"
        ));
    }
}
