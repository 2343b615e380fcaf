//! Explicit run configuration
//!
//! Settings are collected as [`PartialConfig`] layers (TOML file, then
//! environment and command line) and resolved once into a [`Config`].
//! Resolution fails on the first missing required field.
//!
//! ```toml
//! [service]
//! base_url = "https://api.projectplace.com/"
//! client_key = "..."
//! client_secret = "..."
//! access_token_key = "..."
//! access_token_secret = "..."
//!
//! [report]
//! output_dir = "media/timereports"
//! database = "pptime.db"
//! pin_yearly_sheets = 2018
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::materialize::DEFAULT_FILE_PREFIX;
use crate::{Year, YearlySheets};

pub const DEFAULT_OUTPUT_DIR: &str = "timereports";
pub const DEFAULT_DATABASE: &str = "pptime.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Service settings, any of which may still be missing
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialServiceConfig {
    pub base_url: Option<String>,
    pub client_key: Option<String>,
    pub client_secret: Option<String>,
    pub access_token_key: Option<String>,
    pub access_token_secret: Option<String>,
}

/// Report settings, any of which may still be missing
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialReportConfig {
    pub output_dir: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub file_prefix: Option<String>,
    pub pin_yearly_sheets: Option<Year>,
}

/// One configuration layer
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialConfig {
    pub service: PartialServiceConfig,
    pub report: PartialReportConfig,
}

impl PartialConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win
    pub fn merge(self, overrides: Self) -> Self {
        let s = self.service;
        let o = overrides.service;
        let r = self.report;
        let ro = overrides.report;
        Self {
            service: PartialServiceConfig {
                base_url: o.base_url.or(s.base_url),
                client_key: o.client_key.or(s.client_key),
                client_secret: o.client_secret.or(s.client_secret),
                access_token_key: o.access_token_key.or(s.access_token_key),
                access_token_secret: o.access_token_secret.or(s.access_token_secret),
            },
            report: PartialReportConfig {
                output_dir: ro.output_dir.or(r.output_dir),
                database: ro.database.or(r.database),
                file_prefix: ro.file_prefix.or(r.file_prefix),
                pin_yearly_sheets: ro.pin_yearly_sheets.or(r.pin_yearly_sheets),
            },
        }
    }

    /// Settings needed to request an access token
    pub fn resolve_client(&self) -> Result<ClientConfig, ConfigError> {
        let s = &self.service;
        Ok(ClientConfig {
            base_url: required("service.base_url", s.base_url.as_deref())?,
            client_key: required("service.client_key", s.client_key.as_deref())?,
            client_secret: required("service.client_secret", s.client_secret.as_deref())?,
        })
    }

    /// Service endpoint plus consumer and access credentials
    pub fn resolve_service(&self) -> Result<ServiceConfig, ConfigError> {
        let client = self.resolve_client()?;
        let s = &self.service;
        Ok(ServiceConfig {
            base_url: client.base_url,
            client_key: client.client_key,
            client_secret: client.client_secret,
            access_token_key: required("service.access_token_key", s.access_token_key.as_deref())?,
            access_token_secret: required(
                "service.access_token_secret",
                s.access_token_secret.as_deref(),
            )?,
        })
    }

    /// Report settings; every field has a default
    pub fn resolve_report(&self) -> ReportConfig {
        let r = &self.report;
        ReportConfig {
            output_dir: r
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            database: r
                .database
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            file_prefix: r
                .file_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string()),
            yearly_sheets: r
                .pin_yearly_sheets
                .map_or(YearlySheets::PerYear, YearlySheets::Pinned),
        }
    }

    /// Everything a report run against the remote service needs
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        Ok(Config {
            service: self.resolve_service()?,
            report: self.resolve_report(),
        })
    }
}

fn required(name: &'static str, value: Option<&str>) -> Result<String, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Consumer credentials for the delegated-authorization flow
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub client_key: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("client_key", &self.client_key)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Remote service endpoint and credentials
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub client_key: String,
    pub client_secret: String,
    pub access_token_key: String,
    pub access_token_secret: String,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("client_key", &self.client_key)
            .field("client_secret", &"<redacted>")
            .field("access_token_key", &self.access_token_key)
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

/// Where and how reports are written
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub database: PathBuf,
    pub file_prefix: String,
    pub yearly_sheets: YearlySheets,
}

/// Fully resolved configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub service: ServiceConfig,
    pub report: ReportConfig,
}
