//! Client configuration.
//!
//! # Design
//! `ClientConfig` is set once and read by the client for its lifetime. It is
//! serde-derived so it can be embedded in a larger TOML file or loaded on
//! its own. Validation is limited to what the client needs: the base URL is
//! normalized, and the auth scheme must name a known mechanism when
//! credentials are in use.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::http::{AuthScheme, Credentials};

/// Base URL and optional credentials for a `RestClient`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, alias = "server")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_pass: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_auth(
        mut self,
        scheme: impl Into<String>,
        user: impl Into<String>,
        pass: impl Into<String>,
    ) -> Self {
        self.auth_scheme = Some(scheme.into());
        self.auth_user = Some(user.into());
        self.auth_pass = Some(pass.into());
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Copy of this config whose base URL ends with exactly the separator
    /// it already had, or a single appended `/`. An empty URL becomes `/`.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if !config.base_url.ends_with('/') {
            config.base_url.push('/');
        }
        config
    }

    /// Credentials to attach, present only when both scheme and user are
    /// non-empty.
    pub fn credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        let scheme = self.auth_scheme.as_deref().unwrap_or_default();
        let user = self.auth_user.as_deref().unwrap_or_default();
        if scheme.is_empty() || user.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credentials {
            scheme: scheme.parse::<AuthScheme>()?,
            user: user.to_string(),
            password: self.auth_pass.clone().unwrap_or_default(),
        }))
    }
}
