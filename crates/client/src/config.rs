//! Client configuration.

use crate::reconnect::ReconnectPolicy;
use goban_core::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_URI: &str = "ws://localhost:3000";
pub const DEFAULT_MODULE: &str = "quickstart-chat";
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";

pub const ENV_URI: &str = "GOBAN_URI";
pub const ENV_MODULE: &str = "GOBAN_MODULE";
pub const ENV_TOKEN_KEY: &str = "GOBAN_TOKEN_KEY";

/// Connection settings and the fixed subscription set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint of the remote service.
    pub uri: String,
    /// Module (dataset) to connect to.
    pub module_name: String,
    /// Token store key holding the saved auth token.
    pub token_key: String,
    /// Queries issued once per session, one per relation.
    pub queries: Vec<String>,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            module_name: DEFAULT_MODULE.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            queries: vec![
                "SELECT * FROM message".to_string(),
                "SELECT * FROM user".to_string(),
                "SELECT * FROM game".to_string(),
            ],
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Parses a JSON document; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `GOBAN_URI`, `GOBAN_MODULE` and
    /// `GOBAN_TOKEN_KEY` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(uri) = lookup(ENV_URI) {
            config.uri = uri;
        }
        if let Some(module) = lookup(ENV_MODULE) {
            config.module_name = module;
        }
        if let Some(key) = lookup(ENV_TOKEN_KEY) {
            config.token_key = key;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = module_name.into();
        self
    }

    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(Error::config("uri must not be empty"));
        }
        if self.module_name.trim().is_empty() {
            return Err(Error::config("module_name must not be empty"));
        }
        if self.token_key.is_empty() {
            return Err(Error::config("token_key must not be empty"));
        }
        if self.queries.is_empty() {
            return Err(Error::config("at least one query is required"));
        }
        if let Some(blank) = self.queries.iter().position(|q| q.trim().is_empty()) {
            return Err(Error::config(format!("query {} is empty", blank)));
        }
        Ok(())
    }
}
