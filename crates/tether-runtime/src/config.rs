//! Instance configuration

use serde::{Deserialize, Serialize};
use tether_core::{TetherError, TetherResult, NODE_INTERFACE};

use crate::errors::ErrorRetention;

/// Instance configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Server to connect to; `None` selects the library default
    pub remote_name: Option<String>,
    /// Whether a barrier drain empties the error list
    pub error_retention: ErrorRetention,
    /// Interface types that get a bound proxy and an info hook
    pub bind_interfaces: Vec<String>,
    /// Interface version requested for the registry proxy
    pub registry_version: u32,
    /// Interface version requested for bound node proxies
    pub node_version: u32,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        InstanceConfig {
            remote_name: None,
            error_retention: ErrorRetention::default(),
            bind_interfaces: vec![NODE_INTERFACE.to_string()],
            registry_version: 3,
            node_version: 3,
        }
    }
}

impl InstanceConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> TetherResult<Self> {
        let config: InstanceConfig =
            serde_json::from_str(json).map_err(|e| TetherError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TetherResult<()> {
        if let Some(remote) = &self.remote_name {
            if remote.is_empty() || remote.contains('\0') {
                return Err(TetherError::Config(format!("invalid remote name {remote:?}")));
            }
        }
        if let Some(bad) = self
            .bind_interfaces
            .iter()
            .find(|i| i.is_empty() || i.contains('\0'))
        {
            return Err(TetherError::Config(format!("invalid interface type {bad:?}")));
        }
        Ok(())
    }

    /// Whether objects of `type_name` get bound
    pub fn binds(&self, type_name: &str) -> bool {
        self.bind_interfaces.iter().any(|i| i == type_name)
    }

    pub fn with_error_retention(mut self, retention: ErrorRetention) -> Self {
        self.error_retention = retention;
        self
    }

    pub fn with_bind_interfaces<I, T>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.bind_interfaces = interfaces.into_iter().map(Into::into).collect();
        self
    }
}
