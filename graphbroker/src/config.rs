// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Connection and pool configuration
//!
//! This module provides:
//! - [`ResourceConfig`]: how to reach the backing graph database
//! - [`PoolConfig`]: pool sizing, derived from a resource config or supplied explicitly
//! - [`ConfigOption`]: named feature flags that can be re-applied at runtime
//! - [`BrokerSettings`]: the JSON document the CLI and applications load
//!
//! Configurations are values. A change produces a new value; nothing is
//! mutated in place while a pool built from it is live.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{BrokerError, Result};

/// Username and password presented to the backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Passwords never reach logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Feature flag that can be toggled on a live broker
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigOption {
    /// Query-time reasoning on the backend
    Reasoning,
    /// Any other boolean connection option, by name
    Named(String),
}

impl std::str::FromStr for ConfigOption {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err("Option name must not be empty".to_string());
        }
        match name.to_lowercase().as_str() {
            "reasoning" => Ok(ConfigOption::Reasoning),
            _ => Ok(ConfigOption::Named(name.to_string())),
        }
    }
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOption::Reasoning => write!(f, "reasoning"),
            ConfigOption::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Description of how to connect to the backing resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Server endpoint, e.g. `http://localhost:5820`
    pub endpoint: String,
    /// Database name on the server
    pub database: String,
    pub credentials: Option<Credentials>,
    /// Reasoning enabled for connections from this config
    pub reasoning: bool,
    /// Additional boolean connection options
    pub options: BTreeMap<String, bool>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "memory://local".to_string(),
            database: "default".to_string(),
            credentials: None,
            reasoning: false,
            options: BTreeMap::new(),
        }
    }
}

impl ResourceConfig {
    pub fn new(endpoint: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    /// Copy of this config with `option` set to `value`
    pub fn with_option(&self, option: &ConfigOption, value: bool) -> Self {
        let mut next = self.clone();
        match option {
            ConfigOption::Reasoning => next.reasoning = value,
            ConfigOption::Named(name) => {
                next.options.insert(name.clone(), value);
            }
        }
        next
    }

    /// Current value of `option`; unset named options read as `false`
    pub fn option(&self, option: &ConfigOption) -> bool {
        match option {
            ConfigOption::Reasoning => self.reasoning,
            ConfigOption::Named(name) => self.options.get(name).copied().unwrap_or(false),
        }
    }

    /// Check the fields a pool needs before it can be created
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(BrokerError::Config("endpoint must not be empty".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(BrokerError::Config("database must not be empty".to_string()));
        }
        if let Some(credentials) = &self.credentials {
            if credentials.username.trim().is_empty() {
                return Err(BrokerError::Config("username must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.endpoint.trim_end_matches('/'), self.database)?;
        if let Some(credentials) = &self.credentials {
            write!(f, " as {}", credentials.username)?;
        }
        if self.reasoning {
            write!(f, " (reasoning)")?;
        }
        Ok(())
    }
}

/// Pool sizing and behavior
///
/// Opaque to the broker: it is handed unchanged to the
/// [`PoolFactory`](crate::pool::PoolFactory) that builds the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connection settings every pooled connection is opened with
    pub resource: ResourceConfig,
    /// Connections opened eagerly when the pool is created
    pub min_idle: usize,
    /// Idle connections retained on release; surplus connections are closed
    pub max_idle: usize,
    /// Upper bound on connections open at once
    pub max_pool: usize,
    /// How long `obtain` waits for a free connection when the pool is exhausted
    pub blocking_wait_ms: u64,
    /// Idle connections older than this are discarded instead of reused
    pub expiration_ms: u64,
    /// Fail `obtain` immediately instead of waiting when exhausted
    pub no_wait: bool,
}

impl PoolConfig {
    pub const DEFAULT_MIN_IDLE: usize = 1;
    pub const DEFAULT_MAX_IDLE: usize = 100;
    pub const DEFAULT_MAX_POOL: usize = 1000;
    pub const DEFAULT_BLOCKING_WAIT_MS: u64 = 5_000;
    pub const DEFAULT_EXPIRATION_MS: u64 = 3_600_000;

    /// Derive a pool configuration from connection settings
    ///
    /// Deterministic: equal inputs always produce equal outputs.
    pub fn using(resource: &ResourceConfig) -> Self {
        Self {
            resource: resource.clone(),
            min_idle: Self::DEFAULT_MIN_IDLE,
            max_idle: Self::DEFAULT_MAX_IDLE,
            max_pool: Self::DEFAULT_MAX_POOL,
            blocking_wait_ms: Self::DEFAULT_BLOCKING_WAIT_MS,
            expiration_ms: Self::DEFAULT_EXPIRATION_MS,
            no_wait: false,
        }
    }

    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_max_pool(mut self, max_pool: usize) -> Self {
        self.max_pool = max_pool;
        self
    }

    pub fn with_blocking_wait_ms(mut self, blocking_wait_ms: u64) -> Self {
        self.blocking_wait_ms = blocking_wait_ms;
        self
    }

    pub fn with_expiration_ms(mut self, expiration_ms: u64) -> Self {
        self.expiration_ms = expiration_ms;
        self
    }

    pub fn with_no_wait(mut self, no_wait: bool) -> Self {
        self.no_wait = no_wait;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.resource.validate()?;
        if self.max_pool == 0 {
            return Err(BrokerError::Config("max_pool must be at least 1".to_string()));
        }
        if self.min_idle > self.max_pool {
            return Err(BrokerError::Config(format!(
                "min_idle ({}) exceeds max_pool ({})",
                self.min_idle, self.max_pool
            )));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::using(&ResourceConfig::default())
    }
}

/// Options governing the broker itself rather than the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerOptions {
    /// Acquire and release one connection before tearing a pool down for
    /// reconfiguration; a failed probe leaves the old pool in place
    pub probe_before_reconfigure: bool,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            probe_before_reconfigure: true,
        }
    }
}

/// Complete broker configuration document
///
/// ```json
/// {
///   "resource": { "endpoint": "http://localhost:5820", "database": "people" },
///   "pool": { "max_pool": 8 },
///   "broker": { "probe_before_reconfigure": false }
/// }
/// ```
///
/// A missing `pool` section means the pool config is derived from
/// `resource` at initialization. A present one may omit `resource`, in which
/// case it is filled from the top-level `resource`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSettings {
    #[serde(default)]
    pub resource: ResourceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolSection>,
    #[serde(default)]
    pub broker: BrokerOptions,
}

/// `pool` section of [`BrokerSettings`]; unset fields take derived defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_idle: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pool: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_wait_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_wait: Option<bool>,
}

impl BrokerSettings {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let settings: BrokerSettings = serde_json::from_str(text)?;
        settings.resource.validate()?;
        Ok(settings)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded broker settings from {:?}", path.as_ref());
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Explicit pool configuration, if the document has a `pool` section
    pub fn pool_config(&self) -> Option<PoolConfig> {
        let section = self.pool.as_ref()?;
        let derived = PoolConfig::using(&self.resource);
        Some(PoolConfig {
            min_idle: section.min_idle.unwrap_or(derived.min_idle),
            max_idle: section.max_idle.unwrap_or(derived.max_idle),
            max_pool: section.max_pool.unwrap_or(derived.max_pool),
            blocking_wait_ms: section.blocking_wait_ms.unwrap_or(derived.blocking_wait_ms),
            expiration_ms: section.expiration_ms.unwrap_or(derived.expiration_ms),
            no_wait: section.no_wait.unwrap_or(derived.no_wait),
            resource: derived.resource,
        })
    }

    /// Pool configuration the broker will run with
    pub fn effective_pool_config(&self) -> PoolConfig {
        self.pool_config()
            .unwrap_or_else(|| PoolConfig::using(&self.resource))
    }
}
