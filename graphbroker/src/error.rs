// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for GraphBroker

use thiserror::Error;

/// Error reported by a wrapped pool or connection
///
/// Backends are external collaborators, so their failures are carried
/// opaquely and exposed through [`std::error::Error::source`].
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Main error type for broker operations
#[derive(Error, Debug)]
pub enum BrokerError {
    /// No live pool to serve the request
    #[error("Broker is not ready (state: {state})")]
    NotReady { state: &'static str },

    /// Backend failure while obtaining a connection
    #[error("Error obtaining connection from pool")]
    Acquisition(#[source] BackendError),

    /// Backend failure while returning a connection
    #[error("Error releasing connection to pool")]
    Release(#[source] BackendError),

    /// Backend failure while running work on an acquired connection
    #[error("Query error")]
    Query(#[source] BackendError),

    /// Backend failure while creating a pool
    #[error("Error creating connection pool")]
    PoolCreation(#[source] BackendError),

    /// Initialization requested without a resource configuration
    #[error("No resource configuration has been provided")]
    NotConfigured,

    /// Configuration change requested while a pool is live
    #[error("Broker is already initialized; shut it down before reconfiguring")]
    AlreadyInitialized,

    /// Lifecycle call on a destroyed broker
    #[error("Broker has been destroyed")]
    Destroyed,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row could not be converted into the requested type
    #[error("Row mapping error: {0}")]
    Mapping(String),

    /// Serialization/deserialization errors
    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl BrokerError {
    /// Backend cause, when this error wraps one
    pub fn backend_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            BrokerError::Acquisition(e)
            | BrokerError::Release(e)
            | BrokerError::Query(e)
            | BrokerError::PoolCreation(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Backend failure during pool shutdown
///
/// Never returned to callers. Shutdown always completes; the warning is
/// only logged.
#[derive(Error, Debug)]
#[error("Error shutting down connection pool (generation {generation})")]
pub struct ShutdownWarning {
    pub generation: u64,
    #[source]
    pub source: BackendError,
}
