// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! GraphBroker - pooled graph-database connections with managed lifecycle
//!
//! GraphBroker sits between an application and a graph-database client's
//! connection pool. It owns the pool's lifecycle, translates backend failures
//! into one error type, and converts result rows into application values.
//!
//! # Quick Start
//!
//! ```no_run
//! use graphbroker::{MemoryFactory, ResourceBroker, ResourceConfig, Row, SimpleRowMapper};
//!
//! # fn main() -> graphbroker::Result<()> {
//! let factory = MemoryFactory::new()
//!     .with_dataset("SELECT ?name", vec![Row::new().with("name", "Alice")]);
//! let broker = ResourceBroker::with_config(
//!     factory,
//!     ResourceConfig::new("memory://local", "people"),
//! );
//! broker.initialize()?;
//!
//! let connection = broker.acquire()?;
//! // ... run queries ...
//! broker.release(connection)?;
//!
//! let rows = broker.query("SELECT ?name", &SimpleRowMapper)?;
//! assert_eq!(rows[0]["name"], "Alice");
//! broker.destroy();
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`broker`] - Pool lifecycle, acquire/release, reconfiguration
//! - [`config`] - Resource, pool and broker configuration
//! - [`pool`] - Backend traits and the in-memory backend
//! - [`row`] - Result rows and values
//! - [`mapper`] - Row mapping strategies
//! - [`lifecycle`] - Container lifecycle hooks
//! - [`error`] - Error types and handling

pub mod broker;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mapper;
pub mod pool;
pub mod row;

// Re-export main types for convenience
pub use broker::{BrokerState, PooledConnection, ResourceBroker};
pub use config::{BrokerOptions, BrokerSettings, ConfigOption, Credentials, PoolConfig, ResourceConfig};
pub use error::{BackendError, BrokerError, Result, ShutdownWarning};
pub use lifecycle::Lifecycle;
pub use mapper::{map_rows, DeserializeRowMapper, JsonRowMapper, RowMapper, SimpleRowMapper};
pub use pool::{ConnectionOf, MemoryConnection, MemoryFactory, MemoryPool, Pool, PoolFactory, RowSource};
pub use row::{Binding, Row, Value};
