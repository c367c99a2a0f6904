// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pluggable connection pool backends
//!
//! This module provides:
//! - [`Pool`]: a live pool handing out connections
//! - [`PoolFactory`]: builds a pool from a [`PoolConfig`]
//! - [`RowSource`]: connections able to run a query and return rows
//! - [`memory`]: in-memory backend for tests and local tooling
//!
//! Pools are expected to be safe for concurrent `obtain`/`release` from many
//! threads. Blocking, ordering and fairness are whatever the pool provides.

pub mod memory;

use crate::config::PoolConfig;
use crate::error::BackendError;
use crate::row::Row;

pub use memory::{MemoryConnection, MemoryFactory, MemoryPool, MemoryPoolStats};

/// Live connection pool
pub trait Pool: Send + Sync {
    type Connection: Send;

    /// Take a connection, blocking if the pool's admission policy requires it
    fn obtain(&self) -> Result<Self::Connection, BackendError>;

    /// Give a connection back
    fn release(&self, connection: Self::Connection) -> Result<(), BackendError>;

    /// Close every connection; the pool is unusable afterwards
    fn shutdown(&self) -> Result<(), BackendError>;
}

/// Builds pools from configuration
pub trait PoolFactory: Send + Sync {
    type Pool: Pool;

    fn create(&self, config: &PoolConfig) -> Result<Self::Pool, BackendError>;
}

/// Connection that can execute a query and return its rows
///
/// Query syntax is whatever the backend speaks.
pub trait RowSource {
    fn select(&mut self, query: &str) -> Result<Vec<Row>, BackendError>;
}

/// Connection type handed out by a factory's pools
pub type ConnectionOf<F> = <<F as PoolFactory>::Pool as Pool>::Connection;
