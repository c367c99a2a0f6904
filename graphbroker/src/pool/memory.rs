// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory pool backend
//!
//! Bounded blocking pool over connections that answer queries from named,
//! pre-seeded result sets. Best for: unit testing, local tooling.

use log::{debug, trace};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{Pool, PoolFactory, RowSource};
use crate::config::{Credentials, PoolConfig};
use crate::error::BackendError;
use crate::row::Row;

type Datasets = Arc<RwLock<HashMap<String, Vec<Row>>>>;

/// Factory for [`MemoryPool`]s sharing one set of seeded results
#[derive(Default)]
pub struct MemoryFactory {
    datasets: Datasets,
    account: Option<Credentials>,
    pools_created: AtomicU64,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the rows returned for `query`
    pub fn with_dataset(self, query: impl Into<String>, rows: Vec<Row>) -> Self {
        self.add_dataset(query, rows);
        self
    }

    /// Require these credentials when creating pools
    pub fn with_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.account = Some(Credentials::new(username, password));
        self
    }

    /// Seed or replace the rows for `query`; visible to live pools too
    pub fn add_dataset(&self, query: impl Into<String>, rows: Vec<Row>) {
        self.datasets.write().insert(query.into(), rows);
    }

    pub fn pools_created(&self) -> u64 {
        self.pools_created.load(Ordering::SeqCst)
    }

    fn authenticate(&self, config: &PoolConfig) -> Result<(), BackendError> {
        let Some(expected) = &self.account else {
            return Ok(());
        };
        match &config.resource.credentials {
            Some(given) if given == expected => Ok(()),
            Some(given) => Err(format!("authentication failed for user '{}'", given.username).into()),
            None => Err("credentials required".into()),
        }
    }
}

impl PoolFactory for MemoryFactory {
    type Pool = MemoryPool;

    fn create(&self, config: &PoolConfig) -> Result<MemoryPool, BackendError> {
        config.validate().map_err(|e| -> BackendError { Box::new(e) })?;
        self.authenticate(config)?;
        self.pools_created.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryPool::new(config.clone(), self.datasets.clone()))
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryPoolStats {
    /// Connections currently open (idle + in use)
    pub open: usize,
    pub idle: usize,
    pub in_use: usize,
    /// Connections opened over the pool's lifetime
    pub created_total: u64,
    pub shut_down: bool,
}

struct PoolInner {
    idle: VecDeque<(MemoryConnection, Instant)>,
    open: usize,
    created_total: u64,
    shut_down: bool,
}

/// Bounded blocking pool of [`MemoryConnection`]s
pub struct MemoryPool {
    id: Uuid,
    config: PoolConfig,
    datasets: Datasets,
    inner: Mutex<PoolInner>,
    available: Condvar,
}

impl MemoryPool {
    fn new(config: PoolConfig, datasets: Datasets) -> Self {
        let pool = Self {
            id: Uuid::new_v4(),
            inner: Mutex::new(PoolInner {
                idle: VecDeque::with_capacity(config.min_idle),
                open: 0,
                created_total: 0,
                shut_down: false,
            }),
            config,
            datasets,
            available: Condvar::new(),
        };

        {
            let mut inner = pool.inner.lock();
            for _ in 0..pool.config.min_idle {
                inner.idle.push_back((pool.open_connection(), Instant::now()));
                inner.open += 1;
                inner.created_total += 1;
            }
        }

        debug!(
            "Created memory pool {} for {} (min_idle={}, max_pool={})",
            pool.id, pool.config.resource, pool.config.min_idle, pool.config.max_pool
        );
        pool
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }

    pub fn stats(&self) -> MemoryPoolStats {
        let inner = self.inner.lock();
        MemoryPoolStats {
            open: inner.open,
            idle: inner.idle.len(),
            in_use: inner.open - inner.idle.len(),
            created_total: inner.created_total,
            shut_down: inner.shut_down,
        }
    }

    fn open_connection(&self) -> MemoryConnection {
        MemoryConnection {
            id: Uuid::new_v4(),
            pool_id: self.id,
            database: self.config.resource.database.clone(),
            reasoning: self.config.resource.reasoning,
            datasets: self.datasets.clone(),
            queries_run: 0,
        }
    }

    fn is_expired(&self, idle_since: Instant) -> bool {
        idle_since.elapsed() > Duration::from_millis(self.config.expiration_ms)
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("id", &self.id)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Pool for MemoryPool {
    type Connection = MemoryConnection;

    fn obtain(&self) -> Result<MemoryConnection, BackendError> {
        let deadline = Instant::now() + Duration::from_millis(self.config.blocking_wait_ms);
        let mut inner = self.inner.lock();

        loop {
            if inner.shut_down {
                return Err(format!("pool {} is shut down", self.id).into());
            }

            while let Some((connection, idle_since)) = inner.idle.pop_front() {
                if self.is_expired(idle_since) {
                    trace!("Discarding expired connection {}", connection.id);
                    inner.open -= 1;
                    continue;
                }
                return Ok(connection);
            }

            if inner.open < self.config.max_pool {
                inner.open += 1;
                inner.created_total += 1;
                return Ok(self.open_connection());
            }

            if self.config.no_wait {
                return Err(format!("pool {} exhausted ({} connections in use)", self.id, inner.open).into());
            }

            if self.available.wait_until(&mut inner, deadline).timed_out() {
                return Err(format!(
                    "timed out after {} ms waiting for a connection",
                    self.config.blocking_wait_ms
                )
                .into());
            }
        }
    }

    fn release(&self, connection: MemoryConnection) -> Result<(), BackendError> {
        if connection.pool_id != self.id {
            return Err(format!(
                "connection {} does not belong to pool {}",
                connection.id, self.id
            )
            .into());
        }

        let mut inner = self.inner.lock();
        if inner.shut_down || inner.idle.len() >= self.config.max_idle {
            inner.open = inner.open.saturating_sub(1);
        } else {
            inner.idle.push_back((connection, Instant::now()));
        }
        drop(inner);

        self.available.notify_one();
        Ok(())
    }

    fn shutdown(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        if !inner.shut_down {
            let closed = inner.idle.len();
            inner.idle.clear();
            inner.open -= closed;
            inner.shut_down = true;
            debug!("Shut down memory pool {} ({} idle connections closed)", self.id, closed);
        }
        drop(inner);

        self.available.notify_all();
        Ok(())
    }
}

/// Connection served by a [`MemoryPool`]
pub struct MemoryConnection {
    id: Uuid,
    pool_id: Uuid,
    database: String,
    reasoning: bool,
    datasets: Datasets,
    queries_run: u64,
}

impl MemoryConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pool_id(&self) -> Uuid {
        self.pool_id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Reasoning flag of the config this connection was opened with
    pub fn reasoning(&self) -> bool {
        self.reasoning
    }

    pub fn queries_run(&self) -> u64 {
        self.queries_run
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .field("pool_id", &self.pool_id)
            .field("database", &self.database)
            .field("reasoning", &self.reasoning)
            .finish()
    }
}

impl RowSource for MemoryConnection {
    fn select(&mut self, query: &str) -> Result<Vec<Row>, BackendError> {
        let query = query.trim();
        let rows = self
            .datasets
            .read()
            .get(query)
            .cloned()
            .ok_or_else(|| format!("unknown query '{}'", query))?;
        self.queries_run += 1;
        Ok(rows)
    }
}
