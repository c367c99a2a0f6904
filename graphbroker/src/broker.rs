// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Resource broker: lifecycle management for one connection pool
//!
//! A [`ResourceBroker`] owns at most one live pool and mediates every
//! acquire, release and shutdown against it. Its lifecycle is:
//!
//! ```text
//!   Uninitialized --initialize()--> Ready --destroy()--> Destroyed
//!        ^                            |
//!        +--------shutdown()----------+
//! ```
//!
//! `reconfigure_option` replaces the pool of a Ready broker with a new
//! generation built from an updated [`ResourceConfig`].
//!
//! # Concurrency
//!
//! State lives behind a `parking_lot::RwLock`. `acquire` and `release` hold a
//! shared lock for the duration of the pool call; lifecycle operations take
//! the exclusive lock, so a pool is never shut down underneath an `acquire`
//! that is still running against it. `reconfigure_option` probes the pool
//! under an upgradable lock and only upgrades to exclusive for the swap. `release` reads recursively: a release
//! must be able to complete while a lifecycle operation is queued, since the
//! queued operation may itself be waiting on an `acquire` that only the
//! release can unblock.
//!
//! Connections carry the generation of the pool they came from. Releasing a
//! connection after its pool was replaced drops it instead of handing it to
//! the new pool.

use log::{debug, error, info, warn};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{BrokerOptions, BrokerSettings, ConfigOption, PoolConfig, ResourceConfig};
use crate::error::{BrokerError, Result, ShutdownWarning};
use crate::lifecycle::Lifecycle;
use crate::mapper::{map_rows, RowMapper};
use crate::pool::{ConnectionOf, Pool, PoolFactory, RowSource};

/// Observable lifecycle state of a broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    /// No live pool; configuration may be present
    Uninitialized,
    /// Pool live and serving connections
    Ready,
    /// Terminal; a new broker must be constructed
    Destroyed,
}

impl BrokerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerState::Uninitialized => "uninitialized",
            BrokerState::Ready => "ready",
            BrokerState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for BrokerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection checked out of a broker
///
/// Dereferences to the backend connection. Hand it back with
/// [`ResourceBroker::release`].
#[derive(Debug)]
pub struct PooledConnection<C> {
    connection: C,
    generation: u64,
}

impl<C> PooledConnection<C> {
    /// Generation of the pool this connection was obtained from
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Detach from the broker; the caller becomes responsible for the connection
    pub fn into_inner(self) -> C {
        self.connection
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.connection
    }
}

struct LivePool<P> {
    resource: ResourceConfig,
    pool_config: PoolConfig,
    pool: P,
    generation: u64,
}

enum Stage<P> {
    Uninitialized {
        resource: Option<ResourceConfig>,
        pool_config: Option<PoolConfig>,
    },
    Ready(LivePool<P>),
    Destroyed,
}

impl<P> Stage<P> {
    fn state(&self) -> BrokerState {
        match self {
            Stage::Uninitialized { .. } => BrokerState::Uninitialized,
            Stage::Ready(_) => BrokerState::Ready,
            Stage::Destroyed => BrokerState::Destroyed,
        }
    }
}

/// Pooled-connection broker with managed lifecycle
pub struct ResourceBroker<F: PoolFactory> {
    factory: F,
    options: BrokerOptions,
    stage: RwLock<Stage<F::Pool>>,
    generations: AtomicU64,
}

impl<F: PoolFactory> ResourceBroker<F> {
    /// Broker with no configuration yet; call [`configure`](Self::configure)
    pub fn new(factory: F) -> Self {
        Self::from_parts(factory, None, None)
    }

    /// Broker whose pool config will be derived from `resource`
    pub fn with_config(factory: F, resource: ResourceConfig) -> Self {
        Self::from_parts(factory, Some(resource), None)
    }

    /// Broker with an explicit pool configuration
    pub fn with_pool_config(factory: F, resource: ResourceConfig, pool_config: PoolConfig) -> Self {
        Self::from_parts(factory, Some(resource), Some(pool_config))
    }

    /// Broker configured from a settings document
    pub fn from_settings(factory: F, settings: &BrokerSettings) -> Self {
        Self::from_parts(factory, Some(settings.resource.clone()), settings.pool_config())
            .with_options(settings.broker)
    }

    fn from_parts(factory: F, resource: Option<ResourceConfig>, pool_config: Option<PoolConfig>) -> Self {
        Self {
            factory,
            options: BrokerOptions::default(),
            stage: RwLock::new(Stage::Uninitialized {
                resource,
                pool_config,
            }),
            generations: AtomicU64::new(0),
        }
    }

    pub fn with_options(mut self, options: BrokerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> BrokerOptions {
        self.options
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Store configuration; only valid before [`initialize`](Self::initialize)
    ///
    /// Without `pool_config`, one is derived from `resource` at initialization.
    pub fn configure(&self, resource: ResourceConfig, pool_config: Option<PoolConfig>) -> Result<()> {
        let mut stage = self.stage.write();
        match &*stage {
            Stage::Ready(_) => Err(BrokerError::AlreadyInitialized),
            Stage::Destroyed => Err(BrokerError::Destroyed),
            Stage::Uninitialized { .. } => {
                debug!("Configured broker for {}", resource);
                *stage = Stage::Uninitialized {
                    resource: Some(resource),
                    pool_config,
                };
                Ok(())
            }
        }
    }

    /// Create the pool and become Ready
    ///
    /// A no-op when already Ready, so repeated calls never leave two live pools.
    pub fn initialize(&self) -> Result<()> {
        let mut stage = self.stage.write();
        let (resource, pool_config) = match &*stage {
            Stage::Ready(live) => {
                debug!("Broker already initialized (generation {})", live.generation);
                return Ok(());
            }
            Stage::Destroyed => {
                error!("Cannot initialize a destroyed broker");
                return Err(BrokerError::Destroyed);
            }
            Stage::Uninitialized {
                resource,
                pool_config,
            } => (resource.clone(), pool_config.clone()),
        };

        let Some(resource) = resource else {
            error!("Cannot initialize broker: no resource configuration");
            return Err(BrokerError::NotConfigured);
        };
        let pool_config = pool_config.unwrap_or_else(|| {
            debug!("Deriving pool configuration from {}", resource);
            PoolConfig::using(&resource)
        });

        let live = self.create_pool(resource, pool_config)?;
        *stage = Stage::Ready(live);
        Ok(())
    }

    /// Take a connection from the live pool
    ///
    /// Never creates a pool on demand. Blocks as long as the pool's own
    /// admission policy blocks.
    pub fn acquire(&self) -> Result<PooledConnection<ConnectionOf<F>>> {
        let stage = self.stage.read();
        let live = match &*stage {
            Stage::Ready(live) => live,
            other => {
                let state = other.state();
                error!("Cannot acquire a connection: broker is {}", state);
                return Err(BrokerError::NotReady {
                    state: state.as_str(),
                });
            }
        };

        match live.pool.obtain() {
            Ok(connection) => Ok(PooledConnection {
                connection,
                generation: live.generation,
            }),
            Err(e) => {
                error!(
                    "Error obtaining connection from pool (generation {}): {}",
                    live.generation, e
                );
                Err(BrokerError::Acquisition(e))
            }
        }
    }

    /// Give a connection back to the pool it came from
    ///
    /// Without a live pool this is a no-op. A connection from an earlier pool
    /// generation is dropped rather than released into the current one.
    pub fn release(&self, connection: PooledConnection<ConnectionOf<F>>) -> Result<()> {
        let stage = self.stage.read_recursive();
        let live = match &*stage {
            Stage::Ready(live) => live,
            other => {
                debug!(
                    "Broker is {}; dropping connection from generation {}",
                    other.state(),
                    connection.generation
                );
                return Ok(());
            }
        };

        if connection.generation != live.generation {
            warn!(
                "Connection from pool generation {} released after replacement by generation {}; dropping it",
                connection.generation, live.generation
            );
            return Ok(());
        }

        live.pool.release(connection.connection).map_err(|e| {
            error!(
                "Error releasing connection to pool (generation {}): {}",
                live.generation, e
            );
            BrokerError::Release(e)
        })
    }

    /// Rebuild the pool with `option` set to `value`
    ///
    /// Steps: optional probe (acquire + release), shut the current pool down,
    /// derive a new [`ResourceConfig`] and [`PoolConfig`], create the new pool.
    /// A failed probe leaves the current pool in place. If the new pool
    /// cannot be created the broker is left Uninitialized with the new
    /// configuration stored.
    ///
    /// Callers must finish in-flight units of work first; connections still
    /// out when the pool is replaced are dropped on release.
    pub fn reconfigure_option(&self, option: ConfigOption, value: bool) -> Result<()> {
        // Releases must reach the pool while the probe waits on it.
        let stage = self.stage.upgradable_read();
        match &*stage {
            Stage::Ready(live) => {
                if self.options.probe_before_reconfigure {
                    Self::probe(live)?;
                }
            }
            other => {
                let state = other.state();
                error!("Cannot reconfigure {}: broker is {}", option, state);
                return Err(BrokerError::NotReady {
                    state: state.as_str(),
                });
            }
        }

        let mut stage = RwLockUpgradableReadGuard::upgrade(stage);
        let previous = match std::mem::replace(&mut *stage, Stage::Destroyed) {
            Stage::Ready(live) => live,
            other => {
                *stage = other;
                return Err(BrokerError::NotReady {
                    state: stage.state().as_str(),
                });
            }
        };

        info!(
            "Reconfiguring {} = {} (replacing pool generation {})",
            option, value, previous.generation
        );
        let resource = previous.resource.with_option(&option, value);
        let pool_config = PoolConfig::using(&resource);
        Self::shutdown_pool(previous.pool, previous.generation);

        *stage = Stage::Uninitialized {
            resource: Some(resource.clone()),
            pool_config: Some(pool_config.clone()),
        };
        let live = self.create_pool(resource, pool_config)?;
        *stage = Stage::Ready(live);
        Ok(())
    }

    /// Toggle reasoning on the live pool
    pub fn set_reasoning(&self, reasoning: bool) -> Result<()> {
        self.reconfigure_option(ConfigOption::Reasoning, reasoning)
    }

    /// Shut the pool down, keeping configuration
    ///
    /// Backend failures are logged, never returned. No-op without a live pool.
    pub fn shutdown(&self) {
        let mut stage = self.stage.write();
        Self::shutdown_stage(&mut stage);
    }

    /// Shut down and discard configuration; the broker cannot be reused
    pub fn destroy(&self) {
        let mut stage = self.stage.write();
        Self::shutdown_stage(&mut stage);
        if !matches!(*stage, Stage::Destroyed) {
            info!("Broker destroyed");
        }
        *stage = Stage::Destroyed;
    }

    /// Run `work` on a connection, releasing it afterwards whatever the outcome
    ///
    /// An error from `work` takes precedence over a release failure, which is
    /// then only logged.
    pub fn execute<T, W>(&self, work: W) -> Result<T>
    where
        W: FnOnce(&mut ConnectionOf<F>) -> Result<T>,
    {
        let mut connection = self.acquire()?;
        let outcome = work(&mut connection);
        let released = self.release(connection);

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                warn!("Ignoring release failure after failed unit of work: {}", release_error);
                Err(e)
            }
        }
    }

    /// Run `query` on a pooled connection and map every result row
    pub fn query<T, M>(&self, query: &str, mapper: &M) -> Result<Vec<T>>
    where
        ConnectionOf<F>: RowSource,
        M: RowMapper<T> + ?Sized,
    {
        self.execute(|connection| {
            let rows = connection.select(query).map_err(|e| {
                error!("Error executing query '{}': {}", query, e);
                BrokerError::Query(e)
            })?;
            debug!("Query '{}' returned {} rows", query, rows.len());
            Ok(map_rows(&rows, mapper))
        })
    }

    pub fn state(&self) -> BrokerState {
        self.stage.read().state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == BrokerState::Ready
    }

    /// Generation of the live pool; generations start at 1
    pub fn generation(&self) -> Option<u64> {
        match &*self.stage.read() {
            Stage::Ready(live) => Some(live.generation),
            _ => None,
        }
    }

    pub fn resource_config(&self) -> Option<ResourceConfig> {
        match &*self.stage.read() {
            Stage::Ready(live) => Some(live.resource.clone()),
            Stage::Uninitialized { resource, .. } => resource.clone(),
            Stage::Destroyed => None,
        }
    }

    pub fn pool_config(&self) -> Option<PoolConfig> {
        match &*self.stage.read() {
            Stage::Ready(live) => Some(live.pool_config.clone()),
            Stage::Uninitialized { pool_config, .. } => pool_config.clone(),
            Stage::Destroyed => None,
        }
    }

    /// Borrow the live pool, e.g. to read backend statistics
    pub fn inspect_pool<R>(&self, inspect: impl FnOnce(&F::Pool) -> R) -> Option<R> {
        match &*self.stage.read() {
            Stage::Ready(live) => Some(inspect(&live.pool)),
            _ => None,
        }
    }

    fn create_pool(&self, resource: ResourceConfig, pool_config: PoolConfig) -> Result<LivePool<F::Pool>> {
        let generation = self.generations.load(Ordering::SeqCst) + 1;
        debug!(
            "Creating connection pool (generation {}) for {}",
            generation, pool_config.resource
        );

        let pool = self.factory.create(&pool_config).map_err(|e| {
            error!("Error creating connection pool for {}: {}", pool_config.resource, e);
            BrokerError::PoolCreation(e)
        })?;

        self.generations.store(generation, Ordering::SeqCst);
        info!("Connection pool ready (generation {}) for {}", generation, resource);
        Ok(LivePool {
            resource,
            pool_config,
            pool,
            generation,
        })
    }

    fn probe(live: &LivePool<F::Pool>) -> Result<()> {
        let connection = live.pool.obtain().map_err(|e| {
            error!("Probe failed to obtain a connection (generation {}): {}", live.generation, e);
            BrokerError::Acquisition(e)
        })?;
        live.pool.release(connection).map_err(|e| {
            error!("Probe failed to release a connection (generation {}): {}", live.generation, e);
            BrokerError::Release(e)
        })?;
        debug!("Probe succeeded on pool generation {}", live.generation);
        Ok(())
    }

    fn shutdown_stage(stage: &mut Stage<F::Pool>) {
        match std::mem::replace(stage, Stage::Destroyed) {
            Stage::Ready(live) => {
                Self::shutdown_pool(live.pool, live.generation);
                *stage = Stage::Uninitialized {
                    resource: Some(live.resource),
                    pool_config: Some(live.pool_config),
                };
            }
            other => *stage = other,
        }
    }

    fn shutdown_pool(pool: F::Pool, generation: u64) {
        debug!("Shutting down connection pool (generation {})", generation);
        if let Err(source) = pool.shutdown() {
            let warning = ShutdownWarning { generation, source };
            warn!("{}: {}", warning, warning.source);
        }
    }
}

impl<F: PoolFactory> Lifecycle for ResourceBroker<F> {
    fn after_properties_set(&self) -> Result<()> {
        self.initialize()
    }

    fn destroy(&self) {
        ResourceBroker::destroy(self)
    }
}

impl<F: PoolFactory> Drop for ResourceBroker<F> {
    fn drop(&mut self) {
        Self::shutdown_stage(self.stage.get_mut());
    }
}

impl<F: PoolFactory> fmt::Debug for ResourceBroker<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBroker")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("options", &self.options)
            .finish()
    }
}
