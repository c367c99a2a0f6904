// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared test helpers: a recording pool backend with fault injection

#![allow(dead_code)]

use graphbroker::{BackendError, Pool, PoolConfig, PoolFactory};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Once};

static INIT: Once = Once::new();

/// Initialize logging for tests (call once)
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Backend call observed by the recording pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created { pool: u64 },
    ObtainEntered { pool: u64 },
    Obtained { pool: u64, connection: u64 },
    Released { pool: u64, connection: u64 },
    ShutDown { pool: u64 },
}

/// Switches that make backend calls fail
#[derive(Default)]
pub struct Faults {
    pub create: AtomicBool,
    pub obtain: AtomicBool,
    pub release: AtomicBool,
    pub shutdown: AtomicBool,
}

impl Faults {
    fn check(flag: &AtomicBool, what: &str) -> Result<(), BackendError> {
        if flag.load(Ordering::SeqCst) {
            Err(format!("injected {} failure", what).into())
        } else {
            Ok(())
        }
    }
}

/// Two-phase rendezvous: the next `obtain` waits on the barrier once on
/// entry and once more before returning
pub type Gate = Arc<Barrier>;

#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<Event>>>,
    pub configs: Arc<Mutex<Vec<PoolConfig>>>,
    pub faults: Arc<Faults>,
    gate: Arc<Mutex<Option<Gate>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn configs(&self) -> Vec<PoolConfig> {
        self.configs.lock().clone()
    }

    /// Gate the next `obtain` on any pool from this recorder
    pub fn gate_next_obtain(&self) -> Gate {
        let gate = Arc::new(Barrier::new(2));
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

pub struct RecordingFactory {
    pub recorder: Recorder,
    next_pool: AtomicU64,
}

impl RecordingFactory {
    pub fn new() -> (Self, Recorder) {
        let recorder = Recorder::default();
        (
            Self {
                recorder: recorder.clone(),
                next_pool: AtomicU64::new(1),
            },
            recorder,
        )
    }
}

impl PoolFactory for RecordingFactory {
    type Pool = RecordingPool;

    fn create(&self, config: &PoolConfig) -> Result<RecordingPool, BackendError> {
        Faults::check(&self.recorder.faults.create, "create")?;
        let id = self.next_pool.fetch_add(1, Ordering::SeqCst);
        self.recorder.configs.lock().push(config.clone());
        self.recorder.record(Event::Created { pool: id });
        Ok(RecordingPool {
            id,
            recorder: self.recorder.clone(),
            next_connection: AtomicU64::new(1),
            shut_down: Arc::new(AtomicBool::new(false)),
        })
    }
}

pub struct RecordingPool {
    pub id: u64,
    recorder: Recorder,
    next_connection: AtomicU64,
    shut_down: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct RecordingConnection {
    pub pool: u64,
    pub id: u64,
    pool_shut_down: Arc<AtomicBool>,
}

impl RecordingConnection {
    /// Whether the pool that issued this connection has been shut down
    pub fn pool_is_shut_down(&self) -> bool {
        self.pool_shut_down.load(Ordering::SeqCst)
    }
}

impl Pool for RecordingPool {
    type Connection = RecordingConnection;

    fn obtain(&self) -> Result<RecordingConnection, BackendError> {
        self.recorder.record(Event::ObtainEntered { pool: self.id });
        let gate = self.recorder.gate.lock().take();
        if let Some(gate) = &gate {
            gate.wait();
            gate.wait();
        }

        Faults::check(&self.recorder.faults.obtain, "obtain")?;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(format!("pool {} is shut down", self.id).into());
        }

        let connection = RecordingConnection {
            pool: self.id,
            id: self.next_connection.fetch_add(1, Ordering::SeqCst),
            pool_shut_down: self.shut_down.clone(),
        };
        self.recorder.record(Event::Obtained {
            pool: self.id,
            connection: connection.id,
        });
        Ok(connection)
    }

    fn release(&self, connection: RecordingConnection) -> Result<(), BackendError> {
        Faults::check(&self.recorder.faults.release, "release")?;
        self.recorder.record(Event::Released {
            pool: connection.pool,
            connection: connection.id,
        });
        Ok(())
    }

    fn shutdown(&self) -> Result<(), BackendError> {
        self.shut_down.store(true, Ordering::SeqCst);
        self.recorder.record(Event::ShutDown { pool: self.id });
        Faults::check(&self.recorder.faults.shutdown, "shutdown")
    }
}
