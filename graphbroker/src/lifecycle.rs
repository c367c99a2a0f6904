// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Container lifecycle hooks
//!
//! Dependency-injection containers construct a component, set its
//! properties, call an initialization hook, and call a destruction hook when
//! the container closes. Components implement [`Lifecycle`] so a container can
//! drive them without knowing their concrete type.

use crate::error::Result;

/// Initialization and destruction callbacks invoked by a container
pub trait Lifecycle {
    /// Called once all properties are set
    fn after_properties_set(&self) -> Result<()>;

    /// Called when the container shuts down; must always complete
    fn destroy(&self);
}
