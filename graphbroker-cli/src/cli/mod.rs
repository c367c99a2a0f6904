// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for GraphBroker
//!
//! Inspects broker configuration, checks pool health, and runs result rows
//! through the row mapper against the in-memory backend.

pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{Cli, Commands};
pub use handlers::{error_chain, handle_check, handle_config, handle_rows, handle_version};
