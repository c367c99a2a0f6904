// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command definitions for GraphBroker

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Info, warnings, and errors
    Info,
    /// Debug messages and above (verbose)
    Debug,
    /// All messages including trace (very verbose)
    Trace,
    /// Disable all logging
    Off,
}

impl LogLevel {
    /// Convert to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

/// GraphBroker CLI - pooled graph-database connections
#[derive(Parser)]
#[command(name = "graphbroker")]
#[command(about = "GraphBroker - pooled graph-database connections with managed lifecycle")]
#[command(version)]
pub struct Cli {
    /// Username, overriding the configuration file
    #[arg(short = 'u', long = "user", global = true)]
    pub user: Option<String>,

    /// Password (prompted for when a user is set without one)
    #[arg(short = 'p', long = "password", global = true)]
    pub password: Option<String>,

    /// Set log level (error, warn, info, debug, trace, off)
    #[arg(short = 'l', long = "log-level", global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Verbose mode (equivalent to --log-level debug)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Credentials given on the command line
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Cli {
    pub fn credential_overrides(&self) -> CredentialOverrides {
        CredentialOverrides {
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show detailed version information
    Version,

    /// Show the resource configuration and the pool configuration derived from it
    Config {
        /// Broker settings file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Initialize a broker and probe it with one acquire/release round trip
    Check {
        /// Broker settings file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Serve rows from a JSON data file through the broker and map them
    Rows {
        /// Broker settings file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Data file: an array of row objects, or an object of named row arrays
        #[arg(short, long)]
        data: PathBuf,

        /// Named result set to run
        #[arg(short, long, default_value = "rows")]
        query: String,

        /// Reconfigure reasoning before running the query
        #[arg(long)]
        reasoning: Option<bool>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}
