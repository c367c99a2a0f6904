// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! GraphBroker command-line entry point

mod cli;

use clap::Parser;
use colored::Colorize;

use cli::{error_chain, handle_check, handle_config, handle_rows, handle_version, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let level = match (cli.log_level, cli.verbose) {
        (Some(level), _) => level.to_level_filter(),
        (None, true) => log::LevelFilter::Debug,
        (None, false) => log::LevelFilter::Warn,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let overrides = cli.credential_overrides();
    let result = match cli.command {
        Commands::Version => handle_version(),
        Commands::Config { config, format } => handle_config(config, &overrides, format),
        Commands::Check { config } => handle_check(config, &overrides),
        Commands::Rows {
            config,
            data,
            query,
            reasoning,
            format,
        } => handle_rows(config, &overrides, data, query, reasoning, format),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), error_chain(e.as_ref()));
        std::process::exit(1);
    }
}
