// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers for GraphBroker

use colored::Colorize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

use graphbroker::{
    map_rows, BrokerError, BrokerSettings, Credentials, MemoryFactory, ResourceBroker, Row,
    RowSource, SimpleRowMapper,
};

use super::commands::{CredentialOverrides, OutputFormat};
use super::output::ResultFormatter;

/// Handle the version command
pub fn handle_version() -> Result<(), Box<dyn Error>> {
    println!("{} {}", "graphbroker".bold(), env!("CARGO_PKG_VERSION"));
    println!("  backends: memory");
    Ok(())
}

/// Handle the config command
pub fn handle_config(
    config: Option<PathBuf>,
    overrides: &CredentialOverrides,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let mut settings = load_settings(config.as_deref(), overrides, false)?;
    if let Some(credentials) = settings.resource.credentials.as_mut() {
        credentials.password = "***".to_string();
    }

    if format == OutputFormat::Json {
        let document = serde_json::json!({
            "settings": settings,
            "effective_pool": settings.effective_pool_config(),
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let pool = settings.effective_pool_config();
    let source = if settings.pool.is_some() { "explicit" } else { "derived" };
    let entries = vec![
        ("endpoint".to_string(), settings.resource.endpoint.clone()),
        ("database".to_string(), settings.resource.database.clone()),
        ("user".to_string(), user_of(&settings)),
        ("reasoning".to_string(), settings.resource.reasoning.to_string()),
        ("options".to_string(), format_options(&settings)),
        ("pool config".to_string(), source.to_string()),
        ("min_idle".to_string(), pool.min_idle.to_string()),
        ("max_idle".to_string(), pool.max_idle.to_string()),
        ("max_pool".to_string(), pool.max_pool.to_string()),
        ("blocking_wait_ms".to_string(), pool.blocking_wait_ms.to_string()),
        ("expiration_ms".to_string(), pool.expiration_ms.to_string()),
        ("no_wait".to_string(), pool.no_wait.to_string()),
        (
            "probe_before_reconfigure".to_string(),
            settings.broker.probe_before_reconfigure.to_string(),
        ),
    ];
    println!("{}", ResultFormatter::format_report("Configuration", &entries, format)?);
    Ok(())
}

/// Handle the check command
///
/// Initializes a broker, probes one acquire/release round trip and tears it
/// down again.
pub fn handle_check(config: Option<PathBuf>, overrides: &CredentialOverrides) -> Result<(), Box<dyn Error>> {
    let settings = load_settings(config.as_deref(), overrides, true)?;
    let broker = ResourceBroker::from_settings(MemoryFactory::new(), &settings);

    println!("{}", format!("Checking {}", settings.resource).bold());

    broker.initialize()?;
    println!("  → Pool created (generation {})", broker.generation().unwrap_or(0));

    let start = Instant::now();
    let connection = broker.acquire()?;
    let connection_id = connection.id();
    broker.release(connection)?;
    let elapsed = start.elapsed();
    println!("  → Acquired and released connection {}", connection_id);

    let stats = broker.inspect_pool(|pool| pool.stats()).unwrap_or_default();
    let entries = vec![
        ("state".to_string(), broker.state().to_string()),
        ("generation".to_string(), broker.generation().unwrap_or(0).to_string()),
        ("round trip".to_string(), format!("{:.3} ms", elapsed.as_secs_f64() * 1000.0)),
        ("open".to_string(), stats.open.to_string()),
        ("idle".to_string(), stats.idle.to_string()),
        ("in use".to_string(), stats.in_use.to_string()),
    ];
    println!("{}", ResultFormatter::format_report("Pool", &entries, OutputFormat::Table)?);

    broker.destroy();
    println!("{}", "Broker is healthy".green());
    Ok(())
}

/// Handle the rows command
pub fn handle_rows(
    config: Option<PathBuf>,
    overrides: &CredentialOverrides,
    data: PathBuf,
    query: String,
    reasoning: Option<bool>,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let settings = load_settings(config.as_deref(), overrides, true)?;
    let factory = load_datasets(&data, &query)?;
    let broker = ResourceBroker::from_settings(factory, &settings);
    broker.initialize()?;

    if let Some(reasoning) = reasoning {
        log::info!("Reconfiguring reasoning = {}", reasoning);
        broker.set_reasoning(reasoning)?;
    }

    let rows = broker.execute(|connection| connection.select(&query).map_err(BrokerError::Query))?;
    let columns = column_order(&rows);
    let mapped = map_rows(&rows, &SimpleRowMapper);

    println!("{}", ResultFormatter::format_rows(&columns, &mapped, format)?);
    broker.destroy();
    Ok(())
}

/// An error and its causes, outermost first, joined with `: `
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn load_settings(
    path: Option<&Path>,
    overrides: &CredentialOverrides,
    prompt: bool,
) -> Result<BrokerSettings, Box<dyn Error>> {
    let mut settings = match path {
        Some(path) => BrokerSettings::from_json_file(path)
            .map_err(|e| format!("Failed to load settings from {:?}: {}", path, error_chain(&e)))?,
        None => BrokerSettings::default(),
    };

    if let Some(user) = &overrides.user {
        settings.resource.credentials = Some(Credentials::new(
            user.clone(),
            overrides.password.clone().unwrap_or_default(),
        ));
    } else if let (Some(password), Some(credentials)) =
        (&overrides.password, settings.resource.credentials.as_mut())
    {
        credentials.password = password.clone();
    }

    if prompt {
        if let Some(credentials) = settings.resource.credentials.as_mut() {
            if credentials.password.is_empty() && overrides.password.is_none() {
                print!("Password for {}: ", credentials.username);
                std::io::Write::flush(&mut std::io::stdout())?;
                credentials.password = rpassword::read_password()?;
            }
        }
    }

    Ok(settings)
}

/// Seed a memory backend from a data file
///
/// The file holds either an array of row objects, served under `query`, or
/// an object mapping query names to such arrays.
fn load_datasets(path: &Path, query: &str) -> Result<MemoryFactory, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read data file {:?}: {}", path, e))?;
    let document: serde_json::Value = serde_json::from_str(&text)?;

    let factory = MemoryFactory::new();
    match document {
        serde_json::Value::Array(items) => factory.add_dataset(query, parse_rows(query, items)?),
        serde_json::Value::Object(sets) => {
            for (name, value) in sets {
                match value {
                    serde_json::Value::Array(items) => {
                        let rows = parse_rows(&name, items)?;
                        factory.add_dataset(name, rows);
                    }
                    _ => return Err(format!("Result set '{}' must be an array of objects", name).into()),
                }
            }
        }
        _ => return Err("Data file must contain an array or an object of arrays".into()),
    }
    Ok(factory)
}

fn parse_rows(name: &str, items: Vec<serde_json::Value>) -> Result<Vec<Row>, Box<dyn Error>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(object) => Ok(Row::from_json_object(object)),
            _ => Err(format!("Row {} of '{}' is not an object", i, name).into()),
        })
        .collect()
}

/// Binding names in order of first appearance
fn column_order(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for name in row.names() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

fn user_of(settings: &BrokerSettings) -> String {
    settings
        .resource
        .credentials
        .as_ref()
        .map(|c| c.username.clone())
        .unwrap_or_else(|| "-".to_string())
}

fn format_options(settings: &BrokerSettings) -> String {
    if settings.resource.options.is_empty() {
        return "-".to_string();
    }
    settings
        .resource
        .options
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
