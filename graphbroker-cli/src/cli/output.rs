// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Output formatting for mapped rows and key/value reports

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::collections::HashMap;
use std::error::Error;

use super::commands::OutputFormat;

/// Renders mapped rows in the requested format
pub struct ResultFormatter;

impl ResultFormatter {
    /// Format string-mapped rows with the given column order
    pub fn format_rows(
        columns: &[String],
        rows: &[HashMap<String, String>],
        format: OutputFormat,
    ) -> Result<String, Box<dyn Error>> {
        match format {
            OutputFormat::Table => Ok(Self::rows_table(columns, rows)),
            OutputFormat::Json => Self::rows_json(columns, rows),
            OutputFormat::Csv => {
                let records = rows.iter().map(|row| {
                    columns
                        .iter()
                        .map(|c| row.get(c).map(String::as_str).unwrap_or(""))
                        .collect::<Vec<_>>()
                });
                write_csv(columns, records)
            }
        }
    }

    /// Two-column report of `(key, value)` pairs
    pub fn format_report(
        title: &str,
        entries: &[(String, String)],
        format: OutputFormat,
    ) -> Result<String, Box<dyn Error>> {
        match format {
            OutputFormat::Json => {
                let object: serde_json::Map<String, serde_json::Value> = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                Ok(serde_json::to_string_pretty(&object)?)
            }
            OutputFormat::Csv => write_csv(
                &["key", "value"],
                entries.iter().map(|(k, v)| [k.as_str(), v.as_str()]),
            ),
            OutputFormat::Table => {
                let mut table = new_table();
                table.set_header(vec![title.to_string(), String::new()]);
                for (k, v) in entries {
                    table.add_row(vec![k.clone(), v.clone()]);
                }
                Ok(table.to_string())
            }
        }
    }

    fn rows_table(columns: &[String], rows: &[HashMap<String, String>]) -> String {
        let mut table = new_table();
        table.set_header(columns.to_vec());
        for row in rows {
            table.add_row(
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect::<Vec<_>>(),
            );
        }
        format!("{}\n({} rows)", table, rows.len())
    }

    fn rows_json(columns: &[String], rows: &[HashMap<String, String>]) -> Result<String, Box<dyn Error>> {
        let array: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = columns
                    .iter()
                    .filter_map(|c| {
                        row.get(c)
                            .map(|v| (c.clone(), serde_json::Value::String(v.clone())))
                    })
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&array)?)
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Header plus one record per item, quoted where needed
fn write_csv<H, R, I, F>(header: H, records: R) -> Result<String, Box<dyn Error>>
where
    H: IntoIterator,
    H::Item: AsRef<[u8]>,
    R: IntoIterator<Item = I>,
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(header)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|e| format!("Failed to get CSV output: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}
