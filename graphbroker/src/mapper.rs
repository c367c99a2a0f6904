// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row mapping strategies
//!
//! A [`RowMapper`] turns one [`Row`] into an application value. Mappers take
//! `&self` and `&Row`: one instance serves a whole result iteration and
//! cannot alter the rows it is given.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::{BrokerError, Result};
use crate::row::Row;

/// Strategy converting a result row into a `T`
pub trait RowMapper<T> {
    fn map_row(&self, row: &Row) -> T;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&Row) -> T,
{
    fn map_row(&self, row: &Row) -> T {
        self(row)
    }
}

/// Apply one mapper to every row, in order
pub fn map_rows<'r, T, M, I>(rows: I, mapper: &M) -> Vec<T>
where
    M: RowMapper<T> + ?Sized,
    I: IntoIterator<Item = &'r Row>,
{
    rows.into_iter().map(|row| mapper.map_row(row)).collect()
}

/// Maps a row to `binding name -> textual value`
///
/// Duplicate names in a malformed row resolve to the last binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleRowMapper;

impl RowMapper<HashMap<String, String>> for SimpleRowMapper {
    fn map_row(&self, row: &Row) -> HashMap<String, String> {
        let mut result = HashMap::with_capacity(row.len());
        for binding in row {
            result.insert(binding.name.clone(), binding.value.string_value());
        }
        result
    }
}

/// Maps a row to a JSON object keeping value types
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRowMapper;

impl RowMapper<serde_json::Value> for JsonRowMapper {
    fn map_row(&self, row: &Row) -> serde_json::Value {
        let mut object = serde_json::Map::with_capacity(row.len());
        for binding in row {
            object.insert(binding.name.clone(), binding.value.to_json());
        }
        serde_json::Value::Object(object)
    }
}

/// Deserializes each row into `T` through its JSON form
///
/// Field names of `T` match binding names.
pub struct DeserializeRowMapper<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> DeserializeRowMapper<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for DeserializeRowMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> RowMapper<Result<T>> for DeserializeRowMapper<T> {
    fn map_row(&self, row: &Row) -> Result<T> {
        let json = JsonRowMapper.map_row(row);
        serde_json::from_value(json).map_err(|e| {
            log::warn!("Failed to map row into {}: {}", std::any::type_name::<T>(), e);
            BrokerError::Mapping(e.to_string())
        })
    }
}
