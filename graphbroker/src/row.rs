// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query result rows
//!
//! A [`Row`] is one result tuple: an ordered set of named [`Binding`]s.
//! Rows are produced per query iteration and handed to a
//! [`RowMapper`](crate::mapper::RowMapper); the broker never retains them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed value bound to a result variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// Resource identifier
    Iri(String),
    /// Blank node label
    BlankNode(String),
    /// Plain string literal
    String(String),
    /// Literal with an explicit datatype IRI
    Typed { lexical: String, datatype: String },
    /// Literal with a language tag
    LangString { lexical: String, language: String },
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Unbound / null
    Null,
}

impl Value {
    /// Textual representation of the value, without quoting or datatype
    pub fn string_value(&self) -> String {
        match self {
            Value::Iri(s) | Value::BlankNode(s) | Value::String(s) => s.clone(),
            Value::Typed { lexical, .. } | Value::LangString { lexical, .. } => lexical.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => String::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Iri(s) | Value::BlankNode(s) | Value::String(s) => Some(s),
            Value::Typed { lexical, .. } | Value::LangString { lexical, .. } => Some(lexical),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Typed { lexical, .. } => lexical.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Typed { lexical, .. } => lexical.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// JSON rendition used by [`JsonRowMapper`](crate::mapper::JsonRowMapper)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Null => serde_json::Value::Null,
            other => serde_json::Value::String(other.string_value()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Iri(s) => write!(f, "<{}>", s),
            Value::BlankNode(s) => write!(f, "_:{}", s),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Typed { lexical, datatype } => write!(f, "\"{}\"^^<{}>", lexical, datatype),
            Value::LangString { lexical, language } => write!(f, "\"{}\"@{}", lexical, language),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

/// One named value in a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub value: Value,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One result tuple
///
/// Bindings keep the order the backend produced them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    bindings: Vec<Binding>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row from bindings as delivered by a backend
    ///
    /// Names are expected to be unique; this is not checked.
    pub fn from_bindings(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    /// Append a binding, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.push(Binding::new(name, value));
        self
    }

    /// Value bound to `name`; with duplicate names the last binding wins,
    /// as in [`SimpleRowMapper`](crate::mapper::SimpleRowMapper)
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Row from a JSON object, one binding per member in document order
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            bindings: object
                .into_iter()
                .map(|(name, value)| Binding::new(name, Value::from(value)))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

impl FromIterator<Binding> for Row {
    fn from_iter<I: IntoIterator<Item = Binding>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_value_strips_syntax() {
        assert_eq!(Value::Iri("urn:a".to_string()).string_value(), "urn:a");
        assert_eq!(
            Value::Typed {
                lexical: "42".to_string(),
                datatype: "http://www.w3.org/2001/XMLSchema#int".to_string()
            }
            .string_value(),
            "42"
        );
        assert_eq!(
            Value::LangString {
                lexical: "chat".to_string(),
                language: "fr".to_string()
            }
            .string_value(),
            "chat"
        );
        assert_eq!(Value::Integer(7).string_value(), "7");
        assert_eq!(Value::Null.string_value(), "");
    }

    #[test]
    fn test_display_keeps_syntax() {
        assert_eq!(Value::Iri("urn:a".to_string()).to_string(), "<urn:a>");
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(
            Value::LangString {
                lexical: "chat".to_string(),
                language: "fr".to_string()
            }
            .to_string(),
            "\"chat\"@fr"
        );
    }

    #[test]
    fn test_row_preserves_order() {
        let row = Row::new().with("b", "2").with("a", "1").with("c", 3i64);
        let names: Vec<&str> = row.names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(row.get("c"), Some(&Value::Integer(3)));
        assert!(row.get("missing").is_none());
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_row_from_json_object() {
        let json: serde_json::Value =
            serde_json::json!({ "name": "Alice", "age": 30, "score": 1.5, "active": true, "nick": null });
        let row = match json {
            serde_json::Value::Object(map) => Row::from_json_object(map),
            _ => unreachable!(),
        };

        assert_eq!(row.get("name"), Some(&Value::String("Alice".to_string())));
        assert_eq!(row.get("age"), Some(&Value::Integer(30)));
        assert_eq!(row.get("score").and_then(Value::as_f64), Some(1.5));
        assert_eq!(row.get("active").and_then(Value::as_bool), Some(true));
        assert!(row.get("nick").unwrap().is_null());
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(Value::Integer(1).to_json(), serde_json::json!(1));
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::Iri("urn:x".to_string()).to_json(), serde_json::json!("urn:x"));
    }

    #[test]
    fn test_row_from_json_object_keeps_document_order() {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{ "name": "Alice", "age": 30, "city": "Berlin" }"#).unwrap();
        let row = Row::from_json_object(map);
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["name", "age", "city"]);
    }

    #[test]
    fn test_get_returns_last_duplicate() {
        let row = Row::new().with("x", "first").with("y", "2").with("x", "second");
        assert_eq!(row.get("x").map(Value::string_value), Some("second".to_string()));
        assert_eq!(row.len(), 3);
    }
}
