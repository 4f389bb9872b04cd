//! # Content Map
//!
//! The unit of persistence: content key → edit record. Parsing isolates
//! corruption per entry: a malformed record is dropped with a
//! diagnostic while every other entry survives.

use crate::record::EditRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Structured note surfaced to collaborators instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Content key the note concerns, when entry-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn for_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            key: None,
            message: message.into(),
        }
    }
}

/// Mapping from content key to edit record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentMap {
    entries: HashMap<String, EditRecord>,
}

impl ContentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, record: EditRecord) {
        self.entries.insert(key.into(), record);
    }

    pub fn get(&self, key: &str) -> Option<&EditRecord> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<EditRecord> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EditRecord)> {
        self.entries.iter()
    }

    pub fn retain(&mut self, f: impl FnMut(&String, &mut EditRecord) -> bool) {
        self.entries.retain(f);
    }

    /// Parse a serialized map. Never fails: a non-object document or
    /// unparsable JSON yields an empty map plus a diagnostic, and each
    /// malformed entry is dropped individually.
    pub fn parse(payload: &str) -> (Self, Vec<Diagnostic>) {
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => Self::from_json(&value),
            Err(e) => (
                Self::new(),
                vec![Diagnostic::general(format!("content map is not valid JSON: {}", e))],
            ),
        }
    }

    pub fn from_json(value: &Value) -> (Self, Vec<Diagnostic>) {
        let mut map = Self::new();
        let mut diagnostics = Vec::new();

        let Some(object) = value.as_object() else {
            diagnostics.push(Diagnostic::general("content map is not a JSON object"));
            return (map, diagnostics);
        };

        for (key, entry) in object {
            match EditRecord::from_value(entry) {
                Ok(record) => {
                    map.entries.insert(key.clone(), record);
                }
                Err(e) => {
                    diagnostics.push(Diagnostic::for_key(key, format!("entry dropped: {}", e)));
                }
            }
        }

        (map, diagnostics)
    }

    /// Serialize to the wire object. Keys come out sorted, so saving the
    /// same map twice produces byte-identical output.
    pub fn to_json(&self) -> Value {
        let object: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, r)| (k.clone(), r.to_value()))
            .collect();
        Value::Object(object)
    }

    pub fn to_string_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_else(|_| "{}".to_string())
    }
}
