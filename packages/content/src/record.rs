//! # Edit Records
//!
//! One record per content key: what kind of edit was made and the
//! payload needed to replay it.
//!
//! ## Design Principles
//!
//! 1. **Tagged union**: payloads are a closed enum discriminated by
//!    `kind`; the application layer matches exhaustively and an unknown
//!    kind can never reach it
//! 2. **Kind fidelity**: a record's kind matches the mutation last
//!    legitimately applied to its key; a text record is never
//!    reinterpreted as an image record
//! 3. **Flat wire shape**: serialized records are flat camelCase
//!    objects (`kind`, `text`, `src`, `backgroundImage`, ...) shared
//!    with non-Rust collaborators
//! 4. **Forward compatibility**: fields this version does not know are
//!    kept in `extra` and re-emitted on save
//!
//! Serialization is hand-rolled over `serde_json::Value` rather than
//! derived: per-kind type validation (a `text` record with a non-string
//! payload is corrupt) and unknown-field passthrough both need exact
//! control over which keys each kind consumes.

use crate::locator::Locator;
use serde_json::{Map, Value};
use thiserror::Error;

/// Wire names of the record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Text,
    ImageReference,
    BackgroundReference,
    Composite,
    Counter,
}

impl EditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditKind::Text => "text",
            EditKind::ImageReference => "image-reference",
            EditKind::BackgroundReference => "background-reference",
            EditKind::Composite => "composite",
            EditKind::Counter => "counter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(EditKind::Text),
            "image-reference" => Some(EditKind::ImageReference),
            "background-reference" => Some(EditKind::BackgroundReference),
            "composite" => Some(EditKind::Composite),
            "counter" => Some(EditKind::Counter),
            _ => None,
        }
    }
}

impl std::fmt::Display for EditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of an edit.
#[derive(Debug, Clone, PartialEq)]
pub enum EditPayload {
    Text {
        text: String,
    },
    ImageReference {
        src: String,
        alt: Option<String>,
    },
    BackgroundReference {
        background_image: String,
    },
    /// Title + description pair, e.g. a slide. Either sub-field may be
    /// absent; the absent one leaves its target untouched at apply time.
    Composite {
        title: Option<String>,
        description: Option<String>,
    },
    Counter {
        value: f64,
        suffix: Option<String>,
    },
}

impl EditPayload {
    pub fn kind(&self) -> EditKind {
        match self {
            EditPayload::Text { .. } => EditKind::Text,
            EditPayload::ImageReference { .. } => EditKind::ImageReference,
            EditPayload::BackgroundReference { .. } => EditKind::BackgroundReference,
            EditPayload::Composite { .. } => EditKind::Composite,
            EditPayload::Counter { .. } => EditKind::Counter,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Record has no kind")]
    MissingKind,

    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    #[error("Missing required field `{field}` for kind `{kind}`")]
    MissingField { kind: EditKindName, field: &'static str },

    #[error("Field `{field}` has the wrong type for kind `{kind}`")]
    WrongFieldType { kind: EditKindName, field: &'static str },

    #[error("Counter value is not a finite number")]
    NonFiniteCounter,
}

/// Owned kind name for error display (covers unknown kinds too).
pub type EditKindName = String;

/// A persisted edit, addressed by its content key in the map.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRecord {
    pub payload: EditPayload,
    pub locator: Option<Locator>,
    /// RFC 3339 creation/update time.
    pub timestamp: String,
    /// Collaborator-added fields preserved through save/load.
    pub extra: Map<String, Value>,
}

impl EditRecord {
    pub fn new(payload: EditPayload, locator: Option<Locator>, timestamp: String) -> Self {
        Self {
            payload,
            locator,
            timestamp,
            extra: Map::new(),
        }
    }

    pub fn kind(&self) -> EditKind {
        self.payload.kind()
    }

    /// Validate invariants the type system cannot carry. Used by the
    /// gateway before every write; a failing record is dropped
    /// individually, never fatally.
    pub fn validate(&self) -> Result<(), RecordError> {
        match &self.payload {
            EditPayload::Counter { value, .. } if !value.is_finite() => {
                Err(RecordError::NonFiniteCounter)
            }
            EditPayload::ImageReference { src, .. } if src.is_empty() => {
                Err(RecordError::MissingField {
                    kind: self.kind().to_string(),
                    field: "src",
                })
            }
            EditPayload::BackgroundReference { background_image } if background_image.is_empty() => {
                Err(RecordError::MissingField {
                    kind: self.kind().to_string(),
                    field: "backgroundImage",
                })
            }
            _ => Ok(()),
        }
    }

    /// Parse the flat wire shape. Fields consumed by the declared kind
    /// are type-checked; everything else lands in `extra`.
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let object = value.as_object().ok_or(RecordError::NotAnObject)?;

        let kind_str = object
            .get("kind")
            .and_then(|v| v.as_str())
            .ok_or(RecordError::MissingKind)?;
        let kind =
            EditKind::parse(kind_str).ok_or_else(|| RecordError::UnknownKind(kind_str.to_string()))?;

        let payload = match kind {
            EditKind::Text => EditPayload::Text {
                text: required_string(object, kind, "text")?,
            },
            EditKind::ImageReference => EditPayload::ImageReference {
                src: required_string(object, kind, "src")?,
                alt: optional_string(object, kind, "alt")?,
            },
            EditKind::BackgroundReference => EditPayload::BackgroundReference {
                background_image: required_string(object, kind, "backgroundImage")?,
            },
            EditKind::Composite => EditPayload::Composite {
                title: optional_string(object, kind, "title")?,
                description: optional_string(object, kind, "description")?,
            },
            EditKind::Counter => EditPayload::Counter {
                value: required_number(object, kind, "counterValue")?,
                suffix: optional_string(object, kind, "counterSuffix")?,
            },
        };

        // Locators are hints: a snapshot that no longer parses is
        // dropped, the record survives.
        let locator = match object.get("locator") {
            Some(v) => match serde_json::from_value::<Locator>(v.clone()) {
                Ok(l) => Some(l),
                Err(e) => {
                    tracing::debug!("discarding unparsable locator snapshot: {}", e);
                    None
                }
            },
            None => None,
        };

        let timestamp = object
            .get("timestamp")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let consumed = consumed_fields(kind);
        let extra: Map<String, Value> = object
            .iter()
            .filter(|(k, _)| !consumed.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            payload,
            locator,
            timestamp,
            extra,
        })
    }

    /// Emit the flat wire shape, `extra` fields included.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("kind".to_string(), Value::String(self.kind().as_str().to_string()));

        match &self.payload {
            EditPayload::Text { text } => {
                object.insert("text".to_string(), Value::String(text.clone()));
            }
            EditPayload::ImageReference { src, alt } => {
                object.insert("src".to_string(), Value::String(src.clone()));
                if let Some(alt) = alt {
                    object.insert("alt".to_string(), Value::String(alt.clone()));
                }
            }
            EditPayload::BackgroundReference { background_image } => {
                object.insert(
                    "backgroundImage".to_string(),
                    Value::String(background_image.clone()),
                );
            }
            EditPayload::Composite { title, description } => {
                if let Some(title) = title {
                    object.insert("title".to_string(), Value::String(title.clone()));
                }
                if let Some(description) = description {
                    object.insert("description".to_string(), Value::String(description.clone()));
                }
            }
            EditPayload::Counter { value, suffix } => {
                object.insert(
                    "counterValue".to_string(),
                    serde_json::json!(*value),
                );
                if let Some(suffix) = suffix {
                    object.insert("counterSuffix".to_string(), Value::String(suffix.clone()));
                }
            }
        }

        if let Some(locator) = &self.locator {
            if let Ok(v) = serde_json::to_value(locator) {
                object.insert("locator".to_string(), v);
            }
        }
        object.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.clone()),
        );

        for (k, v) in &self.extra {
            object.entry(k.clone()).or_insert_with(|| v.clone());
        }

        Value::Object(object)
    }
}

/// Keys owned by a kind on the wire; anything else is `extra`.
fn consumed_fields(kind: EditKind) -> &'static [&'static str] {
    match kind {
        EditKind::Text => &["kind", "text", "locator", "timestamp"],
        EditKind::ImageReference => &["kind", "src", "alt", "locator", "timestamp"],
        EditKind::BackgroundReference => &["kind", "backgroundImage", "locator", "timestamp"],
        EditKind::Composite => &["kind", "title", "description", "locator", "timestamp"],
        EditKind::Counter => &[
            "kind",
            "counterValue",
            "counterSuffix",
            "locator",
            "timestamp",
        ],
    }
}

fn required_string(
    object: &Map<String, Value>,
    kind: EditKind,
    field: &'static str,
) -> Result<String, RecordError> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(RecordError::WrongFieldType {
            kind: kind.to_string(),
            field,
        }),
        None => Err(RecordError::MissingField {
            kind: kind.to_string(),
            field,
        }),
    }
}

fn optional_string(
    object: &Map<String, Value>,
    kind: EditKind,
    field: &'static str,
) -> Result<Option<String>, RecordError> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(RecordError::WrongFieldType {
            kind: kind.to_string(),
            field,
        }),
    }
}

fn required_number(
    object: &Map<String, Value>,
    kind: EditKind,
    field: &'static str,
) -> Result<f64, RecordError> {
    match object.get(field) {
        Some(Value::Number(n)) => n.as_f64().ok_or(RecordError::WrongFieldType {
            kind: kind.to_string(),
            field,
        }),
        Some(_) => Err(RecordError::WrongFieldType {
            kind: kind.to_string(),
            field,
        }),
        None => Err(RecordError::MissingField {
            kind: kind.to_string(),
            field,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_record_round_trip() {
        let record = EditRecord::new(
            EditPayload::Text {
                text: "World".to_string(),
            },
            None,
            "2026-08-23T10:00:00Z".to_string(),
        );

        let value = record.to_value();
        assert_eq!(value["kind"], "text");
        assert_eq!(value["text"], "World");

        let parsed = EditRecord::from_value(&value).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_counter_wire_fields() {
        let record = EditRecord::new(
            EditPayload::Counter {
                value: 42.0,
                suffix: Some("+".to_string()),
            },
            None,
            String::new(),
        );

        let value = record.to_value();
        assert_eq!(value["counterValue"], json!(42.0));
        assert_eq!(value["counterSuffix"], "+");

        let parsed = EditRecord::from_value(&value).unwrap();
        assert_eq!(parsed.kind(), EditKind::Counter);
    }

    #[test]
    fn test_non_string_text_payload_is_corrupt() {
        let value = json!({ "kind": "text", "text": 7, "timestamp": "" });
        let err = EditRecord::from_value(&value).unwrap_err();
        assert_eq!(
            err,
            RecordError::WrongFieldType {
                kind: "text".to_string(),
                field: "text"
            }
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let value = json!({ "kind": "video-reference", "src": "a.mp4" });
        assert_eq!(
            EditRecord::from_value(&value).unwrap_err(),
            RecordError::UnknownKind("video-reference".to_string())
        );
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let value = json!({
            "kind": "text",
            "text": "Hi",
            "timestamp": "2026-08-23T10:00:00Z",
            "reviewState": { "approvedBy": "ops" }
        });

        let record = EditRecord::from_value(&value).unwrap();
        assert_eq!(record.extra.len(), 1);

        let emitted = record.to_value();
        assert_eq!(emitted["reviewState"]["approvedBy"], "ops");
        assert_eq!(emitted["text"], "Hi");
    }

    #[test]
    fn test_composite_with_single_sub_field() {
        let value = json!({ "kind": "composite", "title": "Summer sale" });
        let record = EditRecord::from_value(&value).unwrap();
        assert_eq!(
            record.payload,
            EditPayload::Composite {
                title: Some("Summer sale".to_string()),
                description: None
            }
        );
    }

    #[test]
    fn test_unparsable_locator_is_dropped_not_fatal() {
        let value = json!({
            "kind": "text",
            "text": "Hi",
            "locator": { "path": "not-an-array" }
        });
        let record = EditRecord::from_value(&value).unwrap();
        assert!(record.locator.is_none());
    }

    #[test]
    fn test_validate_rejects_non_finite_counter() {
        let record = EditRecord::new(
            EditPayload::Counter {
                value: f64::NAN,
                suffix: None,
            },
            None,
            String::new(),
        );
        assert_eq!(record.validate().unwrap_err(), RecordError::NonFiniteCounter);
    }
}
