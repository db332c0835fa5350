//! Input record shapes and record-to-document conversion.
//!
//! Input arrives in one of three closed shapes; conversion to the wire
//! [`Document`] happens synchronously before submission, so a conversion
//! failure surfaces before any write for that record is issued.

use serde::{Deserialize, Serialize};

use crate::errors::SinkError;

/// Wire-level JSON representation of one record as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(serde_json::Value);

impl Document {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Parse raw JSON text into a document.
    pub fn from_json_text(text: &str) -> Result<Self, SinkError> {
        serde_json::from_str(text)
            .map(Self)
            .map_err(|e| {
                SinkError::conversion("INVALID_DOCUMENT_JSON", format!("not valid JSON: {e}"))
            })
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for Document {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Tabular row: named JSON fields in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    fields: Vec<(String, serde_json::Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Serialize every field into one JSON object.
    pub fn into_json_object(self) -> serde_json::Value {
        serde_json::Value::Object(self.fields.into_iter().collect())
    }
}

/// The three accepted input shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Already a wire-ready document.
    Document(Document),
    /// Tabular row, converted per the root-field rule.
    Row(Row),
    /// Raw JSON text of one document.
    Opaque(String),
}

/// Convert one record to its wire document.
///
/// - a document passes through unchanged;
/// - a row with `root_field` set contributes only that field's string
///   content, parsed as the whole document body;
/// - a row without `root_field` serializes every field into a JSON object;
/// - an opaque value is parsed from its raw text.
pub fn to_document(record: Record, root_field: Option<&str>) -> Result<Document, SinkError> {
    match record {
        Record::Document(document) => Ok(document),
        Record::Row(row) => match root_field {
            Some(field) => {
                let value = row.get(field).ok_or_else(|| {
                    SinkError::conversion(
                        "ROOT_FIELD_MISSING",
                        format!("row has no field '{field}'"),
                    )
                })?;
                let text = value.as_str().ok_or_else(|| {
                    SinkError::conversion(
                        "ROOT_FIELD_NOT_TEXT",
                        format!("field '{field}' does not hold string content"),
                    )
                })?;
                Document::from_json_text(text)
            }
            None => Ok(Document::new(row.into_json_object())),
        },
        Record::Opaque(raw) => Document::from_json_text(&raw),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn sample_row() -> Row {
        Row::new()
            .with_field("id", json!("42"))
            .with_field("payload", json!(r#"{"id":"42","score":7}"#))
            .with_field("ignored", json!(true))
    }

    #[test]
    fn test_document_passes_through() {
        let doc = Document::new(json!({"id": "1"}));
        let converted = to_document(Record::Document(doc.clone()), None).unwrap();
        assert_eq!(converted, doc);
    }

    #[test]
    fn test_row_with_root_field_uses_only_that_field() {
        let converted = to_document(Record::Row(sample_row()), Some("payload")).unwrap();
        assert_eq!(converted.as_value(), &json!({"id": "42", "score": 7}));
    }

    #[test]
    fn test_row_without_root_field_serializes_all_fields() {
        let converted = to_document(Record::Row(sample_row()), None).unwrap();
        let object = converted.as_value().as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["id"], json!("42"));
        assert_eq!(object["ignored"], json!(true));
    }

    #[test]
    fn test_root_field_missing_is_conversion_error() {
        let row = Row::new().with_field("id", json!("1"));
        let err = to_document(Record::Row(row), Some("payload")).unwrap_err();
        assert_eq!(err.code, "ROOT_FIELD_MISSING");
        assert!(err.message.contains("payload"));
    }

    #[test]
    fn test_root_field_non_string_is_conversion_error() {
        let row = Row::new().with_field("payload", json!(17));
        let err = to_document(Record::Row(row), Some("payload")).unwrap_err();
        assert_eq!(err.code, "ROOT_FIELD_NOT_TEXT");
    }

    #[test]
    fn test_opaque_parses_raw_text() {
        let converted =
            to_document(Record::Opaque(r#"{"id":"9","kind":"event"}"#.to_string()), None).unwrap();
        assert_eq!(converted.as_value(), &json!({"id": "9", "kind": "event"}));
    }

    #[rstest]
    #[case::opaque_garbage(Record::Opaque("not json".to_string()))]
    #[case::row_root_garbage(
        Record::Row(Row::new().with_field("payload", json!("still not json")))
    )]
    fn test_invalid_json_is_conversion_error(#[case] record: Record) {
        let root = matches!(record, Record::Row(_)).then_some("payload");
        let err = to_document(record, root).unwrap_err();
        assert_eq!(err.code, "INVALID_DOCUMENT_JSON");
    }

    #[test]
    fn test_row_lookup_is_first_match() {
        let row = Row::new()
            .with_field("f", json!(1))
            .with_field("f", json!(2));
        assert_eq!(row.get("f"), Some(&json!(1)));
    }
}
