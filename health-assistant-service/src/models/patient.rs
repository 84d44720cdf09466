//! Patient record as stored in the `users` / `patients` collections.

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// A stored patient or user document. Only the fields the assistant reads are
/// modelled; everything else in the document is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Either an ObjectId or a plain string, depending on who wrote the record.
    #[serde(rename = "_id")]
    pub id: Bson,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form history: usually a string, sometimes a list of conditions.
    #[serde(
        rename = "medicalHistory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub medical_history: Option<Bson>,
}

impl PatientRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Bson::String(id.into()),
            name: None,
            medical_history: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_history(mut self, history: impl Into<Bson>) -> Self {
        self.medical_history = Some(history.into());
        self
    }

    /// String form of the `_id`, matching how callers pass identifiers.
    pub fn id_string(&self) -> String {
        match &self.id {
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Medical history rendered as prompt text. `None` when the field is
    /// absent, null, or empty.
    pub fn history_text(&self) -> Option<String> {
        let text = render(self.medical_history.as_ref()?);
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn render(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Null => String::new(),
        Bson::Array(items) => items
            .iter()
            .map(render)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};

    #[test]
    fn history_text_handles_strings_and_lists() {
        let record = PatientRecord::new("u1").with_history("diabetes");
        assert_eq!(record.history_text().as_deref(), Some("diabetes"));

        let record = PatientRecord::new("u2").with_history(vec![
            Bson::String("asthma".to_string()),
            Bson::String("hypertension".to_string()),
        ]);
        assert_eq!(
            record.history_text().as_deref(),
            Some("asthma, hypertension")
        );
    }

    #[test]
    fn empty_or_null_history_is_none() {
        assert_eq!(PatientRecord::new("u1").history_text(), None);
        assert_eq!(PatientRecord::new("u1").with_history("  ").history_text(), None);
        assert_eq!(
            PatientRecord::new("u1").with_history(Bson::Null).history_text(),
            None
        );
    }

    #[test]
    fn deserializes_camel_case_document_with_extra_fields() {
        let oid = ObjectId::new();
        let document = doc! {
            "_id": oid,
            "name": "Ada",
            "email": "ada@example.com",
            "medicalHistory": "diabetes",
        };

        let record: PatientRecord = mongodb::bson::from_document(document).unwrap();
        assert_eq!(record.id_string(), oid.to_hex());
        assert_eq!(record.name.as_deref(), Some("Ada"));
        assert_eq!(record.history_text().as_deref(), Some("diabetes"));
    }
}
