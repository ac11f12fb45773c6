//! Data model: students, schedule blobs, and the export bundle.
//!
//! Wire names are camelCase throughout — the formats here must keep
//! reading data previously saved by older releases, and must export
//! bundles older releases can re-import.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Export bundle format version.
pub const EXPORT_VERSION: u32 = 1;

/// Returns the current time as milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Returns the current time as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// One schedule-owning entity: a tab in the editor.
///
/// Identity is `storage_key`; `id` mirrors it for the document store's
/// primary-key requirement. `display_order` defines the tab order in
/// listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Unique identifier; mirrors `storage_key`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stable slug used as the storage primary key.
    pub storage_key: String,
    /// Position in tab listings.
    #[serde(default)]
    pub display_order: u32,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
}

impl Student {
    /// Creates a student whose `id` mirrors its storage key and whose
    /// creation time is now.
    #[must_use]
    pub fn new(name: impl Into<String>, storage_key: impl Into<String>, display_order: u32) -> Self {
        let storage_key = storage_key.into();
        Self {
            id: storage_key.clone(),
            name: name.into(),
            storage_key,
            display_order,
            created_at: now_ms(),
        }
    }

    /// Returns a copy with the defaults the store guarantees: a non-empty
    /// `id` and a non-zero `created_at`.
    #[must_use]
    pub(crate) fn normalized(&self) -> Self {
        let mut out = self.clone();
        if out.id.is_empty() {
            out.id = out.storage_key.clone();
        }
        if out.created_at == 0 {
            out.created_at = now_ms();
        }
        out
    }
}

/// One subject row: a name plus per-weekday completion marks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Subject {
    /// Subject name.
    pub name: String,
    /// Weekday code (`M`, `T`, `W`, `Th`, `F`) to completion flag.
    #[serde(default)]
    pub days: BTreeMap<String, bool>,
}

/// The raw schedule blob a tab persists: current-week edits only.
///
/// Unknown fields round-trip through [`TabData::extra`] so this layer
/// never sheds data the editor wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TabData {
    /// Tab title; when present, saves also patch the owning student's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Curriculum year the stored edits belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Week (1..36 nominal) the stored edits belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    /// Student display name at save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Subject rows with per-day completion.
    #[serde(default)]
    pub subjects: Vec<Subject>,
    /// Indices into the curriculum default list the user deleted.
    #[serde(default)]
    pub removed_indices: Vec<u32>,
    /// Reading entries the user added.
    #[serde(default)]
    pub custom_readings: Vec<String>,
    /// Last save time, milliseconds since the Unix epoch. Store-assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Fields this layer does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl TabData {
    /// Builds the year/week-gated [`Schedule`] view of this blob.
    ///
    /// Returns `Some` only when the stored `(year, week)` pair exactly
    /// equals the requested pair; stored edits for a different pair are
    /// not applicable and yield `None`.
    #[must_use]
    pub fn schedule_for(&self, storage_key: &str, year: u32, week: u32) -> Option<Schedule> {
        if self.year != Some(year) || self.week != Some(week) {
            return None;
        }
        Some(Schedule {
            id: format!("{storage_key}-{year}-{week}"),
            student_id: storage_key.to_string(),
            year,
            week,
            notes: self.notes.clone(),
            subjects: self.subjects.clone(),
            removed_indices: self.removed_indices.clone(),
            custom_readings: self.custom_readings.clone(),
            updated_at: self.updated_at.unwrap_or_else(now_ms),
        })
    }
}

/// A stored schedule resolved for a specific `(year, week)` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// `"{storageKey}-{year}-{week}"`.
    pub id: String,
    /// Owning student's storage key.
    pub student_id: String,
    /// Curriculum year.
    pub year: u32,
    /// Week number.
    pub week: u32,
    /// Free-form notes.
    pub notes: String,
    /// Subject rows with per-day completion.
    pub subjects: Vec<Subject>,
    /// Indices into the curriculum default list the user deleted.
    pub removed_indices: Vec<u32>,
    /// Reading entries the user added.
    pub custom_readings: Vec<String>,
    /// Last save time, milliseconds since the Unix epoch.
    pub updated_at: i64,
}

/// The sole interchange format: full backup of every student and blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    /// Bundle format version; always [`EXPORT_VERSION`].
    pub version: u32,
    /// RFC 3339 export time.
    pub exported_at: String,
    /// Every student, in display order.
    pub students: Vec<Student>,
    /// Schedule blob per storage key, for students that have one.
    #[serde(default)]
    pub tabs: BTreeMap<String, TabData>,
}

impl ExportBundle {
    /// Assembles a bundle stamped with the current time.
    #[must_use]
    pub fn new(students: Vec<Student>, tabs: BTreeMap<String, TabData>) -> Self {
        Self {
            version: EXPORT_VERSION,
            exported_at: now_rfc3339(),
            students,
            tabs,
        }
    }

    /// Parses a bundle from raw JSON, failing fast on a missing shape.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::InvalidBundle`] if `students` is
    /// missing or the value does not deserialize as a bundle.
    pub fn parse(value: Value) -> crate::StoreResult<Self> {
        if value.get("students").is_none() {
            return Err(crate::StoreError::InvalidBundle(
                "missing students".to_string(),
            ));
        }
        serde_json::from_value(value)
            .map_err(|e| crate::StoreError::InvalidBundle(e.to_string()))
    }

    /// Parses a bundle from a JSON string, failing fast on a missing shape.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::InvalidBundle`] if the string is not
    /// JSON or the bundle shape is wrong.
    pub fn parse_str(raw: &str) -> crate::StoreResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| crate::StoreError::InvalidBundle(e.to_string()))?;
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tab_data_reads_legacy_json() {
        let raw = json!({
            "title": "Ada",
            "year": 3,
            "week": 7,
            "notes": "review poems",
            "subjects": [{"name": "Math", "days": {"M": true, "F": false}}],
            "removedIndices": [0, 2],
            "customReadings": ["Extra poem"],
            "somethingTheUiAdded": {"nested": true}
        });

        let data: TabData = serde_json::from_value(raw).unwrap();
        assert_eq!(data.title.as_deref(), Some("Ada"));
        assert_eq!(data.year, Some(3));
        assert_eq!(data.removed_indices, vec![0, 2]);
        assert_eq!(data.subjects[0].name, "Math");
        assert!(data.extra.contains_key("somethingTheUiAdded"));

        // Unknown fields survive the round trip.
        let back = serde_json::to_value(&data).unwrap();
        assert_eq!(back["somethingTheUiAdded"], json!({"nested": true}));
        assert_eq!(back["removedIndices"], json!([0, 2]));
    }

    #[test]
    fn schedule_for_gates_on_exact_year_week() {
        let data = TabData {
            year: Some(5),
            week: Some(3),
            notes: "n".into(),
            ..TabData::default()
        };

        assert!(data.schedule_for("ada", 5, 4).is_none());
        assert!(data.schedule_for("ada", 4, 3).is_none());

        let schedule = data.schedule_for("ada", 5, 3).unwrap();
        assert_eq!(schedule.id, "ada-5-3");
        assert_eq!(schedule.student_id, "ada");
        assert_eq!(schedule.notes, "n");
    }

    #[test]
    fn schedule_for_requires_stored_pair() {
        let data = TabData::default();
        assert!(data.schedule_for("ada", 1, 1).is_none());
    }

    #[test]
    fn bundle_parse_rejects_missing_students() {
        let err = ExportBundle::parse(json!({"version": 1, "tabs": {}})).unwrap_err();
        assert!(matches!(err, crate::StoreError::InvalidBundle(_)));
    }

    #[test]
    fn bundle_parse_accepts_exported_shape() {
        let bundle = ExportBundle::new(vec![Student::new("Ada", "ada", 0)], BTreeMap::new());
        let raw = serde_json::to_string(&bundle).unwrap();
        let parsed = ExportBundle::parse_str(&raw).unwrap();
        assert_eq!(parsed.students.len(), 1);
        assert_eq!(parsed.students[0].storage_key, "ada");
    }

    #[test]
    fn student_wire_names_are_camel_case() {
        let value = serde_json::to_value(Student::new("Ada", "ada", 2)).unwrap();
        assert_eq!(value["storageKey"], json!("ada"));
        assert_eq!(value["displayOrder"], json!(2));
        assert!(value.get("storage_key").is_none());
    }
}
