// Observation records, their custom fields, and the researcher profile

mod field;

pub use field::{CustomField, FieldKind, FieldValue, Table};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Title given to records persisted before titles existed.
pub const DEFAULT_TITLE: &str = "Untitled Observation";

/// The current calendar day (UTC), used for default dates and stats.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A single research-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,
    pub date: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub outcome: String,
    pub researcher: String,
    /// Legacy labels from the oldest schema. Kept and editable, not searched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

/// One of the free-text narrative fields of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeField {
    Problem,
    Solution,
    Outcome,
}

impl Observation {
    /// Millisecond creation time encoded in the id, or 0 if the id carries none.
    /// Timestamp ids are decimal milliseconds; ULID ids embed their own.
    pub fn created_millis(&self) -> u64 {
        if let Ok(millis) = self.id.parse::<u64>() {
            return millis;
        }
        ulid::Ulid::from_string(&self.id)
            .map(|u| u.timestamp_ms())
            .unwrap_or(0)
    }

    /// Add a tag. Whitespace is trimmed; empty and duplicate tags are ignored.
    /// Returns whether the tag was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        add_tag(&mut self.tags, tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    pub fn clear(&mut self, field: NarrativeField) {
        match field {
            NarrativeField::Problem => self.problem.clear(),
            NarrativeField::Solution => self.solution.clear(),
            NarrativeField::Outcome => self.outcome.clear(),
        }
    }

    /// Append a custom field, regenerating its id if it collides with an existing one.
    /// Returns the id the field ended up with.
    pub fn add_custom_field(&mut self, mut custom: CustomField) -> String {
        while self.custom_fields.iter().any(|f| f.id == custom.id) {
            custom.id = field::new_field_id();
        }
        let id = custom.id.clone();
        self.custom_fields.push(custom);
        id
    }

    pub fn custom_field(&self, id: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|f| f.id == id)
    }

    pub fn custom_field_mut(&mut self, id: &str) -> Option<&mut CustomField> {
        self.custom_fields.iter_mut().find(|f| f.id == id)
    }

    pub fn remove_custom_field(&mut self, id: &str) -> Option<CustomField> {
        let pos = self.custom_fields.iter().position(|f| f.id == id)?;
        Some(self.custom_fields.remove(pos))
    }
}

/// An observation that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewObservation {
    pub date: NaiveDate,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub researcher: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

impl Default for NewObservation {
    fn default() -> Self {
        NewObservation {
            date: today(),
            title: String::new(),
            problem: String::new(),
            solution: String::new(),
            outcome: String::new(),
            researcher: String::new(),
            tags: Vec::new(),
            custom_fields: Vec::new(),
        }
    }
}

impl NewObservation {
    pub fn add_tag(&mut self, tag: &str) -> bool {
        add_tag(&mut self.tags, tag)
    }

    pub(crate) fn into_observation(self, id: String) -> Observation {
        Observation {
            id,
            date: self.date,
            title: self.title,
            problem: self.problem,
            solution: self.solution,
            outcome: self.outcome,
            researcher: self.researcher,
            tags: self.tags,
            custom_fields: self.custom_fields,
        }
    }
}

fn add_tag(tags: &mut Vec<String>, tag: &str) -> bool {
    let tag = tag.trim();
    if tag.is_empty() || tags.iter().any(|t| t == tag) {
        return false;
    }
    tags.push(tag.to_string());
    true
}

/// Who is keeping the notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearcherProfile {
    pub name: String,
    pub designation: String,
    pub organization: String,
}
