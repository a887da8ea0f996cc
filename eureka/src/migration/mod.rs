// Record migrations - upgrade older persisted shapes to the current one on load

use crate::model::DEFAULT_TITLE;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single upgrade step applied to a raw persisted record.
/// Each step only fills gaps, so applying it twice is the same as once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordMigration {
    /// Records from before titles existed get `DEFAULT_TITLE`.
    TitleDefault,
    /// Records from before custom fields existed get an empty list.
    CustomFieldsDefault,
    /// Narrative fields became optional; absent ones become empty strings.
    NarrativeDefaults,
}

impl RecordMigration {
    /// The chain, in application order.
    pub const CHAIN: [RecordMigration; 3] = [
        RecordMigration::TitleDefault,
        RecordMigration::CustomFieldsDefault,
        RecordMigration::NarrativeDefaults,
    ];

    /// Apply this step. Returns whether the record changed.
    pub fn apply(&self, record: &mut Map<String, Value>) -> bool {
        match self {
            RecordMigration::TitleDefault => {
                fill_missing(record, "title", || Value::String(DEFAULT_TITLE.into()))
            }
            RecordMigration::CustomFieldsDefault => {
                fill_missing(record, "customFields", || Value::Array(Vec::new()))
            }
            RecordMigration::NarrativeDefaults => {
                let mut changed = false;
                for key in ["problem", "solution", "outcome"] {
                    changed |= fill_missing(record, key, || Value::String(String::new()));
                }
                changed
            }
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RecordMigration::TitleDefault => "missing title set to default",
            RecordMigration::CustomFieldsDefault => "missing customFields set to empty",
            RecordMigration::NarrativeDefaults => "missing narrative fields set to empty",
        }
    }
}

fn fill_missing(record: &mut Map<String, Value>, key: &str, default: impl FnOnce() -> Value) -> bool {
    match record.get(key) {
        Some(v) if !v.is_null() => false,
        _ => {
            record.insert(key.to_string(), default());
            true
        }
    }
}

/// What a migration pass did to a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub records: usize,
    pub applied: BTreeMap<RecordMigration, usize>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Run the whole chain over one record. Non-object records are left alone.
pub fn migrate_record(record: &mut Value) -> Vec<RecordMigration> {
    let Some(map) = record.as_object_mut() else {
        return Vec::new();
    };
    RecordMigration::CHAIN
        .iter()
        .copied()
        .filter(|m| m.apply(map))
        .collect()
}

/// Run the chain over every record of a collection.
/// Fails with a description if the collection or any record has the wrong shape.
pub fn migrate_collection(collection: &mut Value) -> Result<MigrationReport, String> {
    let records = collection
        .as_array_mut()
        .ok_or_else(|| "expected a JSON array of observations".to_string())?;

    let mut report = MigrationReport {
        records: records.len(),
        ..Default::default()
    };

    for (index, record) in records.iter_mut().enumerate() {
        if !record.is_object() {
            return Err(format!("record {index} is not a JSON object"));
        }
        for step in migrate_record(record) {
            *report.applied.entry(step).or_insert(0) += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_oldest_schema_record() {
        let mut record = json!({
            "id": "1700000000000",
            "date": "2024-01-01",
            "problem": "p",
            "solution": "",
            "outcome": "",
            "researcher": "R",
            "tags": ["optics"]
        });
        let applied = migrate_record(&mut record);
        assert_eq!(
            applied,
            vec![RecordMigration::TitleDefault, RecordMigration::CustomFieldsDefault]
        );
        assert_eq!(record["title"], "Untitled Observation");
        assert_eq!(record["customFields"], json!([]));
        assert_eq!(record["tags"], json!(["optics"]));
    }

    #[test]
    fn test_existing_values_untouched() {
        let mut record = json!({
            "title": "",
            "customFields": [{ "id": "f", "type": "text", "label": "", "value": "" }],
            "problem": "a", "solution": "b", "outcome": "c"
        });
        let before = record.clone();
        assert!(migrate_record(&mut record).is_empty());
        assert_eq!(record, before);
    }

    #[test]
    fn test_null_title_is_filled() {
        let mut record = json!({ "title": null });
        migrate_record(&mut record);
        assert_eq!(record["title"], DEFAULT_TITLE);
    }

    #[test]
    fn test_migration_idempotent() {
        let mut once = json!([{ "id": "1" }, { "id": "2", "title": "T" }]);
        let first = migrate_collection(&mut once).unwrap();
        assert!(!first.is_noop());
        let mut twice = once.clone();
        let second = migrate_collection(&mut twice).unwrap();
        assert!(second.is_noop());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_report_counts() {
        let mut collection = json!([{ "id": "1" }, { "id": "2", "title": "T" }]);
        let report = migrate_collection(&mut collection).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.applied[&RecordMigration::TitleDefault], 1);
        assert_eq!(report.applied[&RecordMigration::CustomFieldsDefault], 2);
    }

    #[test]
    fn test_wrong_shapes_rejected() {
        assert!(migrate_collection(&mut json!({ "id": "1" })).is_err());
        assert!(migrate_collection(&mut json!([1, 2])).is_err());
    }
}
