// Entry-form validation. The store itself never validates; callers run this first.

use crate::config::SchemaVariant;
use crate::error::{NotebookError, Result};
use crate::model::{FieldValue, NewObservation};
use std::collections::HashSet;

/// Result of validating a draft observation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Turn errors into a single `Validation` error.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_ok() {
            Ok(self.warnings)
        } else {
            Err(NotebookError::Validation(self.errors.join("; ")))
        }
    }
}

/// Check a draft against the required fields of `variant`.
/// Blank (whitespace-only) values count as missing.
pub fn validate_draft(draft: &NewObservation, variant: SchemaVariant) -> ValidationResult {
    let mut result = ValidationResult::default();

    let required = match variant {
        SchemaVariant::Original => [
            ("problem", draft.problem.as_str()),
            ("researcher", draft.researcher.as_str()),
        ],
        SchemaVariant::Titled => [
            ("title", draft.title.as_str()),
            ("researcher", draft.researcher.as_str()),
        ],
    };
    for (name, value) in required {
        if value.trim().is_empty() {
            result.errors.push(format!("Required field '{name}' is missing"));
        }
    }

    let mut seen = HashSet::new();
    for field in &draft.custom_fields {
        if !seen.insert(field.id.as_str()) {
            result
                .errors
                .push(format!("Duplicate custom field id '{}'", field.id));
        }
        if field.label.trim().is_empty() {
            result
                .warnings
                .push(format!("Custom field '{}' has no label", field.id));
        }
        if let FieldValue::Table(table) = &field.value {
            let width = table.column_count();
            if table.rows().iter().any(|row| row.len() != width) {
                result.warnings.push(format!(
                    "Table '{}' has rows of unequal length",
                    field.label
                ));
            }
        }
    }

    result
}
