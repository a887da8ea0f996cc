// Custom fields - typed, labeled values attached to an observation

use crate::error::{NotebookError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant persisted as the `type` key of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Table,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Table => "table",
        };
        f.write_str(name)
    }
}

/// A rectangular grid of string cells. Row 0 is the header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table holding only a header row.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Table {
            rows: vec![headers.into_iter().map(Into::into).collect()],
        }
    }

    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Table { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Number of columns, taken from the header row.
    pub fn column_count(&self) -> usize {
        self.header().map(<[String]>::len).unwrap_or(0)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Append a row of empty cells sized to the current column count.
    pub fn add_row(&mut self) {
        let width = self.column_count();
        self.rows.push(vec![String::new(); width]);
    }

    /// Append an empty cell to every row, header included.
    pub fn add_column(&mut self) {
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        for row in &mut self.rows {
            row.push(String::new());
        }
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) -> Result<()> {
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(column))
            .ok_or_else(|| {
                NotebookError::InvalidField(format!("Cell ({row}, {column}) is out of range"))
            })?;
        *cell = value.into();
        Ok(())
    }

    /// Remove a body row. The header row cannot be removed.
    pub fn remove_row(&mut self, row: usize) -> Result<()> {
        if row == 0 {
            return Err(NotebookError::InvalidField(
                "The header row cannot be removed".into(),
            ));
        }
        if row >= self.rows.len() {
            return Err(NotebookError::InvalidField(format!(
                "Row {row} is out of range"
            )));
        }
        self.rows.remove(row);
        Ok(())
    }

    pub fn remove_column(&mut self, column: usize) -> Result<()> {
        if column >= self.column_count() {
            return Err(NotebookError::InvalidField(format!(
                "Column {column} is out of range"
            )));
        }
        for row in &mut self.rows {
            if column < row.len() {
                row.remove(column);
            }
        }
        Ok(())
    }
}

/// The value of a custom field. The variant is the field's type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Table(Table),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::Table(_) => FieldKind::Table,
        }
    }

    /// Reject values that cannot be stored as JSON.
    pub fn check(&self) -> Result<()> {
        match self {
            FieldValue::Number(n) if !n.is_finite() => Err(NotebookError::InvalidField(format!(
                "{n} is not a finite number"
            ))),
            FieldValue::Number(_) | FieldValue::Text(_) | FieldValue::Table(_) => Ok(()),
        }
    }

    /// Textual form used by text search. Table cells are joined with commas.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Table(table) => table
                .rows()
                .iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Table(table) => serde_json::Value::Array(
                table
                    .rows()
                    .iter()
                    .map(|row| {
                        serde_json::Value::Array(
                            row.iter().cloned().map(serde_json::Value::String).collect(),
                        )
                    })
                    .collect(),
            ),
        }
    }

    fn from_json(kind: FieldKind, value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match (kind, value) {
            (FieldKind::Text, Value::Null) => Ok(FieldValue::Text(String::new())),
            (FieldKind::Text, Value::String(s)) => Ok(FieldValue::Text(s)),
            (FieldKind::Text, Value::Number(n)) => Ok(FieldValue::Text(n.to_string())),

            (FieldKind::Number, Value::Null) => Ok(FieldValue::Number(0.0)),
            (FieldKind::Number, Value::Number(n)) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| NotebookError::InvalidField(format!("Number out of range: {n}"))),
            // Number inputs were sometimes stored as their raw string
            (FieldKind::Number, Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(FieldValue::Number(0.0));
                }
                trimmed.parse::<f64>().map(FieldValue::Number).map_err(|_| {
                    NotebookError::InvalidField(format!("'{s}' is not a number"))
                })
            }

            (FieldKind::Table, Value::Null) => Ok(FieldValue::Table(Table::default())),
            (FieldKind::Table, Value::Array(rows)) => {
                let mut parsed = Vec::with_capacity(rows.len());
                for row in rows {
                    let Value::Array(cells) = row else {
                        return Err(NotebookError::InvalidField(
                            "Table rows must be arrays".into(),
                        ));
                    };
                    let mut parsed_row = Vec::with_capacity(cells.len());
                    for cell in cells {
                        match cell {
                            Value::String(s) => parsed_row.push(s),
                            Value::Number(n) => parsed_row.push(n.to_string()),
                            Value::Null => parsed_row.push(String::new()),
                            other => {
                                return Err(NotebookError::InvalidField(format!(
                                    "Unsupported table cell: {other}"
                                )))
                            }
                        }
                    }
                    parsed.push(parsed_row);
                }
                Ok(FieldValue::Table(Table::from_rows(parsed)))
            }

            (kind, other) => Err(NotebookError::InvalidField(format!(
                "Value {other} does not match field type '{kind}'"
            ))),
        }
    }
}

/// A user-defined, typed, labeled value attached to an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCustomField", into = "RawCustomField")]
pub struct CustomField {
    pub id: String,
    pub label: String,
    pub value: FieldValue,
}

impl CustomField {
    pub fn new(label: impl Into<String>, value: FieldValue) -> Self {
        CustomField {
            id: new_field_id(),
            label: label.into(),
            value,
        }
    }

    pub fn text(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, FieldValue::Text(value.into()))
    }

    pub fn number(label: impl Into<String>, value: f64) -> Self {
        Self::new(label, FieldValue::Number(value))
    }

    pub fn table(label: impl Into<String>, table: Table) -> Self {
        Self::new(label, FieldValue::Table(table))
    }

    pub fn kind(&self) -> FieldKind {
        self.value.kind()
    }

    pub fn table_mut(&mut self) -> Option<&mut Table> {
        match &mut self.value {
            FieldValue::Table(table) => Some(table),
            FieldValue::Text(_) | FieldValue::Number(_) => None,
        }
    }
}

pub(crate) fn new_field_id() -> String {
    nanoid::nanoid!()
}

/// Persisted shape of a custom field: `{ id, type, label, value }`.
#[derive(Serialize, Deserialize)]
struct RawCustomField {
    id: String,
    #[serde(rename = "type")]
    kind: FieldKind,
    #[serde(default)]
    label: String,
    #[serde(default)]
    value: serde_json::Value,
}

impl TryFrom<RawCustomField> for CustomField {
    type Error = NotebookError;

    fn try_from(raw: RawCustomField) -> Result<Self> {
        Ok(CustomField {
            value: FieldValue::from_json(raw.kind, raw.value)?,
            id: raw.id,
            label: raw.label,
        })
    }
}

impl From<CustomField> for RawCustomField {
    fn from(field: CustomField) -> Self {
        RawCustomField {
            kind: field.value.kind(),
            value: field.value.to_json(),
            id: field.id,
            label: field.label,
        }
    }
}
