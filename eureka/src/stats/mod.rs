use crate::model::Observation;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

/// Read-only counts shown above the observation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotebookStats {
    pub total: usize,
    pub today: usize,
    pub researchers: usize,
}

/// Compute counts for `collection`, treating `today` as the current day.
pub fn summarize(collection: &[Observation], today: NaiveDate) -> NotebookStats {
    NotebookStats {
        total: collection.len(),
        today: collection.iter().filter(|o| o.date == today).count(),
        researchers: collection
            .iter()
            .map(|o| o.researcher.as_str())
            .collect::<HashSet<_>>()
            .len(),
    }
}
