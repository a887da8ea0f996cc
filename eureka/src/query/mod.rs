// Query engine - pure filtering and ordering over an observation collection

use crate::model::Observation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Display ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Keep collection (insertion) order
    #[default]
    Id,
    /// Newest date first, then newest creation time first
    Date,
    /// Researcher name, A to Z
    Researcher,
}

/// Parameters of a combined query. Unset parts match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub search: String,
    pub date: Option<NaiveDate>,
    pub sort: SortKey,
    pub tag: Option<String>,
}

/// Whether `term` appears, case-insensitively, in any searchable field.
/// `needle` must already be lowercase.
fn matches_text(obs: &Observation, needle: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(needle);

    hit(&obs.title)
        || hit(&obs.problem)
        || hit(&obs.solution)
        || hit(&obs.outcome)
        || hit(&obs.researcher)
        || obs
            .custom_fields
            .iter()
            .any(|f| hit(&f.label) || hit(&f.value.to_text()))
}

/// Case-insensitive substring search. An empty term matches everything.
pub fn filter_by_text(collection: &[Observation], term: &str) -> Vec<Observation> {
    if term.is_empty() {
        return collection.to_vec();
    }
    let needle = term.to_lowercase();
    collection
        .iter()
        .filter(|obs| matches_text(obs, &needle))
        .cloned()
        .collect()
}

/// Exact date match. `None` matches everything.
pub fn filter_by_date(collection: &[Observation], date: Option<NaiveDate>) -> Vec<Observation> {
    match date {
        None => collection.to_vec(),
        Some(date) => collection
            .iter()
            .filter(|obs| obs.date == date)
            .cloned()
            .collect(),
    }
}

/// Exact, case-sensitive tag match. `None` matches everything.
pub fn filter_by_tag(collection: &[Observation], tag: Option<&str>) -> Vec<Observation> {
    match tag {
        None => collection.to_vec(),
        Some(tag) => collection
            .iter()
            .filter(|obs| obs.tags.iter().any(|t| t == tag))
            .cloned()
            .collect(),
    }
}

fn compare_researchers(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Stable sort by `key`. Equal keys keep their relative order.
pub fn sort(collection: &[Observation], key: SortKey) -> Vec<Observation> {
    let mut sorted = collection.to_vec();
    match key {
        SortKey::Id => {}
        SortKey::Date => sorted.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_millis().cmp(&a.created_millis()))
        }),
        SortKey::Researcher => {
            sorted.sort_by(|a, b| compare_researchers(&a.researcher, &b.researcher))
        }
    }
    sorted
}

/// Sort, then filter by date, tag and text. Filters preserve order.
pub fn run_query(collection: &[Observation], query: &Query) -> Vec<Observation> {
    let sorted = sort(collection, query.sort);
    let by_date = filter_by_date(&sorted, query.date);
    let by_tag = filter_by_tag(&by_date, query.tag.as_deref());
    filter_by_text(&by_tag, &query.search)
}
