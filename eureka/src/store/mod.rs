use crate::config::{IdStrategy, NotebookConfig};
use crate::error::{NotebookError, Result};
use crate::model::{self, NewObservation, Observation, ResearcherProfile};
use crate::persistence::Persistence;
use crate::query::{self, Query};
use crate::stats::{self, NotebookStats};
use crate::storage::KeyValueStorage;
use chrono::{NaiveDate, Utc};

/// Issues observation ids that never repeat within a session.
pub struct IdGenerator {
    strategy: IdStrategy,
    last_millis: u64,
    ulids: ulid::Generator,
}

impl IdGenerator {
    pub fn new(strategy: IdStrategy) -> Self {
        IdGenerator {
            strategy,
            last_millis: 0,
            ulids: ulid::Generator::new(),
        }
    }

    /// Produce a fresh id for which `taken` returns false.
    pub fn next_id(&mut self, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let id = match self.strategy {
                IdStrategy::Timestamp => {
                    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
                    self.last_millis = now.max(self.last_millis + 1);
                    self.last_millis.to_string()
                }
                IdStrategy::Ulid => self
                    .ulids
                    .generate()
                    .unwrap_or_else(|_| ulid::Ulid::new())
                    .to_string(),
            };
            if !taken(&id) {
                return id;
            }
        }
    }
}

/// The authoritative in-memory observation collection with write-through persistence.
///
/// Every mutation is saved before it becomes visible: if the save fails the
/// in-memory collection is left as it was and the error is returned.
pub struct Store<S: KeyValueStorage> {
    config: NotebookConfig,
    persistence: Persistence<S>,
    observations: Vec<Observation>,
    ids: IdGenerator,
}

impl<S: KeyValueStorage> Store<S> {
    /// Load the collection from `storage` and start a session.
    pub fn open(storage: S, config: NotebookConfig) -> Result<Self> {
        let persistence = Persistence::new(storage, &config);
        let observations = persistence.load()?;
        log::info!(
            "Opened notebook '{}' with {} observation(s)",
            config.storage_key,
            observations.len()
        );

        Ok(Store {
            ids: IdGenerator::new(config.id_strategy),
            config,
            persistence,
            observations,
        })
    }

    pub fn config(&self) -> &NotebookConfig {
        &self.config
    }

    /// All observations in collection order (newest created first).
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Observation> {
        self.observations.iter().find(|o| o.id == id)
    }

    pub fn get_required(&self, id: &str) -> Result<&Observation> {
        self.get(id)
            .ok_or_else(|| NotebookError::NotFound { id: id.to_string() })
    }

    /// Assign an id, prepend the record and persist. No validation is done here.
    pub fn create(&mut self, draft: NewObservation) -> Result<Observation> {
        let existing = &self.observations;
        let id = self
            .ids
            .next_id(|candidate| existing.iter().any(|o| o.id == candidate));
        let observation = draft.into_observation(id);

        let mut next = Vec::with_capacity(self.observations.len() + 1);
        next.push(observation.clone());
        next.extend(self.observations.iter().cloned());
        self.commit(next)?;

        log::debug!("Created observation {}", observation.id);
        Ok(observation)
    }

    /// Replace the record with the same id. Unknown ids are a no-op.
    /// Returns whether a record was replaced.
    pub fn update(&mut self, observation: Observation) -> Result<bool> {
        let Some(pos) = self.observations.iter().position(|o| o.id == observation.id) else {
            log::warn!("Ignoring update of unknown observation {}", observation.id);
            return Ok(false);
        };

        let mut next = self.observations.clone();
        next[pos] = observation;
        self.commit(next)?;
        Ok(true)
    }

    /// Apply `edit` to a copy of the record with `id` and store the result.
    /// Unknown ids are a no-op.
    pub fn modify<F>(&mut self, id: &str, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut Observation) -> Result<()>,
    {
        let Some(current) = self.get(id) else {
            log::warn!("Ignoring edit of unknown observation {id}");
            return Ok(false);
        };
        let mut edited = current.clone();
        edit(&mut edited)?;
        // The id is the record's identity
        edited.id = id.to_string();
        self.update(edited)
    }

    /// Remove the record with `id`. Unknown ids are a no-op.
    /// Returns whether a record was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            log::warn!("Ignoring delete of unknown observation {id}");
            return Ok(false);
        }

        let next: Vec<Observation> = self
            .observations
            .iter()
            .filter(|o| o.id != id)
            .cloned()
            .collect();
        self.commit(next)?;
        log::debug!("Deleted observation {id}");
        Ok(true)
    }

    /// Run a combined query over the current collection.
    pub fn query(&self, query: &Query) -> Vec<Observation> {
        query::run_query(&self.observations, query)
    }

    pub fn stats(&self) -> NotebookStats {
        self.stats_on(model::today())
    }

    pub fn stats_on(&self, today: NaiveDate) -> NotebookStats {
        stats::summarize(&self.observations, today)
    }

    pub fn profile(&self) -> Result<ResearcherProfile> {
        self.persistence.load_profile()
    }

    pub fn save_profile(&mut self, profile: &ResearcherProfile) -> Result<()> {
        self.persistence.save_profile(profile)
    }

    pub fn storage(&self) -> &S {
        self.persistence.storage()
    }

    fn commit(&mut self, next: Vec<Observation>) -> Result<()> {
        self.persistence.save(&next)?;
        self.observations = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomField, Table};
    use crate::storage::{FileStorage, MemoryStorage};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn draft(title: &str, researcher: &str, date: &str) -> NewObservation {
        NewObservation {
            date: date.parse().unwrap(),
            title: title.into(),
            researcher: researcher.into(),
            ..Default::default()
        }
    }

    fn open_memory() -> Store<MemoryStorage> {
        Store::open(MemoryStorage::new(), NotebookConfig::default()).unwrap()
    }

    /// Storage whose writes always fail.
    struct ReadOnlyStorage(MemoryStorage);

    impl KeyValueStorage for ReadOnlyStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&mut self, _key: &str, _blob: &str) -> Result<()> {
            Err(NotebookError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    #[test]
    fn test_scenario() {
        let mut store = open_memory();
        let a = store.create(draft("X", "R", "2024-01-01")).unwrap();
        let b = store.create(draft("Y", "S", "2024-01-02")).unwrap();

        let by_date = query::sort(store.observations(), query::SortKey::Date);
        assert_eq!(by_date, vec![b.clone(), a.clone()]);

        let found = query::filter_by_text(store.observations(), "x");
        assert_eq!(found, vec![a.clone()]);

        assert!(store.delete(&a.id).unwrap());
        assert_eq!(store.observations(), &[b]);
    }

    #[test]
    fn test_create_prepends_and_persists() {
        let mut store = open_memory();
        let first = store.create(draft("one", "Ann", "2024-01-01")).unwrap();
        let second = store.create(draft("two", "Ann", "2024-01-01")).unwrap();
        assert_eq!(store.observations()[0].id, second.id);
        assert_eq!(store.observations()[1].id, first.id);

        let blob = store.storage().get("physics-observations").unwrap().unwrap();
        let saved: Vec<Observation> = serde_json::from_str(&blob).unwrap();
        assert_eq!(saved, store.observations());
    }

    #[test]
    fn test_ids_unique_across_rapid_creates() {
        let mut store = open_memory();
        let mut seen = HashSet::new();
        for i in 0..200 {
            let obs = store.create(draft(&format!("n{i}"), "Ann", "2024-01-01")).unwrap();
            assert!(seen.insert(obs.id));
        }
        assert_eq!(store.len(), 200);
    }

    #[test]
    fn test_ulid_ids_unique_and_timed() {
        let config = NotebookConfig {
            id_strategy: IdStrategy::Ulid,
            ..Default::default()
        };
        let mut store = Store::open(MemoryStorage::new(), config).unwrap();
        let a = store.create(draft("a", "Ann", "2024-01-01")).unwrap();
        let b = store.create(draft("b", "Ann", "2024-01-01")).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.created_millis() > 0);
        assert!(b.created_millis() >= a.created_millis());
    }

    #[test]
    fn test_id_generator_skips_taken() {
        let mut ids = IdGenerator::new(IdStrategy::Timestamp);
        let first = ids.next_id(|_| false);
        let blocked: u64 = first.parse::<u64>().unwrap() + 1;
        let next = ids.next_id(|c| c == blocked.to_string());
        assert_ne!(next.parse::<u64>().unwrap(), blocked);
        assert!(next.parse::<u64>().unwrap() > blocked - 1);
    }

    #[test]
    fn test_update_targets_only_matching_record() {
        let mut store = open_memory();
        let a = store.create(draft("A", "Ann", "2024-01-01")).unwrap();
        let b = store.create(draft("B", "Bob", "2024-01-01")).unwrap();

        let mut changed = a.clone();
        changed.title = "A2".into();
        changed.solution = "Recalibrated".into();
        assert!(store.update(changed.clone()).unwrap());

        assert_eq!(store.get(&a.id), Some(&changed));
        assert_eq!(store.get(&b.id), Some(&b));
    }

    #[test]
    fn test_update_writes_through() {
        let mut store = open_memory();
        let a = store.create(draft("A", "Ann", "2024-01-01")).unwrap();
        store.create(draft("B", "Bob", "2024-01-01")).unwrap();

        let mut changed = a.clone();
        changed.outcome = "Stable".into();
        store.update(changed).unwrap();
        store
            .modify(&a.id, |o| {
                o.add_tag("repeat");
                Ok(())
            })
            .unwrap();

        let blob = store.storage().get("physics-observations").unwrap().unwrap();
        let saved: Vec<Observation> = serde_json::from_str(&blob).unwrap();
        assert_eq!(saved, store.observations());
        assert_eq!(saved[1].outcome, "Stable");
        assert_eq!(saved[1].tags, vec!["repeat"]);
    }

    #[test]
    fn test_modify_unknown_does_not_write() {
        let mut store = open_memory();
        let changed = store
            .modify("missing", |o| {
                o.title = "never".into();
                Ok(())
            })
            .unwrap();
        assert!(!changed);
        assert_eq!(store.storage().get("physics-observations").unwrap(), None);
    }

    #[test]
    fn test_create_with_infinite_number_fails_cleanly() {
        let tmp = TempDir::new().unwrap();
        let mut store =
            Store::open(FileStorage::open(tmp.path()).unwrap(), NotebookConfig::default()).unwrap();
        let kept = store.create(draft("kept", "Ann", "2024-01-01")).unwrap();

        let mut bad = draft("bad", "Ann", "2024-01-01");
        bad.custom_fields.push(CustomField::number("x", f64::INFINITY));
        let err = store.create(bad).unwrap_err();
        assert!(matches!(err, NotebookError::InvalidField(_)));
        assert_eq!(store.observations(), &[kept.clone()]);

        let reopened =
            Store::open(FileStorage::open(tmp.path()).unwrap(), NotebookConfig::default()).unwrap();
        assert_eq!(reopened.observations(), store.observations());
    }

    #[test]
    fn test_update_unknown_is_noop() {
        let mut store = open_memory();
        store.create(draft("A", "Ann", "2024-01-01")).unwrap();
        let before = store.observations().to_vec();

        let ghost = draft("ghost", "Nobody", "2024-01-01").into_observation("missing".into());
        assert!(!store.update(ghost).unwrap());
        assert_eq!(store.observations(), before.as_slice());
    }

    #[test]
    fn test_delete_completeness() {
        let mut store = open_memory();
        let a = store.create(draft("A", "Ann", "2024-01-01")).unwrap();
        store.create(draft("B", "Bob", "2024-01-01")).unwrap();

        assert!(!store.delete("missing").unwrap());
        assert_eq!(store.len(), 2);

        assert!(store.delete(&a.id).unwrap());
        assert_eq!(store.len(), 1);
        assert!(store.get(&a.id).is_none());
        assert!(matches!(store.get_required(&a.id), Err(NotebookError::NotFound { .. })));
    }

    #[test]
    fn test_modify_edits_table_field() {
        let mut store = open_memory();
        let mut d = draft("Table", "Ann", "2024-01-01");
        d.custom_fields.push(CustomField::table("Data", Table::new(["a", "b", "c"])));
        let obs = store.create(d).unwrap();
        let field_id = obs.custom_fields[0].id.clone();

        let edited = store
            .modify(&obs.id, |o| {
                let table = o
                    .custom_field_mut(&field_id)
                    .and_then(|f| f.table_mut())
                    .ok_or_else(|| NotebookError::InvalidField("not a table".into()))?;
                table.add_row();
                table.add_column();
                Ok(())
            })
            .unwrap();
        assert!(edited);

        let stored = store.get(&obs.id).unwrap();
        let rows = match &stored.custom_fields[0].value {
            crate::model::FieldValue::Table(t) => t.rows().to_vec(),
            other => panic!("expected table, got {other:?}"),
        };
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 4));
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let mut seeded = MemoryStorage::new();
        seeded
            .set(
                "physics-observations",
                r#"[{"id":"1","date":"2024-01-01","title":"T","researcher":"Ann"}]"#,
            )
            .unwrap();
        let mut store = Store::open(ReadOnlyStorage(seeded), NotebookConfig::default()).unwrap();

        assert!(store.create(draft("new", "Bob", "2024-01-02")).is_err());
        assert!(store.delete("1").is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.observations()[0].title, "T");
    }

    #[test]
    fn test_reopen_from_files() {
        let tmp = TempDir::new().unwrap();
        let created = {
            let mut store =
                Store::open(FileStorage::open(tmp.path()).unwrap(), NotebookConfig::default())
                    .unwrap();
            store.create(draft("Persisted", "Ann", "2024-01-01")).unwrap()
        };

        let store =
            Store::open(FileStorage::open(tmp.path()).unwrap(), NotebookConfig::default()).unwrap();
        assert_eq!(store.observations(), &[created]);
    }

    #[test]
    fn test_open_with_corrupt_blob_fails() {
        let mut storage = MemoryStorage::new();
        storage.set("physics-observations", "not json").unwrap();
        let result = Store::open(storage, NotebookConfig::default());
        assert!(matches!(result, Err(NotebookError::Corrupt { .. })));
    }

    #[test]
    fn test_stats_and_profile() {
        let mut store = open_memory();
        store.create(draft("A", "Ann", "2024-01-01")).unwrap();
        store.create(draft("B", "Ann", "2024-01-02")).unwrap();
        store.create(draft("C", "Bob", "2024-01-02")).unwrap();

        let stats = store.stats_on("2024-01-02".parse().unwrap());
        assert_eq!((stats.total, stats.today, stats.researchers), (3, 2, 2));

        let profile = ResearcherProfile {
            name: "Ann".into(),
            ..Default::default()
        };
        store.save_profile(&profile).unwrap();
        assert_eq!(store.profile().unwrap(), profile);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_stats_counts_entries_dated_today() {
        let mut store = open_memory();
        store
            .create(NewObservation {
                title: "Now".into(),
                researcher: "Ann".into(),
                ..Default::default()
            })
            .unwrap();
        store.create(draft("Old", "Bob", "2001-01-01")).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.today, 1);
        assert_eq!(stats.researchers, 2);
    }

    #[test]
    fn test_query_through_store() {
        let mut store = open_memory();
        store.create(draft("Alpha", "Bob", "2024-01-01")).unwrap();
        store.create(draft("Beta", "Ann", "2024-01-01")).unwrap();

        let query = Query {
            sort: query::SortKey::Researcher,
            ..Default::default()
        };
        let titles: Vec<String> = store.query(&query).into_iter().map(|o| o.title).collect();
        assert_eq!(titles, vec!["Beta", "Alpha"]);
    }
}
