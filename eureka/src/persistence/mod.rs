// Persistence adapter - the whole collection as one JSON blob under one key

use crate::config::NotebookConfig;
use crate::error::{NotebookError, Result};
use crate::migration;
use crate::model::{Observation, ResearcherProfile};
use crate::storage::KeyValueStorage;

/// Loads and saves the observation collection and the researcher profile.
/// This is the only component that touches durable storage.
pub struct Persistence<S> {
    storage: S,
    storage_key: String,
    profile_key: String,
    pretty: bool,
}

impl<S: KeyValueStorage> Persistence<S> {
    pub fn new(storage: S, config: &NotebookConfig) -> Self {
        Persistence {
            storage,
            storage_key: config.storage_key.clone(),
            profile_key: config.profile_key.clone(),
            pretty: config.pretty,
        }
    }

    /// Read and migrate the collection. An absent blob is an empty collection.
    /// An unreadable blob is an error and is left as-is in storage.
    pub fn load(&self) -> Result<Vec<Observation>> {
        let Some(blob) = self.storage.get(&self.storage_key)? else {
            log::debug!("No stored collection under '{}'", self.storage_key);
            return Ok(Vec::new());
        };

        let mut raw: serde_json::Value =
            serde_json::from_str(&blob).map_err(|e| self.corrupt(e.to_string()))?;

        let report = migration::migrate_collection(&mut raw).map_err(|e| self.corrupt(e))?;
        for (step, count) in &report.applied {
            log::debug!("Migrated {count} record(s): {}", step.describe());
        }

        let observations: Vec<Observation> =
            serde_json::from_value(raw).map_err(|e| self.corrupt(e.to_string()))?;
        Ok(observations)
    }

    /// Serialize the full collection and overwrite the stored blob.
    /// Fails without writing if any custom field value cannot be stored.
    pub fn save(&mut self, observations: &[Observation]) -> Result<()> {
        for obs in observations {
            for field in &obs.custom_fields {
                if let Err(e) = field.value.check() {
                    log::warn!("Refusing to save observation {}: {e}", obs.id);
                    return Err(e);
                }
            }
        }
        let blob = self.encode(observations)?;
        self.storage.set(&self.storage_key, &blob)?;
        log::debug!(
            "Saved {} observation(s) under '{}'",
            observations.len(),
            self.storage_key
        );
        Ok(())
    }

    /// Read the researcher profile. An absent blob is the empty profile.
    pub fn load_profile(&self) -> Result<ResearcherProfile> {
        match self.storage.get(&self.profile_key)? {
            None => Ok(ResearcherProfile::default()),
            Some(blob) => serde_json::from_str(&blob).map_err(|e| NotebookError::Corrupt {
                key: self.profile_key.clone(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn save_profile(&mut self, profile: &ResearcherProfile) -> Result<()> {
        let blob = self.encode(profile)?;
        self.storage.set(&self.profile_key, &blob)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn encode<T: serde::Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let blob = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(blob)
    }

    fn corrupt(&self, reason: String) -> NotebookError {
        NotebookError::Corrupt {
            key: self.storage_key.clone(),
            reason,
        }
    }
}
