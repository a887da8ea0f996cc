use crate::error::{NotebookError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the optional config file inside a data directory.
pub const CONFIG_FILE: &str = "notebook.yaml";

/// Notebook settings, read from `notebook.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotebookConfig {
    /// Well-known key of the observation blob
    pub storage_key: String,
    /// Key of the researcher profile blob
    pub profile_key: String,
    pub id_strategy: IdStrategy,
    pub schema_variant: SchemaVariant,
    /// Pretty-print persisted JSON
    pub pretty: bool,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        NotebookConfig {
            storage_key: "physics-observations".into(),
            profile_key: "researcher-profile".into(),
            id_strategy: IdStrategy::default(),
            schema_variant: SchemaVariant::default(),
            pretty: false,
        }
    }
}

/// How new observation ids are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// Decimal milliseconds since the epoch
    #[default]
    Timestamp,
    Ulid,
}

/// Which fields the entry form treats as required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// Problem and researcher are required
    Original,
    /// Title and researcher are required; problem may be empty
    #[default]
    Titled,
}

impl NotebookConfig {
    fn check(self) -> Result<Self> {
        if self.storage_key.trim().is_empty() || self.profile_key.trim().is_empty() {
            return Err(NotebookError::Config("storage keys must not be empty".into()));
        }
        if self.storage_key == self.profile_key {
            return Err(NotebookError::Config(format!(
                "storage_key and profile_key are both '{}'",
                self.storage_key
            )));
        }
        Ok(self)
    }
}

/// Parse a config YAML string.
pub fn parse_config_str(content: &str) -> Result<NotebookConfig> {
    if content.trim().is_empty() {
        return Ok(NotebookConfig::default());
    }
    let config: NotebookConfig = serde_yaml::from_str(content)?;
    config.check()
}

/// Parse a config file.
pub fn parse_config(path: &Path) -> Result<NotebookConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Load `notebook.yaml` from a data directory, falling back to defaults when absent.
pub fn load_from_dir(dir: &Path) -> Result<NotebookConfig> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(NotebookConfig::default());
    }
    parse_config(&path)
}
