use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Stored data under '{key}' is unreadable: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Invalid custom field: {0}")]
    InvalidField(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Observation not found: {id}")]
    NotFound { id: String },
}

pub type Result<T> = std::result::Result<T, NotebookError>;
