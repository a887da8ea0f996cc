pub mod config;
pub mod error;
pub mod migration;
pub mod model;
pub mod persistence;
pub mod query;
pub mod stats;
pub mod storage;
pub mod store;
pub mod validation;

pub use config::NotebookConfig;
pub use error::{NotebookError, Result};
pub use model::{CustomField, FieldValue, NewObservation, Observation, ResearcherProfile};
pub use query::{Query, SortKey};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::Store;
