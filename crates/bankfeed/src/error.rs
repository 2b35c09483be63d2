use thiserror::Error;

use crate::provider::ProviderError;

/// Top-level error taxonomy for the ingestion pipeline.
///
/// `Validation` and `InvalidState` are always rejected before any mutation;
/// `Provider` errors leave the affected document in `Failed` with the error
/// message recorded on the row.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Extraction provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("No approved candidates to import for document '{document_id}'")]
    NothingToImport { document_id: String },

    #[error(
        "Import of document '{document_id}' stopped after {imported} rows at candidate '{candidate_id}': {source}"
    )]
    ImportPartial {
        document_id: String,
        imported: u32,
        candidate_id: String,
        #[source]
        source: crate::db::DatabaseError,
    },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl IngestError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed (provider hiccups).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.retryable(),
            Self::ImportPartial { .. } => true,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, IngestError>;
