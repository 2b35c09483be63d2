//! Bank document model and its status state machine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of an uploaded statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    Failed,
    Imported,
}

/// Events that drive the document state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    /// A processing request claims the document.
    Process,
    /// The extraction provider returned usable rows.
    ExtractionSucceeded,
    /// The extraction provider failed or timed out.
    ExtractionFailed,
    /// All approved candidates were materialized into the ledger.
    Import,
}

/// An event was applied to a status that does not accept it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot apply {event:?} to a document in {from:?}")]
pub struct InvalidTransition {
    pub from: DocumentStatus,
    pub event: DocumentEvent,
}

impl DocumentStatus {
    /// Applies an event, returning the next status or a typed rejection.
    ///
    /// `Process` is accepted from `Pending`, `Failed` (retry) and
    /// `Processed` (re-extraction; the decided-candidate gate lives in the
    /// claim, not here). `Imported` is terminal.
    pub fn apply(self, event: DocumentEvent) -> Result<DocumentStatus, InvalidTransition> {
        use DocumentEvent::*;
        use DocumentStatus::*;

        match (self, event) {
            (Pending | Failed | Processed, Process) => Ok(Processing),
            (Processing, ExtractionSucceeded) => Ok(Processed),
            (Processing, ExtractionFailed) => Ok(Failed),
            (Processed, Import) => Ok(Imported),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Failed => "FAILED",
            Self::Imported => "IMPORTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "PROCESSED" => Some(Self::Processed),
            "FAILED" => Some(Self::Failed),
            "IMPORTED" => Some(Self::Imported),
            _ => None,
        }
    }
}

/// An uploaded bank statement and its extraction bookkeeping.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDocument {
    pub id: String,
    pub owner_id: String,
    /// Filename as supplied by the uploader.
    pub original_name: String,
    /// Path of the stored statement bytes, relative to the upload directory.
    pub file_ref: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Name of the provider that produced the current candidate set.
    pub provider_used: Option<String>,
    pub account_ref: Option<String>,
    /// Number of candidates produced by the most recent extraction.
    pub transaction_count: u32,
    /// Error message from the most recent failed extraction.
    pub processing_error: Option<String>,
    pub statement_start: Option<NaiveDate>,
    pub statement_end: Option<NaiveDate>,
}

impl BankDocument {
    pub fn new(
        owner_id: impl Into<String>,
        original_name: impl Into<String>,
        file_ref: impl Into<String>,
        account_ref: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            original_name: original_name.into(),
            file_ref: file_ref.into(),
            status: DocumentStatus::Pending,
            uploaded_at: Utc::now(),
            processed_at: None,
            provider_used: None,
            account_ref,
            transaction_count: 0,
            processing_error: None,
            statement_start: None,
            statement_end: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_accepts_process() {
        assert_eq!(
            DocumentStatus::Pending.apply(DocumentEvent::Process),
            Ok(DocumentStatus::Processing)
        );
    }

    #[test]
    fn test_failed_accepts_retry() {
        assert_eq!(
            DocumentStatus::Failed.apply(DocumentEvent::Process),
            Ok(DocumentStatus::Processing)
        );
    }

    #[test]
    fn test_processed_accepts_reprocess_and_import() {
        assert_eq!(
            DocumentStatus::Processed.apply(DocumentEvent::Process),
            Ok(DocumentStatus::Processing)
        );
        assert_eq!(
            DocumentStatus::Processed.apply(DocumentEvent::Import),
            Ok(DocumentStatus::Imported)
        );
    }

    #[test]
    fn test_processing_resolves_both_ways() {
        assert_eq!(
            DocumentStatus::Processing.apply(DocumentEvent::ExtractionSucceeded),
            Ok(DocumentStatus::Processed)
        );
        assert_eq!(
            DocumentStatus::Processing.apply(DocumentEvent::ExtractionFailed),
            Ok(DocumentStatus::Failed)
        );
    }

    #[test]
    fn test_processing_rejects_reentrant_process() {
        let err = DocumentStatus::Processing
            .apply(DocumentEvent::Process)
            .unwrap_err();
        assert_eq!(err.from, DocumentStatus::Processing);
    }

    #[test]
    fn test_imported_is_terminal() {
        for event in [
            DocumentEvent::Process,
            DocumentEvent::ExtractionSucceeded,
            DocumentEvent::ExtractionFailed,
            DocumentEvent::Import,
        ] {
            assert!(DocumentStatus::Imported.apply(event).is_err());
        }
    }

    #[test]
    fn test_import_requires_processed() {
        assert!(DocumentStatus::Pending.apply(DocumentEvent::Import).is_err());
        assert!(DocumentStatus::Failed.apply(DocumentEvent::Import).is_err());
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Processing,
            DocumentStatus::Processed,
            DocumentStatus::Failed,
            DocumentStatus::Imported,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("EXTRACTED"), None);
    }

    #[test]
    fn test_new_document_starts_pending() {
        let doc = BankDocument::new("user-1", "statement.pdf", "ab/cd.pdf", None);
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.transaction_count, 0);
        assert!(doc.processed_at.is_none());
        assert!(!doc.id.is_empty());
    }
}
