//! Importer: materializes approved candidates into the permanent ledger.
//!
//! Safe to re-invoke at every point. Each candidate's ledger row and its
//! imported marker commit together, the marker guard skips candidates that
//! already produced a row, and the final Processed -> Imported flip is a
//! compare-and-swap. A second import of the same document is a no-op
//! success with `imported_count = 0`.

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::db::{candidate_repo, document_repo, ledger_repo, Database};
use crate::document::DocumentStatus;
use crate::error::{IngestError, Result};
use crate::ledger::Transaction;

/// Result of an import call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    /// Ledger rows written by this call (retries and already-imported
    /// candidates excluded).
    pub imported_count: u32,
    pub status: DocumentStatus,
}

pub struct Importer {
    db: Database,
}

impl Importer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Imports every currently-approved candidate of a document.
    pub fn import(&self, owner_id: &str, document_id: &str) -> Result<ImportOutcome> {
        let _span = info_span!("import_document", document_id = %document_id).entered();

        let document = document_repo::find_by_id(&self.db, owner_id, document_id)?
            .ok_or_else(|| IngestError::not_found("document", document_id))?;

        match document.status {
            DocumentStatus::Imported => {
                // Tolerate client retries.
                debug!("document already imported; nothing to do");
                return Ok(ImportOutcome {
                    imported_count: 0,
                    status: DocumentStatus::Imported,
                });
            }
            DocumentStatus::Processed => {}
            other => {
                return Err(IngestError::invalid_state(format!(
                    "document in status {} cannot be imported",
                    other.as_str()
                )))
            }
        }

        let approved = candidate_repo::list_approved(&self.db, &document.id)?;
        if approved.is_empty() {
            return Err(IngestError::NothingToImport {
                document_id: document.id,
            });
        }

        let mut imported = 0u32;
        for candidate in &approved {
            if candidate.imported_transaction_id.is_some() {
                // A previous (possibly partially failed) run covered this one.
                continue;
            }

            let txn = Transaction::from_candidate(owner_id, candidate);
            match ledger_repo::import_candidate(&self.db, &candidate.id, &txn) {
                Ok(true) => imported += 1,
                Ok(false) => {}
                Err(e) => {
                    // Committed pairs stay committed; a retry resumes here.
                    return Err(IngestError::ImportPartial {
                        document_id: document.id,
                        imported,
                        candidate_id: candidate.id.clone(),
                        source: e,
                    });
                }
            }
        }

        if !document_repo::mark_imported_if_processed(&self.db, &document.id)? {
            // A concurrent import won the swap; the rows are in either way.
            debug!("document status already advanced past Processed");
        }

        info!("imported {} transaction(s)", imported);
        Ok(ImportOutcome {
            imported_count: imported,
            status: DocumentStatus::Imported,
        })
    }
}
