//! Document repository — owner-scoped CRUD plus the atomic status
//! operations the pipeline's concurrency model relies on.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};
use crate::document::{BankDocument, DocumentEvent, DocumentStatus};

/// Outcome of an attempt to claim a document for processing.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The document is now `Processing`; the caller owns the run.
    Claimed(BankDocument),
    NotFound,
    /// The current status does not accept a processing request.
    InvalidStatus(DocumentStatus),
    /// Re-extraction would discard reviewer decisions.
    HasDecisions(u32),
}

/// Outcome of a delete attempt.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// Deleted; carries the file_ref so the stored bytes can be removed too.
    Deleted { file_ref: String },
    NotFound,
    /// Deletion is disallowed while an extraction run is in flight.
    Processing,
}

fn conversion_err(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(format!("bad timestamp '{}': {}", s, e)))
}

fn from_row(row: &Row<'_>) -> Result<BankDocument, rusqlite::Error> {
    let status: String = row.get("status")?;
    let uploaded_at: String = row.get("uploaded_at")?;
    let processed_at: Option<String> = row.get("processed_at")?;
    let statement_start: Option<String> = row.get("statement_start")?;
    let statement_end: Option<String> = row.get("statement_end")?;

    let parse_date = |s: String| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| conversion_err(format!("bad date '{}': {}", s, e)))
    };

    Ok(BankDocument {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        original_name: row.get("original_name")?,
        file_ref: row.get("file_ref")?,
        status: DocumentStatus::parse(&status)
            .ok_or_else(|| conversion_err(format!("unknown document status '{}'", status)))?,
        uploaded_at: parse_timestamp(&uploaded_at)?,
        processed_at: processed_at.as_deref().map(parse_timestamp).transpose()?,
        provider_used: row.get("provider_used")?,
        account_ref: row.get("account_ref")?,
        transaction_count: row.get("transaction_count")?,
        processing_error: row.get("processing_error")?,
        statement_start: statement_start.map(parse_date).transpose()?,
        statement_end: statement_end.map(parse_date).transpose()?,
    })
}

/// Inserts a new document row.
pub fn insert(db: &Database, doc: &BankDocument) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO bank_documents (id, owner_id, original_name, file_ref, status,
             uploaded_at, processed_at, provider_used, account_ref, transaction_count,
             processing_error, statement_start, statement_end)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                doc.id,
                doc.owner_id,
                doc.original_name,
                doc.file_ref,
                doc.status.as_str(),
                doc.uploaded_at.to_rfc3339(),
                doc.processed_at.map(|t| t.to_rfc3339()),
                doc.provider_used,
                doc.account_ref,
                doc.transaction_count,
                doc.processing_error,
                doc.statement_start.map(|d| d.to_string()),
                doc.statement_end.map(|d| d.to_string()),
            ],
        )?;
        Ok(())
    })
}

/// Finds a document by id, scoped to its owner. Cross-owner lookups come
/// back as `None`, indistinguishable from a missing row.
pub fn find_by_id(
    db: &Database,
    owner_id: &str,
    id: &str,
) -> Result<Option<BankDocument>, DatabaseError> {
    db.with_conn(|conn| find_on_conn(conn, owner_id, id))
}

fn find_on_conn(
    conn: &Connection,
    owner_id: &str,
    id: &str,
) -> Result<Option<BankDocument>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM bank_documents WHERE id = ?1 AND owner_id = ?2")?;
    let mut rows = stmt.query_map(params![id, owner_id], from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Lists an owner's documents, most recently uploaded first.
pub fn list_by_owner(db: &Database, owner_id: &str) -> Result<Vec<BankDocument>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM bank_documents WHERE owner_id = ?1 ORDER BY uploaded_at DESC, id",
        )?;
        let docs = stmt
            .query_map(params![owner_id], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    })
}

/// Atomically claims a document for processing.
///
/// The whole read-check-update sequence runs under the connection lock, so
/// the `Processing` status doubles as the concurrency guard: a second caller
/// observes either `Processing` or the finished state, never a half-claim.
pub fn claim_processing(
    db: &Database,
    owner_id: &str,
    id: &str,
) -> Result<ClaimOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let Some(mut doc) = find_on_conn(conn, owner_id, id)? else {
            return Ok(ClaimOutcome::NotFound);
        };

        if doc.status.apply(DocumentEvent::Process).is_err() {
            return Ok(ClaimOutcome::InvalidStatus(doc.status));
        }

        if doc.status == DocumentStatus::Processed {
            let decided: u32 = conn.query_row(
                "SELECT COUNT(*) FROM pending_transactions
                 WHERE document_id = ?1 AND status != 'PENDING'",
                params![id],
                |r| r.get(0),
            )?;
            if decided > 0 {
                return Ok(ClaimOutcome::HasDecisions(decided));
            }
        }

        let updated = conn.execute(
            "UPDATE bank_documents SET status = 'PROCESSING', processing_error = NULL
             WHERE id = ?1 AND status = ?2",
            params![id, doc.status.as_str()],
        )?;
        if updated == 0 {
            // Raced with another request between read and write.
            return Ok(ClaimOutcome::InvalidStatus(DocumentStatus::Processing));
        }

        doc.status = DocumentStatus::Processing;
        doc.processing_error = None;
        Ok(ClaimOutcome::Claimed(doc))
    })
}

/// Marks a processing run as failed, recording the error.
pub fn mark_failed(db: &Database, id: &str, error: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE bank_documents SET status = 'FAILED', processing_error = ?2, processed_at = ?3
             WHERE id = ?1 AND status = 'PROCESSING'",
            params![id, error, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Compare-and-swap `Processed` -> `Imported`. Returns false when the
/// document was not in `Processed` (e.g. a concurrent import already won).
pub fn mark_imported_if_processed(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE bank_documents SET status = 'IMPORTED' WHERE id = ?1 AND status = 'PROCESSED'",
            params![id],
        )?;
        Ok(updated == 1)
    })
}

/// Deletes a document unless an extraction run is in flight. Candidate rows
/// cascade; ledger rows are untouched.
pub fn delete(db: &Database, owner_id: &str, id: &str) -> Result<DeleteOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let Some(doc) = find_on_conn(conn, owner_id, id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        if doc.status == DocumentStatus::Processing {
            return Ok(DeleteOutcome::Processing);
        }
        conn.execute(
            "DELETE FROM bank_documents WHERE id = ?1 AND owner_id = ?2 AND status != 'PROCESSING'",
            params![id, owner_id],
        )?;
        Ok(DeleteOutcome::Deleted {
            file_ref: doc.file_ref,
        })
    })
}
