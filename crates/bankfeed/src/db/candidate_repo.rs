//! Candidate repository — CRUD for `pending_transactions`, the
//! status-conditioned writes used by the review engine, and the atomic
//! extraction commit.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};
use crate::candidate::{CandidateEdit, CandidateStatus, PendingTransaction, TransactionKind};

fn conversion_err(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

fn from_row(row: &Row<'_>) -> Result<PendingTransaction, rusqlite::Error> {
    let date: String = row.get("date")?;
    let kind: String = row.get("kind")?;
    let status: String = row.get("status")?;

    Ok(PendingTransaction {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| conversion_err(format!("bad date '{}': {}", date, e)))?,
        description: row.get("description")?,
        original_description: row.get("original_description")?,
        amount_cents: row.get("amount_cents")?,
        kind: TransactionKind::parse(&kind)
            .ok_or_else(|| conversion_err(format!("unknown kind '{}'", kind)))?,
        category: row.get("category")?,
        user_category: row.get("user_category")?,
        confidence: row.get("confidence")?,
        status: CandidateStatus::parse(&status)
            .ok_or_else(|| conversion_err(format!("unknown candidate status '{}'", status)))?,
        duplicate_of: row.get("duplicate_of")?,
        imported_transaction_id: row.get("imported_transaction_id")?,
    })
}

fn insert_on_conn(conn: &Connection, candidate: &PendingTransaction) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pending_transactions (id, document_id, date, description,
         original_description, amount_cents, kind, category, user_category, confidence,
         status, duplicate_of, imported_transaction_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            candidate.id,
            candidate.document_id,
            candidate.date.to_string(),
            candidate.description,
            candidate.original_description,
            candidate.amount_cents,
            candidate.kind.as_str(),
            candidate.category,
            candidate.user_category,
            candidate.confidence,
            candidate.status.as_str(),
            candidate.duplicate_of,
            candidate.imported_transaction_id,
        ],
    )?;
    Ok(())
}

/// Commits a successful extraction in one transaction: drops the document's
/// un-reviewed (PENDING-only) candidates from any earlier run, inserts the
/// fresh set and flips the document to `Processed`.
///
/// Running the discard inside the success commit means a failed re-run never
/// disturbs candidates from an earlier one.
#[allow(clippy::too_many_arguments)]
pub fn commit_extraction(
    db: &Database,
    document_id: &str,
    provider: &str,
    processed_at: DateTime<Utc>,
    statement_start: Option<NaiveDate>,
    statement_end: Option<NaiveDate>,
    candidates: &[PendingTransaction],
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM pending_transactions WHERE document_id = ?1 AND status = 'PENDING'",
            params![document_id],
        )?;

        for candidate in candidates {
            insert_on_conn(&tx, candidate)?;
        }

        tx.execute(
            "UPDATE bank_documents SET status = 'PROCESSED', transaction_count = ?2,
             provider_used = ?3, processed_at = ?4, processing_error = NULL,
             statement_start = ?5, statement_end = ?6
             WHERE id = ?1",
            params![
                document_id,
                candidates.len() as u32,
                provider,
                processed_at.to_rfc3339(),
                statement_start.map(|d| d.to_string()),
                statement_end.map(|d| d.to_string()),
            ],
        )?;

        tx.commit()?;
        Ok(())
    })
}

/// Finds a candidate by id, scoped to the owning user via its document.
pub fn find_by_id(
    db: &Database,
    owner_id: &str,
    id: &str,
) -> Result<Option<PendingTransaction>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT p.* FROM pending_transactions p
             JOIN bank_documents d ON d.id = p.document_id
             WHERE p.id = ?1 AND d.owner_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![id, owner_id], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists a document's candidates in statement order (date, then id).
pub fn list_by_document(
    db: &Database,
    owner_id: &str,
    document_id: &str,
) -> Result<Vec<PendingTransaction>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT p.* FROM pending_transactions p
             JOIN bank_documents d ON d.id = p.document_id
             WHERE p.document_id = ?1 AND d.owner_id = ?2
             ORDER BY p.date, p.id",
        )?;
        let rows = stmt
            .query_map(params![document_id, owner_id], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Applies an edit to a candidate, guarded by the `Pending` precondition.
/// Returns false when the status changed since it was read (no write happens).
pub fn apply_edit(db: &Database, id: &str, edit: &CandidateEdit) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(id.to_string())];

        if let Some(description) = &edit.description {
            values.push(Box::new(description.clone()));
            sets.push(format!("description = ?{}", values.len()));
        }
        if let Some(date) = edit.date {
            values.push(Box::new(date.to_string()));
            sets.push(format!("date = ?{}", values.len()));
        }
        if let Some(amount) = edit.amount_cents {
            values.push(Box::new(amount));
            sets.push(format!("amount_cents = ?{}", values.len()));
        }
        if let Some(kind) = edit.kind {
            values.push(Box::new(kind.as_str().to_string()));
            sets.push(format!("kind = ?{}", values.len()));
        }
        if let Some(category) = &edit.category {
            values.push(Box::new(category.clone()));
            sets.push(format!("user_category = ?{}", values.len()));
        }

        if sets.is_empty() {
            return Ok(true);
        }

        let sql = format!(
            "UPDATE pending_transactions SET {} WHERE id = ?1 AND status = 'PENDING'",
            sets.join(", ")
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(|v| v.as_ref()).collect();
        let updated = conn.execute(&sql, params_ref.as_slice())?;
        Ok(updated == 1)
    })
}

/// Conditional status write: succeeds only when the row still carries the
/// status observed at read time.
pub fn set_status_if(
    db: &Database,
    id: &str,
    from: CandidateStatus,
    to: CandidateStatus,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE pending_transactions SET status = ?3 WHERE id = ?1 AND status = ?2",
            params![id, from.as_str(), to.as_str()],
        )?;
        Ok(updated == 1)
    })
}

/// Flags a candidate as a likely duplicate of a ledger row.
pub fn mark_duplicate(db: &Database, id: &str, duplicate_of: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE pending_transactions SET status = 'DUPLICATE', duplicate_of = ?2
             WHERE id = ?1 AND status IN ('PENDING', 'DUPLICATE')",
            params![id, duplicate_of],
        )?;
        Ok(())
    })
}

/// Clears a duplicate verdict that no longer holds.
pub fn clear_duplicate(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE pending_transactions SET status = 'PENDING', duplicate_of = NULL
             WHERE id = ?1 AND status = 'DUPLICATE'",
            params![id],
        )?;
        Ok(())
    })
}

/// Lists a document's approved candidates (the importer's working set).
pub fn list_approved(
    db: &Database,
    document_id: &str,
) -> Result<Vec<PendingTransaction>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM pending_transactions
             WHERE document_id = ?1 AND status = 'APPROVED'
             ORDER BY date, id",
        )?;
        let rows = stmt
            .query_map(params![document_id], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Per-status candidate count and cent total for a document.
pub fn status_summary(
    db: &Database,
    document_id: &str,
) -> Result<Vec<(CandidateStatus, u32, i64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*), COALESCE(SUM(amount_cents), 0)
             FROM pending_transactions WHERE document_id = ?1
             GROUP BY status ORDER BY status",
        )?;
        let rows = stmt
            .query_map(params![document_id], |row| {
                let status: String = row.get(0)?;
                Ok((
                    CandidateStatus::parse(&status).ok_or_else(|| {
                        conversion_err(format!("unknown candidate status '{}'", status))
                    })?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
