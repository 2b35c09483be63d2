//! Ledger repository — permanent transaction rows.
//!
//! The import pairing (`import_candidate`) is the only writer; duplicate
//! detection reads through `query_window`.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::candidate::TransactionKind;
use crate::ledger::Transaction;

fn conversion_err(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

fn from_row(row: &Row<'_>) -> Result<Transaction, rusqlite::Error> {
    let date: String = row.get("date")?;
    let kind: String = row.get("kind")?;
    let created_at: String = row.get("created_at")?;

    Ok(Transaction {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| conversion_err(format!("bad date '{}': {}", date, e)))?,
        description: row.get("description")?,
        amount_cents: row.get("amount_cents")?,
        kind: TransactionKind::parse(&kind)
            .ok_or_else(|| conversion_err(format!("unknown kind '{}'", kind)))?,
        category: row.get("category")?,
        document_id: row.get("document_id")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_err(format!("bad timestamp '{}': {}", created_at, e)))?,
    })
}

/// Inserts a ledger transaction directly (test fixtures and non-pipeline
/// callers; the importer goes through `import_candidate`).
pub fn insert(db: &Database, txn: &Transaction) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO transactions (id, owner_id, date, description, amount_cents,
             kind, category, document_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                txn.id,
                txn.owner_id,
                txn.date.to_string(),
                txn.description,
                txn.amount_cents,
                txn.kind.as_str(),
                txn.category,
                txn.document_id,
                txn.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Atomically materializes one approved candidate: writes the ledger row and
/// stamps the candidate's `imported_transaction_id` in a single transaction.
///
/// The stamp is guarded by `imported_transaction_id IS NULL`, so a candidate
/// that already produced a row is skipped (returns false); retries and
/// concurrent imports can never double-insert.
pub fn import_candidate(
    db: &Database,
    candidate_id: &str,
    txn: &Transaction,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;

        let claimed = tx.execute(
            "UPDATE pending_transactions SET imported_transaction_id = ?2
             WHERE id = ?1 AND status = 'APPROVED' AND imported_transaction_id IS NULL",
            params![candidate_id, txn.id],
        )?;
        if claimed == 0 {
            // Already imported (or no longer approved); leave everything as is.
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO transactions (id, owner_id, date, description, amount_cents,
             kind, category, document_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                txn.id,
                txn.owner_id,
                txn.date.to_string(),
                txn.description,
                txn.amount_cents,
                txn.kind.as_str(),
                txn.category,
                txn.document_id,
                txn.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(true)
    })
}

/// Ledger rows for an owner within an inclusive date window, ordered by
/// date then id so downstream matching is deterministic.
pub fn query_window(
    db: &Database,
    owner_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Transaction>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM transactions
             WHERE owner_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, id",
        )?;
        let rows = stmt
            .query_map(params![owner_id, from.to_string(), to.to_string()], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts ledger rows imported from a given document.
pub fn count_by_document(db: &Database, document_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE document_id = ?1",
            params![document_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
