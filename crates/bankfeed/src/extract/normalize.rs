//! Normalization of raw provider rows into candidates.
//!
//! Providers report loosely typed data (string dates, float amounts,
//! free-form directions). Everything is pinned down here: canonical
//! calendar dates, integer cents, a typed kind and clamped confidence.
//! Rows that cannot be normalized are skipped, not fatal: a statement
//! with one garbled line still yields the rest.

use chrono::NaiveDate;
use tracing::warn;

use crate::candidate::{CandidateStatus, PendingTransaction, TransactionKind};
use crate::provider::{ExtractedRow, ExtractedStatement};

/// Fallback formats for providers that ignore the YYYY-MM-DD instruction.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d/%m/%Y",
    "%d/%m/%y",
    "%m-%d-%Y",
    "%m-%d-%y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parses a provider-reported date, ISO first.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Converts a decimal amount to positive integer cents, rounding to the
/// nearest cent. Zero, non-finite and absurdly large values are rejected.
pub fn to_cents(amount: f64) -> Option<i64> {
    if !amount.is_finite() {
        return None;
    }
    let cents = (amount.abs() * 100.0).round();
    if cents <= 0.0 || cents > 1e15 {
        return None;
    }
    Some(cents as i64)
}

pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Builds a `Pending` candidate from one provider row.
pub fn normalize_row(document_id: &str, row: &ExtractedRow) -> Option<PendingTransaction> {
    let date = parse_date(&row.date)?;
    let amount_cents = to_cents(row.amount)?;

    let description = {
        let trimmed = row.description.trim();
        if trimmed.is_empty() {
            "Unknown".to_string()
        } else {
            trimmed.to_string()
        }
    };

    Some(PendingTransaction {
        id: uuid::Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        date,
        original_description: row
            .original_description
            .clone()
            .unwrap_or_else(|| description.clone()),
        description,
        amount_cents,
        kind: TransactionKind::from_direction(&row.direction),
        category: row.category.clone().unwrap_or_else(|| "Other".to_string()),
        user_category: None,
        confidence: clamp_confidence(row.confidence),
        status: CandidateStatus::Pending,
        duplicate_of: None,
        imported_transaction_id: None,
    })
}

/// Normalizes a whole provider statement. Returns the candidates plus the
/// number of rows dropped as unusable.
pub fn normalize_statement(
    document_id: &str,
    statement: &ExtractedStatement,
) -> (Vec<PendingTransaction>, usize) {
    let mut candidates = Vec::with_capacity(statement.rows.len());
    let mut skipped = 0usize;

    for row in &statement.rows {
        match normalize_row(document_id, row) {
            Some(candidate) => candidates.push(candidate),
            None => {
                skipped += 1;
                warn!(
                    "skipping unusable extracted row (date '{}', amount {})",
                    row.date, row.amount
                );
            }
        }
    }

    (candidates, skipped)
}

/// Statement period dates share the transaction date formats.
pub fn parse_statement_period(
    statement: &ExtractedStatement,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    (
        statement.statement_start.as_deref().and_then(parse_date),
        statement.statement_end.as_deref().and_then(parse_date),
    )
}
