//! Permanent ledger transactions.
//!
//! Rows are created exclusively by the importer and never mutated by this
//! pipeline afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::candidate::{PendingTransaction, TransactionKind};

/// A confirmed, owner-scoped ledger transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub owner_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount_cents: i64,
    pub kind: TransactionKind,
    pub category: String,
    /// Document this row was imported from, when it came through the pipeline.
    pub document_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds the ledger row for an approved candidate.
    pub fn from_candidate(owner_id: &str, candidate: &PendingTransaction) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            date: candidate.date,
            description: candidate.description.clone(),
            amount_cents: candidate.amount_cents,
            kind: candidate.kind,
            category: candidate.effective_category().to_string(),
            document_id: Some(candidate.document_id.clone()),
            created_at: Utc::now(),
        }
    }
}
