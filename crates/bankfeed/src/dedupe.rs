//! Duplicate detection against the permanent ledger.
//!
//! A candidate is flagged when an existing ledger row has the exact same
//! cent amount, a date within two days, and a sufficiently similar
//! description. The flag is advice, never a merge: the candidate stays in
//! place and a reviewer can override it.
//!
//! Verdicts are re-derived on every run: a candidate flagged earlier that
//! no longer matches anything goes back to `Pending`. Only `Pending` and
//! `Duplicate` candidates are examined; reviewer decisions are never
//! revisited. The detector only reads the ledger, so identical inputs give
//! identical verdicts.

use std::collections::BTreeSet;

use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use crate::candidate::{CandidateStatus, PendingTransaction};
use crate::db::{candidate_repo, document_repo, ledger_repo, Database};
use crate::error::{IngestError, Result};
use crate::ledger::Transaction;

/// Candidate and ledger dates may differ by at most this many days.
pub const DATE_WINDOW_DAYS: i64 = 2;

/// Minimum token-overlap similarity between descriptions.
pub const SIMILARITY_THRESHOLD: f64 = 0.5;

/// Result of one duplicate check run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    /// Candidates examined (Pending or Duplicate).
    pub checked: u32,
    /// Candidates carrying a Duplicate verdict after the run.
    pub duplicates_found: u32,
}

pub struct DuplicateDetector {
    db: Database,
}

impl DuplicateDetector {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Re-derives duplicate verdicts for every undecided candidate of a
    /// document.
    pub fn check_document(&self, owner_id: &str, document_id: &str) -> Result<DuplicateReport> {
        let document = document_repo::find_by_id(&self.db, owner_id, document_id)?
            .ok_or_else(|| IngestError::not_found("document", document_id))?;

        let candidates: Vec<PendingTransaction> =
            candidate_repo::list_by_document(&self.db, owner_id, &document.id)?
                .into_iter()
                .filter(|c| {
                    matches!(
                        c.status,
                        CandidateStatus::Pending | CandidateStatus::Duplicate
                    )
                })
                .collect();

        if candidates.is_empty() {
            return Ok(DuplicateReport {
                checked: 0,
                duplicates_found: 0,
            });
        }

        // One ledger read covering every candidate date, padded by the window.
        let min_date = candidates.iter().map(|c| c.date).min().expect("non-empty");
        let max_date = candidates.iter().map(|c| c.date).max().expect("non-empty");
        let ledger = ledger_repo::query_window(
            &self.db,
            owner_id,
            min_date - Duration::days(DATE_WINDOW_DAYS),
            max_date + Duration::days(DATE_WINDOW_DAYS),
        )?;

        let mut duplicates_found = 0u32;
        for candidate in &candidates {
            match find_match(candidate, &ledger) {
                Some(txn) => {
                    duplicates_found += 1;
                    if candidate.status != CandidateStatus::Duplicate
                        || candidate.duplicate_of.as_deref() != Some(txn.id.as_str())
                    {
                        candidate_repo::mark_duplicate(&self.db, &candidate.id, &txn.id)?;
                    }
                }
                None => {
                    if candidate.status == CandidateStatus::Duplicate {
                        debug!("clearing stale duplicate verdict on '{}'", candidate.id);
                        candidate_repo::clear_duplicate(&self.db, &candidate.id)?;
                    }
                }
            }
        }

        Ok(DuplicateReport {
            checked: candidates.len() as u32,
            duplicates_found,
        })
    }
}

/// First ledger row matching the candidate, in (date, id) order. The
/// window query already sorts, which keeps the chosen `duplicate_of` stable
/// across runs.
fn find_match<'a>(
    candidate: &PendingTransaction,
    ledger: &'a [Transaction],
) -> Option<&'a Transaction> {
    ledger.iter().find(|txn| is_duplicate(candidate, txn))
}

/// The match policy: cent-equal amount, date within the window, similar
/// description.
pub fn is_duplicate(candidate: &PendingTransaction, txn: &Transaction) -> bool {
    if candidate.amount_cents != txn.amount_cents {
        return false;
    }
    if (candidate.date - txn.date).num_days().abs() > DATE_WINDOW_DAYS {
        return false;
    }
    description_similarity(&candidate.description, &txn.description) >= SIMILARITY_THRESHOLD
}

/// Case- and whitespace-insensitive token overlap (Jaccard index).
pub fn description_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

fn tokenize(s: &str) -> BTreeSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
