//! Review engine: per-candidate edits and decisions, plus bulk actions
//! with per-id outcomes.
//!
//! Every mutation is a read-then-conditional-write: the UPDATE carries the
//! status observed at read time, so a decision never lands on a candidate
//! that changed concurrently.

use serde::Serialize;
use tracing::info;

use crate::candidate::{CandidateEdit, CandidateStatus, PendingTransaction, ReviewAction};
use crate::db::{candidate_repo, document_repo, Database};
use crate::error::{IngestError, Result};

/// Per-id result of a bulk action. One illegal transition never blocks the
/// rest of the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub candidate_id: String,
    pub success: bool,
    pub new_status: Option<CandidateStatus>,
    pub error: Option<String>,
}

impl BulkOutcome {
    fn ok(candidate_id: &str, new_status: CandidateStatus) -> Self {
        Self {
            candidate_id: candidate_id.to_string(),
            success: true,
            new_status: Some(new_status),
            error: None,
        }
    }

    fn failed(candidate_id: &str, error: String) -> Self {
        Self {
            candidate_id: candidate_id.to_string(),
            success: false,
            new_status: None,
            error: Some(error),
        }
    }
}

/// Candidate counts and totals for one document's review session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub pending: u32,
    pub approved: u32,
    pub rejected: u32,
    pub duplicate: u32,
    /// Cent total of the approved set (what an import would move).
    pub approved_cents: i64,
    pub ready_to_import: u32,
}

pub struct ReviewEngine {
    db: Database,
}

impl ReviewEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Lists a document's candidates. The document must exist for the owner.
    pub fn list(&self, owner_id: &str, document_id: &str) -> Result<Vec<PendingTransaction>> {
        self.require_document(owner_id, document_id)?;
        Ok(candidate_repo::list_by_document(
            &self.db, owner_id, document_id,
        )?)
    }

    /// The select-all set: ids of candidates still awaiting a decision.
    pub fn pending_ids(&self, owner_id: &str, document_id: &str) -> Result<Vec<String>> {
        Ok(self
            .list(owner_id, document_id)?
            .into_iter()
            .filter(|c| c.status == CandidateStatus::Pending)
            .map(|c| c.id)
            .collect())
    }

    /// Edits a `Pending` candidate. Validation happens before any write;
    /// the write itself is guarded by the Pending precondition.
    pub fn edit(
        &self,
        owner_id: &str,
        candidate_id: &str,
        edit: &CandidateEdit,
    ) -> Result<PendingTransaction> {
        edit.validate()?;

        let candidate = self.require_candidate(owner_id, candidate_id)?;
        if candidate.status != CandidateStatus::Pending {
            return Err(IngestError::invalid_state(format!(
                "only PENDING candidates can be edited (candidate is {})",
                candidate.status.as_str()
            )));
        }

        if edit.is_empty() {
            return Ok(candidate);
        }

        if !candidate_repo::apply_edit(&self.db, candidate_id, edit)? {
            return Err(IngestError::invalid_state(
                "candidate status changed concurrently; re-read and retry",
            ));
        }

        self.require_candidate(owner_id, candidate_id)
    }

    pub fn approve(&self, owner_id: &str, candidate_id: &str) -> Result<PendingTransaction> {
        self.decide(owner_id, candidate_id, ReviewAction::Approve)
    }

    pub fn reject(&self, owner_id: &str, candidate_id: &str) -> Result<PendingTransaction> {
        self.decide(owner_id, candidate_id, ReviewAction::Reject)
    }

    /// Applies one decision with the legal-transition rules of the
    /// candidate state machine.
    pub fn decide(
        &self,
        owner_id: &str,
        candidate_id: &str,
        action: ReviewAction,
    ) -> Result<PendingTransaction> {
        let candidate = self.require_candidate(owner_id, candidate_id)?;

        let next = candidate
            .status
            .apply(action)
            .map_err(|e| IngestError::invalid_state(e.to_string()))?;

        if !candidate_repo::set_status_if(&self.db, candidate_id, candidate.status, next)? {
            return Err(IngestError::invalid_state(
                "candidate status changed concurrently; re-read and retry",
            ));
        }

        if candidate.status == CandidateStatus::Duplicate && next == CandidateStatus::Approved {
            info!("duplicate verdict on '{}' overridden by approval", candidate_id);
        }

        self.require_candidate(owner_id, candidate_id)
    }

    /// Applies one action to many candidates independently, reporting a
    /// per-id outcome for each.
    pub fn bulk(&self, owner_id: &str, ids: &[String], action: ReviewAction) -> Vec<BulkOutcome> {
        ids.iter()
            .map(|id| match self.decide(owner_id, id, action) {
                Ok(candidate) => BulkOutcome::ok(id, candidate.status),
                Err(e) => BulkOutcome::failed(id, e.to_string()),
            })
            .collect()
    }

    /// Counts and totals per status for a document.
    pub fn summary(&self, owner_id: &str, document_id: &str) -> Result<ReviewSummary> {
        self.require_document(owner_id, document_id)?;

        let mut summary = ReviewSummary::default();
        for (status, count, cents) in candidate_repo::status_summary(&self.db, document_id)? {
            match status {
                CandidateStatus::Pending => summary.pending = count,
                CandidateStatus::Approved => {
                    summary.approved = count;
                    summary.approved_cents = cents;
                }
                CandidateStatus::Rejected => summary.rejected = count,
                CandidateStatus::Duplicate => summary.duplicate = count,
            }
        }
        summary.ready_to_import = summary.approved;
        Ok(summary)
    }

    fn require_document(&self, owner_id: &str, document_id: &str) -> Result<()> {
        document_repo::find_by_id(&self.db, owner_id, document_id)?
            .ok_or_else(|| IngestError::not_found("document", document_id))?;
        Ok(())
    }

    fn require_candidate(&self, owner_id: &str, candidate_id: &str) -> Result<PendingTransaction> {
        candidate_repo::find_by_id(&self.db, owner_id, candidate_id)?
            .ok_or_else(|| IngestError::not_found("candidate", candidate_id))
    }
}
