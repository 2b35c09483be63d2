//! Extracted transaction candidates and the review state machine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::IngestError;

/// Direction of money movement, as inferred from the provider output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INCOME" => Some(Self::Income),
            "EXPENSE" => Some(Self::Expense),
            _ => None,
        }
    }

    /// Maps the free-form direction string reported by a provider.
    /// Credits and deposits count as income; everything else is an expense.
    pub fn from_direction(direction: &str) -> Self {
        match direction.trim().to_ascii_lowercase().as_str() {
            "income" | "credit" | "deposit" | "in" => Self::Income,
            _ => Self::Expense,
        }
    }
}

/// Review status of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    Pending,
    Approved,
    Rejected,
    Duplicate,
}

/// A reviewer decision on a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// A decision was applied to a candidate whose status does not accept it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot {action:?} a candidate in {from:?}")]
pub struct IllegalDecision {
    pub from: CandidateStatus,
    pub action: ReviewAction,
}

impl CandidateStatus {
    /// Applies a reviewer decision.
    ///
    /// Approve is legal from `Pending` and from `Duplicate` (explicit
    /// override of the detector's verdict). A rejected candidate can only
    /// come back through re-extraction, never through approval.
    pub fn apply(self, action: ReviewAction) -> Result<CandidateStatus, IllegalDecision> {
        match (self, action) {
            (Self::Pending | Self::Duplicate, ReviewAction::Approve) => Ok(Self::Approved),
            (Self::Pending | Self::Duplicate, ReviewAction::Reject) => Ok(Self::Rejected),
            (from, action) => Err(IllegalDecision { from, action }),
        }
    }

    /// True once a human (or the detector) has moved the candidate out of
    /// `Pending`. Decided candidates block re-extraction of their document.
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Duplicate => "DUPLICATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "DUPLICATE" => Some(Self::Duplicate),
            _ => None,
        }
    }
}

/// A single extracted transaction awaiting a decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub id: String,
    pub document_id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Raw description exactly as it appeared on the statement.
    pub original_description: String,
    /// Fixed-point currency in cents; always strictly positive.
    pub amount_cents: i64,
    pub kind: TransactionKind,
    pub category: String,
    /// Reviewer-assigned category, taking precedence over `category` at import.
    pub user_category: Option<String>,
    /// Provider confidence, clamped to [0, 1].
    pub confidence: f64,
    pub status: CandidateStatus,
    /// Ledger transaction this candidate likely duplicates.
    pub duplicate_of: Option<String>,
    /// Ledger row produced from this candidate, once imported.
    pub imported_transaction_id: Option<String>,
}

impl PendingTransaction {
    /// Category that ends up on the ledger row: the reviewer's override if
    /// present, otherwise the provider's suggestion.
    pub fn effective_category(&self) -> &str {
        self.user_category.as_deref().unwrap_or(&self.category)
    }
}

/// Field updates applied to a `Pending` candidate. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEdit {
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount_cents: Option<i64>,
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
}

impl CandidateEdit {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.date.is_none()
            && self.amount_cents.is_none()
            && self.kind.is_none()
            && self.category.is_none()
    }

    /// Rejects malformed input before anything is written.
    pub fn validate(&self) -> Result<(), IngestError> {
        if let Some(description) = &self.description {
            if description.trim().is_empty() {
                return Err(IngestError::validation("description must not be empty"));
            }
        }
        if let Some(amount) = self.amount_cents {
            if amount <= 0 {
                return Err(IngestError::validation(
                    "amount must be a positive number of cents",
                ));
            }
        }
        if let Some(category) = &self.category {
            if category.trim().is_empty() {
                return Err(IngestError::validation("category must not be empty"));
            }
        }
        Ok(())
    }
}
