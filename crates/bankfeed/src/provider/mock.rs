//! Mock extraction provider: deterministic canned output, always available.
//!
//! Serves two purposes, both inherited from the original service: a
//! last-resort fallback when no real provider is reachable, and a test
//! double whose behavior is scripted per case.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{ExtractedRow, ExtractedStatement, ExtractionProvider, ProviderError};

#[derive(Debug, Clone)]
enum Behavior {
    Rows(Vec<ExtractedRow>),
    Empty,
    Fail(String),
    Unavailable,
}

pub struct MockProvider {
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Fixed sample statement, good enough to exercise the full pipeline.
    pub fn new() -> Self {
        Self::with_rows(Self::sample_rows())
    }

    pub fn with_rows(rows: Vec<ExtractedRow>) -> Self {
        Self {
            behavior: Behavior::Rows(rows),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Extraction succeeds but yields zero rows.
    pub fn empty() -> Self {
        Self {
            behavior: Behavior::Empty,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every extraction fails with a transport-style error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(message.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never passes the availability probe.
    pub fn unavailable() -> Self {
        Self {
            behavior: Behavior::Unavailable,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of extraction calls made against this instance.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared counter handle, for asserting after the provider moved into
    /// a registry.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn sample_rows() -> Vec<ExtractedRow> {
        vec![
            ExtractedRow {
                date: "2026-03-02".to_string(),
                description: "Grocery store".to_string(),
                original_description: Some("GROCERY MART #0042".to_string()),
                amount: 52.13,
                direction: "expense".to_string(),
                category: Some("Groceries".to_string()),
                confidence: 0.95,
            },
            ExtractedRow {
                date: "2026-03-05".to_string(),
                description: "Salary".to_string(),
                original_description: Some("ACH PAYROLL".to_string()),
                amount: 2400.00,
                direction: "income".to_string(),
                category: Some("Income".to_string()),
                confidence: 0.99,
            },
            ExtractedRow {
                date: "2026-03-07".to_string(),
                description: "Streaming subscription".to_string(),
                original_description: Some("STREAMCO MONTHLY".to_string()),
                amount: 12.99,
                direction: "expense".to_string(),
                category: Some("Subscriptions".to_string()),
                confidence: 0.90,
            },
        ]
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        !matches!(self.behavior, Behavior::Unavailable)
    }

    async fn extract(&self, _bytes: &[u8]) -> Result<ExtractedStatement, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Rows(rows) => Ok(ExtractedStatement {
                rows: rows.clone(),
                statement_start: Some("2026-03-01".to_string()),
                statement_end: Some("2026-03-31".to_string()),
            }),
            Behavior::Empty => Ok(ExtractedStatement::default()),
            Behavior::Fail(message) => Err(ProviderError::Http {
                name: "mock".to_string(),
                message: message.clone(),
            }),
            Behavior::Unavailable => Err(ProviderError::Unavailable {
                name: "mock".to_string(),
            }),
        }
    }
}
