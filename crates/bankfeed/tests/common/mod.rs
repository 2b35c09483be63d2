//! Test harness for isolated pipeline execution.
//!
//! Builds a full `IngestService` over an in-memory database, a temporary
//! upload directory and a scripted provider registry.

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use bankfeed::candidate::TransactionKind;
use bankfeed::config::IngestConfig;
use bankfeed::db::{ledger_repo, Database};
use bankfeed::document::BankDocument;
use bankfeed::ledger::Transaction;
use bankfeed::provider::{ExtractedRow, ExtractionProvider, MockProvider, ProviderRegistry};
use bankfeed::service::IngestService;
use bankfeed::storage::FileStorage;

pub struct TestHarness {
    /// Keeps the upload directory alive for the harness's lifetime.
    _temp_dir: TempDir,
    pub db: Database,
    pub service: IngestService,
}

impl TestHarness {
    /// Harness with the stock mock provider (three sample rows).
    pub fn new() -> Self {
        Self::with_provider(MockProvider::new())
    }

    /// Harness whose provider returns exactly the given rows.
    pub fn with_rows(rows: Vec<ExtractedRow>) -> Self {
        Self::with_provider(MockProvider::with_rows(rows))
    }

    /// Harness with a custom provider implementation.
    pub fn with_provider(provider: impl ExtractionProvider + 'static) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        let files = FileStorage::new(temp_dir.path());
        let providers = ProviderRegistry::new(vec![Arc::new(provider)]);
        let service = IngestService::new(db.clone(), files, providers, &IngestConfig::default());

        Self {
            _temp_dir: temp_dir,
            db,
            service,
        }
    }

    /// Uploads a minimal PDF payload and returns the registered document.
    pub fn upload(&self, owner: &str, name: &str) -> BankDocument {
        self.service
            .upload(owner, name, b"%PDF-1.4\nfake statement body", None)
            .expect("Failed to upload statement")
    }

    /// Seeds one ledger row directly (pre-existing history for duplicate
    /// matching). Returns its id.
    pub fn seed_ledger(&self, owner: &str, date: &str, description: &str, cents: i64) -> String {
        let txn = Transaction {
            id: uuid_like(description, date),
            owner_id: owner.to_string(),
            date: date.parse().expect("bad test date"),
            description: description.to_string(),
            amount_cents: cents,
            kind: TransactionKind::Expense,
            category: "Other".to_string(),
            document_id: None,
            created_at: chrono::Utc::now(),
        };
        ledger_repo::insert(&self.db, &txn).expect("Failed to seed ledger");
        txn.id
    }

    /// Total ledger rows for an owner, across all dates.
    pub fn ledger_count(&self, owner: &str) -> u32 {
        self.db
            .with_conn(|conn| {
                let count: u32 = conn.query_row(
                    "SELECT COUNT(*) FROM transactions WHERE owner_id = ?1",
                    [owner],
                    |r| r.get(0),
                )?;
                Ok(count)
            })
            .expect("Failed to count ledger rows")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic-ish readable ids for seeded rows.
fn uuid_like(description: &str, date: &str) -> String {
    format!(
        "seed-{}-{}",
        description.to_lowercase().replace(' ', "-"),
        date
    )
}

/// One provider row with sensible defaults.
pub fn extracted_row(date: &str, description: &str, amount: f64) -> ExtractedRow {
    ExtractedRow {
        date: date.to_string(),
        description: description.to_string(),
        original_description: Some(description.to_uppercase()),
        amount,
        direction: "expense".to_string(),
        category: Some("Other".to_string()),
        confidence: 0.9,
    }
}
