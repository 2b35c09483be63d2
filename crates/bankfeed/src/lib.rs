pub mod candidate;
pub mod config;
pub mod db;
pub mod dedupe;
pub mod document;
pub mod error;
pub mod extract;
pub mod import;
pub mod ledger;
pub mod provider;
pub mod review;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use candidate::{CandidateEdit, CandidateStatus, PendingTransaction, ReviewAction, TransactionKind};
pub use config::{load_config, IngestConfig};
pub use dedupe::{DuplicateDetector, DuplicateReport};
pub use document::{BankDocument, DocumentStatus};
pub use error::{IngestError, Result};
pub use extract::{ExtractionCoordinator, ProcessOutcome};
pub use import::{ImportOutcome, Importer};
pub use ledger::Transaction;
pub use provider::{ExtractionProvider, ProviderError, ProviderRegistry};
pub use review::{BulkOutcome, ReviewEngine, ReviewSummary};
pub use service::IngestService;
