//! The ingestion service facade.
//!
//! Wires storage, providers and the pipeline stages behind one owner-scoped
//! surface. Every operation takes the authenticated owner id; anything the
//! owner cannot see is NotFound, never Forbidden.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::candidate::{CandidateEdit, PendingTransaction, ReviewAction};
use crate::config::IngestConfig;
use crate::db::{self, document_repo, Database};
use crate::dedupe::{DuplicateDetector, DuplicateReport};
use crate::document::BankDocument;
use crate::error::{IngestError, Result};
use crate::extract::{ExtractionCoordinator, ProcessOutcome};
use crate::import::{ImportOutcome, Importer};
use crate::provider::{ProviderInfo, ProviderRegistry};
use crate::review::{BulkOutcome, ReviewEngine, ReviewSummary};
use crate::storage::FileStorage;

pub struct IngestService {
    db: Database,
    files: Arc<FileStorage>,
    providers: Arc<ProviderRegistry>,
    coordinator: ExtractionCoordinator,
    detector: DuplicateDetector,
    review: ReviewEngine,
    importer: Importer,
    max_upload_bytes: u64,
}

impl IngestService {
    /// Assembles the service from explicit collaborators (tests swap in a
    /// scripted provider registry here).
    pub fn new(
        db: Database,
        files: FileStorage,
        providers: ProviderRegistry,
        config: &IngestConfig,
    ) -> Self {
        let files = Arc::new(files);
        let providers = Arc::new(providers);

        Self {
            coordinator: ExtractionCoordinator::new(
                db.clone(),
                files.clone(),
                providers.clone(),
                Duration::from_secs(config.providers.request_timeout_secs),
            ),
            detector: DuplicateDetector::new(db.clone()),
            review: ReviewEngine::new(db.clone()),
            importer: Importer::new(db.clone()),
            db,
            files,
            providers,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Production constructor — opens the database and upload directory
    /// from config and registers the built-in providers.
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        let db_path = match &config.database_path {
            Some(path) => path.clone(),
            None => db::default_database_path().ok_or_else(|| {
                IngestError::validation("no database path configured and no home directory found")
            })?,
        };
        let db = Database::open(&db_path)?;
        let files = FileStorage::new(&config.upload_directory);
        let providers = ProviderRegistry::from_config(&config.providers);
        Ok(Self::new(db, files, providers, config))
    }

    /// Registers an uploaded statement: validates the payload, stores the
    /// bytes and creates a `Pending` document.
    pub fn upload(
        &self,
        owner_id: &str,
        original_name: &str,
        bytes: &[u8],
        account_ref: Option<&str>,
    ) -> Result<BankDocument> {
        if owner_id.trim().is_empty() {
            return Err(IngestError::validation("owner id must not be empty"));
        }
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(IngestError::validation(format!(
                "file too large: {} bytes (maximum {})",
                bytes.len(),
                self.max_upload_bytes
            )));
        }
        if !bytes.starts_with(b"%PDF-") {
            return Err(IngestError::validation(
                "only PDF bank statements are supported",
            ));
        }
        // A name like "statement.csv" on PDF bytes is almost always the
        // wrong file picked; reject rather than guess.
        if let Some(guessed) = mime_guess::from_path(original_name).first() {
            if guessed != mime_guess::mime::APPLICATION_PDF {
                return Err(IngestError::validation(format!(
                    "file name suggests '{}', expected a PDF",
                    guessed
                )));
            }
        }

        let file_ref = format!("{}.pdf", uuid::Uuid::new_v4());
        self.files.store(&file_ref, bytes)?;

        let document = BankDocument::new(
            owner_id,
            original_name,
            file_ref,
            account_ref.map(str::to_string),
        );
        if let Err(e) = document_repo::insert(&self.db, &document) {
            // Don't leave orphaned bytes behind a failed insert.
            if let Err(cleanup) = self.files.remove(&document.file_ref) {
                warn!("failed to clean up stored upload: {}", cleanup);
            }
            return Err(e.into());
        }

        info!(
            "registered upload '{}' as document {}",
            original_name, document.id
        );
        Ok(document)
    }

    /// Runs extraction for an uploaded document.
    pub async fn process(
        &self,
        owner_id: &str,
        document_id: &str,
        provider_hint: Option<&str>,
    ) -> Result<ProcessOutcome> {
        self.coordinator
            .process(owner_id, document_id, provider_hint)
            .await
    }

    pub fn list_documents(&self, owner_id: &str) -> Result<Vec<BankDocument>> {
        Ok(document_repo::list_by_owner(&self.db, owner_id)?)
    }

    pub fn get_document(&self, owner_id: &str, document_id: &str) -> Result<BankDocument> {
        document_repo::find_by_id(&self.db, owner_id, document_id)?
            .ok_or_else(|| IngestError::not_found("document", document_id))
    }

    pub fn list_candidates(
        &self,
        owner_id: &str,
        document_id: &str,
    ) -> Result<Vec<PendingTransaction>> {
        self.review.list(owner_id, document_id)
    }

    /// Ids of a document's candidates still awaiting a decision.
    pub fn pending_candidate_ids(&self, owner_id: &str, document_id: &str) -> Result<Vec<String>> {
        self.review.pending_ids(owner_id, document_id)
    }

    pub fn edit_candidate(
        &self,
        owner_id: &str,
        candidate_id: &str,
        edit: &CandidateEdit,
    ) -> Result<PendingTransaction> {
        self.review.edit(owner_id, candidate_id, edit)
    }

    pub fn approve_candidate(
        &self,
        owner_id: &str,
        candidate_id: &str,
    ) -> Result<PendingTransaction> {
        self.review.approve(owner_id, candidate_id)
    }

    pub fn reject_candidate(
        &self,
        owner_id: &str,
        candidate_id: &str,
    ) -> Result<PendingTransaction> {
        self.review.reject(owner_id, candidate_id)
    }

    pub fn bulk_review(
        &self,
        owner_id: &str,
        ids: &[String],
        action: ReviewAction,
    ) -> Vec<BulkOutcome> {
        self.review.bulk(owner_id, ids, action)
    }

    pub fn check_duplicates(&self, owner_id: &str, document_id: &str) -> Result<DuplicateReport> {
        self.detector.check_document(owner_id, document_id)
    }

    pub fn import(&self, owner_id: &str, document_id: &str) -> Result<ImportOutcome> {
        self.importer.import(owner_id, document_id)
    }

    pub fn summary(&self, owner_id: &str, document_id: &str) -> Result<ReviewSummary> {
        self.review.summary(owner_id, document_id)
    }

    /// Deletes a document and its stored bytes. Un-imported candidates
    /// cascade away; ledger rows always survive.
    pub fn delete_document(&self, owner_id: &str, document_id: &str) -> Result<()> {
        use document_repo::DeleteOutcome;

        match document_repo::delete(&self.db, owner_id, document_id)? {
            DeleteOutcome::Deleted { file_ref } => {
                if let Err(e) = self.files.remove(&file_ref) {
                    warn!("document row deleted but file removal failed: {}", e);
                }
                Ok(())
            }
            DeleteOutcome::NotFound => Err(IngestError::not_found("document", document_id)),
            DeleteOutcome::Processing => Err(IngestError::invalid_state(
                "document is being processed and cannot be deleted",
            )),
        }
    }

    /// Availability report for every registered extraction provider.
    pub async fn list_providers(&self) -> Vec<ProviderInfo> {
        self.providers.list().await
    }
}
