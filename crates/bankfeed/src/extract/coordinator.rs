//! Extraction coordinator: claims a document, runs the selected provider
//! under a deadline and commits (or fails) the run.
//!
//! The provider call holds no database lock; the document's `Processing`
//! status is the concurrency guard. Every claimed run concludes in
//! `Processed` or `Failed`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use super::normalize;
use crate::db::{candidate_repo, document_repo, Database};
use crate::document::{BankDocument, DocumentStatus};
use crate::error::{IngestError, Result};
use crate::provider::{ProviderError, ProviderRegistry};
use crate::storage::FileStorage;

/// Result of a completed processing request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub status: DocumentStatus,
    pub transaction_count: u32,
    pub provider: String,
}

pub struct ExtractionCoordinator {
    db: Database,
    files: Arc<FileStorage>,
    providers: Arc<ProviderRegistry>,
    request_timeout: Duration,
}

impl ExtractionCoordinator {
    pub fn new(
        db: Database,
        files: Arc<FileStorage>,
        providers: Arc<ProviderRegistry>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            db,
            files,
            providers,
            request_timeout,
        }
    }

    /// Processes an uploaded document into candidates.
    pub async fn process(
        &self,
        owner_id: &str,
        document_id: &str,
        provider_hint: Option<&str>,
    ) -> Result<ProcessOutcome> {
        let span = info_span!("process_document", document_id = %document_id);
        async {
            let document = self.claim(owner_id, document_id)?;

            match self.run_extraction(&document, provider_hint).await {
                Ok(outcome) => {
                    info!(
                        "extracted {} candidates via '{}'",
                        outcome.transaction_count, outcome.provider
                    );
                    Ok(outcome)
                }
                Err(e) => {
                    // The claim succeeded, so the run must conclude: record
                    // the failure rather than leaving the document Processing.
                    if let Err(mark_err) =
                        document_repo::mark_failed(&self.db, &document.id, &e.to_string())
                    {
                        warn!("failed to mark document as failed: {}", mark_err);
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn claim(&self, owner_id: &str, document_id: &str) -> Result<BankDocument> {
        use document_repo::ClaimOutcome;

        match document_repo::claim_processing(&self.db, owner_id, document_id)? {
            ClaimOutcome::Claimed(document) => Ok(document),
            ClaimOutcome::NotFound => Err(IngestError::not_found("document", document_id)),
            ClaimOutcome::InvalidStatus(DocumentStatus::Processing) => Err(
                IngestError::invalid_state("document is already being processed"),
            ),
            ClaimOutcome::InvalidStatus(DocumentStatus::Imported) => Err(
                IngestError::invalid_state("document has already been imported"),
            ),
            ClaimOutcome::InvalidStatus(status) => Err(IngestError::invalid_state(format!(
                "document in status {} cannot be processed",
                status.as_str()
            ))),
            ClaimOutcome::HasDecisions(count) => Err(IngestError::invalid_state(format!(
                "document has {} reviewed candidate(s); re-processing would discard decisions",
                count
            ))),
        }
    }

    async fn run_extraction(
        &self,
        document: &BankDocument,
        provider_hint: Option<&str>,
    ) -> Result<ProcessOutcome> {
        let bytes = self.files.read(&document.file_ref)?;

        let provider = self.providers.select(provider_hint).await?;
        let provider_name = provider.name().to_string();

        let statement =
            match tokio::time::timeout(self.request_timeout, provider.extract(&bytes)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ProviderError::Timeout {
                        name: provider_name,
                        seconds: self.request_timeout.as_secs(),
                    }
                    .into())
                }
            };

        let (candidates, skipped) = normalize::normalize_statement(&document.id, &statement);
        if skipped > 0 {
            warn!("{} extracted row(s) were unusable", skipped);
        }
        if candidates.is_empty() {
            return Err(ProviderError::EmptyExtraction {
                name: provider_name,
            }
            .into());
        }

        let (statement_start, statement_end) = normalize::parse_statement_period(&statement);

        candidate_repo::commit_extraction(
            &self.db,
            &document.id,
            &provider_name,
            Utc::now(),
            statement_start,
            statement_end,
            &candidates,
        )?;

        Ok(ProcessOutcome {
            status: DocumentStatus::Processed,
            transaction_count: candidates.len() as u32,
            provider: provider_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateStatus;
    use crate::provider::{ExtractedStatement, ExtractionProvider, MockProvider};
    use tempfile::TempDir;

    struct SlowProvider;

    #[async_trait::async_trait]
    impl ExtractionProvider for SlowProvider {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn extract(&self, _bytes: &[u8]) -> std::result::Result<ExtractedStatement, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Default::default())
        }
    }

    struct Fixture {
        _dir: TempDir,
        db: Database,
        files: Arc<FileStorage>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let files = Arc::new(FileStorage::new(dir.path()));
        Fixture {
            _dir: dir,
            db: Database::open_in_memory().unwrap(),
            files,
        }
    }

    fn coordinator_with(fixture: &Fixture, provider: impl ExtractionProvider + 'static) -> ExtractionCoordinator {
        let registry = Arc::new(ProviderRegistry::new(vec![Arc::new(provider)]));
        ExtractionCoordinator::new(
            fixture.db.clone(),
            fixture.files.clone(),
            registry,
            Duration::from_secs(30),
        )
    }

    fn upload_document(fixture: &Fixture, id: &str) -> BankDocument {
        let mut doc = BankDocument::new("u1", "statement.pdf", format!("{id}.pdf"), None);
        doc.id = id.to_string();
        fixture.files.store(&doc.file_ref, b"%PDF-1.4 fake").unwrap();
        document_repo::insert(&fixture.db, &doc).unwrap();
        doc
    }

    #[tokio::test]
    async fn test_successful_extraction_creates_candidates() {
        let fx = fixture();
        upload_document(&fx, "d1");
        let coordinator = coordinator_with(&fx, MockProvider::new());

        let outcome = coordinator.process("u1", "d1", None).await.unwrap();
        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert_eq!(outcome.transaction_count, 3);
        assert_eq!(outcome.provider, "mock");

        let doc = document_repo::find_by_id(&fx.db, "u1", "d1").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.transaction_count, 3);
        assert_eq!(doc.provider_used.as_deref(), Some("mock"));
        assert!(doc.statement_start.is_some());

        let candidates = candidate_repo::list_by_document(&fx.db, "u1", "d1").unwrap();
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.status == CandidateStatus::Pending));
    }

    #[tokio::test]
    async fn test_provider_failure_marks_document_failed() {
        let fx = fixture();
        upload_document(&fx, "d1");
        let coordinator = coordinator_with(&fx, MockProvider::failing("connection reset"));

        let err = coordinator.process("u1", "d1", None).await.unwrap_err();
        assert!(err.is_retryable());

        let doc = document_repo::find_by_id(&fx.db, "u1", "d1").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc
            .processing_error
            .as_deref()
            .unwrap()
            .contains("connection reset"));
    }

    #[tokio::test]
    async fn test_zero_rows_is_a_failure() {
        let fx = fixture();
        upload_document(&fx, "d1");
        let coordinator = coordinator_with(&fx, MockProvider::empty());

        let err = coordinator.process("u1", "d1", None).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Provider(ProviderError::EmptyExtraction { .. })
        ));

        let doc = document_repo::find_by_id(&fx.db, "u1", "d1").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_into_failed() {
        let fx = fixture();
        upload_document(&fx, "d1");
        let coordinator = coordinator_with(&fx, SlowProvider);

        let err = coordinator.process("u1", "d1", None).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Provider(ProviderError::Timeout { .. })
        ));
        assert!(err.is_retryable());

        let doc = document_repo::find_by_id(&fx.db, "u1", "d1").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_run_leaves_prior_candidates_untouched() {
        let fx = fixture();
        upload_document(&fx, "d1");

        // First run succeeds and leaves three pending candidates.
        let coordinator = coordinator_with(&fx, MockProvider::new());
        coordinator.process("u1", "d1", None).await.unwrap();
        let before = candidate_repo::list_by_document(&fx.db, "u1", "d1").unwrap();
        assert_eq!(before.len(), 3);

        // Re-run against a failing provider: document Failed, candidates kept.
        let failing = coordinator_with(&fx, MockProvider::failing("flaky"));
        failing.process("u1", "d1", None).await.unwrap_err();

        let doc = document_repo::find_by_id(&fx.db, "u1", "d1").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        let after = candidate_repo::list_by_document(&fx.db, "u1", "d1").unwrap();
        assert_eq!(after.len(), 3);
        let before_ids: Vec<_> = before.iter().map(|c| c.id.clone()).collect();
        let after_ids: Vec<_> = after.iter().map(|c| c.id.clone()).collect();
        assert_eq!(before_ids, after_ids);
    }

    #[tokio::test]
    async fn test_reprocess_replaces_pending_candidates() {
        let fx = fixture();
        upload_document(&fx, "d1");
        let coordinator = coordinator_with(&fx, MockProvider::new());

        coordinator.process("u1", "d1", None).await.unwrap();
        let first_ids: Vec<_> = candidate_repo::list_by_document(&fx.db, "u1", "d1")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();

        coordinator.process("u1", "d1", None).await.unwrap();
        let second = candidate_repo::list_by_document(&fx.db, "u1", "d1").unwrap();
        assert_eq!(second.len(), 3);
        assert!(second.iter().all(|c| !first_ids.contains(&c.id)));
    }

    #[tokio::test]
    async fn test_reprocess_with_decision_is_invalid_state() {
        let fx = fixture();
        upload_document(&fx, "d1");
        let coordinator = coordinator_with(&fx, MockProvider::new());
        coordinator.process("u1", "d1", None).await.unwrap();

        let candidate = &candidate_repo::list_by_document(&fx.db, "u1", "d1").unwrap()[0];
        candidate_repo::set_status_if(
            &fx.db,
            &candidate.id,
            CandidateStatus::Pending,
            CandidateStatus::Approved,
        )
        .unwrap();

        let err = coordinator.process("u1", "d1", None).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidState { .. }));

        // The rejected claim left the document Processed.
        let doc = document_repo::find_by_id(&fx.db, "u1", "d1").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Processed);
    }

    #[tokio::test]
    async fn test_cross_owner_process_is_not_found() {
        let fx = fixture();
        upload_document(&fx, "d1");
        let coordinator = coordinator_with(&fx, MockProvider::new());

        let err = coordinator.process("intruder", "d1", None).await.unwrap_err();
        assert!(matches!(err, IngestError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_hint_fails_and_is_recorded() {
        let fx = fixture();
        upload_document(&fx, "d1");
        let coordinator = coordinator_with(&fx, MockProvider::new());

        let err = coordinator.process("u1", "d1", Some("gemini")).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Provider(ProviderError::Unavailable { .. })
        ));

        let doc = document_repo::find_by_id(&fx.db, "u1", "d1").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.processing_error.is_some());
    }
}
