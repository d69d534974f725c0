//! Drives one generation request from entitlement check to stored result.
//!
//! Per attempt the state machine is
//! `Pending -> Checking -> Collecting -> Assembling -> Generating -> Persisting -> Done`,
//! with `Failed` reachable from any state. The charge is resolved before any
//! external call and only settled after the result is stored, so a provider or
//! persistence failure never costs the user an entitlement.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::answers::GenerationAnswers;
use crate::entitlement::{ChargePath, CreditKind, EntitlementLedger};
use crate::error::CoreError;
use crate::history::{GenerationResult, NewGenerationResult};
use crate::prompt;
use crate::provider::{GenerationError, ImageGenerator};
use crate::references::ReferenceCollector;
use crate::regenerate::{RegenerateSessions, SessionTarget};
use crate::scratch::{ScratchDir, ScratchSpace};
use crate::store::ResultStore;
use crate::types::ImagePayload;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_REFERENCES: usize = 3;
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_VARIATION_DELAY: Duration = Duration::from_millis(2_000);
pub const DEFAULT_MAX_VARIATIONS: usize = 4;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Pending,
    Checking,
    Collecting,
    Assembling,
    Generating,
    Persisting,
    Done,
    Failed,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Pending => "pending",
            GenerationState::Checking => "checking",
            GenerationState::Collecting => "collecting",
            GenerationState::Assembling => "assembling",
            GenerationState::Generating => "generating",
            GenerationState::Persisting => "persisting",
            GenerationState::Done => "done",
            GenerationState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Done | GenerationState::Failed)
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the state of one attempt.
struct AttemptTrace<'a> {
    user_id: &'a str,
    attempt: usize,
    state: GenerationState,
}

impl<'a> AttemptTrace<'a> {
    fn new(user_id: &'a str, attempt: usize) -> Self {
        Self {
            user_id,
            attempt,
            state: GenerationState::Pending,
        }
    }

    fn enter(&mut self, state: GenerationState) {
        tracing::debug!(
            user_id = self.user_id,
            attempt = self.attempt,
            from = %self.state,
            to = %state,
            "Generation state transition"
        );
        self.state = state;
    }

    /// Log the failure against the state it happened in.
    fn fail(&mut self, err: &CoreError) {
        match err {
            CoreError::EntitlementDenied { .. } | CoreError::Validation(_) => tracing::info!(
                user_id = self.user_id,
                attempt = self.attempt,
                state = %self.state,
                error = %err,
                "Generation rejected"
            ),
            _ => tracing::error!(
                user_id = self.user_id,
                attempt = self.attempt,
                state = %self.state,
                error = %err,
                "Generation failed"
            ),
        }
        self.state = GenerationState::Failed;
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_references: usize,
    pub generation_timeout: Duration,
    pub variation_delay: Duration,
    pub max_variations: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_references: DEFAULT_MAX_REFERENCES,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            variation_delay: DEFAULT_VARIATION_DELAY,
            max_variations: DEFAULT_MAX_VARIATIONS,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct GenerationOrchestrator {
    ledger: Arc<EntitlementLedger>,
    results: Arc<dyn ResultStore>,
    sessions: Arc<RegenerateSessions>,
    generator: Arc<dyn ImageGenerator>,
    references: Option<Arc<ReferenceCollector>>,
    scratch: ScratchSpace,
    settings: OrchestratorSettings,
}

impl GenerationOrchestrator {
    pub fn new(
        ledger: Arc<EntitlementLedger>,
        results: Arc<dyn ResultStore>,
        sessions: Arc<RegenerateSessions>,
        generator: Arc<dyn ImageGenerator>,
        scratch: ScratchSpace,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            ledger,
            results,
            sessions,
            generator,
            references: None,
            scratch,
            settings,
        }
    }

    /// Enable reference collection. Without a collector, generations run on
    /// the answers and user image alone.
    pub fn with_references(mut self, collector: Arc<ReferenceCollector>) -> Self {
        self.references = Some(collector);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Generate a single thumbnail, paid by the free preview or a thumbnail credit.
    pub async fn generate_one(
        &self,
        user_id: &str,
        answers: &GenerationAnswers,
        user_image: Option<&ImagePayload>,
    ) -> Result<GenerationResult, CoreError> {
        answers.validate()?;
        self.charge_and_run(user_id, answers, user_image, CreditKind::Thumbnail, 0)
            .await
    }

    /// Generate up to `count` perturbed variations, one after another.
    ///
    /// Only an entitlement denial on the first attempt fails the whole batch.
    /// Later failures are logged and skipped; a later denial ends the batch
    /// early since every remaining attempt would be denied too.
    pub async fn generate_variations(
        &self,
        user_id: &str,
        answers: &GenerationAnswers,
        count: usize,
        user_image: Option<&ImagePayload>,
    ) -> Result<Vec<GenerationResult>, CoreError> {
        answers.validate()?;
        if count == 0 || count > self.settings.max_variations {
            return Err(CoreError::Validation(format!(
                "count must be between 1 and {}",
                self.settings.max_variations
            )));
        }

        let mut results = Vec::with_capacity(count);
        for index in 0..count {
            if index > 0 {
                tokio::time::sleep(self.settings.variation_delay).await;
            }
            let varied = answers.variation(index);
            match self
                .charge_and_run(user_id, &varied, user_image, CreditKind::Thumbnail, index)
                .await
            {
                Ok(result) => results.push(result),
                Err(err @ CoreError::EntitlementDenied { .. }) if index == 0 => return Err(err),
                Err(CoreError::EntitlementDenied { .. }) => {
                    tracing::info!(user_id, index, "Stopping variations, entitlement exhausted");
                    break;
                }
                Err(err) => {
                    tracing::warn!(user_id, index, error = %err, "Skipping failed variation");
                }
            }
        }

        tracing::info!(
            user_id,
            requested = count,
            produced = results.len(),
            "Variations finished"
        );
        Ok(results)
    }

    /// Re-run the user's active regenerate session, paid by a regenerate credit.
    /// The session is deleted once the new result is stored.
    pub async fn generate_from_session(&self, user_id: &str) -> Result<GenerationResult, CoreError> {
        let session = self
            .sessions
            .get_active(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("RegenerateSession", user_id))?;

        let answers = GenerationAnswers::from_topic(session.topic.clone());
        answers.validate()?;
        let result = self
            .charge_and_run(
                user_id,
                &answers,
                session.user_image.as_ref(),
                CreditKind::Regenerate,
                0,
            )
            .await?;

        // The result is already stored and paid for; a stale session only
        // lingers until it expires.
        if let Err(err) = self
            .sessions
            .delete(SessionTarget::ById {
                id: session.id,
                user_id: session.user_id.clone(),
            })
            .await {
            tracing::warn!(user_id, session_id = %session.id, error = %err, "Failed to delete regenerate session");
        }
        Ok(result)
    }

    async fn charge_and_run(
        &self,
        user_id: &str,
        answers: &GenerationAnswers,
        user_image: Option<&ImagePayload>,
        kind: CreditKind,
        attempt: usize,
    ) -> Result<GenerationResult, CoreError> {
        let mut trace = AttemptTrace::new(user_id, attempt);
        trace.enter(GenerationState::Checking);

        let outcome = match self.ledger.resolve_charge(user_id, kind).await {
            Ok(path) => {
                let trace = &mut trace;
                self.scratch
                    .with_scratch_dir(move |dir| self.run_attempt(trace, dir, answers, user_image, path))
                    .await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(result) => {
                trace.enter(GenerationState::Done);
                tracing::info!(user_id, attempt, result_id = %result.id, "Thumbnail generated");
                Ok(result)
            }
            Err(err) => {
                trace.fail(&err);
                Err(err)
            }
        }
    }

    async fn run_attempt(
        &self,
        trace: &mut AttemptTrace<'_>,
        dir: ScratchDir,
        answers: &GenerationAnswers,
        user_image: Option<&ImagePayload>,
        path: ChargePath,
    ) -> Result<GenerationResult, CoreError> {
        let user_id = trace.user_id;

        trace.enter(GenerationState::Collecting);
        let references = match &self.references {
            Some(collector) => {
                collector
                    .collect_into(&answers.topic, self.settings.max_references, &dir)
                    .await
            }
            None => Vec::new(),
        };

        trace.enter(GenerationState::Assembling);
        let request = prompt::assemble(answers, &references, user_image);

        trace.enter(GenerationState::Generating);
        let generated =
            match tokio::time::timeout(self.settings.generation_timeout, self.generator.generate(&request))
                .await
            {
                Ok(result) => result?,
                Err(_) => return Err(GenerationError::Timeout.into()),
            };

        trace.enter(GenerationState::Persisting);
        let result = self
            .results
            .insert(NewGenerationResult {
                user_id: user_id.to_string(),
                topic: answers.topic.trim().to_string(),
                prompt: request.prompt_text(),
                image_url: generated.image.to_data_url(),
            })
            .await?;

        if let Err(err) = self.ledger.settle(user_id, path).await {
            // The entitlement was spent by a concurrent request; do not hand
            // out a result nobody paid for.
            if let Err(cleanup) = self.results.delete(result.id).await {
                tracing::error!(user_id, result_id = %result.id, error = %cleanup, "Failed to remove unpaid result");
            }
            return Err(err);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::entitlement::AdminEmails;
    use crate::memory::{MemoryEntitlementStore, MemoryResultStore, MemorySessionStore};
    use crate::provider::{AssembledRequest, GeneratedImage};

    const ADMIN: &str = "boss@example.com";

    /// Fails the calls whose (zero-based) index is listed in `fail_on`.
    #[derive(Default)]
    struct ScriptedGenerator {
        calls: AtomicUsize,
        fail_on: Vec<usize>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageGenerator for ScriptedGenerator {
        async fn generate(&self, request: &AssembledRequest) -> Result<GeneratedImage, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.prompt_text());
            if self.fail_on.contains(&call) {
                return Err(GenerationError::NoOutputProduced);
            }
            Ok(GeneratedImage {
                image: ImagePayload::new("image/png", vec![call as u8]),
                model: "fake".to_string(),
                provider_text: None,
            })
        }
    }

    struct HangingGenerator;

    #[async_trait]
    impl ImageGenerator for HangingGenerator {
        async fn generate(&self, _request: &AssembledRequest) -> Result<GeneratedImage, GenerationError> {
            std::future::pending::<()>().await;
            Err(GenerationError::NoOutputProduced)
        }
    }

    struct Harness {
        ledger: Arc<EntitlementLedger>,
        results: Arc<MemoryResultStore>,
        sessions: Arc<RegenerateSessions>,
        orchestrator: GenerationOrchestrator,
        _root: tempfile::TempDir,
    }

    fn harness(generator: Arc<dyn ImageGenerator>) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let results = Arc::new(MemoryResultStore::new());
        let ledger = Arc::new(EntitlementLedger::new(
            Arc::new(MemoryEntitlementStore::new()),
            results.clone(),
            Arc::new(AdminEmails::new([ADMIN])),
        ));
        let sessions = Arc::new(RegenerateSessions::new(Arc::new(MemorySessionStore::new())));
        let orchestrator = GenerationOrchestrator::new(
            ledger.clone(),
            results.clone(),
            sessions.clone(),
            generator,
            ScratchSpace::new(root.path()),
            OrchestratorSettings {
                generation_timeout: Duration::from_millis(100),
                variation_delay: Duration::ZERO,
                ..OrchestratorSettings::default()
            },
        );
        Harness {
            ledger,
            results,
            sessions,
            orchestrator,
            _root: root,
        }
    }

    fn answers() -> GenerationAnswers {
        GenerationAnswers::from_topic("Home espresso")
    }

    #[tokio::test]
    async fn free_preview_pays_for_first_generation() {
        let h = harness(Arc::new(ScriptedGenerator::default()));
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();

        let result = h.orchestrator.generate_one("u1", &answers(), None).await.unwrap();
        assert_eq!(result.user_id, "u1");
        assert!(result.image_url.starts_with("data:image/png;base64,"));
        assert!(result.prompt.contains("Home espresso"));

        let record = h.ledger.get("u1").await.unwrap();
        assert!(record.has_used_free_preview);
        assert_eq!(record.thumbnails_remaining, 0);
    }

    #[tokio::test]
    async fn denied_user_never_reaches_the_provider() {
        let generator = Arc::new(ScriptedGenerator::default());
        let h = harness(generator.clone());
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();
        h.ledger.consume_free_preview("u1").await.unwrap();

        assert_matches!(
            h.orchestrator.generate_one("u1", &answers(), None).await,
            Err(CoreError::EntitlementDenied { .. })
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_consumes_nothing() {
        let h = harness(Arc::new(ScriptedGenerator {
            fail_on: vec![0],
            ..Default::default()
        }));
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();
        h.ledger.adjust("u1", 2, 0).await.unwrap();

        assert_matches!(
            h.orchestrator.generate_one("u1", &answers(), None).await,
            Err(CoreError::Generation(GenerationError::NoOutputProduced))
        );
        let record = h.ledger.get("u1").await.unwrap();
        assert!(!record.has_used_free_preview);
        assert_eq!(record.thumbnails_remaining, 2);
        assert_eq!(h.results.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn provider_timeout_is_a_generation_error() {
        let h = harness(Arc::new(HangingGenerator));
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();

        assert_matches!(
            h.orchestrator.generate_one("u1", &answers(), None).await,
            Err(CoreError::Generation(GenerationError::Timeout))
        );
    }

    #[tokio::test]
    async fn admin_generates_without_spending() {
        let h = harness(Arc::new(ScriptedGenerator::default()));
        h.ledger.get_or_create("a1", ADMIN).await.unwrap();

        h.orchestrator.generate_one("a1", &answers(), None).await.unwrap();
        h.orchestrator.generate_one("a1", &answers(), None).await.unwrap();

        let record = h.ledger.get("a1").await.unwrap();
        assert!(!record.has_used_free_preview);
        assert_eq!(h.results.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn invalid_answers_are_rejected_before_charging() {
        let h = harness(Arc::new(ScriptedGenerator::default()));
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();

        assert_matches!(
            h.orchestrator
                .generate_one("u1", &GenerationAnswers::from_topic(" "), None)
                .await,
            Err(CoreError::Validation(_))
        );
        assert!(!h.ledger.get("u1").await.unwrap().has_used_free_preview);
    }

    #[tokio::test]
    async fn variations_keep_partial_successes() {
        let generator = Arc::new(ScriptedGenerator {
            fail_on: vec![1],
            ..Default::default()
        });
        let h = harness(generator.clone());
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();
        h.ledger.adjust("u1", 5, 0).await.unwrap();

        let results = h
            .orchestrator
            .generate_variations("u1", &answers(), 3, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        // Free preview + one credit spent; the failed attempt cost nothing.
        assert_eq!(h.ledger.get("u1").await.unwrap().thumbnails_remaining, 4);

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert_ne!(prompts[0], prompts[1]);
        assert_ne!(prompts[1], prompts[2]);
    }

    #[tokio::test]
    async fn variations_stop_when_credits_run_out() {
        let h = harness(Arc::new(ScriptedGenerator::default()));
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();
        h.ledger.adjust("u1", 1, 0).await.unwrap();

        let results = h
            .orchestrator
            .generate_variations("u1", &answers(), 4, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn variations_fail_when_first_attempt_is_denied() {
        let h = harness(Arc::new(ScriptedGenerator::default()));
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();
        h.ledger.consume_free_preview("u1").await.unwrap();

        assert_matches!(
            h.orchestrator.generate_variations("u1", &answers(), 2, None).await,
            Err(CoreError::EntitlementDenied { .. })
        );
    }

    #[tokio::test]
    async fn variation_count_is_bounded() {
        let h = harness(Arc::new(ScriptedGenerator::default()));
        assert_matches!(
            h.orchestrator.generate_variations("u1", &answers(), 0, None).await,
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            h.orchestrator
                .generate_variations("u1", &answers(), DEFAULT_MAX_VARIATIONS + 1, None)
                .await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn session_regeneration_spends_a_regenerate_credit() {
        let generator = Arc::new(ScriptedGenerator::default());
        let h = harness(generator.clone());
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();
        h.ledger.adjust("u1", 0, 1).await.unwrap();
        let photo = ImagePayload::new("image/jpeg", vec![7, 7]);
        h.sessions
            .create("u1", "Latte art basics", None, Some(photo))
            .await
            .unwrap();

        let result = h.orchestrator.generate_from_session("u1").await.unwrap();
        assert_eq!(result.topic, "Latte art basics");
        assert!(generator.prompts.lock().unwrap()[0].contains("preserve their face"));

        let record = h.ledger.get("u1").await.unwrap();
        assert_eq!(record.regenerates_remaining, 0);
        assert!(!record.has_used_free_preview);
        assert_eq!(h.sessions.get_active("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn session_regeneration_without_session_is_not_found() {
        let h = harness(Arc::new(ScriptedGenerator::default()));
        h.ledger.get_or_create("u1", "u1@example.com").await.unwrap();
        assert_matches!(
            h.orchestrator.generate_from_session("u1").await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[test]
    fn terminal_states() {
        assert!(GenerationState::Done.is_terminal());
        assert!(GenerationState::Failed.is_terminal());
        assert!(!GenerationState::Generating.is_terminal());
        assert_eq!(GenerationState::Persisting.to_string(), "persisting");
    }
}
