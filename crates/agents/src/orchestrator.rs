use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use switchboard_core::{
    normalize_text, BusinessContext, ClassificationResult, ClassificationSource,
    Classifier, ConversationEntry, Denial, DenialReason, HandlerFault, HandlerResult,
    InboundMessage, Intent, IntentClassifier, Language, LanguageDetector, OrchestrationResult, OutboundAction,
    PipelineState, ResponseFormatter, Role, SecurityGate, Session, SessionContext,
};
use switchboard_observability::PipelineMetrics;
use switchboard_storage::SessionStore;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::handlers::HandlerInput;
use crate::recorder::{Interaction, MemoryRecorder};
use crate::registry::HandlerRegistry;

const CONTEXT_HISTORY: usize = 10;
const REDACTED: &str = "[content withheld by risk policy]";

/// One async mutex per active session id. Entries are dropped once the last
/// holder or waiter is gone, so the table only grows with concurrency.
#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

type PendingLock = Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>;

impl SessionLocks {
    async fn acquire(self: &Arc<Self>, session_id: &str) -> SessionGuard {
        let lock = self
            .inner
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone();

        // The guard owns the pending acquisition, so a caller cancelled while
        // waiting still runs the table cleanup.
        let mut guard = SessionGuard {
            locks: Arc::clone(self),
            session_id: session_id.to_string(),
            pending: Some(Box::pin(lock.lock_owned())),
            held: None,
        };
        if let Some(pending) = guard.pending.as_mut() {
            guard.held = Some(pending.await);
        }
        guard.pending = None;
        guard
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

struct SessionGuard {
    locks: Arc<SessionLocks>,
    session_id: String,
    pending: Option<PendingLock>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        drop(self.pending.take());
        let mut table = self.locks.inner.lock();
        if table
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.session_id);
        }
    }
}

/// Everything needed to close out a pipeline run.
struct Completed {
    correlation_id: Uuid,
    session_id: String,
    language: Language,
    classification: Option<ClassificationResult>,
    result: HandlerResult,
    message: String,
    recorded: bool,
}

pub struct Orchestrator<S> {
    store: Arc<S>,
    gate: SecurityGate,
    detector: LanguageDetector,
    classifier: IntentClassifier,
    registry: Arc<HandlerRegistry>,
    recorder: MemoryRecorder,
    formatter: Arc<ResponseFormatter>,
    metrics: Arc<PipelineMetrics>,
    config: OrchestratorConfig,
    locks: Arc<SessionLocks>,
}

impl<S> Clone for Orchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gate: self.gate,
            detector: self.detector,
            classifier: self.classifier.clone(),
            registry: Arc::clone(&self.registry),
            recorder: self.recorder,
            formatter: Arc::clone(&self.formatter),
            metrics: Arc::clone(&self.metrics),
            config: self.config.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S> Orchestrator<S>
where
    S: SessionStore,
{
    pub fn new(
        store: Arc<S>,
        outbound: Arc<dyn OutboundAction>,
        formatter: Arc<ResponseFormatter>,
        metrics: Arc<PipelineMetrics>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            gate: SecurityGate::new(),
            detector: LanguageDetector::new(config.default_language),
            classifier: IntentClassifier::new().with_threshold(config.clarify_threshold),
            registry: Arc::new(HandlerRegistry::standard(outbound, &config)),
            recorder: MemoryRecorder::new(config.history_cap, config.memory_cap),
            formatter,
            metrics,
            config,
            locks: Arc::new(SessionLocks::default()),
        }
    }

    /// Puts an LLM in front of the rule-based classifier.
    pub fn with_classifier(mut self, llm: Arc<dyn Classifier>) -> Self {
        self.classifier = self.classifier.with_llm(llm, self.config.llm_timeout);
        self
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn active_session_locks(&self) -> usize {
        self.locks.len()
    }

    /// Runs one message through the pipeline. Every failure is folded into a
    /// terminal state with a user-facing message; this never returns an error.
    ///
    /// The session lock is taken twice: once to read a snapshot, once to
    /// append and write. Classification and handlers run between the two, so
    /// outbound calls never hold it.
    #[instrument(
        skip(self, text, business),
        fields(correlation_id = tracing::field::Empty)
    )]
    pub async fn process_message(
        &self,
        session_id: &str,
        user_id: &str,
        role: Role,
        text: &str,
        business: &BusinessContext,
    ) -> OrchestrationResult {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4();
        tracing::Span::current().record("correlation_id", tracing::field::display(correlation_id));
        self.metrics.inc_message();

        let text = normalize_text(text);
        debug!(state = PipelineState::Received.as_str(), "message received");

        let stored = {
            let _guard = self.locks.acquire(session_id).await;
            self.store.get(session_id).await
        };
        let snapshot = match stored {
            Ok(stored) => stored.unwrap_or_else(|| self.new_session(session_id, user_id, role)),
            Err(err) => {
                self.metrics.inc_store_failure();
                error!(error = %format!("{err:#}"), "session read failed");
                let language = self.detector.detect(&text);
                let result = HandlerResult::Error(HandlerFault {
                    handler: "session_store".to_string(),
                    detail: err.to_string(),
                });
                let message = self.render(&result, language);
                return self.finish(
                    started,
                    Completed {
                        correlation_id,
                        session_id: session_id.to_string(),
                        language,
                        classification: None,
                        result,
                        message,
                        recorded: false,
                    },
                );
            }
        };

        let content = self.gate.check_content(&text);
        let language = self.detector.detect(&text);
        debug!(state = PipelineState::LanguageResolved.as_str(), language = %language, "language resolved");

        let (classification, result) = if content.allowed {
            debug!(state = PipelineState::Secured.as_str(), "content check passed");
            let classification = self.classifier.classify(&text).await;
            if classification.source == ClassificationSource::RulesFallback {
                self.metrics.inc_llm_fallback();
                warn!(llm = ?self.classifier.llm_name(), "llm verdict rejected, used rules");
            }
            debug!(
                state = PipelineState::Classified.as_str(),
                intent = %classification.intent,
                confidence = classification.confidence,
                "message classified"
            );

            let mut ctx = session_context(&snapshot, language, correlation_id, business);
            ctx.user_id = user_id.to_string();
            ctx.role = role;
            let result = self.route(&ctx, &text, &classification).await;
            (Some(classification), result)
        } else {
            warn!(
                risk = ?content.risk,
                reason = content.message.as_deref().unwrap_or_default(),
                "message denied"
            );
            (
                None,
                HandlerResult::Denied(Denial {
                    reason: DenialReason::RiskyContent,
                    intent: None,
                }),
            )
        };

        let message = self.render(&result, language);
        let redacted = matches!(
            &result,
            HandlerResult::Denied(Denial {
                reason: DenialReason::RiskyContent,
                ..
            })
        );
        let interaction = Interaction {
            correlation_id,
            timestamp: Utc::now(),
            language,
            intent: classification.as_ref().map(|c| c.intent),
            user_text: if redacted { REDACTED } else { &text },
            response: &message,
            state: final_state(&result),
            classification: classification.as_ref(),
            result: &result,
        };
        let recorded = self
            .commit(session_id, user_id, role, interaction)
            .await;

        self.finish(
            started,
            Completed {
                correlation_id,
                session_id: session_id.to_string(),
                language,
                classification,
                result,
                message,
                recorded,
            },
        )
    }

    /// Re-reads the session under its lock, appends the interaction and
    /// writes it back, so concurrent messages never overwrite each other.
    async fn commit(
        &self,
        session_id: &str,
        user_id: &str,
        role: Role,
        interaction: Interaction<'_>,
    ) -> bool {
        let _guard = self.locks.acquire(session_id).await;

        let mut session = match self.store.get(session_id).await {
            Ok(stored) => stored.unwrap_or_else(|| self.new_session(session_id, user_id, role)),
            Err(err) => {
                self.metrics.inc_store_failure();
                error!(error = %format!("{err:#}"), "session read before write failed");
                return false;
            }
        };
        session.user_id = user_id.to_string();
        session.role = role;
        self.recorder.record(&mut session, interaction);

        match self.store.put(&session).await {
            Ok(()) => {
                debug!(state = PipelineState::Recorded.as_str(), history = session.history.len(), "session saved");
                true
            }
            Err(err) => {
                self.metrics.inc_store_failure();
                error!(error = %format!("{err:#}"), "session write failed");
                false
            }
        }
    }

    fn new_session(&self, session_id: &str, user_id: &str, role: Role) -> Session {
        Session::new(session_id, user_id, role, self.config.default_language)
    }

    pub async fn handle(&self, message: &InboundMessage) -> OrchestrationResult {
        self.process_message(
            &message.session_id,
            &message.user_id,
            message.role,
            &message.text,
            &message.business,
        )
        .await
    }

    async fn route(
        &self,
        ctx: &SessionContext,
        text: &str,
        classification: &ClassificationResult,
    ) -> HandlerResult {
        let input = HandlerInput {
            text,
            classification,
        };

        let ambiguous = classification.intent == Intent::Unclear
            || classification.confidence < self.classifier.threshold();
        if ambiguous {
            return self.registry.clarify(ctx, &input);
        }

        let permission = self.gate.check_permission(ctx.role, classification.intent);
        if !permission.allowed {
            warn!(
                role = %ctx.role,
                intent = %classification.intent,
                "message denied"
            );
            return HandlerResult::Denied(Denial {
                reason: DenialReason::InsufficientPermission,
                intent: Some(classification.intent),
            });
        }

        debug!(state = PipelineState::Routed.as_str(), intent = %classification.intent, "routing to handler");
        let result = self.registry.dispatch(ctx, &input).await;
        if matches!(result, HandlerResult::Error(_)) {
            self.metrics.inc_handler_error();
        }
        result
    }

    fn render(&self, result: &HandlerResult, language: Language) -> String {
        match self.formatter.try_render(result, language) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "template render failed, sending apology");
                self.formatter.apology(language).to_string()
            }
        }
    }

    fn finish(&self, started: Instant, done: Completed) -> OrchestrationResult {
        let state = final_state(&done.result);
        match &done.result {
            HandlerResult::Denied(denial) => match denial.reason {
                DenialReason::RiskyContent => self.metrics.inc_denied_risky(),
                DenialReason::InsufficientPermission => self.metrics.inc_denied_permission(),
            },
            HandlerResult::Clarification(_) => self.metrics.inc_clarification(),
            HandlerResult::Error(_) => {}
            other => {
                self.metrics.inc_responded();
                self.metrics.add_outbound_failures(other.failed_actions());
            }
        }
        self.metrics.observe_latency(started.elapsed());

        info!(
            session_id = %done.session_id,
            correlation_id = %done.correlation_id,
            outcome = state.as_str(),
            kind = done.result.kind().as_str(),
            language = %done.language,
            intent = ?done.classification.as_ref().map(|c| c.intent),
            recorded = done.recorded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "message handled"
        );

        OrchestrationResult {
            session_id: done.session_id,
            correlation_id: done.correlation_id,
            state,
            language: done.language,
            classification: done.classification,
            result: done.result,
            message: done.message,
            recorded: done.recorded,
        }
    }

    /// Deletes the session once any in-flight message for it has finished.
    pub async fn clear_session(&self, session_id: &str) -> Result<bool> {
        let _guard = self.locks.acquire(session_id).await;
        let removed = self.store.delete(session_id).await?;
        info!(session_id, removed, "session cleared");
        Ok(removed)
    }

    pub async fn session_snapshot(&self, session_id: &str) -> Result<Option<Session>> {
        self.store.get(session_id).await
    }

    /// Most recent `limit` entries, oldest first.
    pub async fn recent_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationEntry>> {
        Ok(self
            .store
            .get(session_id)
            .await?
            .map(|session| session.recent_history(limit).to_vec())
            .unwrap_or_default())
    }

    pub async fn session_ids(&self) -> Result<Vec<String>> {
        self.store.list_ids().await
    }

    pub async fn purge_idle_sessions(&self, idle: chrono::Duration) -> Result<u64> {
        let purged = self.store.purge_idle(Utc::now() - idle).await?;
        info!(purged, "idle sessions purged");
        Ok(purged)
    }
}

fn final_state(result: &HandlerResult) -> PipelineState {
    match result {
        HandlerResult::Denied(_) => PipelineState::Denied,
        HandlerResult::Clarification(_) => PipelineState::Clarification,
        HandlerResult::Error(_) => PipelineState::Error,
        HandlerResult::Offer(_)
        | HandlerResult::Appointment(_)
        | HandlerResult::CallRequest(_)
        | HandlerResult::ServiceReply(_)
        | HandlerResult::TaskCreated(_) => PipelineState::Responded,
    }
}

fn session_context(
    session: &Session,
    language: Language,
    correlation_id: Uuid,
    business: &BusinessContext,
) -> SessionContext {
    SessionContext {
        session_id: session.session_id.clone(),
        user_id: session.user_id.clone(),
        role: session.role,
        language,
        last_intent: session.last_intent,
        correlation_id,
        history_len: session.history.len(),
        recent: session.recent_history(CONTEXT_HISTORY).to_vec(),
        business: business.clone(),
    }
}
