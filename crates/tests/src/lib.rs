//! Test doubles shared by the integration suites.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use switchboard_agents::{Handler, HandlerInput, LoggingOutbound, Orchestrator, OrchestratorConfig};
use switchboard_core::{
    ActionReceipt, Classifier, ClassifierVerdict, HandlerResult, OutboundAction,
    ResponseFormatter, Session, SessionContext,
};
use switchboard_observability::PipelineMetrics;
use switchboard_storage::{MemoryStore, SessionStore};
use tokio::sync::{Mutex, Notify};

pub fn orchestrator() -> Orchestrator<MemoryStore> {
    orchestrator_with(Arc::new(LoggingOutbound), OrchestratorConfig::default())
}

pub fn orchestrator_with(
    outbound: Arc<dyn OutboundAction>,
    config: OrchestratorConfig,
) -> Orchestrator<MemoryStore> {
    Orchestrator::new(
        Arc::new(MemoryStore::new()),
        outbound,
        Arc::new(ResponseFormatter::builtin().expect("built-in templates")),
        PipelineMetrics::shared(),
        config,
    )
}

/// Answers every request with a fixed label and confidence.
pub struct FakeClassifier {
    pub category: String,
    pub confidence: f32,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(category: &str, confidence: f32) -> Self {
        Self {
            category: category.to_string(),
            confidence,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    fn name(&self) -> &str {
        "fake"
    }

    async fn classify(&self, _text: &str, _categories: &[&'static str]) -> Result<ClassifierVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ClassifierVerdict {
            category: self.category.clone(),
            confidence: self.confidence,
        })
    }
}

/// Never answers within any reasonable timeout.
pub struct SlowClassifier(pub Duration);

#[async_trait]
impl Classifier for SlowClassifier {
    fn name(&self) -> &str {
        "slow"
    }

    async fn classify(&self, _text: &str, _categories: &[&'static str]) -> Result<ClassifierVerdict> {
        tokio::time::sleep(self.0).await;
        Ok(ClassifierVerdict {
            category: "sales_inquiry".to_string(),
            confidence: 1.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentAction {
    Message { to: String, text: String },
    Call { to: String, script: String },
}

#[derive(Default)]
pub struct RecordingOutbound {
    pub sent: Mutex<Vec<SentAction>>,
}

#[async_trait]
impl OutboundAction for RecordingOutbound {
    async fn send_message(&self, to: &str, text: &str) -> Result<ActionReceipt> {
        self.sent.lock().await.push(SentAction::Message {
            to: to.to_string(),
            text: text.to_string(),
        });
        Ok(ActionReceipt {
            reference: format!("msg-{to}"),
        })
    }

    async fn place_call(&self, to: &str, script: &str) -> Result<ActionReceipt> {
        self.sent.lock().await.push(SentAction::Call {
            to: to.to_string(),
            script: script.to_string(),
        });
        Ok(ActionReceipt {
            reference: format!("call-{to}"),
        })
    }
}

/// Holds every call open until `release` is notified; `started` fires when a
/// call begins.
#[derive(Default)]
pub struct GatedOutbound {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl OutboundAction for GatedOutbound {
    async fn send_message(&self, to: &str, _text: &str) -> Result<ActionReceipt> {
        Ok(ActionReceipt {
            reference: format!("msg-{to}"),
        })
    }

    async fn place_call(&self, to: &str, _script: &str) -> Result<ActionReceipt> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(ActionReceipt {
            reference: format!("call-{to}"),
        })
    }
}

pub struct FailingOutbound;

#[async_trait]
impl OutboundAction for FailingOutbound {
    async fn send_message(&self, to: &str, _text: &str) -> Result<ActionReceipt> {
        bail!("gateway rejected message to {to}")
    }

    async fn place_call(&self, to: &str, _script: &str) -> Result<ActionReceipt> {
        bail!("no line available for {to}")
    }
}

pub struct PanickingHandler;

#[async_trait]
impl Handler for PanickingHandler {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn handle(&self, _ctx: &SessionContext, _input: &HandlerInput<'_>) -> Result<HandlerResult> {
        panic!("handler exploded")
    }
}

/// Store whose reads or writes can be switched off.
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl SessionStore for FailingStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        if self.fail_reads {
            bail!("store unavailable");
        }
        self.inner.get(session_id).await
    }

    async fn put(&self, session: &Session) -> Result<()> {
        if self.fail_writes {
            bail!("store is read-only");
        }
        self.inner.put(session).await
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        self.inner.delete(session_id).await
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        self.inner.list_ids().await
    }

    async fn purge_idle(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        self.inner.purge_idle(cutoff).await
    }
}
