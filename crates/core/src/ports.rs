//! Collaborator interfaces the pipeline depends on. Implementations live
//! outside the core so every stage can run without network access.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ActionReceipt;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierVerdict {
    pub category: String,
    pub confidence: f32,
}

/// Optional probabilistic classifier (LLM or statistical model).
///
/// The returned category is untrusted: callers validate it against the
/// category enumeration before using it.
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, text: &str, categories: &[&'static str])
        -> Result<ClassifierVerdict>;
}

/// Side-effecting messaging and telephony actions, invoked only by handlers.
#[async_trait]
pub trait OutboundAction: Send + Sync {
    async fn send_message(&self, to: &str, text: &str) -> Result<ActionReceipt>;

    async fn place_call(&self, to: &str, script: &str) -> Result<ActionReceipt>;
}
