use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use switchboard_core::{ActionOutcome, ActionReceipt, OutboundAction, PipelineError};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

/// Runs one outbound action under `limit`. Failures and timeouts are reported
/// in the outcome and never retried.
pub async fn attempt<F>(action: &'static str, target: &str, limit: Duration, call: F) -> ActionOutcome
where
    F: Future<Output = Result<ActionReceipt>>,
{
    let detail = match timeout(limit, call).await {
        Ok(Ok(receipt)) => {
            return ActionOutcome {
                target: target.to_string(),
                success: true,
                reference: Some(receipt.reference),
                error: None,
            };
        }
        Ok(Err(err)) => format!("{err:#}"),
        Err(_) => format!("timed out after {}ms", limit.as_millis()),
    };

    let failure = PipelineError::ExternalActionFailure {
        action,
        target: target.to_string(),
        detail,
    };
    warn!(error = %failure, "outbound action failed");

    ActionOutcome {
        target: target.to_string(),
        success: false,
        reference: None,
        error: Some(failure.to_string()),
    }
}

/// Logs actions instead of performing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOutbound;

impl LoggingOutbound {
    fn receipt(kind: &str) -> ActionReceipt {
        ActionReceipt {
            reference: format!("{kind}-{}", Uuid::new_v4().simple()),
        }
    }
}

#[async_trait]
impl OutboundAction for LoggingOutbound {
    async fn send_message(&self, to: &str, text: &str) -> Result<ActionReceipt> {
        info!(to, chars = text.chars().count(), "send_message");
        Ok(Self::receipt("msg"))
    }

    async fn place_call(&self, to: &str, script: &str) -> Result<ActionReceipt> {
        info!(to, chars = script.chars().count(), "place_call");
        Ok(Self::receipt("call"))
    }
}
