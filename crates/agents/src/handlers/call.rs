use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use switchboard_core::{CallRequest, HandlerResult, OutboundAction, SessionContext};

use super::{localized, Handler, HandlerInput};
use crate::outbound::attempt;

pub struct CallHandler {
    outbound: Arc<dyn OutboundAction>,
    action_timeout: Duration,
    max_targets: usize,
}

impl CallHandler {
    pub fn new(outbound: Arc<dyn OutboundAction>, action_timeout: Duration, max_targets: usize) -> Self {
        Self {
            outbound,
            action_timeout,
            max_targets,
        }
    }

    /// Numbers named in the message win over the tenant's customer list.
    fn targets(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> Vec<String> {
        let named = input.classification.entity("phones");
        let source = if named.is_empty() {
            ctx.business.customer_phones.as_slice()
        } else {
            named
        };

        let mut targets: Vec<String> = Vec::new();
        for phone in source {
            if targets.len() >= self.max_targets {
                break;
            }
            if !targets.contains(phone) {
                targets.push(phone.clone());
            }
        }
        targets
    }
}

#[async_trait]
impl Handler for CallHandler {
    fn name(&self) -> &'static str {
        "call"
    }

    async fn handle(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> Result<HandlerResult> {
        let targets = self.targets(ctx, input);
        let script = format!(
            "{} {}",
            localized(ctx.language, "Hello, this is a call from", "مرحباً، معك فريق"),
            ctx.business.business_name
        );

        let placed = join_all(targets.iter().map(|target| {
            attempt(
                "place_call",
                target,
                self.action_timeout,
                self.outbound.place_call(target, &script),
            )
        }))
        .await;
        let success = !placed.is_empty() && placed.iter().all(|outcome| outcome.success);

        Ok(HandlerResult::CallRequest(CallRequest {
            targets,
            script,
            placed,
            success,
        }))
    }
}
