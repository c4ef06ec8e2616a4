use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use switchboard_core::{
    HandlerFault, HandlerResult, Intent, OutboundAction, PipelineError, SessionContext,
};
use tracing::error;

use crate::config::OrchestratorConfig;
use crate::handlers::{
    clarification_for, CallHandler, ClarificationHandler, CustomerServiceHandler, Handler,
    HandlerInput, OfferHandler, SchedulerHandler, TaskHandler,
};

/// Intent to handler routing table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Intent, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard(outbound: Arc<dyn OutboundAction>, config: &OrchestratorConfig) -> Self {
        let customer_service: Arc<dyn Handler> = Arc::new(CustomerServiceHandler::new());

        let mut registry = Self::new();
        registry
            .register(
                Intent::SalesInquiry,
                Arc::new(OfferHandler::new(config.offer_validity_days)),
            )
            .register(
                Intent::Telemarketing,
                Arc::new(CallHandler::new(
                    outbound.clone(),
                    config.action_timeout,
                    config.max_call_targets,
                )),
            )
            .register(
                Intent::AppointmentScheduling,
                Arc::new(SchedulerHandler::new(outbound, config.action_timeout)),
            )
            .register(Intent::CustomerService, customer_service.clone())
            .register(Intent::GeneralChat, customer_service)
            .register(Intent::TaskManagement, Arc::new(TaskHandler::new()))
            .register(Intent::Unclear, Arc::new(ClarificationHandler));
        registry
    }

    pub fn register(&mut self, intent: Intent, handler: Arc<dyn Handler>) -> &mut Self {
        self.handlers.insert(intent, handler);
        self
    }

    pub fn handler_for(&self, intent: Intent) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(&intent)
    }

    /// Runs the handler for the classified intent. Errors and panics are
    /// contained here and come back as `HandlerResult::Error`.
    pub async fn dispatch(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> HandlerResult {
        let intent = input.classification.intent;
        let Some(handler) = self.handlers.get(&intent) else {
            return clarification_for(input.classification, ctx.language);
        };

        match AssertUnwindSafe(handler.handle(ctx, input)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => fault(handler.name(), format!("{err:#}")),
            Err(panic) => fault(handler.name(), panic_message(panic.as_ref())),
        }
    }

    pub fn clarify(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> HandlerResult {
        clarification_for(input.classification, ctx.language)
    }

    pub fn intents(&self) -> Vec<Intent> {
        let mut intents = self.handlers.keys().copied().collect::<Vec<_>>();
        intents.sort();
        intents
    }
}

fn fault(handler: &'static str, detail: String) -> HandlerResult {
    let failure = PipelineError::HandlerFailure {
        handler: handler.to_string(),
        detail: detail.clone(),
    };
    error!(error = %failure, "handler failed");

    HandlerResult::Error(HandlerFault {
        handler: handler.to_string(),
        detail,
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
