use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use switchboard_agents::{HandlerRegistry, LoggingOutbound, Orchestrator, OrchestratorConfig};
use switchboard_core::{
    BusinessContext, ClassificationSource, DenialReason, HandlerResult, Intent, Language,
    PipelineState, ResponseFormatter, Role,
};
use switchboard_observability::PipelineMetrics;
use switchboard_storage::MemoryStore;
use switchboard_tests::{
    orchestrator, orchestrator_with, FailingOutbound, FailingStore, FakeClassifier, GatedOutbound,
    PanickingHandler, RecordingOutbound, SentAction, SlowClassifier,
};

fn business() -> BusinessContext {
    BusinessContext::default()
}

fn business_with_phones(phones: &[&str]) -> BusinessContext {
    BusinessContext {
        customer_phones: phones.iter().map(|p| p.to_string()).collect(),
        ..BusinessContext::default()
    }
}

#[tokio::test]
async fn viewer_asking_for_a_call_campaign_is_denied() {
    let orchestrator = orchestrator();
    let result = orchestrator
        .process_message("s-a", "u-1", Role::Viewer, "اتصل بجميع العملاء", &business())
        .await;

    assert_eq!(result.state, PipelineState::Denied);
    assert_eq!(result.denial_reason(), Some(DenialReason::InsufficientPermission));
    assert_eq!(result.intent(), Some(Intent::Telemarketing));
    assert!(result.language.is_arabic());
    assert!(!result.message.is_empty());
    assert_eq!(orchestrator.metrics().snapshot().denied_permission_total, 1);
}

#[tokio::test]
async fn sales_manager_gets_a_priced_crm_offer() {
    let orchestrator = orchestrator();
    let result = orchestrator
        .process_message(
            "s-b",
            "u-1",
            Role::SalesManager,
            "I need a quote for a CRM system",
            &business(),
        )
        .await;

    assert_eq!(result.state, PipelineState::Responded);
    assert_eq!(result.intent(), Some(Intent::SalesInquiry));
    assert_eq!(result.language, Language::En);

    let HandlerResult::Offer(offer) = &result.result else {
        panic!("expected an offer, got {:?}", result.result);
    };
    assert_eq!(offer.product, "CRM");
    assert!(offer.price_minor > 0);
    assert!(!offer.features.is_empty());
    assert!(result.message.contains("1,200.00"));
    assert!(result.message.contains(&offer.features[0]));
}

#[tokio::test]
async fn destructive_request_is_denied_for_every_role() {
    for role in Role::ALL {
        let orchestrator = orchestrator();
        let result = orchestrator
            .process_message(
                "s-c",
                "u-1",
                role,
                "please delete the admin database right now",
                &business(),
            )
            .await;

        assert_eq!(result.state, PipelineState::Denied, "role {role}");
        assert_eq!(result.denial_reason(), Some(DenialReason::RiskyContent));
        assert!(result.classification.is_none());
    }
}

#[tokio::test]
async fn risky_content_never_reaches_the_llm() {
    let llm = Arc::new(FakeClassifier::new("general_chat", 0.9));
    let orchestrator = orchestrator().with_classifier(llm.clone());

    let result = orchestrator
        .process_message("s-c2", "u-1", Role::Admin, "delete the admin database", &business())
        .await;

    assert_eq!(result.denial_reason(), Some(DenialReason::RiskyContent));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_messages_on_one_session_are_both_recorded() {
    let orchestrator = orchestrator();
    let first = orchestrator.clone();
    let second = orchestrator.clone();
    let business = business();

    let (a, b) = tokio::join!(
        first.process_message("s-d", "u-1", Role::Admin, "hello there", &business),
        second.process_message("s-d", "u-1", Role::Admin, "my order never arrived", &business),
    );
    assert!(a.recorded && b.recorded);

    let session = orchestrator.session_snapshot("s-d").await.unwrap().unwrap();
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.memory_bank.len(), 2);
    assert_eq!(orchestrator.active_session_locks(), 0);
}

#[tokio::test]
async fn many_concurrent_messages_lose_no_updates() {
    let orchestrator = orchestrator();
    let business = business();
    let runs = (0..16).map(|i| {
        let orchestrator = orchestrator.clone();
        let business = business.clone();
        tokio::spawn(async move {
            orchestrator
                .process_message("s-many", "u-1", Role::Admin, &format!("hello {i}"), &business)
                .await
        })
    });

    for outcome in join_all(runs).await {
        assert!(outcome.unwrap().recorded);
    }

    let history = orchestrator.recent_history("s-many", 100).await.unwrap();
    assert_eq!(history.len(), 16);
}

#[tokio::test]
async fn outbound_call_holds_up_neither_its_own_session_nor_others() {
    let outbound = Arc::new(GatedOutbound::default());
    let orchestrator = orchestrator_with(outbound.clone(), OrchestratorConfig::default());
    let business = business_with_phones(&["+15550100001"]);

    let calling = {
        let orchestrator = orchestrator.clone();
        let business = business.clone();
        tokio::spawn(async move {
            orchestrator
                .process_message("s-gate-a", "u-1", Role::Admin, "call my customers", &business)
                .await
        })
    };
    outbound.started.notified().await;

    let other = tokio::time::timeout(
        Duration::from_secs(1),
        orchestrator.process_message("s-gate-b", "u-1", Role::Admin, "hello there", &business),
    )
    .await
    .expect("another session waited on the open call");
    assert!(other.recorded);

    let same = tokio::time::timeout(
        Duration::from_secs(1),
        orchestrator.process_message("s-gate-a", "u-1", Role::Admin, "hello there", &business),
    )
    .await
    .expect("the calling session stayed locked during the call");
    assert!(same.recorded);
    assert!(!calling.is_finished());
    assert_eq!(orchestrator.active_session_locks(), 0);

    outbound.release.notify_one();
    let called = calling.await.unwrap();
    let HandlerResult::CallRequest(call) = &called.result else {
        panic!("expected call request, got {:?}", called.result);
    };
    assert!(call.success);
    assert!(called.recorded);

    let history = orchestrator.recent_history("s-gate-a", 10).await.unwrap();
    let contents = history.iter().map(|e| e.content.as_str()).collect::<Vec<_>>();
    assert_eq!(contents, ["hello there", "call my customers"]);
}

#[tokio::test]
async fn history_keeps_submission_order() {
    let orchestrator = orchestrator();
    let texts = ["hello there", "my order never arrived", "remind me to send the contract"];
    for text in texts {
        orchestrator
            .process_message("s-order", "u-1", Role::Admin, text, &business())
            .await;
    }

    let history = orchestrator.recent_history("s-order", 10).await.unwrap();
    let contents = history.iter().map(|e| e.content.as_str()).collect::<Vec<_>>();
    assert_eq!(contents, texts);

    let recent = orchestrator.recent_history("s-order", 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[1].content, "remind me to send the contract");
}

#[tokio::test]
async fn history_is_capped_fifo() {
    let config = OrchestratorConfig {
        history_cap: 3,
        ..OrchestratorConfig::default()
    };
    let orchestrator = orchestrator_with(Arc::new(LoggingOutbound), config);
    for i in 0..5 {
        orchestrator
            .process_message("s-cap", "u-1", Role::Admin, &format!("hello {i}"), &business())
            .await;
    }

    let history = orchestrator.recent_history("s-cap", 10).await.unwrap();
    let contents = history.iter().map(|e| e.content.as_str()).collect::<Vec<_>>();
    assert_eq!(contents, vec!["hello 2", "hello 3", "hello 4"]);
}

#[tokio::test]
async fn identical_input_gives_identical_classification() {
    let text = "Can we book a meeting tomorrow at 3pm?";
    let first = orchestrator()
        .process_message("s-1", "u-1", Role::Admin, text, &business())
        .await;
    let second = orchestrator()
        .process_message("s-2", "u-1", Role::Admin, text, &business())
        .await;

    assert_eq!(first.classification, second.classification);
    assert_eq!(first.state, second.state);
    assert_eq!(first.result.kind(), second.result.kind());
}

#[tokio::test]
async fn admin_is_never_denied_for_permission() {
    let orchestrator = orchestrator();
    let texts = [
        "call my customers",
        "I need a quote for a CRM system",
        "Can we book a meeting tomorrow at 3pm?",
        "remind me to send the contract",
    ];
    for text in texts {
        let result = orchestrator
            .process_message("s-admin", "u-1", Role::Admin, text, &business())
            .await;
        assert_ne!(
            result.denial_reason(),
            Some(DenialReason::InsufficientPermission),
            "{text}"
        );
    }
}

#[tokio::test]
async fn sales_agent_cannot_start_call_campaigns() {
    let result = orchestrator()
        .process_message("s-agent", "u-1", Role::SalesAgent, "call my customers", &business())
        .await;
    assert_eq!(result.denial_reason(), Some(DenialReason::InsufficientPermission));
}

#[tokio::test]
async fn unclear_message_asks_for_clarification() {
    let orchestrator = orchestrator();
    let result = orchestrator
        .process_message("s-unclear", "u-1", Role::Viewer, "qwerty zxcv", &business())
        .await;

    assert_eq!(result.state, PipelineState::Clarification);
    let HandlerResult::Clarification(clarification) = &result.result else {
        panic!("expected clarification");
    };
    assert!(!clarification.suggestions.is_empty());
    assert!(result.message.contains(&clarification.suggestions[0]));
    assert_eq!(orchestrator.metrics().snapshot().clarifications_total, 1);
}

#[tokio::test]
async fn invalid_llm_label_falls_back_to_rules() {
    let orchestrator =
        orchestrator().with_classifier(Arc::new(FakeClassifier::new("wire_money", 0.99)));
    let result = orchestrator
        .process_message(
            "s-llm",
            "u-1",
            Role::SalesManager,
            "I need a quote for a CRM system",
            &business(),
        )
        .await;

    let classification = result.classification.unwrap();
    assert_eq!(classification.intent, Intent::SalesInquiry);
    assert_eq!(classification.source, ClassificationSource::RulesFallback);
    assert_eq!(orchestrator.metrics().snapshot().llm_fallbacks_total, 1);
}

#[tokio::test]
async fn slow_llm_times_out_to_rules() {
    let config = OrchestratorConfig {
        llm_timeout: Duration::from_millis(20),
        ..OrchestratorConfig::default()
    };
    let orchestrator = orchestrator_with(Arc::new(LoggingOutbound), config)
        .with_classifier(Arc::new(SlowClassifier(Duration::from_secs(5))));

    let result = orchestrator
        .process_message("s-slow", "u-1", Role::Viewer, "hello there", &business())
        .await;

    let classification = result.classification.unwrap();
    assert_eq!(classification.intent, Intent::GeneralChat);
    assert_eq!(classification.source, ClassificationSource::RulesFallback);
    assert_eq!(result.state, PipelineState::Responded);
}

#[tokio::test]
async fn valid_llm_verdict_is_used() {
    let orchestrator =
        orchestrator().with_classifier(Arc::new(FakeClassifier::new("customer_service", 0.9)));
    let result = orchestrator
        .process_message("s-llm-ok", "u-1", Role::Viewer, "something vague", &business())
        .await;

    let classification = result.classification.as_ref().unwrap();
    assert_eq!(classification.source, ClassificationSource::Llm);
    assert_eq!(classification.intent, Intent::CustomerService);
    assert!(matches!(result.result, HandlerResult::ServiceReply(_)));
}

#[tokio::test]
async fn handler_panic_becomes_error_and_keeps_session() {
    let config = OrchestratorConfig::default();
    let mut registry = HandlerRegistry::standard(Arc::new(LoggingOutbound), &config);
    registry.register(Intent::SalesInquiry, Arc::new(PanickingHandler));
    let orchestrator = orchestrator_with(Arc::new(LoggingOutbound), config).with_registry(registry);

    let failed = orchestrator
        .process_message(
            "s-panic",
            "u-1",
            Role::Admin,
            "I need a quote for a CRM system",
            &business(),
        )
        .await;
    assert_eq!(failed.state, PipelineState::Error);
    assert!(failed.recorded);
    assert!(!failed.message.is_empty());
    assert_eq!(orchestrator.metrics().snapshot().handler_errors_total, 1);

    let next = orchestrator
        .process_message("s-panic", "u-1", Role::Admin, "hello there", &business())
        .await;
    assert_eq!(next.state, PipelineState::Responded);

    let history = orchestrator.recent_history("s-panic", 10).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn failed_calls_are_reported_not_retried() {
    let orchestrator = orchestrator_with(Arc::new(FailingOutbound), OrchestratorConfig::default());
    let result = orchestrator
        .process_message(
            "s-calls",
            "u-1",
            Role::Admin,
            "call my customers",
            &business_with_phones(&["+15550100001", "+15550100002"]),
        )
        .await;

    assert_eq!(result.state, PipelineState::Responded);
    let HandlerResult::CallRequest(call) = &result.result else {
        panic!("expected call request, got {:?}", result.result);
    };
    assert!(!call.success);
    assert_eq!(call.placed.len(), 2);
    assert!(call.placed.iter().all(|outcome| outcome.error.is_some()));
    assert_eq!(orchestrator.metrics().snapshot().outbound_failures_total, 2);
}

#[tokio::test]
async fn dated_call_campaign_targets_business_phones() {
    let outbound = Arc::new(RecordingOutbound::default());
    let orchestrator = orchestrator_with(outbound.clone(), OrchestratorConfig::default());
    let result = orchestrator
        .process_message(
            "s-dated-call",
            "u-1",
            Role::Admin,
            "call my customers on 2026-05-02",
            &business_with_phones(&["+15550100001"]),
        )
        .await;

    let HandlerResult::CallRequest(call) = &result.result else {
        panic!("expected call request, got {:?}", result.result);
    };
    assert_eq!(call.targets, vec!["+15550100001".to_string()]);

    let sent = outbound.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], SentAction::Call { to, .. } if to == "+15550100001"));
}

#[tokio::test]
async fn dated_booking_without_a_number_sends_nothing() {
    let outbound = Arc::new(RecordingOutbound::default());
    let orchestrator = orchestrator_with(outbound.clone(), OrchestratorConfig::default());
    let result = orchestrator
        .process_message(
            "s-dated-book",
            "u-1",
            Role::SupportAgent,
            "Can we book a meeting on 2026-05-02 at 3pm?",
            &business(),
        )
        .await;

    let HandlerResult::Appointment(appointment) = &result.result else {
        panic!("expected appointment, got {:?}", result.result);
    };
    assert_eq!(appointment.date.to_string(), "2026-05-02");
    assert!(appointment.confirmation.is_none());
    assert!(outbound.sent.lock().await.is_empty());
}

#[tokio::test]
async fn appointment_confirmation_goes_through_outbound_port() {
    let outbound = Arc::new(RecordingOutbound::default());
    let orchestrator = orchestrator_with(outbound.clone(), OrchestratorConfig::default());
    let result = orchestrator
        .process_message(
            "s-book",
            "u-1",
            Role::SupportAgent,
            "Can we book a meeting tomorrow at 3pm? my number is +1 555 010 0199",
            &business(),
        )
        .await;

    let HandlerResult::Appointment(appointment) = &result.result else {
        panic!("expected appointment, got {:?}", result.result);
    };
    assert!(appointment.confirmation.as_ref().unwrap().success);

    let sent = outbound.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], SentAction::Message { to, .. } if to == "+15550100199"));
}

#[tokio::test]
async fn store_read_failure_ends_in_error_state() {
    let store = FailingStore {
        fail_reads: true,
        ..FailingStore::default()
    };
    let orchestrator = Orchestrator::new(
        Arc::new(store),
        Arc::new(LoggingOutbound),
        Arc::new(ResponseFormatter::builtin().unwrap()),
        PipelineMetrics::shared(),
        OrchestratorConfig::default(),
    );

    let result = orchestrator
        .process_message("s-store", "u-1", Role::Admin, "hello there", &business())
        .await;
    assert_eq!(result.state, PipelineState::Error);
    assert!(!result.recorded);
    assert!(!result.message.is_empty());
    assert_eq!(orchestrator.metrics().snapshot().store_failures_total, 1);
}

#[tokio::test]
async fn store_write_failure_is_flagged_on_the_result() {
    let store = FailingStore {
        fail_writes: true,
        ..FailingStore::default()
    };
    let orchestrator = Orchestrator::new(
        Arc::new(store),
        Arc::new(LoggingOutbound),
        Arc::new(ResponseFormatter::builtin().unwrap()),
        PipelineMetrics::shared(),
        OrchestratorConfig::default(),
    );

    let result = orchestrator
        .process_message("s-store", "u-1", Role::Admin, "hello there", &business())
        .await;
    assert_eq!(result.state, PipelineState::Responded);
    assert!(!result.recorded);
    assert!(orchestrator.session_snapshot("s-store").await.unwrap().is_none());
}

#[tokio::test]
async fn clearing_a_session_starts_fresh() {
    let orchestrator: Orchestrator<MemoryStore> = orchestrator();
    orchestrator
        .process_message("s-clear", "u-1", Role::Admin, "hello there", &business())
        .await;
    assert!(orchestrator.clear_session("s-clear").await.unwrap());

    orchestrator
        .process_message("s-clear", "u-1", Role::Admin, "hello again", &business())
        .await;
    let history = orchestrator.recent_history("s-clear", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(orchestrator.session_ids().await.unwrap(), vec!["s-clear".to_string()]);
}
