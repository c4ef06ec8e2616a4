use anyhow::Result;
use async_trait::async_trait;
use switchboard_core::{HandlerResult, Intent, Language, ServiceReply, ServiceTopic, SessionContext};

use super::{contains_any, short_id, Handler, HandlerInput};

const TOPIC_MARKERS: &[(ServiceTopic, &[&str])] = &[
    (
        ServiceTopic::Refund,
        &["refund", "money back", "return", "استرجاع", "استرداد", "ارجاع", "فلوسي"],
    ),
    (
        ServiceTopic::Delivery,
        &["delivery", "shipping", "arrived", "tracking", "order", "التوصيل", "الشحن", "طلبي", "الطلب"],
    ),
    (
        ServiceTopic::Technical,
        &[
            "not working", "broken", "error", "bug", "crash", "login", "عطل", "خطأ", "مش شغال",
            "ما يشتغل", "تعطل",
        ],
    ),
    (
        ServiceTopic::Billing,
        &["invoice", "bill", "charged", "payment", "فاتورة", "الفاتورة", "دفع", "الدفع"],
    ),
];

const URGENT_MARKERS: &[&str] = &[
    "urgent", "asap", "immediately", "lawyer", "unacceptable", "عاجل", "ضروري", "فورا", "فوراً",
];

#[derive(Debug, Default)]
pub struct CustomerServiceHandler;

impl CustomerServiceHandler {
    pub fn new() -> Self {
        Self
    }
}

fn detect_topic(intent: Intent, lower: &str) -> ServiceTopic {
    if intent == Intent::GeneralChat {
        return ServiceTopic::Greeting;
    }
    TOPIC_MARKERS
        .iter()
        .find(|(_, markers)| contains_any(lower, markers))
        .map(|(topic, _)| *topic)
        .unwrap_or(ServiceTopic::General)
}

fn next_steps(topic: ServiceTopic, language: Language) -> Vec<String> {
    let arabic = language.is_arabic();
    let steps: &[&str] = match (topic, arabic) {
        (ServiceTopic::Greeting, _) => &[],
        (ServiceTopic::Refund, false) => &[
            "Reply with your order number",
            "Refunds are processed within 5 business days",
        ],
        (ServiceTopic::Refund, true) => &["أرسل رقم الطلب", "تتم معالجة الاسترداد خلال 5 أيام عمل"],
        (ServiceTopic::Delivery, false) => &[
            "Reply with your order number",
            "We will share the tracking status",
        ],
        (ServiceTopic::Delivery, true) => &["أرسل رقم الطلب", "سنرسل لك حالة الشحنة"],
        (ServiceTopic::Technical, false) => &[
            "Describe what you see on screen",
            "Restart the app and try again",
        ],
        (ServiceTopic::Technical, true) => &["صف لنا ما يظهر على الشاشة", "أعد تشغيل التطبيق وحاول مرة أخرى"],
        (ServiceTopic::Billing, false) => &["Reply with the invoice number"],
        (ServiceTopic::Billing, true) => &["أرسل رقم الفاتورة"],
        (ServiceTopic::General, false) => &["Tell us a bit more about your request"],
        (ServiceTopic::General, true) => &["أخبرنا بتفاصيل أكثر عن طلبك"],
    };
    steps.iter().map(|step| step.to_string()).collect()
}

#[async_trait]
impl Handler for CustomerServiceHandler {
    fn name(&self) -> &'static str {
        "customer_service"
    }

    async fn handle(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> Result<HandlerResult> {
        let lower = input.text.to_lowercase();
        let topic = detect_topic(input.classification.intent, &lower);
        let ticket_id = match topic {
            ServiceTopic::Greeting => None,
            _ => Some(short_id("TCK")),
        };
        let escalated = topic != ServiceTopic::Greeting && contains_any(&lower, URGENT_MARKERS);

        Ok(HandlerResult::ServiceReply(ServiceReply {
            topic,
            ticket_id,
            next_steps: next_steps(topic, ctx.language),
            escalated,
        }))
    }
}
