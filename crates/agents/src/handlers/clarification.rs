use anyhow::Result;
use async_trait::async_trait;
use switchboard_core::{
    Clarification, ClassificationResult, HandlerResult, Intent, Language, SessionContext,
};

use super::{Handler, HandlerInput};

pub fn clarifying_questions_for(hint: Option<Intent>, language: Language) -> Vec<String> {
    let arabic = language.is_arabic();
    let specific = match (hint, arabic) {
        (Some(Intent::SalesInquiry), false) => Some("Would you like a price quote? Which product are you interested in?"),
        (Some(Intent::SalesInquiry), true) => Some("هل تريد عرض سعر؟ ما المنتج الذي يهمك؟"),
        (Some(Intent::Telemarketing), false) => Some("Should we call your customers? Which list should we use?"),
        (Some(Intent::Telemarketing), true) => Some("هل تريد أن نتصل بعملائك؟ أي قائمة نستخدم؟"),
        (Some(Intent::AppointmentScheduling), false) => Some("Do you want to book an appointment? Which day and time suit you?"),
        (Some(Intent::AppointmentScheduling), true) => Some("هل تريد حجز موعد؟ ما اليوم والوقت المناسب لك؟"),
        (Some(Intent::CustomerService), false) => Some("Is there a problem with an order or invoice we can help with?"),
        (Some(Intent::CustomerService), true) => Some("هل توجد مشكلة في طلب أو فاتورة نقدر نساعدك فيها؟"),
        (Some(Intent::TaskManagement), false) => Some("Should I create a task or reminder for you?"),
        (Some(Intent::TaskManagement), true) => Some("هل تريد أن أضيف مهمة أو تذكيراً؟"),
        _ => None,
    };

    let general = if arabic {
        "أقدر أساعدك في عروض الأسعار، المواعيد، المكالمات، خدمة العملاء والمهام. ماذا تحتاج؟"
    } else {
        "I can help with quotes, appointments, calls, customer service and tasks. What do you need?"
    };

    specific
        .into_iter()
        .chain(std::iter::once(general))
        .map(str::to_string)
        .collect()
}

/// Builds a clarification, preferring the near-miss category as the hint.
pub fn clarification_for(classification: &ClassificationResult, language: Language) -> HandlerResult {
    let hint = classification.candidate.or(match classification.intent {
        Intent::Unclear => None,
        other => Some(other),
    });

    HandlerResult::Clarification(Clarification {
        suggestions: clarifying_questions_for(hint, language),
        hint,
    })
}

#[derive(Debug, Default)]
pub struct ClarificationHandler;

#[async_trait]
impl Handler for ClarificationHandler {
    fn name(&self) -> &'static str {
        "clarification"
    }

    async fn handle(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> Result<HandlerResult> {
        Ok(clarification_for(input.classification, ctx.language))
    }
}
