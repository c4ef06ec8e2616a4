use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as Days, NaiveTime, Utc};
use switchboard_core::{Appointment, HandlerResult, OutboundAction, SessionContext};

use super::{
    contains_any, localized, parse_iso_date, resolve_date, resolve_time, Handler, HandlerInput,
};
use crate::outbound::attempt;

const DEFAULT_DURATION_MINUTES: u32 = 30;

/// (markers, english topic, arabic topic)
const TOPICS: &[(&[&str], &str, &str)] = &[
    (&["demo", "عرض تجريبي"], "demo", "عرض تجريبي"),
    (&["meeting", "اجتماع"], "meeting", "اجتماع"),
    (&["visit", "زيارة"], "visit", "زيارة"),
    (&["call", "مكالمة"], "call", "مكالمة"),
    (&["consultation", "استشارة"], "consultation", "استشارة"),
];

pub struct SchedulerHandler {
    outbound: Arc<dyn OutboundAction>,
    action_timeout: Duration,
}

impl SchedulerHandler {
    pub fn new(outbound: Arc<dyn OutboundAction>, action_timeout: Duration) -> Self {
        Self {
            outbound,
            action_timeout,
        }
    }
}

fn duration_minutes(lower: &str) -> u32 {
    if contains_any(lower, &["hour", "ساعة"]) {
        60
    } else {
        DEFAULT_DURATION_MINUTES
    }
}

#[async_trait]
impl Handler for SchedulerHandler {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    async fn handle(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> Result<HandlerResult> {
        let lower = input.text.to_lowercase();
        let today = Utc::now().date_naive();
        let classification = input.classification;

        let date = parse_iso_date(&lower)
            .or_else(|| resolve_date(classification.entity("dates"), today))
            .unwrap_or(today + Days::days(1));
        let time = resolve_time(classification.entity("times"))
            .or_else(|| NaiveTime::from_hms_opt(10, 0, 0))
            .unwrap_or(NaiveTime::MIN);
        let topic = TOPICS
            .iter()
            .find(|(markers, _, _)| contains_any(&lower, markers))
            .map(|(_, en, ar)| localized(ctx.language, en, ar))
            .unwrap_or_else(|| localized(ctx.language, "appointment", "موعد"))
            .to_string();

        let confirmation = match classification.entity("phones").first() {
            Some(phone) => {
                let text = format!(
                    "{} {} {} {}",
                    localized(ctx.language, "Your appointment is confirmed:", "تم تأكيد موعدك:"),
                    date.format("%Y-%m-%d"),
                    time.format("%H:%M"),
                    ctx.business.business_name
                );
                Some(
                    attempt(
                        "send_message",
                        phone,
                        self.action_timeout,
                        self.outbound.send_message(phone, &text),
                    )
                    .await,
                )
            }
            None => None,
        };

        Ok(HandlerResult::Appointment(Appointment {
            date,
            time,
            duration_minutes: duration_minutes(&lower),
            topic,
            confirmation,
        }))
    }
}
