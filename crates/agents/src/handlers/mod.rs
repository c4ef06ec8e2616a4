pub mod call;
pub mod clarification;
pub mod customer_service;
pub mod offer;
pub mod scheduler;
pub mod task;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use switchboard_core::{ClassificationResult, HandlerResult, Language, SessionContext};
use uuid::Uuid;

pub use call::CallHandler;
pub use clarification::{clarification_for, clarifying_questions_for, ClarificationHandler};
pub use customer_service::CustomerServiceHandler;
pub use offer::OfferHandler;
pub use scheduler::SchedulerHandler;
pub use task::TaskHandler;

pub struct HandlerInput<'a> {
    pub text: &'a str,
    pub classification: &'a ClassificationResult,
}

/// Intent-specific work. Handlers see a read-only session view and reach the
/// outside world only through the injected outbound port.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> Result<HandlerResult>;
}

pub(crate) fn localized<'a>(language: Language, en: &'a str, ar: &'a str) -> &'a str {
    if language.is_arabic() {
        ar
    } else {
        en
    }
}

pub(crate) fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}

pub(crate) fn short_id(prefix: &str) -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", raw[..8].to_uppercase())
}

/// Resolves the first usable date hint relative to `today`.
pub(crate) fn resolve_date(hints: &[String], today: NaiveDate) -> Option<NaiveDate> {
    hints.iter().find_map(|hint| match hint.as_str() {
        "today" => Some(today),
        "tomorrow" => Some(today + Duration::days(1)),
        "next_week" => Some(today + Duration::days(7)),
        other => other
            .parse::<Weekday>()
            .ok()
            .map(|weekday| next_weekday(today, weekday)),
    })
}

fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = weekday.num_days_from_monday() as i64;
    let mut delta = (wanted - current).rem_euclid(7);
    if delta == 0 {
        delta = 7;
    }
    today + Duration::days(delta)
}

pub(crate) fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != '-'))
        .find_map(|token| NaiveDate::parse_from_str(token, "%Y-%m-%d").ok())
}

/// Accepts `14:30`, `3pm`, `3:30 pm` and `10 am` style hints.
pub(crate) fn resolve_time(hints: &[String]) -> Option<NaiveTime> {
    hints.iter().find_map(|hint| parse_time(hint))
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let compact = raw.to_lowercase().replace(' ', "");
    let (clock, meridiem) = if let Some(rest) = compact.strip_suffix("am") {
        (rest.to_string(), Some(false))
    } else if let Some(rest) = compact.strip_suffix("pm") {
        (rest.to_string(), Some(true))
    } else {
        (compact, None)
    };

    let (hour, minute) = match clock.split_once(':') {
        Some((hour, minute)) => (hour.parse::<u32>().ok()?, minute.parse::<u32>().ok()?),
        None => (clock.parse::<u32>().ok()?, 0),
    };

    let hour = match meridiem {
        Some(_) if hour == 0 || hour > 12 => return None,
        Some(false) if hour == 12 => 0,
        Some(true) if hour < 12 => hour + 12,
        _ => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}
