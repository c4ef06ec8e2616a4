use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use switchboard_core::{HandlerResult, SessionContext, TaskCreated, TaskPriority};

use super::{contains_any, parse_iso_date, resolve_date, short_id, Handler, HandlerInput};

const MAX_TITLE_CHARS: usize = 80;

const COMMAND_PREFIXES: &[&str] = &[
    "please remind me to",
    "remind me to",
    "remind me",
    "create a task to",
    "create a task for",
    "create a task",
    "add a task to",
    "add a task for",
    "add a task",
    "add a todo for",
    "add a todo",
    "todo:",
    "task:",
    "ذكرني أن",
    "ذكرني ان",
    "ذكرني",
    "أضف مهمة",
    "اضف مهمة",
    "أنشئ مهمة",
    "انشئ مهمة",
];

const HIGH_MARKERS: &[&str] = &[
    "urgent",
    "asap",
    "important",
    "high priority",
    "عاجل",
    "ضروري",
    "أولوية عالية",
    "مهم جدا",
];
const LOW_MARKERS: &[&str] = &[
    "whenever",
    "low priority",
    "someday",
    "no rush",
    "لاحقا",
    "لاحقاً",
    "مو مستعجل",
];

#[derive(Debug, Default)]
pub struct TaskHandler;

impl TaskHandler {
    pub fn new() -> Self {
        Self
    }
}

fn task_title(text: &str) -> String {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    let stripped = COMMAND_PREFIXES
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .and_then(|prefix| trimmed.get(prefix.len()..))
        .unwrap_or(trimmed);

    let cleaned = stripped
        .trim()
        .trim_matches(|ch: char| ch.is_ascii_punctuation() || ch == '،' || ch == '؟');
    let title = if cleaned.is_empty() { trimmed } else { cleaned };
    title.chars().take(MAX_TITLE_CHARS).collect()
}

fn priority(lower: &str) -> TaskPriority {
    if contains_any(lower, HIGH_MARKERS) {
        TaskPriority::High
    } else if contains_any(lower, LOW_MARKERS) {
        TaskPriority::Low
    } else {
        TaskPriority::Normal
    }
}

#[async_trait]
impl Handler for TaskHandler {
    fn name(&self) -> &'static str {
        "task"
    }

    async fn handle(&self, _ctx: &SessionContext, input: &HandlerInput<'_>) -> Result<HandlerResult> {
        let lower = input.text.to_lowercase();
        let today = Utc::now().date_naive();

        Ok(HandlerResult::TaskCreated(TaskCreated {
            task_id: short_id("TSK"),
            title: task_title(input.text),
            priority: priority(&lower),
            due: parse_iso_date(&lower)
                .or_else(|| resolve_date(input.classification.entity("dates"), today)),
        }))
    }
}
