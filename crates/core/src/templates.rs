use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tera::{Context, Tera};

use crate::error::TemplateError;
use crate::models::{HandlerResult, Language, ResultKind};

const BUILTIN_TEMPLATES: &str = include_str!("../resources/templates.json");
const FALLBACK_APOLOGY: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, Deserialize)]
struct TemplateResource {
    templates: BTreeMap<String, BTreeMap<String, String>>,
    apology: BTreeMap<String, String>,
}

/// Renders handler results into user-facing text, one template per result
/// kind and language. Loading fails fast when any pair is missing.
#[derive(Debug)]
pub struct ResponseFormatter {
    tera: Tera,
    apologies: BTreeMap<Language, String>,
}

impl ResponseFormatter {
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_json(BUILTIN_TEMPLATES)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, TemplateError> {
        let resource: TemplateResource = serde_json::from_str(raw)?;
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        let mut apologies = BTreeMap::new();

        for language in Language::ALL {
            for kind in ResultKind::ALL {
                let body = resource
                    .templates
                    .get(kind.as_str())
                    .and_then(|by_language| by_language.get(language.as_code()))
                    .ok_or_else(|| TemplateError::Missing {
                        kind: kind.as_str().to_string(),
                        language: language.as_code().to_string(),
                    })?;
                let name = template_name(kind, language);
                tera.add_raw_template(&name, body)
                    .map_err(|source| TemplateError::Compile { name, source })?;
            }

            let apology = resource
                .apology
                .get(language.as_code())
                .filter(|text| !text.trim().is_empty())
                .ok_or_else(|| TemplateError::MissingApology(language.as_code().to_string()))?;
            apologies.insert(language, apology.clone());
        }

        Ok(Self { tera, apologies })
    }

    pub fn try_render(
        &self,
        result: &HandlerResult,
        language: Language,
    ) -> Result<String, TemplateError> {
        let name = template_name(result.kind(), language);
        let context = build_context(result, language);
        let text = self
            .tera
            .render(&name, &context)
            .map_err(|source| TemplateError::Render {
                name: name.clone(),
                source,
            })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TemplateError::Empty(name));
        }
        Ok(text.to_string())
    }

    /// Never returns an empty string.
    pub fn render(&self, result: &HandlerResult, language: Language) -> String {
        self.try_render(result, language)
            .unwrap_or_else(|_| self.apology(language).to_string())
    }

    pub fn apology(&self, language: Language) -> &str {
        self.apologies
            .get(&language)
            .or_else(|| self.apologies.get(&language.base()))
            .or_else(|| self.apologies.get(&Language::default()))
            .map(String::as_str)
            .unwrap_or(FALLBACK_APOLOGY)
    }

    pub fn template_names(&self) -> Vec<&str> {
        let mut names = self.tera.get_template_names().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

fn template_name(kind: ResultKind, language: Language) -> String {
    format!("{}.{}", kind.as_str(), language.as_code())
}

fn build_context(result: &HandlerResult, language: Language) -> Context {
    let mut context = Context::new();
    context.insert("language", language.as_code());

    match result {
        HandlerResult::Offer(offer) => {
            context.insert("product", &offer.product);
            context.insert("price", &format_amount(offer.price_minor));
            context.insert("currency", &offer.currency);
            context.insert("features", &offer.features);
            context.insert("valid_until", &offer.valid_until.format("%Y-%m-%d").to_string());
        }
        HandlerResult::Appointment(appointment) => {
            let confirmation = match &appointment.confirmation {
                Some(outcome) if outcome.success => "sent",
                Some(_) => "failed",
                None => "none",
            };
            context.insert("topic", &appointment.topic);
            context.insert("date", &appointment.date.format("%Y-%m-%d").to_string());
            context.insert("time", &appointment.time.format("%H:%M").to_string());
            context.insert("duration", &appointment.duration_minutes);
            context.insert("confirmation", confirmation);
        }
        HandlerResult::CallRequest(call) => {
            let placed = call.placed.iter().filter(|outcome| outcome.success).count();
            context.insert("total", &call.targets.len());
            context.insert("placed", &placed);
            context.insert("failed", &call.targets.len().saturating_sub(placed));
            context.insert("success", &call.success);
        }
        HandlerResult::ServiceReply(reply) => {
            context.insert("topic", reply.topic.as_str());
            context.insert("ticket_id", &reply.ticket_id);
            context.insert("next_steps", &reply.next_steps);
            context.insert("escalated", &reply.escalated);
        }
        HandlerResult::TaskCreated(task) => {
            context.insert("task_id", &task.task_id);
            context.insert("title", &task.title);
            context.insert("priority", task.priority.as_str());
            context.insert(
                "due",
                &task.due.map(|due| due.format("%Y-%m-%d").to_string()),
            );
        }
        HandlerResult::Clarification(clarification) => {
            context.insert("suggestions", &clarification.suggestions);
            context.insert("hint", &clarification.hint.map(|intent| intent.as_label()));
        }
        HandlerResult::Denied(denial) => {
            context.insert("reason", denial.reason.as_str());
            context.insert("intent", &denial.intent.map(|intent| intent.as_label()));
        }
        HandlerResult::Error(fault) => {
            context.insert("handler", &fault.handler);
        }
    }

    context
}

/// Formats minor currency units with thousands separators, e.g. `1,200.00`.
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let minor = minor.unsigned_abs();
    let whole = (minor / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}{grouped}.{:02}", minor % 100)
}
