use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::timeout;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{
    clamp_confidence, ClassificationResult, ClassificationSource, Entities, Intent,
};
use crate::patterns::PatternCatalog;
use crate::ports::{Classifier, ClassifierVerdict};

pub const DEFAULT_CLARIFY_THRESHOLD: f32 = 0.2;
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(2);
pub const SIGNATURE_WEIGHT: f32 = 0.25;

const ARABIC_PREFIXES: &[char] = &['و', 'ب', 'ل', 'ف', 'ك', 'ا'];

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternScore {
    pub intent: Intent,
    pub score: f32,
    pub keyword_hits: usize,
    pub signature_hits: usize,
    pub priority: u8,
}

pub fn score_patterns(catalog: &PatternCatalog, text: &str) -> Vec<PatternScore> {
    let lower = text.to_lowercase();
    let tokens = tokenize(&lower);

    catalog
        .patterns()
        .iter()
        .map(|pattern| {
            let keyword_hits = pattern
                .keywords
                .iter()
                .filter(|keyword| keyword_matches(keyword, &lower, &tokens))
                .count();
            let signature_hits = pattern
                .signatures
                .iter()
                .filter(|signature| signature.is_match(&lower))
                .count();
            let fraction = if pattern.keywords.is_empty() {
                0.0
            } else {
                keyword_hits as f32 / pattern.keywords.len() as f32
            };

            PatternScore {
                intent: pattern.category,
                score: clamp_confidence(fraction + SIGNATURE_WEIGHT * signature_hits as f32),
                keyword_hits,
                signature_hits,
                priority: pattern.priority,
            }
        })
        .collect()
}

/// Highest score wins; equal scores go to the lower priority rank.
pub fn best_match(scores: &[PatternScore]) -> Option<&PatternScore> {
    scores
        .iter()
        .filter(|candidate| candidate.score > 0.0)
        .max_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| b.priority.cmp(&a.priority))
        })
}

pub fn classify_rules(catalog: &PatternCatalog, text: &str, threshold: f32) -> ClassificationResult {
    let entities = extract_entities(text);
    let scores = score_patterns(catalog, text);

    match best_match(&scores) {
        Some(best) if best.score >= threshold => {
            ClassificationResult::new(best.intent, best.score, entities, ClassificationSource::Rules)
        }
        Some(best) => {
            let mut result = ClassificationResult::new(
                Intent::Unclear,
                best.score,
                entities,
                ClassificationSource::Rules,
            );
            result.candidate = Some(best.intent);
            result
        }
        None => ClassificationResult::new(Intent::Unclear, 0.0, entities, ClassificationSource::Rules),
    }
}

/// Accepts a classifier verdict only when it names a known category.
pub fn validate_verdict(verdict: &ClassifierVerdict) -> Option<(Intent, f32)> {
    if !verdict.confidence.is_finite() {
        return None;
    }
    Intent::from_label(&verdict.category).map(|intent| (intent, clamp_confidence(verdict.confidence)))
}

#[derive(Clone)]
pub struct IntentClassifier {
    catalog: &'static PatternCatalog,
    llm: Option<Arc<dyn Classifier>>,
    llm_timeout: Duration,
    threshold: f32,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            catalog: PatternCatalog::builtin(),
            llm: None,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            threshold: DEFAULT_CLARIFY_THRESHOLD,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn Classifier>, llm_timeout: Duration) -> Self {
        self.llm = Some(llm);
        self.llm_timeout = llm_timeout;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = clamp_confidence(threshold);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn llm_name(&self) -> Option<&str> {
        self.llm.as_deref().map(|llm| llm.name())
    }

    pub fn classify_rules(&self, text: &str) -> ClassificationResult {
        classify_rules(self.catalog, text, self.threshold)
    }

    /// Consults the LLM first (bounded by the timeout); any invalid, failed or
    /// late answer falls through to the deterministic catalog.
    pub async fn classify(&self, text: &str) -> ClassificationResult {
        let Some(llm) = &self.llm else {
            return self.classify_rules(text);
        };

        let labels = Intent::labels();
        let accepted = match timeout(self.llm_timeout, llm.classify(text, &labels)).await {
            Ok(Ok(verdict)) => validate_verdict(&verdict),
            Ok(Err(_)) | Err(_) => None,
        };

        match accepted {
            Some((intent, confidence)) => ClassificationResult::new(
                intent,
                confidence,
                extract_entities(text),
                ClassificationSource::Llm,
            ),
            None => {
                let mut result = self.classify_rules(text);
                result.source = ClassificationSource::RulesFallback;
                result
            }
        }
    }
}

const ENTITY_SPECS: &[(&str, &str)] = &[
    ("phones", r"\+?\d[\d \-]{6,16}\d"),
    ("emails", r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}"),
    ("times", r"(?i)\b\d{1,2}(:\d{2})?\s*(am|pm)\b|\b\d{1,2}:\d{2}\b"),
];

static ENTITY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    ENTITY_SPECS
        .iter()
        .filter_map(|(key, raw)| Regex::new(raw).ok().map(|regex| (*key, regex)))
        .collect()
});

static ISO_DATE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").ok());

const PRODUCT_ALIASES: &[(&str, &str)] = &[
    ("crm", "CRM"),
    ("customer relationship", "CRM"),
    ("نظام إدارة العملاء", "CRM"),
    ("erp", "ERP"),
    ("pos", "POS"),
    ("point of sale", "POS"),
    ("نقاط البيع", "POS"),
    ("website", "Website"),
    ("موقع", "Website"),
    ("متجر", "Website"),
    ("mobile app", "Mobile App"),
    ("تطبيق", "Mobile App"),
    ("chatbot", "Chatbot"),
    ("شات بوت", "Chatbot"),
    ("whatsapp", "WhatsApp Automation"),
    ("واتساب", "WhatsApp Automation"),
];

const DATE_HINTS: &[(&str, &str)] = &[
    ("today", "today"),
    ("اليوم", "today"),
    ("tomorrow", "tomorrow"),
    ("غدا", "tomorrow"),
    ("غداً", "tomorrow"),
    ("بكرة", "tomorrow"),
    ("بكره", "tomorrow"),
    ("next week", "next_week"),
    ("الأسبوع القادم", "next_week"),
    ("monday", "monday"),
    ("الاثنين", "monday"),
    ("الإثنين", "monday"),
    ("tuesday", "tuesday"),
    ("الثلاثاء", "tuesday"),
    ("wednesday", "wednesday"),
    ("الأربعاء", "wednesday"),
    ("الاربعاء", "wednesday"),
    ("thursday", "thursday"),
    ("الخميس", "thursday"),
    ("friday", "friday"),
    ("الجمعة", "friday"),
    ("saturday", "saturday"),
    ("السبت", "saturday"),
    ("sunday", "sunday"),
    ("الأحد", "sunday"),
    ("الاحد", "sunday"),
];

/// Best effort: a message without recognisable entities yields an empty map.
pub fn extract_entities(text: &str) -> Entities {
    let lower = text.to_lowercase();
    let tokens = tokenize(&lower);
    let mut entities = Entities::new();
    // Dates like 2026-05-02 would otherwise read as phone numbers.
    let without_dates = match ISO_DATE.as_ref() {
        Some(regex) => regex.replace_all(&lower, " "),
        None => std::borrow::Cow::Borrowed(lower.as_str()),
    };

    for (key, regex) in ENTITY_PATTERNS.iter() {
        let haystack = match *key {
            "phones" => without_dates.as_ref(),
            _ => lower.as_str(),
        };
        let found = regex
            .find_iter(haystack)
            .filter_map(|hit| match *key {
                "phones" => normalize_phone(hit.as_str()),
                _ => Some(hit.as_str().trim().to_string()),
            })
            .collect::<Vec<_>>();
        push_unique(&mut entities, key, found);
    }

    let products = PRODUCT_ALIASES
        .iter()
        .filter(|(alias, _)| keyword_matches(alias, &lower, &tokens))
        .map(|(_, product)| product.to_string())
        .collect();
    push_unique(&mut entities, "products", products);

    let dates = DATE_HINTS
        .iter()
        .filter(|(hint, _)| keyword_matches(hint, &lower, &tokens))
        .map(|(_, canonical)| canonical.to_string())
        .collect();
    push_unique(&mut entities, "dates", dates);

    entities
}

fn push_unique(entities: &mut Entities, key: &str, values: Vec<String>) {
    let mut unique: Vec<String> = Vec::new();
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    if !unique.is_empty() {
        entities.insert(key.to_string(), unique);
    }
}

fn normalize_phone(raw: &str) -> Option<String> {
    let digits = raw.chars().filter(char::is_ascii_digit).collect::<String>();
    if !(8..=15).contains(&digits.len()) {
        return None;
    }
    if raw.trim_start().starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

fn keyword_matches(keyword: &str, lower: &str, tokens: &[String]) -> bool {
    if keyword.contains(char::is_whitespace) || keyword.contains('-') {
        return lower.contains(keyword);
    }
    tokens
        .iter()
        .any(|token| token == keyword || has_arabic_prefix(token, keyword))
}

/// Arabic attaches conjunctions and prepositions to the word, e.g. "وموعد".
fn has_arabic_prefix(token: &str, keyword: &str) -> bool {
    if keyword.is_ascii() || token.len() <= keyword.len() {
        return false;
    }
    match token.strip_suffix(keyword) {
        Some(prefix) => {
            prefix.chars().count() <= 3 && prefix.chars().all(|ch| ARABIC_PREFIXES.contains(&ch))
        }
        None => false,
    }
}
