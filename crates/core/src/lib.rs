pub mod error;
pub mod intent;
pub mod language;
pub mod models;
pub mod patterns;
pub mod policy;
pub mod ports;
pub mod templates;

pub use error::{PipelineError, TemplateError};
pub use intent::{
    classify_rules, extract_entities, normalize_text, tokenize, IntentClassifier,
    DEFAULT_CLARIFY_THRESHOLD, DEFAULT_LLM_TIMEOUT,
};
pub use language::{detect_language, LanguageDetector};
pub use models::*;
pub use patterns::{IntentPattern, PatternCatalog};
pub use policy::{GateDecision, RiskCategory, RolePermission, SecurityGate};
pub use ports::{Classifier, ClassifierVerdict, OutboundAction};
pub use templates::{format_amount, ResponseFormatter};
