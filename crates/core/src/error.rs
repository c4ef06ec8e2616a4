use thiserror::Error;

use crate::models::{Intent, Role};

/// Failure taxonomy of a single pipeline run. None of these end the session.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("message blocked by risk policy ({0})")]
    RiskyContent(String),
    #[error("role `{role}` is not allowed to use intent `{intent}`")]
    InsufficientPermission { role: Role, intent: Intent },
    #[error("intent could not be determined (confidence {confidence:.2})")]
    AmbiguousIntent { confidence: f32 },
    #[error("handler `{handler}` failed: {detail}")]
    HandlerFailure { handler: String, detail: String },
    #[error("{action} to {target} failed: {detail}")]
    ExternalActionFailure {
        action: &'static str,
        target: String,
        detail: String,
    },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid template resource: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed reading template resource {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("missing template for kind `{kind}` in language `{language}`")]
    Missing { kind: String, language: String },
    #[error("missing apology template for language `{0}`")]
    MissingApology(String),
    #[error("template `{name}` failed to compile: {source}")]
    Compile {
        name: String,
        #[source]
        source: tera::Error,
    },
    #[error("template `{name}` failed to render: {source}")]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
    #[error("template `{0}` rendered an empty response")]
    Empty(String),
}
