use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "ar")]
    Ar,
    #[serde(rename = "ar-gulf")]
    ArGulf,
    #[serde(rename = "ar-egypt")]
    ArEgypt,
}

impl Language {
    pub const ALL: [Language; 4] = [Self::En, Self::Ar, Self::ArGulf, Self::ArEgypt];

    pub fn from_optional_str(value: Option<&str>) -> Option<Self> {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "en" || v == "en-us" || v == "english" => Some(Self::En),
            Some(v) if v == "ar" || v == "arabic" => Some(Self::Ar),
            Some(v) if v == "ar-gulf" || v == "ar-sa" || v == "ar-ae" || v == "gulf" => {
                Some(Self::ArGulf)
            }
            Some(v) if v == "ar-egypt" || v == "ar-eg" || v == "egyptian" => Some(Self::ArEgypt),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
            Self::ArGulf => "ar-gulf",
            Self::ArEgypt => "ar-egypt",
        }
    }

    /// Base language with any dialect refinement stripped.
    pub fn base(self) -> Self {
        match self {
            Self::ArGulf | Self::ArEgypt => Self::Ar,
            other => other,
        }
    }

    pub fn is_arabic(self) -> bool {
        self.base() == Self::Ar
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    SalesManager,
    SalesAgent,
    SupportAgent,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Self::Admin,
        Self::SalesManager,
        Self::SalesAgent,
        Self::SupportAgent,
        Self::Viewer,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "admin" | "owner" | "superadmin" => Some(Self::Admin),
            "sales_manager" | "manager" => Some(Self::SalesManager),
            "sales_agent" | "sales" | "agent" => Some(Self::SalesAgent),
            "support_agent" | "support" => Some(Self::SupportAgent),
            "viewer" | "guest" | "readonly" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Unrecognised roles get the least privileged role.
    pub fn parse_lossy(value: &str) -> Self {
        Self::parse(value).unwrap_or(Self::Viewer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::SalesManager => "sales_manager",
            Self::SalesAgent => "sales_agent",
            Self::SupportAgent => "support_agent",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SalesInquiry,
    Telemarketing,
    AppointmentScheduling,
    CustomerService,
    TaskManagement,
    GeneralChat,
    Unclear,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Self::SalesInquiry,
        Self::Telemarketing,
        Self::AppointmentScheduling,
        Self::CustomerService,
        Self::TaskManagement,
        Self::GeneralChat,
        Self::Unclear,
    ];

    pub fn as_label(self) -> &'static str {
        match self {
            Self::SalesInquiry => "sales_inquiry",
            Self::Telemarketing => "telemarketing",
            Self::AppointmentScheduling => "appointment_scheduling",
            Self::CustomerService => "customer_service",
            Self::TaskManagement => "task_management",
            Self::GeneralChat => "general_chat",
            Self::Unclear => "unclear",
        }
    }

    /// Strict lookup against the known category enumeration.
    pub fn from_label(value: &str) -> Option<Self> {
        let wanted = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_label() == wanted)
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|intent| intent.as_label()).collect()
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub actor: Actor,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub language: Language,
    pub intent: Option<Intent>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
    pub language: Language,
    pub last_intent: Option<Intent>,
    pub history: Vec<ConversationEntry>,
    pub memory_bank: BTreeMap<String, MemoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: &str, user_id: &str, role: Role, language: Language) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            role,
            language,
            last_intent: None,
            history: Vec::new(),
            memory_bank: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn recent_history(&self, limit: usize) -> &[ConversationEntry] {
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }
}

pub type Entities = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Rules,
    Llm,
    /// The LLM was consulted but its answer was rejected.
    RulesFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Entities,
    pub source: ClassificationSource,
    /// Best category that scored below the clarification threshold.
    pub candidate: Option<Intent>,
}

impl ClassificationResult {
    pub fn new(
        intent: Intent,
        confidence: f32,
        entities: Entities,
        source: ClassificationSource,
    ) -> Self {
        Self {
            intent,
            confidence: clamp_confidence(confidence),
            entities,
            source,
            candidate: None,
        }
    }

    pub fn entity(&self, key: &str) -> &[String] {
        self.entities.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub tenant_id: String,
    pub business_name: String,
    pub currency: String,
    pub customer_phones: Vec<String>,
    /// Product key (lowercase) to price in minor units.
    pub price_overrides: BTreeMap<String, i64>,
}

impl Default for BusinessContext {
    fn default() -> Self {
        Self {
            tenant_id: "default".to_string(),
            business_name: "Switchboard".to_string(),
            currency: "USD".to_string(),
            customer_phones: Vec::new(),
            price_overrides: BTreeMap::new(),
        }
    }
}

/// Read-only view of a session handed to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
    pub language: Language,
    pub last_intent: Option<Intent>,
    pub correlation_id: Uuid,
    pub history_len: usize,
    pub recent: Vec<ConversationEntry>,
    pub business: BusinessContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub target: String,
    pub success: bool,
    pub reference: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub product: String,
    pub price_minor: i64,
    pub currency: String,
    pub features: Vec<String>,
    pub valid_until: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub topic: String,
    pub confirmation: Option<ActionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub targets: Vec<String>,
    pub script: String,
    pub placed: Vec<ActionOutcome>,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTopic {
    Greeting,
    Refund,
    Delivery,
    Technical,
    Billing,
    General,
}

impl ServiceTopic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Refund => "refund",
            Self::Delivery => "delivery",
            Self::Technical => "technical",
            Self::Billing => "billing",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReply {
    pub topic: ServiceTopic,
    pub ticket_id: Option<String>,
    pub next_steps: Vec<String>,
    pub escalated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: String,
    pub title: String,
    pub priority: TaskPriority,
    pub due: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub suggestions: Vec<String>,
    pub hint: Option<Intent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    RiskyContent,
    InsufficientPermission,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RiskyContent => "risky_content",
            Self::InsufficientPermission => "insufficient_permission",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub reason: DenialReason,
    pub intent: Option<Intent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerFault {
    pub handler: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerResult {
    Offer(Offer),
    Appointment(Appointment),
    CallRequest(CallRequest),
    ServiceReply(ServiceReply),
    TaskCreated(TaskCreated),
    Clarification(Clarification),
    Denied(Denial),
    Error(HandlerFault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Offer,
    Appointment,
    CallRequest,
    ServiceReply,
    TaskCreated,
    Clarification,
    Denied,
    Error,
}

impl ResultKind {
    pub const ALL: [ResultKind; 8] = [
        Self::Offer,
        Self::Appointment,
        Self::CallRequest,
        Self::ServiceReply,
        Self::TaskCreated,
        Self::Clarification,
        Self::Denied,
        Self::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Appointment => "appointment",
            Self::CallRequest => "call_request",
            Self::ServiceReply => "service_reply",
            Self::TaskCreated => "task_created",
            Self::Clarification => "clarification",
            Self::Denied => "denied",
            Self::Error => "error",
        }
    }
}

impl HandlerResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Offer(_) => ResultKind::Offer,
            Self::Appointment(_) => ResultKind::Appointment,
            Self::CallRequest(_) => ResultKind::CallRequest,
            Self::ServiceReply(_) => ResultKind::ServiceReply,
            Self::TaskCreated(_) => ResultKind::TaskCreated,
            Self::Clarification(_) => ResultKind::Clarification,
            Self::Denied(_) => ResultKind::Denied,
            Self::Error(_) => ResultKind::Error,
        }
    }

    /// Outbound actions attempted by the handler that did not succeed.
    pub fn failed_actions(&self) -> usize {
        match self {
            Self::CallRequest(call) => call.placed.iter().filter(|o| !o.success).count(),
            Self::Appointment(appointment) => appointment
                .confirmation
                .iter()
                .filter(|o| !o.success)
                .count(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Secured,
    LanguageResolved,
    Classified,
    Routed,
    Recorded,
    Responded,
    Denied,
    Clarification,
    Error,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Responded | Self::Denied | Self::Clarification | Self::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Secured => "secured",
            Self::LanguageResolved => "language_resolved",
            Self::Classified => "classified",
            Self::Routed => "routed",
            Self::Recorded => "recorded",
            Self::Responded => "responded",
            Self::Denied => "denied",
            Self::Clarification => "clarification",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
    pub text: String,
    pub business: BusinessContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub session_id: String,
    pub correlation_id: Uuid,
    pub state: PipelineState,
    pub language: Language,
    pub classification: Option<ClassificationResult>,
    pub result: HandlerResult,
    pub message: String,
    /// False when the session store rejected the final write.
    pub recorded: bool,
}

impl OrchestrationResult {
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match &self.result {
            HandlerResult::Denied(denial) => Some(denial.reason),
            _ => None,
        }
    }

    pub fn intent(&self) -> Option<Intent> {
        self.classification.as_ref().map(|c| c.intent)
    }
}
