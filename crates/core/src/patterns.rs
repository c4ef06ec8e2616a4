use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Intent;

#[derive(Debug, Clone)]
pub struct IntentPattern {
    pub category: Intent,
    pub keywords: Vec<&'static str>,
    pub signatures: Vec<Regex>,
    /// Lower ranks win ties.
    pub priority: u8,
}

#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<IntentPattern>,
}

struct PatternSpec {
    category: Intent,
    priority: u8,
    keywords: &'static [&'static str],
    signatures: &'static [&'static str],
}

const BUILTIN_SPECS: &[PatternSpec] = &[
    PatternSpec {
        category: Intent::SalesInquiry,
        priority: 0,
        keywords: &[
            "quote",
            "quotation",
            "price",
            "pricing",
            "cost",
            "offer",
            "buy",
            "purchase",
            "package",
            "subscription",
            "crm",
            "erp",
            "pos",
            "website",
            "chatbot",
            "demo",
            "عرض سعر",
            "سعر",
            "أسعار",
            "اسعار",
            "تكلفة",
            "بكم",
            "شراء",
            "باقة",
            "اشتراك",
        ],
        signatures: &[
            r"(?i)\b(quote|quotation|pricing|price|cost)s?\b.{0,40}\b(for|of|on)\b",
            r"(?i)\bhow much\b",
            r"(?i)\b(buy|purchase|subscribe to)\b",
            r"(عرض\s*سعر|كم\s*(سعر|تكلفة)|بكم)",
        ],
    },
    PatternSpec {
        category: Intent::Telemarketing,
        priority: 1,
        keywords: &[
            "call",
            "calls",
            "dial",
            "campaign",
            "telemarketing",
            "outreach",
            "leads",
            "customers",
            "اتصل",
            "اتصال",
            "مكالمة",
            "مكالمات",
            "حملة",
            "العملاء",
            "الزبائن",
            "كلم",
        ],
        signatures: &[
            r"(?i)\b(call|dial|phone|ring)\b.{0,30}\b(customers|clients|leads|contacts|list|numbers?)\b",
            r"(?i)\b(telemarketing|cold[- ]calls?|call campaign|outbound calls?)\b",
            r"(اتصل|اتصال|كلم)\s*(ب|على|مع)?\s*\S*\s*(العملاء|الزبائن|العميل|الزبون|الأرقام|الارقام)",
            r"حملة\s*(اتصال|مكالمات|تسويق)",
        ],
    },
    PatternSpec {
        category: Intent::AppointmentScheduling,
        priority: 2,
        keywords: &[
            "appointment",
            "schedule",
            "book",
            "booking",
            "meeting",
            "reschedule",
            "calendar",
            "slot",
            "موعد",
            "حجز",
            "احجز",
            "اجتماع",
            "جدولة",
        ],
        signatures: &[
            r"(?i)\b(book|schedule|set up|arrange|reschedule)\b.{0,30}\b(appointment|meeting|call|demo|slot|visit)\b",
            r"(?i)\b(appointment|meeting)\b",
            r"(احجز|حجز|أحجز|جدول).{0,20}(موعد|اجتماع)",
            r"موعد",
        ],
    },
    PatternSpec {
        category: Intent::CustomerService,
        priority: 3,
        keywords: &[
            "help",
            "support",
            "problem",
            "issue",
            "complaint",
            "refund",
            "return",
            "broken",
            "delivery",
            "order",
            "invoice",
            "billing",
            "charged",
            "not working",
            "مشكلة",
            "شكوى",
            "مساعدة",
            "استرجاع",
            "استرداد",
            "طلبي",
            "التوصيل",
            "فاتورة",
            "عطل",
            "ما يشتغل",
            "مش شغال",
        ],
        signatures: &[
            r"(?i)\b(refund|complain|complaint|broken|not working|doesn'?t work|never arrived|where is my order)\b",
            r"(?i)\b(my|the)\s+(order|invoice|bill|account|delivery)\b",
            r"(مشكلة|شكوى|استرجاع|استرداد|عطل|ما\s*يشتغل|مش\s*شغال)",
        ],
    },
    PatternSpec {
        category: Intent::TaskManagement,
        priority: 4,
        keywords: &[
            "task",
            "todo",
            "to-do",
            "remind",
            "reminder",
            "follow up",
            "follow-up",
            "assign",
            "deadline",
            "checklist",
            "مهمة",
            "مهام",
            "ذكرني",
            "تذكير",
            "متابعة",
        ],
        signatures: &[
            r"(?i)\b(create|add|make|assign)\b.{0,20}\b(task|todo|to-do|reminder)\b",
            r"(?i)\bremind me\b",
            r"(?i)\bfollow[- ]?up\b",
            r"(أضف|اضف|انشئ|أنشئ).{0,15}(مهمة|تذكير)",
            r"ذكرني",
        ],
    },
    PatternSpec {
        category: Intent::GeneralChat,
        priority: 5,
        keywords: &[
            "hello",
            "hi",
            "hey",
            "thanks",
            "thank you",
            "good morning",
            "good evening",
            "how are you",
            "مرحبا",
            "السلام عليكم",
            "اهلا",
            "أهلا",
            "شكرا",
            "صباح الخير",
            "مساء الخير",
            "كيف حالك",
            "هلا",
        ],
        signatures: &[
            r"(?i)^\s*(hi|hello|hey|good (morning|afternoon|evening))\b",
            r"(?i)\b(thanks|thank you)\b",
            r"^\s*(مرحبا|السلام عليكم|اهلا|أهلا|هلا)",
            r"شكرا",
        ],
    },
];

static BUILTIN: Lazy<PatternCatalog> = Lazy::new(|| PatternCatalog::from_specs(BUILTIN_SPECS));

impl PatternCatalog {
    pub fn builtin() -> &'static PatternCatalog {
        &BUILTIN
    }

    fn from_specs(specs: &[PatternSpec]) -> Self {
        let mut patterns = specs
            .iter()
            .map(|spec| IntentPattern {
                category: spec.category,
                keywords: spec.keywords.to_vec(),
                signatures: spec
                    .signatures
                    .iter()
                    .filter_map(|raw| Regex::new(raw).ok())
                    .collect(),
                priority: spec.priority,
            })
            .collect::<Vec<_>>();
        patterns.sort_by_key(|pattern| pattern.priority);
        Self { patterns }
    }

    pub fn patterns(&self) -> &[IntentPattern] {
        &self.patterns
    }

    pub fn get(&self, category: Intent) -> Option<&IntentPattern> {
        self.patterns
            .iter()
            .find(|pattern| pattern.category == category)
    }
}
