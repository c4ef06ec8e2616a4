use chrono::{DateTime, Utc};
use serde_json::json;
use switchboard_core::{
    Actor, ClassificationResult, ConversationEntry, HandlerResult, Intent, Language, MemoryEntry,
    PipelineState, Session,
};
use uuid::Uuid;

pub struct Interaction<'a> {
    pub correlation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub language: Language,
    pub intent: Option<Intent>,
    pub user_text: &'a str,
    pub response: &'a str,
    pub state: PipelineState,
    pub classification: Option<&'a ClassificationResult>,
    pub result: &'a HandlerResult,
}

/// Appends interactions to a session, keeping history and memory bounded.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRecorder {
    history_cap: usize,
    memory_cap: usize,
}

impl MemoryRecorder {
    pub fn new(history_cap: usize, memory_cap: usize) -> Self {
        Self {
            history_cap: history_cap.max(1),
            memory_cap: memory_cap.max(1),
        }
    }

    /// Returns the id of the new memory entry. Infallible.
    pub fn record(&self, session: &mut Session, interaction: Interaction<'_>) -> String {
        let memory_id = Uuid::new_v4().to_string();

        session.history.push(ConversationEntry {
            actor: Actor::User,
            content: interaction.user_text.to_string(),
            timestamp: interaction.timestamp,
            correlation_id: interaction.correlation_id,
        });
        if session.history.len() > self.history_cap {
            let overflow = session.history.len() - self.history_cap;
            session.history.drain(..overflow);
        }

        session.memory_bank.insert(
            memory_id.clone(),
            MemoryEntry {
                id: memory_id.clone(),
                timestamp: interaction.timestamp,
                session_id: session.session_id.clone(),
                language: interaction.language,
                intent: interaction.intent,
                payload: json!({
                    "correlation_id": interaction.correlation_id,
                    "state": interaction.state.as_str(),
                    "kind": interaction.result.kind().as_str(),
                    "response": interaction.response,
                    "confidence": interaction.classification.map(|c| c.confidence),
                    "source": interaction.classification.map(|c| c.source),
                    "entities": interaction.classification.map(|c| &c.entities),
                    "result": interaction.result,
                }),
            },
        );
        self.evict_oldest_memory(session);

        session.language = interaction.language;
        if let Some(intent) = interaction.intent {
            session.last_intent = Some(intent);
        }
        session.updated_at = interaction.timestamp;

        memory_id
    }

    fn evict_oldest_memory(&self, session: &mut Session) {
        while session.memory_bank.len() > self.memory_cap {
            let oldest = session
                .memory_bank
                .values()
                .min_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
                .map(|entry| entry.id.clone());
            match oldest {
                Some(id) => {
                    session.memory_bank.remove(&id);
                }
                None => break,
            }
        }
    }
}
