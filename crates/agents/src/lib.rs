pub mod config;
pub mod handlers;
pub mod orchestrator;
pub mod outbound;
pub mod recorder;
pub mod registry;

pub use config::OrchestratorConfig;
pub use handlers::{Handler, HandlerInput};
pub use orchestrator::Orchestrator;
pub use outbound::LoggingOutbound;
pub use recorder::{Interaction, MemoryRecorder};
pub use registry::HandlerRegistry;
