//! Teller Core Library
//!
//! Cache-aware multi-agent answering over a bank operations manual. Every agent
//! prompt starts with the same byte-identical static zone (system framing plus
//! the manual) so the inference server can reuse its prefix cache; reuse is
//! inferred from time to first token, and queries fan out to several
//! specialist agents concurrently.

pub mod cache;
pub mod config;
pub mod error;
pub mod fanout;
pub mod llm;
pub mod prompts;
pub mod service;
pub mod session;
pub mod telemetry;

// Re-export commonly used types
pub use cache::{CacheEfficiencyReport, CacheGrade, CacheMetricsRegistry, CacheOutcome};
pub use config::{LogFormat, LoggingConfig, Settings, load_settings};
pub use error::{TellerError, TellerResult, UnifiedError};
pub use fanout::{
    AgentRouter, FanoutCoordinator, FanoutOutcome, FanoutRequest, LlmRouter, ResponseAggregator,
    SectionAggregator, StaticRouter,
};
pub use llm::{Completion, InferenceBackend, OpenAiCompatClient};
pub use prompts::{PromptAssembler, PromptInputs, PromptRegistry, RenderedPrompt};
pub use service::{AgentDiagnostic, QueryRequest, QueryResponse, QueryService};
pub use session::{SessionStore, Turn};
pub use telemetry::{TellerMetrics, TraceSink};
