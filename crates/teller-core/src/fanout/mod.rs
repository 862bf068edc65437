//! Multi-agent fan-out
//!
//! A query is routed to one to three specialist agents. Each agent's prompt is
//! rendered and sent as an independent concurrent call; results are joined,
//! partial failures degrade the response instead of failing it, and
//! uncertainty in compliance-sensitive answers raises an escalation flag.

mod aggregator;
mod coordinator;
mod escalation;
mod router;
mod types;

pub use aggregator::{ResponseAggregator, SectionAggregator, display_name};
pub use coordinator::FanoutCoordinator;
pub use escalation::{Escalation, EscalationPolicy};
pub use router::{AgentRouter, LlmRouter, StaticRouter, parse_agent_selection};
pub use types::{AgentOutcome, AgentStatus, FanoutOutcome, FanoutRequest};

#[cfg(test)]
mod tests;
