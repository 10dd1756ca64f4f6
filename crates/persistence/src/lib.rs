//! Typed repositories over ScyllaDB for calls, call log events, turns,
//! agents, campaigns, and cached-prompt handles, with in-memory fallbacks
//! for degraded operation.

pub mod client;
pub mod error;
pub mod repository;
pub mod schema;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::{PersistenceError, Result};
pub use repository::{
    AgentRepository, CachedPromptRepository, CallLogRepository, CallRepository, CampaignRepository,
    InMemoryAgentRepository, InMemoryCachedPromptRepository, InMemoryCallLogRepository,
    InMemoryCallRepository, InMemoryCampaignRepository, InMemoryTurnRepository,
    ScyllaAgentRepository, ScyllaCachedPromptRepository, ScyllaCallLogRepository, ScyllaCallRepository,
    ScyllaCampaignRepository, ScyllaTurnRepository, TurnRepository,
};
