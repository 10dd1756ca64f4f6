//! Shared application state across all HTTP/WebSocket handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use voice_agent_agent::{ConversationAnalyzer, PrincipleEngine};
use voice_agent_config::{AgentConfigStore, Settings};
use voice_agent_hedge::HedgeSelector;
use voice_agent_llm::ContextCacheManager;
use voice_agent_persistence::{
    AgentRepository, CachedPromptRepository, CallLogRepository, CallRepository, CampaignRepository,
    TurnRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub agents: Arc<AgentConfigStore>,
    pub cache_manager: Arc<ContextCacheManager>,
    pub analyzer: Arc<ConversationAnalyzer>,
    pub principle_engine: Arc<PrincipleEngine>,
    pub hedge_selector: Arc<HedgeSelector>,
    pub calls: Arc<dyn CallRepository>,
    pub call_logs: Arc<dyn CallLogRepository>,
    pub cached_prompts: Arc<dyn CachedPromptRepository>,
    pub turns: Arc<dyn TurnRepository>,
    pub agent_repo: Arc<dyn AgentRepository>,
    pub campaign_repo: Arc<dyn CampaignRepository>,
    pub metrics_handle: PrometheusHandle,
}

#[allow(clippy::too_many_arguments)]
impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        agents: Arc<AgentConfigStore>,
        cache_manager: Arc<ContextCacheManager>,
        hedge_selector: Arc<HedgeSelector>,
        calls: Arc<dyn CallRepository>,
        call_logs: Arc<dyn CallLogRepository>,
        cached_prompts: Arc<dyn CachedPromptRepository>,
        turns: Arc<dyn TurnRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        campaign_repo: Arc<dyn CampaignRepository>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            settings,
            agents,
            cache_manager,
            analyzer: Arc::new(ConversationAnalyzer::new()),
            principle_engine: Arc::new(PrincipleEngine::new()),
            hedge_selector,
            calls,
            call_logs,
            cached_prompts,
            turns,
            agent_repo,
            campaign_repo,
            metrics_handle,
        }
    }
}
