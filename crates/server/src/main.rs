//! Voice agent server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_agent_config::{load_settings, AgentConfigStore, Settings};
use voice_agent_hedge::{FillerIndex, HedgeSelector};
use voice_agent_llm::{ContextCacheManager, HttpCachePublisher};
use voice_agent_persistence::{
    AgentRepository, CachedPromptRepository, CallLogRepository, CallRepository, CampaignRepository,
    InMemoryAgentRepository, InMemoryCachedPromptRepository, InMemoryCallLogRepository,
    InMemoryCallRepository, InMemoryCampaignRepository, InMemoryTurnRepository, ScyllaAgentRepository,
    ScyllaCachedPromptRepository, ScyllaCallLogRepository, ScyllaCallRepository, ScyllaCampaignRepository,
    ScyllaClient, ScyllaConfig, ScyllaTurnRepository, TurnRepository,
};
use voice_agent_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("Warning: failed to load configuration: {error}. Using defaults.");
            Settings::default()
        }
    };

    init_tracing(&settings);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting voice agent server");

    let metrics_handle = init_metrics();
    tracing::info!("initialized prometheus metrics at /metrics");

    let agents = AgentConfigStore::load_dir(&settings.agents_dir).unwrap_or_else(|error| {
        tracing::warn!(error = %error, dir = %settings.agents_dir, "failed to load agent configs, starting empty");
        AgentConfigStore::default()
    });
    tracing::info!(count = agents.len(), "loaded agent configs");

    let filler_index = FillerIndex::load_manifest(&settings.fillers_dir).unwrap_or_else(|error| {
        tracing::warn!(error = %error, dir = %settings.fillers_dir, "failed to load filler manifest, starting empty");
        FillerIndex::default()
    });
    let hedge_selector = Arc::new(HedgeSelector::new(filler_index));

    let cache_publisher = Arc::new(HttpCachePublisher::new(settings.model.endpoint.clone()));
    let cache_manager = Arc::new(ContextCacheManager::new(cache_publisher));

    let (calls, call_logs, cached_prompts, turns, agent_repo, campaign_repo): (
        Arc<dyn CallRepository>,
        Arc<dyn CallLogRepository>,
        Arc<dyn CachedPromptRepository>,
        Arc<dyn TurnRepository>,
        Arc<dyn AgentRepository>,
        Arc<dyn CampaignRepository>,
    ) = match init_persistence(&settings).await {
        Ok(client) => {
            tracing::info!(keyspace = %client.keyspace(), "scylla persistence initialized");
            (
                Arc::new(ScyllaCallRepository::new(client.session_arc(), client.keyspace())),
                Arc::new(ScyllaCallLogRepository::new(client.session_arc(), client.keyspace())),
                Arc::new(ScyllaCachedPromptRepository::new(client.session_arc(), client.keyspace())),
                Arc::new(ScyllaTurnRepository::new(client.session_arc(), client.keyspace())),
                Arc::new(ScyllaAgentRepository::new(client.session_arc(), client.keyspace())),
                Arc::new(ScyllaCampaignRepository::new(client.session_arc(), client.keyspace())),
            )
        }
        Err(error) => {
            tracing::warn!(error = %error, "failed to initialize scylla persistence, falling back to in-memory");
            (
                Arc::new(InMemoryCallRepository::default()),
                Arc::new(InMemoryCallLogRepository::default()),
                Arc::new(InMemoryCachedPromptRepository::default()),
                Arc::new(InMemoryTurnRepository::default()),
                Arc::new(InMemoryAgentRepository::default()),
                Arc::new(InMemoryCampaignRepository::default()),
            )
        }
    };

    let settings = Arc::new(settings);
    let state = AppState::new(
        settings.clone(),
        Arc::new(agents),
        cache_manager,
        hedge_selector,
        calls,
        call_logs,
        cached_prompts,
        turns,
        agent_repo,
        campaign_repo,
        metrics_handle,
    );

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn init_persistence(settings: &Settings) -> Result<ScyllaClient, voice_agent_persistence::PersistenceError> {
    let config = ScyllaConfig {
        hosts: settings.persistence.scylla_hosts.clone(),
        keyspace: settings.persistence.keyspace.clone(),
        replication_factor: settings.persistence.replication_factor as u8,
    };
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;
    Ok(client)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received sigterm, shutting down"),
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("voice_agent={},tower_http=info", settings.observability.log_filter).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
