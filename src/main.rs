use ragbot::agent::HttpAgentClient;
use ragbot::config::Config;
use ragbot::dedupe::{Deduplicator, ProcessStart};
use ragbot::dispatch::Dispatcher;
use ragbot::handlers::{CommandHandler, MessageHandler};
use ragbot::server::{router, AppState};
use ragbot::signature::SignatureVerifier;
use ragbot::slack::SlackWebClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Events queued before this instant are treated as stale
    let started = ProcessStart::now();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragbot=info,tower_http=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.agent.knowledge_base_id.is_none() {
        info!("AWS_BEDROCK_KNOWLEDGE_BASE_ID not set - knowledge base commands will report it");
    }

    // Initialize clients
    let slack = Arc::new(SlackWebClient::new(config.bot_token.clone()));
    let agent = match HttpAgentClient::new(
        config.agent_api_url.clone(),
        config.agent_api_token.clone(),
        config.agent.clone(),
        config.agent_timeout,
    ) {
        Ok(agent) => Arc::new(agent),
        Err(e) => {
            error!("Failed to build agent client: {}", e);
            std::process::exit(1);
        }
    };
    let verifier = match SignatureVerifier::new(&config.signing_secret, config.signature_max_skew) {
        Ok(verifier) => verifier,
        Err(e) => {
            error!("Invalid signing secret: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState {
        verifier: Arc::new(verifier),
        dedupe: Arc::new(Deduplicator::new(config.dedupe_window, started)),
        dispatcher: Dispatcher::new(config.max_in_flight_handlers),
        messages: Arc::new(MessageHandler::new(
            slack.clone(),
            agent.clone(),
            config.bot_name.clone(),
            config.agent_timeout,
        )),
        commands: Arc::new(CommandHandler::new(
            slack,
            agent,
            config.agent_timeout,
            config.sync_monitor,
        )),
        bot_name: Arc::from(config.bot_name.as_str()),
    };

    // Sweep expired dedupe entries so idle ids do not pile up
    let dedupe_cleanup = state.dedupe.clone();
    tokio::spawn(async move {
        let period = dedupe_cleanup.window().max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = dedupe_cleanup.purge_expired();
            if purged > 0 {
                info!(purged, remaining = dedupe_cleanup.tracked(), "purged dedupe entries");
            }
        }
    });

    let app = router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!(
        max_in_flight = config.max_in_flight_handlers,
        dedupe_window_secs = config.dedupe_window.as_secs(),
        "⚡️ RagBot is running on {}",
        addr
    );
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
