//! Invora API Server
//!
//! Main entry point for the Invora backend service.

use std::sync::Arc;

use anyhow::Context;
use sea_orm::DatabaseConnection;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use invora_api::{AppState, create_router};
use invora_core::assistant::{AssistantService, ModelStrategy, QueryExecutor, SchemaCache};
use invora_core::mcp::{McpClient, McpQueryExecutor};
use invora_db::{DbQueryExecutor, SchemaRepository, connect_with_pool};
use invora_shared::{AppConfig, JwtService, LogFormat, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let db = connect_with_pool(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("Failed to connect to database")?;
    info!("Connected to database");

    let jwt_service = JwtService::from_settings(&config.jwt);

    let assistant = build_assistant(&config, &db).await?;

    let state = AppState {
        db: Arc::new(db),
        jwt_service: Arc::new(jwt_service),
        assistant,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Builds the data assistant, or `None` when no model is configured.
async fn build_assistant(
    config: &AppConfig,
    db: &DatabaseConnection,
) -> anyhow::Result<Option<Arc<AssistantService>>> {
    let Some(llm) = &config.llm else {
        info!("No llm section configured, data assistant disabled");
        return Ok(None);
    };

    let models = ModelStrategy::from_config(llm).context("Failed to build model clients")?;
    info!(
        provider = ?llm.provider,
        sql_model = %llm.sql_model,
        summary_model = %llm.summary_model(),
        "Model strategy configured"
    );

    let executor: Arc<dyn QueryExecutor> = if let Some(mcp) = &config.mcp {
        let client = Arc::new(McpClient::spawn(mcp).context("Failed to start MCP server")?);
        let init = client.initialize().await.context("MCP handshake failed")?;
        client
            .require_tool(&mcp.tool_name)
            .await
            .context("MCP server does not provide the query tool")?;
        info!(
            command = %mcp.command,
            tool = %mcp.tool_name,
            server = ?init.server_info.map(|s| s.name),
            "Queries run through MCP tool"
        );
        Arc::new(McpQueryExecutor::new(client, mcp.tool_name.clone()))
    } else {
        info!("Queries run through the database executor");
        Arc::new(DbQueryExecutor::new(db.clone()))
    };

    let schema = Arc::new(SchemaCache::new(
        Arc::new(SchemaRepository::new(db.clone())),
        config.assistant.exposed_tables.clone(),
    ));
    if let Err(e) = schema.refresh().await {
        warn!(error = %e, "Schema cache empty, will load on first question");
    }

    Ok(Some(Arc::new(AssistantService::new(
        models,
        schema,
        executor,
        config.assistant.clone(),
    ))))
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown..."),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
