mod api;
mod middleware;
mod pipeline;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use adlens_analytics::PipelineRecorder;
use adlens_source::AdsClient;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = adlens_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = adlens_db::PoolConfig::from_app_config(&config);
    let pool = adlens_db::connect_pool(&config.database_url, pool_config).await?;
    adlens_db::run_migrations(&pool).await?;

    let source = match config.ads_access_token.as_deref() {
        Some(token) => Some(AdsClient::with_base_url(
            token,
            config.ads_request_timeout_secs,
            config.ads_max_retries,
            config.ads_retry_backoff_base_ms,
            &config.ads_api_base_url,
        )?),
        None => {
            tracing::warn!("ADS_ACCESS_TOKEN is not set; collection endpoints are disabled");
            None
        }
    };

    let recorder = Arc::new(PipelineRecorder::new(config.recorder_capacity));
    let state = AppState::new(
        pool,
        source,
        recorder,
        Duration::from_millis(config.refresh_delay_ms),
    );

    let _scheduler = scheduler::build_scheduler(state.clone()).await?;

    let auth = AuthState::from_env(matches!(config.env, adlens_core::Environment::Development))?;
    let app = build_app(state, auth, default_rate_limit_state());

    tracing::info!(bind_addr = %config.bind_addr, env = %config.env, "adlens server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
