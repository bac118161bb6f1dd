mod api;
mod middleware;
mod notify;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    notify::{Notifier, TracingNotifier, WebhookNotifier},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = partquote_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = partquote_db::PoolConfig::from_app_config(&config);
    let pool = partquote_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = partquote_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(TracingNotifier),
    };

    let auth = AuthState::from_env(matches!(
        config.env,
        partquote_core::Environment::Development
    ))?;
    let state = AppState {
        pool,
        notifier,
        vat_rate: config.vat_rate,
    };
    let app = build_app(state, &auth, default_rate_limit_state());

    tracing::info!(
        addr = %config.bind_addr,
        env = %config.env,
        vat_rate = %config.vat_rate,
        "partquote-server listening"
    );
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
