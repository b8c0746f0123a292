mod config;

use std::sync::Arc;

use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use forge_api::AppStateInner;
use forge_api::auth::JwtVerifier;
use forge_db::{Database, Store};
use forge_worker::{LogPublisher, PostDispatcher};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "socialforge=info,forge_api=info,forge_worker=info,forge_db=info,tower_http=info"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init store
    let db = Database::open(&config.db_path)?;
    let store: Arc<dyn Store> = Arc::new(db);

    let shutdown = CancellationToken::new();

    // Background dispatcher
    let dispatcher =
        PostDispatcher::new(store.clone(), Arc::new(LogPublisher), config.dispatch_interval)
            .with_failure_policy(config.failure_policy);
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown.clone()));

    let state = Arc::new(AppStateInner {
        store,
        verifier: Arc::new(JwtVerifier::new(
            &config.jwt_secret,
            config.jwt_issuer.as_deref(),
            config.jwt_audience.as_deref(),
        )),
        admin_subjects: config.admin_subjects.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = forge_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("SocialForge listening on {}", config.addr);
    if !config.admin_subjects.is_empty() {
        info!("{} bootstrap admin subject(s) configured", config.admin_subjects.len());
    }

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.cancel();
        })
        .await?;

    // The dispatcher finishes its current tick before exiting.
    shutdown.cancel();
    dispatcher_task.await?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
