mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use lostfound_api::auth::{AppState, AppStateInner};
use lostfound_api::routes::router;
use lostfound_matching::sweep::run_rematch_loop;
use lostfound_matching::{EmbeddingProvider, Evaluator, HashingEmbedder, HttpEmbedder, MatchConfig};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lostfound=debug,lostfound_matching=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set LOSTFOUND_JWT_SECRET in your .env file and restart.");
            std::process::exit(1);
        }
    };
    let match_config = MatchConfig::from_env()?;

    // Init database
    let db = Arc::new(lostfound_db::Database::open(&config.db_path)?);

    let provider: Arc<dyn EmbeddingProvider> = match &config.embedding_url {
        Some(url) => {
            info!("Using embedding service at {}", url);
            Arc::new(HttpEmbedder::new(
                url.clone(),
                match_config.embedding_dim,
                match_config.embed_timeout,
            )?)
        }
        None => {
            info!("Using local hashing embedder ({} dims)", match_config.embedding_dim);
            Arc::new(HashingEmbedder::new(match_config.embedding_dim))
        }
    };

    info!(
        "Matching: threshold {}, max {} results, weights {:?}",
        match_config.threshold, match_config.max_results, match_config.weights
    );
    let evaluator = Arc::new(Evaluator::new(db.clone(), provider, match_config)?);

    // Background rematch sweep
    if config.rematch_interval_secs > 0 {
        tokio::spawn(run_rematch_loop(evaluator.clone(), config.rematch_interval_secs));
        info!("Rematch sweep every {} seconds", config.rematch_interval_secs);
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        evaluator,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: chrono::Duration::days(config.token_ttl_days),
    });

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Lost & found server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
                tracing::warn!("SIGTERM handler unavailable: {}", e);
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
