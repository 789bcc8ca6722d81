use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ownership_runtime::{
    api::{ApiClient, GraphApi},
    config::load_config,
    pipeline::{LoadOutcome, LoadPipeline},
    render::{HeadlessRenderer, RenderFacade},
    session::{SelectionOutcome, Session},
    store::{Store, WILDCARD},
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "Runtime crashed");
        eprintln!("Runtime crashed: {err:#}");
    }
}

async fn run() -> Result<()> {
    init_tracing();
    if let Err(err) = dotenv() {
        debug!(error = %err, "No .env file loaded");
    }

    let config = Arc::new(
        load_config()
            .await
            .context("Failed to load application configuration")?,
    );
    info!(base_url = %config.api.base_url, "Loaded configuration");

    let api: Arc<dyn GraphApi> = Arc::new(ApiClient::from_config(&config)?);
    let store = Store::new();
    let renderer: Arc<dyn RenderFacade> = Arc::new(HeadlessRenderer::new());
    let pipeline = Arc::new(LoadPipeline::new(
        api.clone(),
        store.clone(),
        renderer.clone(),
        &config,
    ));
    let session = Session::new(api, renderer, pipeline, config.clone());

    let _trace = store.subscribe(WILDCARD, |_, changed| {
        debug!(path = changed, "store updated");
        Ok(())
    });

    tokio::select! {
        outcome = session.load() => report(&session, outcome).await,
        _ = shutdown_signal() => return Ok(()),
    }

    shutdown_signal().await;
    Ok(())
}

async fn report(session: &Session, outcome: LoadOutcome) {
    match outcome {
        LoadOutcome::Ready {
            nodes,
            edges,
            suggested_focus,
            degraded,
            ..
        } => {
            info!(nodes, edges, degraded, "Graph ready");
            let Some(id) = suggested_focus else {
                info!("No focus node suggested");
                return;
            };
            info!(node = %id, "Suggested focus node");
            match session.select_node(&id).await {
                SelectionOutcome::Applied => {
                    let panel = session.node_panel(&id);
                    info!(
                        node = %id,
                        connections = panel.stats.connection_count,
                        max_stock_ratio = %panel.stats.max_stock_ratio,
                        shareholders = %panel.stats.shareholder_count,
                        "Focus node detail"
                    );
                }
                SelectionOutcome::Stale => debug!(node = %id, "Focus selection superseded"),
                SelectionOutcome::Failed(kind) => {
                    warn!(node = %id, kind = kind.as_str(), "Focus node detail unavailable")
                }
            }
        }
        LoadOutcome::Failed { kind, message, .. } => {
            error!(kind = kind.as_str(), %message, "Graph load failed");
        }
        LoadOutcome::Superseded { generation } => {
            debug!(generation, "Graph load superseded");
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                if stream.recv().await.is_some() {
                    info!("Received SIGTERM");
                }
            }
            Err(err) => warn!(error = %err, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received termination signal (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received termination signal (SIGTERM)");
        }
    }
}
