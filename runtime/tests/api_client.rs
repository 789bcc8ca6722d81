use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use axum::{
    Json, Router,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use ownership_runtime::{
    api::{ApiClient, ErrorKind, GraphApi, GraphQuery},
    config::AppConfig,
};
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Captured {
    queries: Arc<Mutex<Vec<String>>>,
    hits: Arc<AtomicUsize>,
}

impl Captured {
    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve(app: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn client(base: &str) -> anyhow::Result<ApiClient> {
    let mut config = AppConfig::default();
    config.api.base_url = base.to_string();
    config.api.retry_delay_ms = 1;
    ApiClient::from_config(&config)
}

async fn empty_graph(
    State(captured): State<Captured>,
    RawQuery(query): RawQuery,
) -> Json<serde_json::Value> {
    captured.hits.fetch_add(1, Ordering::SeqCst);
    captured
        .queries
        .lock()
        .unwrap()
        .push(query.unwrap_or_default());
    Json(json!({"nodes": [], "edges": []}))
}

#[tokio::test]
async fn duplicate_labels_are_sent_once() -> anyhow::Result<()> {
    let captured = Captured::default();
    let app = Router::new()
        .route("/api/graph", get(empty_graph))
        .with_state(captured.clone());
    let api = client(&serve(app).await?)?;

    let labels = ["Company", "Stockholder", "Company", "Stockholder"]
        .into_iter()
        .map(String::from)
        .collect();
    api.get_graph(&GraphQuery::new(20).with_labels(Some(labels)).with_node_cap(20))
        .await?;

    let query = &captured.queries()[0];
    assert_eq!(query.matches("node_labels=Company").count(), 1);
    assert_eq!(query.matches("node_labels=Stockholder").count(), 1);
    assert!(query.contains("node_cap=20"));
    assert!(query.contains("relationship_types=HOLDS_SHARES"));
    assert!(query.contains("relationship_types=HAS_COMPENSATION"));
    Ok(())
}

#[tokio::test]
async fn slow_responses_time_out() -> anyhow::Result<()> {
    let app = Router::new().route(
        "/api/graph",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"nodes": [], "edges": []}))
        }),
    );
    let api = client(&serve(app).await?)?;

    let started = Instant::now();
    let err = api
        .get_graph(&GraphQuery::new(10).with_timeout(Duration::from_millis(100)))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(1));
    Ok(())
}

#[tokio::test]
async fn refused_connection_is_a_network_error() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    let api = client(&format!("http://{addr}"))?;

    let err = api.health_check().await.unwrap_err();
    assert!(err.is_network_error());
    assert!(!err.is_timeout());
    Ok(())
}

#[tokio::test]
async fn degraded_store_surfaces_status_sub_code() -> anyhow::Result<()> {
    let app = Router::new().route(
        "/health",
        get(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"detail": {"status": "auth_failed", "message": "authentication failed"}})),
            )
        }),
    );
    let api = client(&serve(app).await?)?;

    let err = api.health_check().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(err.status(), Some("auth_failed"));
    assert_eq!(err.detail(), Some("authentication failed"));
    Ok(())
}

#[tokio::test]
async fn healthy_payload_is_returned_unmodified() -> anyhow::Result<()> {
    let app = Router::new().route(
        "/health",
        get(|| async { Json(json!({"status": "healthy", "neo4j": "disconnected"})) }),
    );
    let api = client(&serve(app).await?)?;

    let health = api.health_check().await?;
    assert_eq!(health.backing_store.as_deref(), Some("disconnected"));
    assert!(!health.is_healthy());
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() -> anyhow::Result<()> {
    let app = Router::new().route("/api/statistics", get(|| async { "not json" }));
    let api = client(&serve(app).await?)?;

    let err = api.get_statistics().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    Ok(())
}

#[tokio::test]
async fn search_retries_server_errors() -> anyhow::Result<()> {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/api/graph/search",
            get(|State(captured): State<Captured>, RawQuery(query): RawQuery| async move {
                let attempt = captured.hits.fetch_add(1, Ordering::SeqCst);
                captured
                    .queries
                    .lock()
                    .unwrap()
                    .push(query.unwrap_or_default());
                if attempt < 2 {
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                } else {
                    Json(json!({"nodes": [{"id": "c1", "label": "Company"}], "edges": []}))
                        .into_response()
                }
            }),
        )
        .with_state(captured.clone());
    let api = client(&serve(app).await?)?;

    let graph = api.search("acme", 5, None).await?;
    assert_eq!(graph.nodes.len(), 1);
    assert_eq!(captured.hits(), 3);
    let query = &captured.queries()[0];
    assert!(query.contains("search=acme"));
    assert!(query.contains("search_properties=bizno"));
    Ok(())
}

#[tokio::test]
async fn load_calls_are_not_retried() -> anyhow::Result<()> {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/api/graph/analysis",
            get(|State(captured): State<Captured>| async move {
                captured.hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "boom"})))
            }),
        )
        .with_state(captured.clone());
    let api = client(&serve(app).await?)?;

    let err = api
        .get_graph_with_analysis(&GraphQuery::new(50))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some("http_500"));
    assert_eq!(captured.hits(), 1);
    Ok(())
}

#[tokio::test]
async fn node_detail_encodes_id_and_forwards_id_property() -> anyhow::Result<()> {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/api/node/{id}",
            get(
                |State(captured): State<Captured>, Path(id): Path<String>, RawQuery(query): RawQuery| async move {
                    captured
                        .queries
                        .lock()
                        .unwrap()
                        .push(format!("{id}?{}", query.unwrap_or_default()));
                    Json(json!({
                        "node": {"id": id},
                        "relationships": [],
                        "maxStockRatioFromRels": 8.51,
                        "shareholder_count": 4
                    }))
                },
            ),
        )
        .with_state(captured.clone());
    let api = client(&serve(app).await?)?;

    let detail = api.get_node_detail("123 45", Some("bizno")).await?;
    assert_eq!(detail.max_stock_ratio_from_rels, Some(8.51));
    assert_eq!(detail.shareholder_count, Some(4));
    assert_eq!(captured.queries(), vec!["123 45?id_property=bizno".to_string()]);
    Ok(())
}

#[tokio::test]
async fn chat_reset_failures_are_swallowed() -> anyhow::Result<()> {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/api/chat/reset",
            post(|State(captured): State<Captured>| async move {
                captured.hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::INTERNAL_SERVER_ERROR
            }),
        )
        .with_state(captured.clone());
    let api = client(&serve(app).await?)?;

    api.reset_chat_history().await;
    assert_eq!(captured.hits(), 1);
    Ok(())
}

#[tokio::test]
async fn chat_sends_message_and_context() -> anyhow::Result<()> {
    let app = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<serde_json::Value>| async move {
            Json(json!({
                "response": format!("{} / {}", body["message"], body["context"]["id"]),
                "graph_data": null
            }))
        }),
    );
    let api = client(&serve(app).await?)?;

    let reply = api
        .send_chat_message("who owns c1?", Some(&json!({"id": "c1"})))
        .await?;
    assert_eq!(reply.response, "\"who owns c1?\" / \"c1\"");
    assert!(reply.graph_data.is_none());
    Ok(())
}
