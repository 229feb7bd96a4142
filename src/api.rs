use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::analyzer;
use crate::config::Config;
use crate::export;

pub async fn serve(cfg: Config) -> eyre::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(cfg);
    let port = state.port;

    let app = Router::new()
        .route("/", get(|| async { "Bitcoin Flow Analyzer API running" }))
        .route("/api/bubble_map/:address", get(bubble_map))
        .route("/api/analysis/:address", get(analysis))
        .route("/api/reports", get(reports))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// GET /api/bubble_map/{address}
/// Runs a fresh analysis and returns the bubble and network projections
async fn bubble_map(
    State(cfg): State<Arc<Config>>,
    Path(address): Path<String>,
) -> Json<serde_json::Value> {
    match analyzer::run_analysis(&cfg, &address).await {
        Ok(a) => Json(json!({
            "success": true,
            "bubble": a.bubble_map,
            "network": a.report.network_graph,
        })),
        Err(e) => {
            warn!("Bubble map analysis failed for {}: {}", address, e);
            Json(json!({ "success": false, "error": e.to_string() }))
        }
    }
}

/// GET /api/analysis/{address}
/// Full report JSON, same shape as the persisted file
async fn analysis(
    State(cfg): State<Arc<Config>>,
    Path(address): Path<String>,
) -> Json<serde_json::Value> {
    match analyzer::run_analysis(&cfg, &address).await {
        Ok(a) => Json(json!({ "success": true, "report": a.report })),
        Err(e) => {
            warn!("Analysis failed for {}: {}", address, e);
            Json(json!({ "success": false, "error": e.to_string() }))
        }
    }
}

/// GET /api/reports
/// Lists previously exported bitcoin_analysis_*.json files
async fn reports(State(cfg): State<Arc<Config>>) -> Json<serde_json::Value> {
    match export::list_reports(&cfg.output_dir) {
        Ok(files) => Json(json!({ "files": files })),
        Err(e) => Json(json!({ "files": [], "error": e.to_string() })),
    }
}
