//! HTTP front of the choreographer proxy

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use super::client::CompletionClient;
use super::config::ProxyConfig;
use super::error::ProxyError;

pub const ROUTE: &str = "/api/choreographer";

#[derive(Debug, Serialize, Deserialize)]
pub struct InstructionBody {
    pub instruction: String,
}

async fn choreographer(
    State(client): State<CompletionClient>,
) -> Result<Json<InstructionBody>, ProxyError> {
    let instruction = client.instruction().await.inspect_err(|e| {
        log::warn!("Choreographer request failed: {}", e);
    })?;
    Ok(Json(InstructionBody { instruction }))
}

pub fn router(client: CompletionClient) -> Router {
    Router::new()
        .route(ROUTE, post(choreographer))
        .with_state(client)
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve_on(
    listener: TcpListener,
    config: ProxyConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ProxyError> {
    let client = CompletionClient::new(config)?;
    axum::serve(listener, router(client))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `config.bind` and serve until Ctrl-C
pub async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    let listener = TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;
    log::info!("Choreographer proxy listening on http://{}{}", addr, ROUTE);
    serve_on(listener, config, async {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("Shutting down");
    })
    .await
}
