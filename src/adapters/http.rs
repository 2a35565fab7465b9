//! Plain HTTP surface: `GET /?action=<state|open|close>&token=<token>`.
//!
//! Every request is answered with 200 and one literal from the closed reply
//! set; clients parse the body, never the status code.

use crate::core::dispatch::Dispatcher;
use crate::domain::model::{Reply, RequestContext};
use crate::utils::error::{Result, SphincterError};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(handle))
        .with_state(AppState { dispatcher })
}

async fn handle(
    State(state): State<AppState>,
    query: std::result::Result<Query<RequestContext>, QueryRejection>,
) -> impl IntoResponse {
    let ctx = match query {
        Ok(Query(ctx)) => ctx,
        Err(e) => {
            tracing::debug!("Malformed query string: {}", e);
            RequestContext::default()
        }
    };

    let dispatcher = Arc::clone(&state.dispatcher);
    let reply = tokio::task::spawn_blocking(move || dispatcher.dispatch(&ctx))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Request handler failed: {}", e);
            Reply::Failed
        });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        reply.as_str(),
    )
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| SphincterError::Server {
            message: format!("failed to bind {}: {}", addr, e),
        })
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on {}", addr);
    }

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SphincterError::Server {
            message: e.to_string(),
        })
}
