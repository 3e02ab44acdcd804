use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use super::recorder::ObservedRequest;
use crate::analytics::extract_client_ip;
use crate::state::AppState;

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Record every non-exempt request once its response has been produced.
///
/// Nothing here can change the response: enrichment and storage problems
/// are logged and dropped.
pub async fn instrument(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.exemptions.is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let user_agent = header_text(request.headers(), header::USER_AGENT);
    let referrer = header_text(request.headers(), header::REFERER);
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = extract_client_ip(request.headers(), peer, &state.client_ip);

    let response = next.run(request).await;

    let observed = ObservedRequest {
        method,
        uri,
        status: response.status().as_u16(),
        user_agent,
        referrer,
        client_ip,
        completed_at: Utc::now(),
    };

    // Spawned so a dropped connection cannot abandon the append half-way
    let recorder = state.recorder.clone();
    if let Err(err) = tokio::spawn(async move { recorder.record(observed).await }).await {
        error!(error = %err, "request recording task failed");
    }

    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request instrumented"
    );

    response
}
