// GET /v1/completions (WebSocket): one socket handles many requests in
// sequence. Auth is a query-string token checked against a fixed secret
// (not the per-request bearer/DB token the HTTP path uses), then each text
// frame received is run through the same admission/cache/dispatch/stream
// flow as `http::admission::completions`, framed as WebSocket text messages
// instead of HTTP request/response. Mirrors `ws_receiver.rs`'s
// upgrade-then-loop shape and `ws_common.rs`'s shared send/recv helpers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::{IntoResponse, Response};
use gateway_bus::RequestProducer;
use gateway_cache::{fingerprint, ResponseCache};
use gateway_protocol::{Choice, CompletionChunk, CompletionRequest, ErrorChunk, WorkItem};
use uuid::Uuid;

use crate::http::admission::BUSY_MESSAGE;
use crate::inference_log;
use crate::state::AppState;
use crate::stream::{StreamLoop, StreamStep};
use crate::waiters::WaiterGuard;

pub async fn completions_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let token = params.get("token").cloned().unwrap_or_default();
    ws.on_upgrade(move |socket| handle_socket(socket, state, remote_addr, token))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, remote_addr: SocketAddr, token: String) {
    if token != state.websocket_secret_key.as_ref() {
        close_with(&mut socket, 1008, "invalid token").await;
        return;
    }

    loop {
        match recv_with_timeout(&mut socket, state.response_timeout).await {
            RecvOutcome::Text(text) => {
                if !handle_one_request(&mut socket, &state, &remote_addr, &text).await {
                    return;
                }
            }
            RecvOutcome::Timeout => {
                close_with(&mut socket, 1008, "idle timeout").await;
                return;
            }
            RecvOutcome::Disconnected => return,
        }
    }
}

enum RecvOutcome {
    Text(String),
    Timeout,
    Disconnected,
}

async fn recv_with_timeout(socket: &mut WebSocket, timeout: Duration) -> RecvOutcome {
    match tokio::time::timeout(timeout, socket.recv()).await {
        Ok(Some(Ok(Message::Text(text)))) => RecvOutcome::Text(text.to_string()),
        Ok(Some(Ok(_))) => RecvOutcome::Disconnected,
        Ok(Some(Err(_)) | None) => RecvOutcome::Disconnected,
        Err(_) => RecvOutcome::Timeout,
    }
}

async fn close_with(socket: &mut WebSocket, code: u16, reason: &str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_owned().into(),
        })))
        .await;
}

async fn send_json(socket: &mut WebSocket, value: &impl serde::Serialize) {
    if let Ok(json) = serde_json::to_string(value) {
        let _ = socket.send(Message::Text(json.into())).await;
    }
}

/// Handles exactly one client message, then returns whether `handle_socket`
/// should keep waiting for the next one. A schema error (malformed JSON or a
/// failed `validate()`) closes the socket with 1008, same as the auth check
/// above -- only the rate-limit, duplicate-id, and publish-failure cases are
/// reported as an inline JSON error frame with the connection left open.
/// Every request, regardless of its `stream` field, is framed as a sequence
/// of chunk frames followed by the literal text frame `[DONE]`.
async fn handle_one_request(
    socket: &mut WebSocket,
    state: &AppState,
    remote_addr: &SocketAddr,
    raw: &str,
) -> bool {
    let req: CompletionRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => {
            close_with(socket, 1008, &e.to_string()).await;
            return false;
        }
    };

    if !state.rate_limiter.check(&remote_addr.ip().to_string()).await {
        send_json(
            socket,
            &ErrorChunk::new(String::new(), "rate limit exceeded"),
        )
        .await;
        return true;
    }
    if let Err(e) = req.validate() {
        close_with(socket, 1008, &e.to_string()).await;
        return false;
    }

    let request_id = req
        .request_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let fp = fingerprint(&req.prompt, &req.model, req.max_tokens, req.temperature);

    if let Some(cached) = state.cache.lookup(&fp).await {
        send_cached(socket, &request_id, &req, cached.text).await;
        return true;
    }

    let rx = match state.waiters.register(&request_id).await {
        Ok(rx) => rx,
        Err(_) => {
            send_json(socket, &ErrorChunk::new(request_id, "duplicate request id")).await;
            return true;
        }
    };

    let item = WorkItem::from_request(request_id.clone(), &req);
    if let Err(e) = state.request_producer.publish(&item).await {
        state.waiters.unregister(&request_id).await;
        tracing::warn!(request_id = %request_id, error = %e, "failed to enqueue work item");
        send_json(socket, &ErrorChunk::new(request_id, BUSY_MESSAGE)).await;
        return true;
    }

    let _guard = WaiterGuard::new(state.waiters.clone(), request_id.clone());
    let mut wait = StreamLoop::new(rx, state.response_timeout);

    loop {
        match wait.next().await {
            StreamStep::Chunk(data) => {
                let chunk = CompletionChunk::new(request_id.clone(), req.model.clone(), data.choices);
                send_json(socket, &chunk).await;
            }
            StreamStep::Done | StreamStep::TimedOut => break,
        }
    }
    if wait.full.is_empty() {
        send_json(socket, &ErrorChunk::new(request_id.clone(), BUSY_MESSAGE)).await;
    } else {
        persist(state, &request_id, &req, &wait.full).await;
    }
    let _ = socket.send(Message::Text("[DONE]".into())).await;
    true
}

async fn persist(state: &AppState, request_id: &str, req: &CompletionRequest, full: &str) {
    let fp = fingerprint(&req.prompt, &req.model, req.max_tokens, req.temperature);
    state.cache.store(&fp, full, request_id).await;
    inference_log::record(
        &state.pool,
        request_id,
        &req.prompt,
        full,
        &req.model,
        req.temperature,
        req.max_tokens,
    )
    .await;
}

async fn send_cached(socket: &mut WebSocket, request_id: &str, req: &CompletionRequest, text: String) {
    let chunk = CompletionChunk::new(
        request_id.to_owned(),
        req.model.clone(),
        vec![Choice {
            text,
            index: 0,
            finish_reason: Some("stop".to_owned()),
        }],
    );
    send_json(socket, &chunk).await;
    let _ = socket.send(Message::Text("[DONE]".into())).await;
}
