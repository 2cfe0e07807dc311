// POST /v1/completions: the same admission/cache/dispatch/stream flow as
// `ws.rs`'s per-message handling, just framed as one request/response
// instead of a long-lived socket. Mirrors the shape of `races.rs`'s handlers
// (auth/validate/repo-call/respond) generalized with a cache lookup and a
// background-dispatched wait instead of a single repo query.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_bus::RequestProducer;
use gateway_cache::{fingerprint, ResponseCache};
use gateway_protocol::{
    Choice, CompletionChunk, CompletionRequest, CompletionResponse, ErrorChunk, ResponseFrame,
    WorkItem,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::response::{bad_request, internal_error, service_unavailable, too_many_requests, unauthorized};
use crate::auth::{extract_bearer, validate_token};
use crate::inference_log;
use crate::state::AppState;
use crate::stream::{StreamLoop, StreamStep};
use crate::waiters::WaiterGuard;

/// Fixed message for both the streaming error chunk and the non-streaming
/// 503, regardless of whether the cause was a timeout, a breaker trip, or a
/// backend error -- matches the original service's uniform busy message.
pub const BUSY_MESSAGE: &str = "Server is busy, please try again.";
const SSE_KEEPALIVE: Duration = Duration::from_secs(15);

pub async fn completions(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<CompletionRequest>,
) -> Response {
    if let Err(resp) = authenticate(&state, &headers).await {
        return resp;
    }
    if !state.rate_limiter.check(&remote_addr.ip().to_string()).await {
        return too_many_requests("rate limit exceeded").into_response();
    }
    if let Err(e) = req.validate() {
        return bad_request(e.to_string()).into_response();
    }

    let request_id = req
        .request_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let fp = fingerprint(&req.prompt, &req.model, req.max_tokens, req.temperature);

    if let Some(cached) = state.cache.lookup(&fp).await {
        return respond_cached(&request_id, &req, cached.text);
    }

    let rx = match state.waiters.register(&request_id).await {
        Ok(rx) => rx,
        Err(_) => return internal_error("duplicate request id").into_response(),
    };

    let item = WorkItem::from_request(request_id.clone(), &req);
    if let Err(e) = state.request_producer.publish(&item).await {
        state.waiters.unregister(&request_id).await;
        tracing::warn!(request_id = %request_id, error = %e, "failed to enqueue work item");
        return service_unavailable(BUSY_MESSAGE).into_response();
    }

    if req.stream {
        stream_response(state, request_id, req, rx).into_response()
    } else {
        non_stream_response(state, request_id, req, rx).await
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer);
    let token = match token {
        Some(t) => t,
        None => return Err(unauthorized("missing bearer token").into_response()),
    };
    if validate_token(&state.pool, token).await {
        Ok(())
    } else {
        Err(unauthorized("invalid api token").into_response())
    }
}

fn respond_cached(request_id: &str, req: &CompletionRequest, text: String) -> Response {
    if req.stream {
        let chunk = CompletionChunk::new(
            request_id.to_owned(),
            req.model.clone(),
            vec![Choice {
                text,
                index: 0,
                finish_reason: Some("stop".to_owned()),
            }],
        );
        let chunk_json = serde_json::to_string(&chunk).unwrap_or_default();
        let events: Vec<Result<Event, Infallible>> = vec![
            Ok(Event::default().data(chunk_json)),
            Ok(Event::default().data("[DONE]")),
        ];
        Sse::new(tokio_stream::iter(events))
            .keep_alive(KeepAlive::new().interval(SSE_KEEPALIVE).text("keepalive"))
            .into_response()
    } else {
        Json(CompletionResponse::new(
            request_id.to_owned(),
            req.model.clone(),
            text,
        ))
        .into_response()
    }
}

/// Genuinely incremental SSE: each chunk is yielded as soon as the dispatcher
/// delivers it, not buffered until the backend finishes. Persistence (cache
/// store, inference log) happens after the wait loop ends, inside the same
/// generator, so it still runs exactly once per completed request.
fn stream_response(
    state: AppState,
    request_id: String,
    req: CompletionRequest,
    rx: mpsc::Receiver<ResponseFrame>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    let timeout = state.response_timeout;
    let stream = async_stream::stream! {
        let _guard = WaiterGuard::new(state.waiters.clone(), request_id.clone());
        let mut wait = StreamLoop::new(rx, timeout);

        loop {
            match wait.next().await {
                StreamStep::Chunk(data) => {
                    let chunk = CompletionChunk::new(request_id.clone(), req.model.clone(), data.choices);
                    if let Ok(json) = serde_json::to_string(&chunk) {
                        yield Ok(Event::default().data(json));
                    }
                }
                StreamStep::Done | StreamStep::TimedOut => break,
            }
        }

        if wait.full.is_empty() {
            let error_chunk = ErrorChunk::new(request_id.clone(), BUSY_MESSAGE);
            if let Ok(json) = serde_json::to_string(&error_chunk) {
                yield Ok(Event::default().data(json));
            }
        } else {
            let fp = fingerprint(&req.prompt, &req.model, req.max_tokens, req.temperature);
            state.cache.store(&fp, &wait.full, &request_id).await;
            inference_log::record(
                &state.pool,
                &request_id,
                &req.prompt,
                &wait.full,
                &req.model,
                req.temperature,
                req.max_tokens,
            )
            .await;
        }

        yield Ok(Event::default().data("[DONE]"));
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEPALIVE).text("keepalive"))
}

/// Non-streaming completion: drains the same wait loop, then applies the
/// distinct empty-response rule for this path -- zero chunks received (not
/// "assembled text is empty") triggers the 503.
async fn non_stream_response(
    state: AppState,
    request_id: String,
    req: CompletionRequest,
    rx: mpsc::Receiver<ResponseFrame>,
) -> Response {
    let _guard = WaiterGuard::new(state.waiters.clone(), request_id.clone());
    let mut wait = StreamLoop::new(rx, state.response_timeout);
    loop {
        match wait.next().await {
            StreamStep::Chunk(_) => {}
            StreamStep::Done | StreamStep::TimedOut => break,
        }
    }

    if wait.chunks_received == 0 {
        return service_unavailable(BUSY_MESSAGE).into_response();
    }

    if !wait.full.is_empty() {
        let fp = fingerprint(&req.prompt, &req.model, req.max_tokens, req.temperature);
        state.cache.store(&fp, &wait.full, &request_id).await;
        inference_log::record(
            &state.pool,
            &request_id,
            &req.prompt,
            &wait.full,
            &req.model,
            req.temperature,
            req.max_tokens,
        )
        .await;
    }

    Json(CompletionResponse::new(request_id, req.model, wait.full)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_message_matches_the_original_services_literal_text() {
        assert_eq!(BUSY_MESSAGE, "Server is busy, please try again.");
    }

    #[test]
    fn respond_cached_streaming_emits_chunk_then_done() {
        let req = CompletionRequest {
            request_id: None,
            model: "m1".to_owned(),
            prompt: "hi".to_owned(),
            max_tokens: 4,
            temperature: 0.0,
            stream: true,
        };
        // Only asserting this builds and returns a response; body framing is
        // exercised in the integration tests against a running router.
        let _ = respond_cached("req-1", &req, "cached text".to_owned());
    }
}
