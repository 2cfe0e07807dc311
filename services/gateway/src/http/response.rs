use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_protocol::{error_codes, HttpErrorEnvelope};

pub type HttpResponse = Response;
pub type HttpResult<T = ()> = Result<T, HttpResponse>;

pub(crate) fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> HttpResponse {
    (
        status,
        Json(HttpErrorEnvelope {
            code: code.into(),
            message: message.into(),
            details: None,
        }),
    )
        .into_response()
}

pub fn internal_error(err: impl Display) -> HttpResponse {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        error_codes::INTERNAL_ERROR,
        err.to_string(),
    )
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::BAD_REQUEST, error_codes::BAD_REQUEST, message)
}

pub fn unauthorized(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::UNAUTHORIZED, error_codes::UNAUTHORIZED, message)
}

pub fn too_many_requests(message: impl Into<String>) -> HttpResponse {
    json_error(
        StatusCode::TOO_MANY_REQUESTS,
        error_codes::RATE_LIMITED,
        message,
    )
}

pub fn service_unavailable(message: impl Into<String>) -> HttpResponse {
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        error_codes::BACKEND_BUSY,
        message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn assert_error_response(
        response: Response,
        expected_status: StatusCode,
        expected_code: &str,
        expected_message: &str,
    ) {
        assert_eq!(response.status(), expected_status);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should be readable");
        let parsed: HttpErrorEnvelope =
            serde_json::from_slice(&body).expect("response body should be valid error json");

        assert_eq!(parsed.code, expected_code);
        assert_eq!(parsed.message, expected_message);
        assert_eq!(parsed.details, None);
    }

    #[tokio::test]
    async fn internal_error_sets_internal_contract() {
        let response = internal_error("database unavailable");
        assert_error_response(
            response,
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            "database unavailable",
        )
        .await;
    }

    #[tokio::test]
    async fn bad_request_sets_bad_request_contract() {
        let response = bad_request("prompt must not be empty");
        assert_error_response(
            response,
            StatusCode::BAD_REQUEST,
            error_codes::BAD_REQUEST,
            "prompt must not be empty",
        )
        .await;
    }

    #[tokio::test]
    async fn unauthorized_sets_unauthorized_contract() {
        let response = unauthorized("missing bearer token");
        assert_error_response(
            response,
            StatusCode::UNAUTHORIZED,
            error_codes::UNAUTHORIZED,
            "missing bearer token",
        )
        .await;
    }

    #[tokio::test]
    async fn too_many_requests_sets_rate_limited_contract() {
        let response = too_many_requests("rate limit exceeded");
        assert_error_response(
            response,
            StatusCode::TOO_MANY_REQUESTS,
            error_codes::RATE_LIMITED,
            "rate limit exceeded",
        )
        .await;
    }

    #[tokio::test]
    async fn service_unavailable_sets_backend_busy_contract() {
        let response = service_unavailable("Server is busy, please try again.");
        assert_error_response(
            response,
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::BACKEND_BUSY,
            "Server is busy, please try again.",
        )
        .await;
    }
}
