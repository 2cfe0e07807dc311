// Bearer-token auth against `api_tokens`. Tokens are opaque strings, compared
// verbatim rather than hashed.

use sqlx::PgPool;

pub async fn validate_token(pool: &PgPool, raw_token: &str) -> bool {
    sqlx::query_scalar::<_, i64>("SELECT 1 FROM api_tokens WHERE token = $1")
        .bind(raw_token)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .is_some()
}

pub fn extract_bearer(authorization: &str) -> Option<&str> {
    authorization.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_requires_exact_prefix() {
        assert_eq!(extract_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer("Basic abc123"), None);
        assert_eq!(extract_bearer("abc123"), None);
        assert_eq!(extract_bearer("Bearer "), Some(""));
    }
}
