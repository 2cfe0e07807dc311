// Writes the completed text of a request to `inference_logs` at most once.
// `ON CONFLICT DO NOTHING` makes the insert idempotent by itself, but callers
// still only call this once per request_id in practice.

use sqlx::PgPool;

pub async fn record(
    pool: &PgPool,
    request_id: &str,
    prompt: &str,
    response: &str,
    model: &str,
    temperature: f32,
    max_tokens: u32,
) {
    let result = sqlx::query(
        "INSERT INTO inference_logs (request_id, prompt, response, model, temperature, max_tokens) \
         VALUES ($1::uuid, $2, $3, $4, $5, $6) \
         ON CONFLICT (request_id) DO NOTHING",
    )
    .bind(request_id)
    .bind(prompt)
    .bind(response)
    .bind(model)
    .bind(temperature)
    .bind(i32::try_from(max_tokens).unwrap_or(i32::MAX))
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(request_id, error = %e, "failed to record inference log");
    }
}
