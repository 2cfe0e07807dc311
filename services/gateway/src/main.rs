use std::net::SocketAddr;
use std::sync::Arc;

use gateway::config::Config;
use gateway::model_backend::ModelBackendClient;
use gateway::state::AppState;
use gateway::{db, dispatcher, worker};
use gateway_bus::kafka::{
    random_group_suffix, KafkaConfig, KafkaRequestConsumer, KafkaRequestProducer,
    KafkaResponseConsumer, KafkaResponseProducer,
};
use gateway_breaker::CircuitBreaker;
use gateway_cache::RedisResponseCache;
use tracing::info;

#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .init();

    let config = Config::from_env();

    info!("connecting to database...");
    let pool = db::create_pool(&config.database_url).await;
    db::run_migrations(&pool).await;
    info!("migrations applied");

    let cache = RedisResponseCache::connect(&config.redis_host, config.redis_port)
        .await
        .expect("failed to connect to Redis response cache");

    let redis_client = redis::Client::open(format!(
        "redis://{}:{}",
        config.redis_host, config.redis_port
    ))
    .expect("invalid Redis URL");
    let rate_limit_conn = redis::aio::ConnectionManager::new(redis_client)
        .await
        .expect("failed to connect to Redis rate limiter");
    let rate_limiter = gateway::ratelimit::RateLimiter::new(
        rate_limit_conn,
        config.rate_limit_requests,
        config.rate_limit_window,
    );

    let kafka_config = KafkaConfig {
        bootstrap_servers: config.kafka_bootstrap_servers.clone(),
        request_topic: config.kafka_topic.clone(),
        response_topic: config.kafka_response_topic.clone(),
        worker_group_id: config.kafka_group_id.clone(),
    };

    let request_producer = Arc::new(
        KafkaRequestProducer::new(&kafka_config).expect("failed to create Kafka request producer"),
    );
    let response_producer = Arc::new(
        KafkaResponseProducer::new(&kafka_config).expect("failed to create Kafka response producer"),
    );
    let request_consumer = Box::new(
        KafkaRequestConsumer::new(&kafka_config).expect("failed to create Kafka request consumer"),
    );
    let dispatcher_group_id = format!("dispatcher-group-{}", random_group_suffix());
    let response_consumer = Box::new(
        KafkaResponseConsumer::new(&kafka_config, &dispatcher_group_id)
            .expect("failed to create Kafka response consumer"),
    );

    let breaker = Arc::new(CircuitBreaker::new(
        config.breaker_fail_max,
        config.breaker_reset_timeout,
    ));
    let backend = Arc::new(ModelBackendClient::new(config.model_backend_url.clone()));

    let state = AppState::new(
        pool,
        Arc::new(cache),
        Arc::new(rate_limiter),
        request_producer,
        config.websocket_secret_key.clone(),
        config.response_timeout,
    );

    let dispatcher_task = tokio::spawn(dispatcher::run(response_consumer, state.waiters.clone()));
    let worker_task = tokio::spawn(worker::run(
        request_consumer,
        response_producer,
        backend,
        breaker,
        config.backend_call_timeout,
    ));

    let router = gateway::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %config.bind_addr, "gateway listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    info!("shutting down background tasks");
    dispatcher_task.abort();
    worker_task.abort();
    info!("gateway shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
