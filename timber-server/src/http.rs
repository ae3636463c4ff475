//! Route handlers for the broker's HTTP surface.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use timber_broker::{Ack, Broker};
use timber_topic::TopicConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Body of `POST /create-topic`.
#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    /// Topic name.
    pub name: String,
    /// Topic configuration.
    pub config: CreateTopicConfig,
}

/// The `config` object of a create-topic request.
#[derive(Debug, Deserialize)]
pub struct CreateTopicConfig {
    /// Compression tag (stored, not enforced).
    #[serde(default)]
    pub compression: String,
    /// Data-type tag (stored, not enforced).
    #[serde(default)]
    pub data_type: String,
    /// Replica count (stored, not enforced).
    #[serde(default)]
    pub replicas: u32,
    /// Number of partitions.
    pub num_of_partitions: u32,
}

/// Body of `POST /produce`.
#[derive(Debug, Deserialize)]
pub struct ProduceRequest {
    /// Target topic.
    pub topic: String,
    /// Partitioning key.
    pub key: String,
    /// Message payload: any JSON value.
    pub message: serde_json::Value,
}

/// Builds the intake router over a running broker.
pub fn router(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/create-topic", post(create_topic))
        .route("/produce", post(produce))
        .with_state(broker)
}

async fn create_topic(
    State(broker): State<Arc<Broker>>,
    Json(request): Json<CreateTopicRequest>,
) -> impl IntoResponse {
    info!(topic = %request.name, "Creating topic");

    let config = TopicConfig::new(request.config.num_of_partitions)
        .with_compression(request.config.compression)
        .with_data_type(request.config.data_type)
        .with_replicas(request.config.replicas);

    match broker.create_topic(&request.name, &config).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({ "message": "Topic created successfully" })),
        ),
        Err(e) => {
            warn!(topic = %request.name, error = %e, "Topic creation failed");
            (StatusCode::BAD_REQUEST, Json(json!({ "message": e.to_string() })))
        }
    }
}

async fn produce(
    State(broker): State<Arc<Broker>>,
    Json(request): Json<ProduceRequest>,
) -> impl IntoResponse {
    let token = CancellationToken::new();

    match broker
        .produce(
            &request.topic,
            &request.key,
            &request.message,
            Ack::Offset,
            &token,
        )
        .await
    {
        Ok(metadata) => (StatusCode::OK, Json(json!(metadata))),
        Err(e) => {
            warn!(topic = %request.topic, error = %e, "Produce failed");
            (StatusCode::BAD_REQUEST, Json(json!({ "message": e.to_string() })))
        }
    }
}
