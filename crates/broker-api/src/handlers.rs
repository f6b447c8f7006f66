use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use csi_broker::{
    BindDetails, Broker, Catalog, DeprovisionDetails, ProvisionDetails, UnbindDetails,
    UpdateDetails,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ApiError;

pub type AppState = Arc<Broker>;

#[derive(Debug, Default, Deserialize)]
pub struct AsyncQuery {
    #[serde(default)]
    pub accepts_incomplete: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LastOperationQuery {
    #[serde(default)]
    pub operation: Option<String>,
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /v2/catalog
pub async fn catalog(State(broker): State<AppState>) -> Json<Catalog> {
    Json(Catalog {
        services: broker.services(),
    })
}

/// PUT /v2/service_instances/:instance_id
pub async fn provision(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<AsyncQuery>,
    body: Result<Json<ProvisionDetails>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(details) = body?;
    info!(%instance_id, service_id = %details.service_id, "PUT provision");
    debug!(
        accepts_incomplete = query.accepts_incomplete,
        "provisioning completes synchronously"
    );

    let spec = broker
        .provision(&instance_id, details)
        .await
        .map_err(|e| ApiError::logged("provision", e))?;
    Ok((StatusCode::CREATED, Json(spec)).into_response())
}

/// PATCH /v2/service_instances/:instance_id
pub async fn update(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
    body: Result<Json<UpdateDetails>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(details) = body?;
    let spec = broker
        .update(&instance_id, details)
        .map_err(|e| ApiError::logged("update", e))?;
    Ok((StatusCode::OK, Json(spec)).into_response())
}

/// DELETE /v2/service_instances/:instance_id?service_id&plan_id
pub async fn deprovision(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
    query: Result<Query<DeprovisionDetails>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(details) = query?;
    info!(%instance_id, service_id = %details.service_id, "DELETE deprovision");

    let spec = broker
        .deprovision(&instance_id, details)
        .await
        .map_err(|e| ApiError::logged("deprovision", e))?;
    Ok((StatusCode::OK, Json(spec)).into_response())
}

/// GET /v2/service_instances/:instance_id/last_operation
pub async fn last_operation(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<LastOperationQuery>,
) -> impl IntoResponse {
    Json(broker.last_operation(&instance_id, query.operation.as_deref()))
}

/// PUT /v2/service_instances/:instance_id/service_bindings/:binding_id
pub async fn bind(
    State(broker): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    body: Result<Json<BindDetails>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(details) = body?;
    info!(%instance_id, %binding_id, service_id = %details.service_id, "PUT bind");

    let binding = broker
        .bind(&instance_id, &binding_id, details)
        .await
        .map_err(|e| ApiError::logged("bind", e))?;
    Ok((StatusCode::CREATED, Json(binding)).into_response())
}

/// DELETE /v2/service_instances/:instance_id/service_bindings/:binding_id
pub async fn unbind(
    State(broker): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    query: Result<Query<UnbindDetails>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(details) = query?;
    info!(%instance_id, %binding_id, service_id = %details.service_id, "DELETE unbind");

    broker
        .unbind(&instance_id, &binding_id, details)
        .await
        .map_err(|e| ApiError::logged("unbind", e))?;
    Ok((StatusCode::OK, Json(json!({}))).into_response())
}
