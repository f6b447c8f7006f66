use axum::{
    routing::{get, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use csi_broker::Broker;

use crate::handlers::*;

/// Open Service Broker routes over `broker`.
pub fn router(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v2/catalog", get(catalog))
        .route(
            "/v2/service_instances/:instance_id",
            put(provision).patch(update).delete(deprovision),
        )
        .route(
            "/v2/service_instances/:instance_id/last_operation",
            get(last_operation),
        )
        .route(
            "/v2/service_instances/:instance_id/service_bindings/:binding_id",
            put(bind).delete(unbind),
        )
        .with_state(broker)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    broker: Arc<Broker>,
    listen_addr: SocketAddr,
}

impl ApiServer {
    pub fn new(broker: Arc<Broker>, listen_addr: SocketAddr) -> Self {
        Self {
            broker,
            listen_addr,
        }
    }

    pub async fn run(self) -> std::io::Result<()> {
        let app = router(self.broker);
        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;

        info!("CSI broker listening on http://{}", listener.local_addr()?);
        info!("  curl http://{}/v2/catalog", self.listen_addr);

        axum::serve(listener, app).await
    }
}
