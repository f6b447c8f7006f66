use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use broker_api::{router, ErrorBody};
use broker_store::MemoryStore;
use csi_broker::{Broker, Service, ServicePlan, ServiceSpec, ServicesRegistry};
use csi_plugin::{
    ControllerClient, CreateVolumeRequest, CreateVolumeResponse, DeleteVolumeRequest,
    IdentityClient, PluginConnector, PluginError, PluginHandle, PluginResult, ProbeResponse,
    Volume,
};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Default)]
struct StubPlugin {
    deletes: AtomicUsize,
}

impl IdentityClient for StubPlugin {
    fn probe(&self) -> BoxFuture<'_, PluginResult<ProbeResponse>> {
        Box::pin(async { Ok(ProbeResponse { ready: Some(true) }) })
    }
}

impl ControllerClient for StubPlugin {
    fn create_volume(
        &self,
        request: CreateVolumeRequest,
    ) -> BoxFuture<'_, PluginResult<CreateVolumeResponse>> {
        Box::pin(async move {
            if request.name == "explode" {
                return Err(PluginError::Unavailable("backend down".into()));
            }
            Ok(CreateVolumeResponse {
                volume: Volume {
                    volume_id: format!("vol-{}", request.name),
                    capacity_bytes: 0,
                    volume_context: HashMap::from([("share".into(), "srv:/export".into())]),
                },
            })
        })
    }

    fn delete_volume(&self, _request: DeleteVolumeRequest) -> BoxFuture<'_, PluginResult<()>> {
        Box::pin(async move {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

struct StubConnector(Arc<StubPlugin>);

impl PluginConnector for StubConnector {
    fn connect(&self, _address: &str) -> PluginResult<PluginHandle> {
        Ok(PluginHandle::from_shared(self.0.clone()))
    }
}

fn app() -> (Router, Arc<StubPlugin>) {
    let plugin = Arc::new(StubPlugin::default());
    let spec = ServiceSpec {
        driver_name: "org.example.nfs".into(),
        connection_address: "127.0.0.1:50051".into(),
        service: Service {
            id: "svc-nfs".into(),
            name: "csi-nfs".into(),
            bindable: true,
            plans: vec![ServicePlan {
                id: "plan-free".into(),
                name: "free".into(),
                ..ServicePlan::default()
            }],
            ..Service::default()
        },
    };
    let registry = ServicesRegistry::new(vec![spec], &StubConnector(plugin.clone())).unwrap();
    let broker = Broker::new(Box::new(MemoryStore::new()), Arc::new(registry)).unwrap();
    (router(Arc::new(broker)), plugin)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn provision_body(name: &str) -> Value {
    json!({
        "service_id": "svc-nfs",
        "plan_id": "plan-free",
        "organization_guid": "org",
        "space_guid": "space",
        "parameters": {
            "name": name,
            "volume_capabilities": [{ "mount": {} }]
        }
    })
}

#[tokio::test]
async fn catalog_lists_services_with_volume_mount() {
    let (app, _) = app();

    let (status, body) = send(&app, Method::GET, "/v2/catalog", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"][0]["id"], "svc-nfs");
    assert_eq!(body["services"][0]["requires"], json!(["volume_mount"]));
    assert!(body["services"][0].get("driver_name").is_none());
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn full_lifecycle_over_http() {
    let (app, plugin) = app();

    let (status, _) = send(
        &app,
        Method::PUT,
        "/v2/service_instances/inst-1",
        Some(provision_body("data")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, binding) = send(
        &app,
        Method::PUT,
        "/v2/service_instances/inst-1/service_bindings/bind-1",
        Some(json!({
            "service_id": "svc-nfs",
            "plan_id": "plan-free",
            "bind_resource": { "app_guid": "app-1" },
            "parameters": { "readonly": true }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(binding["credentials"], json!({}));
    assert_eq!(binding["volume_mounts"][0]["mode"], "r");
    assert_eq!(binding["volume_mounts"][0]["device_type"], "shared");
    assert_eq!(
        binding["volume_mounts"][0]["device"]["volume_id"],
        "inst-1-volume"
    );

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/v2/service_instances/inst-1/service_bindings/bind-1?service_id=svc-nfs&plan_id=plan-free",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/v2/service_instances/inst-1?service_id=svc-nfs&plan_id=plan-free",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operation"], "deprovision");
    assert_eq!(plugin.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn conflicting_provision_is_409() {
    let (app, _) = app();
    send(
        &app,
        Method::PUT,
        "/v2/service_instances/inst-1",
        Some(provision_body("data")),
    )
    .await;

    let mut body = provision_body("data");
    body["plan_id"] = json!("plan-other");
    let (status, err) = send(&app, Method::PUT, "/v2/service_instances/inst-1", Some(body)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    let err: ErrorBody = serde_json::from_value(err).unwrap();
    assert_eq!(err.error, "InstanceAlreadyExists");
}

#[tokio::test]
async fn plugin_failure_is_502() {
    let (app, _) = app();
    let (status, err) = send(
        &app,
        Method::PUT,
        "/v2/service_instances/inst-1",
        Some(provision_body("explode")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(err["error"], "PluginFailure");
    assert!(err["description"].as_str().unwrap().contains("backend down"));
}

#[tokio::test]
async fn missing_instance_is_410() {
    let (app, plugin) = app();
    let (status, err) = send(
        &app,
        Method::DELETE,
        "/v2/service_instances/nope?service_id=svc-nfs&plan_id=plan-free",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::GONE);
    assert_eq!(err["error"], "InstanceDoesNotExist");
    assert_eq!(plugin.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bind_without_app_guid_is_422() {
    let (app, _) = app();
    send(
        &app,
        Method::PUT,
        "/v2/service_instances/inst-1",
        Some(provision_body("data")),
    )
    .await;

    let (status, err) = send(
        &app,
        Method::PUT,
        "/v2/service_instances/inst-1/service_bindings/bind-1",
        Some(json!({ "service_id": "svc-nfs", "plan_id": "plan-free" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "RequiresApp");
}

#[tokio::test]
async fn malformed_body_is_400() {
    let (app, _) = app();
    let (status, err) = send(
        &app,
        Method::PUT,
        "/v2/service_instances/inst-1",
        Some(json!({ "plan_id": 7 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "MalformedRequest");
}

#[tokio::test]
async fn update_is_unsupported_and_last_operation_succeeds() {
    let (app, _) = app();

    let (status, err) = send(
        &app,
        Method::PATCH,
        "/v2/service_instances/inst-1",
        Some(json!({ "service_id": "svc-nfs", "plan_id": "plan-free" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "OperationNotSupported");

    let (status, body) = send(
        &app,
        Method::GET,
        "/v2/service_instances/inst-1/last_operation?operation=deprovision",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "state": "succeeded" }));
}
