//! Service catalog metadata advertised to the platform.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Permission a service must request for its bindings to carry volume mounts.
pub const PERMISSION_VOLUME_MOUNT: &str = "volume_mount";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bindable: bool,
    #[serde(default)]
    pub plan_updateable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub plans: Vec<ServicePlan>,
}

impl Service {
    pub fn requires_volume_mount(&self) -> bool {
        self.requires.iter().any(|r| r == PERMISSION_VOLUME_MOUNT)
    }
}

/// One entry of the service specification file: catalog metadata plus the
/// plugin it is served by.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub connection_address: String,
    #[serde(flatten)]
    pub service: Service,
}

/// `GET /v2/catalog` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub services: Vec<Service>,
}
