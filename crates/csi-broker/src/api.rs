//! Request and response shapes of the broker operations.
//!
//! These mirror the Open Service Broker v2 bodies so the HTTP layer can
//! (de)serialize them directly.

use broker_store::{BindResource, BindingRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::MountMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionDetails {
    pub service_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub organization_guid: String,
    #[serde(default)]
    pub space_guid: String,
    /// Raw configuration, decoded into a plugin create-volume request.
    #[serde(default, rename = "parameters", skip_serializing_if = "Option::is_none")]
    pub raw_parameters: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedServiceSpec {
    #[serde(skip)]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
    #[serde(default, rename = "operation", skip_serializing_if = "Option::is_none")]
    pub operation_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprovisionDetails {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprovisionServiceSpec {
    #[serde(skip)]
    pub is_async: bool,
    #[serde(rename = "operation")]
    pub operation_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindDetails {
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub app_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_resource: Option<BindResource>,
    #[serde(default, rename = "parameters", skip_serializing_if = "Option::is_none")]
    pub raw_parameters: Option<Value>,
}

impl BindDetails {
    /// Top-level `app_guid`, falling back to `bind_resource.app_guid`.
    pub fn app_guid(&self) -> &str {
        if !self.app_guid.is_empty() {
            return &self.app_guid;
        }
        self.bind_resource
            .as_ref()
            .and_then(|r| r.app_guid.as_deref())
            .unwrap_or("")
    }

    pub fn to_record(&self) -> BindingRecord {
        BindingRecord {
            service_id: self.service_id.clone(),
            plan_id: self.plan_id.clone(),
            app_guid: self.app_guid.clone(),
            bind_resource: self.bind_resource.clone(),
            parameters: self.raw_parameters.clone(),
        }
    }
}

/// Device handed to the volume driver at mount time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedDevice {
    pub volume_id: String,
    pub mount_config: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub driver: String,
    pub container_dir: String,
    pub mode: MountMode,
    pub device_type: String,
    pub device: SharedDevice,
}

/// Bind result. `credentials` always serializes as an object, never `null`:
/// the platform rejects a binding without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub credentials: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbindDetails {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub service_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, rename = "parameters", skip_serializing_if = "Option::is_none")]
    pub raw_parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_values: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateServiceSpec {
    #[serde(skip)]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_data: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastOperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[default]
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    pub state: LastOperationState,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn app_guid_falls_back_to_bind_resource() {
        let details: BindDetails = serde_json::from_value(json!({
            "service_id": "svc",
            "bind_resource": { "app_guid": "app-from-resource" }
        }))
        .unwrap();
        assert_eq!(details.app_guid(), "app-from-resource");

        let details = BindDetails {
            app_guid: "top".into(),
            ..details
        };
        assert_eq!(details.app_guid(), "top");
    }

    #[test]
    fn empty_binding_has_object_credentials() {
        let value = serde_json::to_value(Binding::default()).unwrap();
        assert_eq!(value["credentials"], json!({}));
    }

    #[test]
    fn provision_details_read_parameters_field() {
        let details: ProvisionDetails = serde_json::from_value(json!({
            "service_id": "svc",
            "plan_id": "plan",
            "organization_guid": "org",
            "space_guid": "space",
            "parameters": { "name": "vol" }
        }))
        .unwrap();
        assert_eq!(details.raw_parameters.unwrap()["name"], "vol");
    }

    #[test]
    fn deprovision_spec_reports_operation() {
        let spec = DeprovisionServiceSpec {
            is_async: false,
            operation_data: "deprovision".into(),
        };
        assert_eq!(
            serde_json::to_value(spec).unwrap(),
            json!({ "operation": "deprovision" })
        );
    }
}
