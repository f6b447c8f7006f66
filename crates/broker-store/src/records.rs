use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpaqueValue;

/// A provisioned service instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub service_id: String,
    pub plan_id: String,
    pub organization_guid: String,
    pub space_guid: String,
    /// Plugin-assigned identity, opaque to the store.
    pub fingerprint: OpaqueValue,
}

impl InstanceRecord {
    /// Two records describe the same instance when the caller-visible
    /// identity matches. The fingerprint is not compared.
    pub fn same_identity(&self, other: &InstanceRecord) -> bool {
        self.service_id == other.service_id
            && self.plan_id == other.plan_id
            && self.organization_guid == other.organization_guid
            && self.space_guid == other.space_guid
    }
}

/// Resource the binding is made for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

/// Bind details as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingRecord {
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub app_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_resource: Option<BindResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// The whole persisted dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub instances: HashMap<String, InstanceRecord>,
    #[serde(default)]
    pub bindings: HashMap<String, BindingRecord>,
}

impl RecordSet {
    pub fn instance_conflicts(&self, instance_id: &str, record: &InstanceRecord) -> bool {
        self.instances
            .get(instance_id)
            .is_some_and(|existing| !existing.same_identity(record))
    }

    pub fn binding_conflicts(&self, binding_id: &str, record: &BindingRecord) -> bool {
        self.bindings
            .get(binding_id)
            .is_some_and(|existing| existing != record)
    }
}
