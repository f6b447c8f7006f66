//! Lifecycle state machine.
//!
//! Plugin RPCs for provision and deprovision run without the record lock so
//! volume calls for different instances can overlap. Every read/check/write of
//! the record set, and the save that follows it, runs under the lock.
//!
//! Saves are synchronous: a [`FileStore`](broker_store::FileStore) writes and
//! renames its file on the calling tokio worker while the lock is held, so
//! record writes are serialized behind disk latency.

use std::sync::Arc;

use broker_store::{InstanceRecord, RecordStore, StoreError};
use csi_plugin::{CreateVolumeRequest, DeleteVolumeRequest};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{
    BindDetails, Binding, DeprovisionDetails, DeprovisionServiceSpec, LastOperation,
    ProvisionDetails, ProvisionedServiceSpec, SharedDevice, UnbindDetails, UpdateDetails,
    UpdateServiceSpec, VolumeMount,
};
use crate::catalog::Service;
use crate::error::{BrokerError, BrokerResult};
use crate::fingerprint::ServiceFingerprint;
use crate::params::{evaluate_container_path, evaluate_id, evaluate_mode, parameter_map};
use crate::probe::ProbeGate;
use crate::registry::ServicesRegistry;

/// Marker returned with a completed deprovision.
pub const DEPROVISION_OPERATION: &str = "deprovision";

/// Device type of every mount handed out by this broker.
pub const SHARED_DEVICE_TYPE: &str = "shared";

pub struct Broker {
    registry: Arc<ServicesRegistry>,
    store: Mutex<Box<dyn RecordStore>>,
    probes: ProbeGate,
}

impl Broker {
    /// Restore `store` and take ownership of it.
    pub fn new(store: Box<dyn RecordStore>, registry: Arc<ServicesRegistry>) -> BrokerResult<Self> {
        store.restore().map_err(BrokerError::store("restore"))?;
        info!(
            instances = store.instance_ids().len(),
            bindings = store.binding_ids().len(),
            "record store restored"
        );

        Ok(Self {
            registry,
            store: Mutex::new(store),
            probes: ProbeGate::new(),
        })
    }

    pub fn services(&self) -> Vec<Service> {
        self.registry.broker_services()
    }

    #[instrument(skip(self, details), fields(service_id = %details.service_id))]
    pub async fn provision(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
    ) -> BrokerResult<ProvisionedServiceSpec> {
        self.ensure_probed(&details.service_id).await?;

        let request = create_volume_request(details.raw_parameters.as_ref())?;
        let name = request.name.clone();
        let controller = self.registry.controller_client(&details.service_id)?;

        debug!(volume_name = %name, "creating volume");
        let response = controller
            .create_volume(request)
            .await
            .map_err(BrokerError::plugin("create_volume"))?;
        info!(volume_id = %response.volume, "volume created");

        let record = InstanceRecord {
            service_id: details.service_id,
            plan_id: details.plan_id,
            organization_guid: details.organization_guid,
            space_guid: details.space_guid,
            fingerprint: ServiceFingerprint::new(name, response.volume).into_opaque(),
        };

        let store = self.store.lock().await;
        let result = if store.is_instance_conflict(instance_id, &record) {
            Err(BrokerError::InstanceAlreadyExists(instance_id.to_string()))
        } else {
            store
                .create_instance(instance_id, record)
                .map_err(BrokerError::store("create_instance"))
        };
        persist_after(&**store, "provision", result)?;

        Ok(ProvisionedServiceSpec::default())
    }

    #[instrument(skip(self, details), fields(service_id = %details.service_id))]
    pub async fn deprovision(
        &self,
        instance_id: &str,
        details: DeprovisionDetails,
    ) -> BrokerResult<DeprovisionServiceSpec> {
        self.ensure_probed(&details.service_id).await?;

        if instance_id.is_empty() {
            return Err(BrokerError::MissingField("instance_id"));
        }
        if details.plan_id.is_empty() {
            return Err(BrokerError::MissingField("plan_id"));
        }
        if details.service_id.is_empty() {
            return Err(BrokerError::MissingField("service_id"));
        }

        let record = {
            let store = self.store.lock().await;
            store
                .retrieve_instance(instance_id)
                .map_err(|e| instance_lookup(instance_id, e))?
        };
        let fingerprint = ServiceFingerprint::from_opaque(instance_id, &record.fingerprint)?;

        let controller = self.registry.controller_client(&details.service_id)?;
        controller
            .delete_volume(DeleteVolumeRequest::new(fingerprint.volume.volume_id.clone()))
            .await
            .map_err(BrokerError::plugin("delete_volume"))?;
        info!(volume_id = %fingerprint.volume, "volume deleted");

        let store = self.store.lock().await;
        let result = store
            .delete_instance(instance_id)
            .map_err(|e| instance_lookup(instance_id, e));
        persist_after(&**store, "deprovision", result)?;

        Ok(DeprovisionServiceSpec {
            is_async: false,
            operation_data: DEPROVISION_OPERATION.to_string(),
        })
    }

    #[instrument(skip(self, details), fields(service_id = %details.service_id))]
    pub async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: BindDetails,
    ) -> BrokerResult<Binding> {
        self.ensure_probed(&details.service_id).await?;

        let store = self.store.lock().await;
        let result = self.bind_locked(&**store, instance_id, binding_id, &details);
        let binding = persist_after(&**store, "bind", result)?;

        info!(binding_id, "binding created");
        Ok(binding)
    }

    #[instrument(skip(self, details), fields(service_id = %details.service_id))]
    pub async fn unbind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: UnbindDetails,
    ) -> BrokerResult<()> {
        self.ensure_probed(&details.service_id).await?;

        let store = self.store.lock().await;
        let result = store
            .retrieve_instance(instance_id)
            .map_err(|e| instance_lookup(instance_id, e))
            .and_then(|_| {
                store
                    .retrieve_binding(binding_id)
                    .map_err(|e| binding_lookup(binding_id, e))
            })
            .and_then(|_| {
                store
                    .delete_binding(binding_id)
                    .map_err(|e| binding_lookup(binding_id, e))
            });
        persist_after(&**store, "unbind", result)?;

        info!(binding_id, "binding removed");
        Ok(())
    }

    /// Every operation completes synchronously, so there is never anything
    /// in flight to report.
    pub fn last_operation(&self, instance_id: &str, operation_data: Option<&str>) -> LastOperation {
        debug!(instance_id, ?operation_data, "last operation polled");
        LastOperation::default()
    }

    pub fn update(
        &self,
        instance_id: &str,
        details: UpdateDetails,
    ) -> BrokerResult<UpdateServiceSpec> {
        warn!(instance_id, service_id = %details.service_id, "update requested but not supported");
        Err(BrokerError::Unsupported("update"))
    }

    async fn ensure_probed(&self, service_id: &str) -> BrokerResult<()> {
        if self.probes.is_probed(service_id) {
            return Ok(());
        }

        let identity = self.registry.identity_client(service_id)?;
        let response = identity.probe().await.map_err(|e| {
            error!(service_id, error = %e, "plugin probe failed");
            BrokerError::plugin("probe")(e)
        })?;
        if response.ready == Some(false) {
            warn!(service_id, "plugin reports not ready");
        }

        if self.probes.mark_probed(service_id) {
            info!(service_id, "plugin probe succeeded");
        }
        Ok(())
    }

    fn bind_locked(
        &self,
        store: &dyn RecordStore,
        instance_id: &str,
        binding_id: &str,
        details: &BindDetails,
    ) -> BrokerResult<Binding> {
        let instance = store
            .retrieve_instance(instance_id)
            .map_err(|e| instance_lookup(instance_id, e))?;

        if details.app_guid().is_empty() {
            return Err(BrokerError::AppGuidNotProvided);
        }

        let fingerprint = ServiceFingerprint::from_opaque(instance_id, &instance.fingerprint)?;

        let params = parameter_map(details.raw_parameters.as_ref())?;
        let mode = evaluate_mode(&params)?;
        let container_dir = evaluate_container_path(&params, instance_id)?;
        let ids = evaluate_id(&params)?;

        let record = details.to_record();
        if store.is_binding_conflict(binding_id, &record) {
            return Err(BrokerError::BindingAlreadyExists(binding_id.to_string()));
        }

        let driver = self.registry.driver_name(&details.service_id)?;
        store
            .create_binding(binding_id, record)
            .map_err(BrokerError::store("create_binding"))?;

        let mut mount_config = Map::new();
        mount_config.insert("id".into(), Value::String(fingerprint.volume.volume_id));
        mount_config.insert(
            "attributes".into(),
            Value::Object(
                fingerprint
                    .volume
                    .volume_context
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ),
        );
        mount_config.insert(
            "binding-params".into(),
            ids.map_or(Value::Null, |ids| {
                Value::Object(ids.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
            }),
        );

        Ok(Binding {
            credentials: Map::new(),
            volume_mounts: vec![VolumeMount {
                driver,
                container_dir,
                mode,
                device_type: SHARED_DEVICE_TYPE.to_string(),
                device: SharedDevice {
                    volume_id: format!("{}-volume", instance_id),
                    mount_config,
                },
            }],
        })
    }
}

/// Decode provision parameters into the plugin request.
fn create_volume_request(raw: Option<&Value>) -> BrokerResult<CreateVolumeRequest> {
    let raw = raw.ok_or_else(|| BrokerError::InvalidParameters("no parameters supplied".into()))?;
    let request: CreateVolumeRequest = serde_json::from_value(raw.clone())
        .map_err(|e| BrokerError::InvalidParameters(e.to_string()))?;

    if request.name.is_empty() {
        return Err(BrokerError::InvalidParameters("volume name is required".into()));
    }
    if request.volume_capabilities.is_empty() {
        return Err(BrokerError::InvalidParameters(
            "at least one volume capability is required".into(),
        ));
    }
    Ok(request)
}

/// Save the store after an in-lock step, whatever its outcome.
///
/// A failed step keeps its own error; a failed save turns a successful step
/// into a persistence error. The in-memory change is kept either way and is
/// written out by the next successful save. The save blocks the current
/// worker thread.
fn persist_after<T>(
    store: &dyn RecordStore,
    operation: &'static str,
    result: BrokerResult<T>,
) -> BrokerResult<T> {
    match (result, store.save()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => {
            error!(operation, error = %e, "failed to persist records");
            Err(BrokerError::store("save")(e))
        }
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(e)) => {
            error!(operation, error = %e, "failed to persist records after error");
            Err(err)
        }
    }
}

fn instance_lookup(instance_id: &str, e: StoreError) -> BrokerError {
    if e.is_not_found() {
        BrokerError::InstanceDoesNotExist(instance_id.to_string())
    } else {
        BrokerError::store("instance")(e)
    }
}

fn binding_lookup(binding_id: &str, e: StoreError) -> BrokerError {
    if e.is_not_found() {
        BrokerError::BindingDoesNotExist(binding_id.to_string())
    } else {
        BrokerError::store("binding")(e)
    }
}
