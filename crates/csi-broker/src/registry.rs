//! Service id → plugin resolution.
//!
//! The registry is built once from the service specification and is
//! read-only afterwards. Construction fails fast on an empty or malformed
//! specification so a misconfigured broker never starts serving.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csi_plugin::{ControllerClient, IdentityClient, PluginConnector, PluginError, PluginHandle};
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{Service, ServiceSpec, PERMISSION_VOLUME_MOUNT};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("At least one service must be provided in specfile")]
    EmptySpecFile,

    #[error("Invalid service in specfile at index {index}: {reason}")]
    InvalidService { index: usize, reason: String },

    #[error("Invalid specfile {}: {reason}", .path.display())]
    InvalidSpecFile { path: PathBuf, reason: String },

    #[error("Cannot connect service at index {index} to its plugin: {source}")]
    Connect {
        index: usize,
        #[source]
        source: PluginError,
    },

    #[error("Unknown service {0}")]
    UnknownService(String),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

struct RegistryEntry {
    driver_name: String,
    plugin: PluginHandle,
}

pub struct ServicesRegistry {
    entries: HashMap<String, RegistryEntry>,
    catalog: Vec<Service>,
}

impl ServicesRegistry {
    /// Validate `specs` and connect every service to its plugin.
    pub fn new(specs: Vec<ServiceSpec>, connector: &dyn PluginConnector) -> RegistryResult<Self> {
        if specs.is_empty() {
            return Err(RegistryError::EmptySpecFile);
        }

        let mut entries = HashMap::with_capacity(specs.len());
        let mut catalog = Vec::with_capacity(specs.len());

        for (index, spec) in specs.into_iter().enumerate() {
            validate(index, &spec)?;
            if entries.contains_key(&spec.service.id) {
                return Err(RegistryError::InvalidService {
                    index,
                    reason: format!("duplicate service id {}", spec.service.id),
                });
            }

            let plugin = connector
                .connect(&spec.connection_address)
                .map_err(|source| RegistryError::Connect { index, source })?;

            let mut service = spec.service;
            if !service.requires_volume_mount() {
                debug!(service_id = %service.id, "adding volume_mount permission");
                service.requires.push(PERMISSION_VOLUME_MOUNT.to_string());
            }

            info!(
                service_id = %service.id,
                driver = %spec.driver_name,
                address = %spec.connection_address,
                "registered service"
            );
            entries.insert(
                service.id.clone(),
                RegistryEntry {
                    driver_name: spec.driver_name,
                    plugin,
                },
            );
            catalog.push(service);
        }

        Ok(Self { entries, catalog })
    }

    /// Load a specification file: YAML for `.yml`/`.yaml`, JSON otherwise.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        connector: &dyn PluginConnector,
    ) -> RegistryResult<Self> {
        let specs = load_spec_file(path.as_ref())?;
        Self::new(specs, connector)
    }

    pub fn broker_services(&self) -> Vec<Service> {
        self.catalog.clone()
    }

    pub fn identity_client(&self, service_id: &str) -> RegistryResult<Arc<dyn IdentityClient>> {
        self.entry(service_id).map(|e| e.plugin.identity.clone())
    }

    pub fn controller_client(&self, service_id: &str) -> RegistryResult<Arc<dyn ControllerClient>> {
        self.entry(service_id).map(|e| e.plugin.controller.clone())
    }

    pub fn driver_name(&self, service_id: &str) -> RegistryResult<String> {
        self.entry(service_id).map(|e| e.driver_name.clone())
    }

    fn entry(&self, service_id: &str) -> RegistryResult<&RegistryEntry> {
        self.entries
            .get(service_id)
            .ok_or_else(|| RegistryError::UnknownService(service_id.to_string()))
    }
}

pub fn load_spec_file(path: &Path) -> RegistryResult<Vec<ServiceSpec>> {
    let invalid = |reason: String| RegistryError::InvalidSpecFile {
        path: path.to_path_buf(),
        reason,
    };

    let text = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    );

    if is_yaml {
        serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))
    } else {
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
    }
}

fn validate(index: usize, spec: &ServiceSpec) -> RegistryResult<()> {
    let missing = [
        ("id", spec.service.id.as_str()),
        ("name", spec.service.name.as_str()),
        ("driver_name", spec.driver_name.as_str()),
        ("connection_address", spec.connection_address.as_str()),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty());

    if let Some((field, _)) = missing {
        return Err(RegistryError::InvalidService {
            index,
            reason: format!("missing {}", field),
        });
    }
    if spec.service.plans.is_empty() {
        return Err(RegistryError::InvalidService {
            index,
            reason: "no plans".to_string(),
        });
    }
    if let Some(plan) = spec
        .service
        .plans
        .iter()
        .find(|p| p.id.trim().is_empty() || p.name.trim().is_empty())
    {
        return Err(RegistryError::InvalidService {
            index,
            reason: format!("plan {:?} needs an id and a name", plan.name),
        });
    }
    Ok(())
}
