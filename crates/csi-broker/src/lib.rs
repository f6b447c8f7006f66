//! Storage service broker backed by CSI volume plugins.
//!
//! [`Broker`] drives the instance and binding lifecycle: it probes each
//! service's plugin once, calls the plugin's controller to create and delete
//! volumes, and keeps the resulting records in a [`broker_store::RecordStore`].
//! [`ServicesRegistry`] maps the advertised services to their plugins.

pub mod api;
pub mod broker;
pub mod catalog;
pub mod error;
pub mod fingerprint;
pub mod params;
pub mod probe;
pub mod registry;

pub use api::{
    BindDetails, Binding, DeprovisionDetails, DeprovisionServiceSpec, LastOperation,
    LastOperationState, ProvisionDetails, ProvisionedServiceSpec, SharedDevice, UnbindDetails,
    UpdateDetails, UpdateServiceSpec, VolumeMount,
};
pub use broker::{Broker, DEPROVISION_OPERATION, SHARED_DEVICE_TYPE};
pub use catalog::{Catalog, Service, ServicePlan, ServiceSpec, PERMISSION_VOLUME_MOUNT};
pub use error::{BrokerError, BrokerResult, ErrorCategory};
pub use fingerprint::ServiceFingerprint;
pub use params::{MountMode, DEFAULT_CONTAINER_PATH};
pub use registry::{load_spec_file, RegistryError, RegistryResult, ServicesRegistry};
