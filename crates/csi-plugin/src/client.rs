use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{
    CreateVolumeRequest, CreateVolumeResponse, DeleteVolumeRequest, PluginResult, ProbeResponse,
};

/// Identity service of a plugin.
pub trait IdentityClient: Send + Sync {
    fn probe(&self) -> BoxFuture<'_, PluginResult<ProbeResponse>>;
}

/// Controller service of a plugin.
pub trait ControllerClient: Send + Sync {
    fn create_volume(
        &self,
        request: CreateVolumeRequest,
    ) -> BoxFuture<'_, PluginResult<CreateVolumeResponse>>;

    fn delete_volume(&self, request: DeleteVolumeRequest) -> BoxFuture<'_, PluginResult<()>>;
}

/// Both capabilities of one plugin endpoint.
#[derive(Clone)]
pub struct PluginHandle {
    pub identity: Arc<dyn IdentityClient>,
    pub controller: Arc<dyn ControllerClient>,
}

impl PluginHandle {
    /// Use a single value for both capabilities.
    pub fn from_shared<T>(client: Arc<T>) -> Self
    where
        T: IdentityClient + ControllerClient + 'static,
    {
        Self {
            identity: client.clone(),
            controller: client,
        }
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle").finish_non_exhaustive()
    }
}

/// Turns a configured connection address into a [`PluginHandle`].
///
/// Connecting must not perform I/O; the first RPC is the first contact with
/// the plugin.
pub trait PluginConnector: Send + Sync {
    fn connect(&self, address: &str) -> PluginResult<PluginHandle>;
}
