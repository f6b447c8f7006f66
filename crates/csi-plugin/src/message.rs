//! Request/response envelope carried by the HTTP transport.
//!
//! One request variant is posted per call and the plugin answers with the
//! matching response variant or [`PluginMessage::Error`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PluginError;
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum PluginMessage {
    // requests
    Probe,
    CreateVolume(CreateVolumeRequest),
    DeleteVolume(DeleteVolumeRequest),

    // responses
    ProbeResult(ProbeResponse),
    VolumeCreated(CreateVolumeResponse),
    Ok,
    Error(PluginError),
}

impl fmt::Display for PluginMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe => f.write_str("Probe"),
            Self::CreateVolume(req) => write!(f, "CreateVolume(name={})", req.name),
            Self::DeleteVolume(req) => write!(f, "DeleteVolume({})", req.volume_id),
            Self::ProbeResult(resp) => write!(f, "ProbeResult(ready={:?})", resp.ready),
            Self::VolumeCreated(resp) => write!(f, "VolumeCreated({})", resp.volume),
            Self::Ok => f.write_str("Ok"),
            Self::Error(e) => write!(f, "Error({})", e),
        }
    }
}
