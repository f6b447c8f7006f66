use broker_store::OpaqueValue;
use csi_plugin::Volume;
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, BrokerResult};

/// Plugin-assigned identity of a provisioned volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFingerprint {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Volume")]
    pub volume: Volume,
}

impl ServiceFingerprint {
    pub fn new(name: impl Into<String>, volume: Volume) -> Self {
        Self {
            name: name.into(),
            volume,
        }
    }

    pub fn into_opaque(self) -> OpaqueValue {
        OpaqueValue::native(self)
    }

    /// Recover the fingerprint from a record slot.
    ///
    /// A slot written by this process still holds the typed value; a slot
    /// reloaded from disk holds a generic document that has to be decoded
    /// again.
    pub fn from_opaque(instance_id: &str, slot: &OpaqueValue) -> BrokerResult<Self> {
        if let Some(fingerprint) = slot.downcast_ref::<ServiceFingerprint>() {
            return Ok(fingerprint.clone());
        }

        slot.decode().map_err(|source| BrokerError::Fingerprint {
            instance_id: instance_id.to_string(),
            source,
        })
    }
}
