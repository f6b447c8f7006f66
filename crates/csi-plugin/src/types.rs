//! CSI controller and identity payloads.
//!
//! Field names follow the CSI proto names in snake case; the lower camel case
//! spelling produced by proto JSON encoders is accepted as an alias so raw
//! broker parameters written against either form decode the same way. Proto
//! JSON also writes 64-bit integers as strings and may write enums as their
//! numbers; both are accepted.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Access mode requested for a volume capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessModeKind {
    #[default]
    Unknown,
    SingleNodeWriter,
    SingleNodeReaderOnly,
    MultiNodeReaderOnly,
    MultiNodeSingleWriter,
    MultiNodeMultiWriter,
}

impl AccessModeKind {
    const ALL: [AccessModeKind; 6] = [
        AccessModeKind::Unknown,
        AccessModeKind::SingleNodeWriter,
        AccessModeKind::SingleNodeReaderOnly,
        AccessModeKind::MultiNodeReaderOnly,
        AccessModeKind::MultiNodeSingleWriter,
        AccessModeKind::MultiNodeMultiWriter,
    ];

    /// Proto enum name, e.g. `SINGLE_NODE_WRITER`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessModeKind::Unknown => "UNKNOWN",
            AccessModeKind::SingleNodeWriter => "SINGLE_NODE_WRITER",
            AccessModeKind::SingleNodeReaderOnly => "SINGLE_NODE_READER_ONLY",
            AccessModeKind::MultiNodeReaderOnly => "MULTI_NODE_READER_ONLY",
            AccessModeKind::MultiNodeSingleWriter => "MULTI_NODE_SINGLE_WRITER",
            AccessModeKind::MultiNodeMultiWriter => "MULTI_NODE_MULTI_WRITER",
        }
    }

    /// Look up the proto enum number.
    pub fn from_number(n: i64) -> Option<Self> {
        usize::try_from(n).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == name)
    }
}

impl<'de> Deserialize<'de> for AccessModeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self::from_number(n)
                .ok_or_else(|| de::Error::custom(format!("unknown access mode {}", n))),
            Raw::Name(name) => Self::from_name(&name)
                .ok_or_else(|| de::Error::custom(format!("unknown access mode {:?}", name))),
        }
    }
}

/// A `u64` written either as a JSON number or as a decimal string.
fn u64_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => text
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid byte count {:?}", text))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessMode {
    #[serde(default)]
    pub mode: AccessModeKind,
}

/// Filesystem access type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountVolume {
    #[serde(default, alias = "fsType", skip_serializing_if = "String::is_empty")]
    pub fs_type: String,
    #[serde(default, alias = "mountFlags", skip_serializing_if = "Vec::is_empty")]
    pub mount_flags: Vec<String>,
}

/// Raw block access type. Carries no fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVolume {}

/// A capability the created volume must satisfy.
///
/// `mount` and `block` are the two arms of the CSI access type; at most one is
/// expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount: Option<MountVolume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockVolume>,
    #[serde(default, alias = "accessMode", skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<AccessMode>,
}

impl VolumeCapability {
    /// Filesystem-mode capability with the given access mode.
    pub fn mount(mode: AccessModeKind) -> Self {
        Self {
            mount: Some(MountVolume::default()),
            block: None,
            access_mode: Some(AccessMode { mode }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityRange {
    #[serde(
        default,
        alias = "requiredBytes",
        deserialize_with = "u64_from_number_or_string"
    )]
    pub required_bytes: u64,
    #[serde(
        default,
        alias = "limitBytes",
        deserialize_with = "u64_from_number_or_string"
    )]
    pub limit_bytes: u64,
}

/// Controller `CreateVolume` request.
///
/// Unknown fields are rejected so that a typo in the caller's configuration
/// surfaces as a decode failure instead of being silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateVolumeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "capacityRange", skip_serializing_if = "Option::is_none")]
    pub capacity_range: Option<CapacityRange>,
    #[serde(default, alias = "volumeCapabilities")]
    pub volume_capabilities: Vec<VolumeCapability>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub secrets: HashMap<String, String>,
}

/// Volume descriptor returned by the plugin at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(alias = "volumeId")]
    pub volume_id: String,
    #[serde(default, alias = "capacityBytes")]
    pub capacity_bytes: u64,
    /// Opaque attributes the plugin wants handed back at mount time.
    #[serde(default, alias = "volumeContext", alias = "attributes")]
    pub volume_context: HashMap<String, String>,
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.volume_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeResponse {
    pub volume: Volume,
}

/// Controller `DeleteVolume` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteVolumeRequest {
    #[serde(alias = "volumeId")]
    pub volume_id: String,
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

impl DeleteVolumeRequest {
    pub fn new(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
            secrets: HashMap::new(),
        }
    }
}

/// Identity `Probe` response. `ready` is optional in CSI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    #[serde(default)]
    pub ready: Option<bool>,
}
