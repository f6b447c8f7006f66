//! Pure derivations from caller-supplied bind parameters.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BrokerError, BrokerResult};

/// Base directory for container mounts when the caller gives no `mount`.
pub const DEFAULT_CONTAINER_PATH: &str = "/var/vcap/data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountMode {
    #[serde(rename = "r")]
    ReadOnly,
    #[default]
    #[serde(rename = "rw")]
    ReadWrite,
}

impl MountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountMode::ReadOnly => "r",
            MountMode::ReadWrite => "rw",
        }
    }
}

impl From<bool> for MountMode {
    fn from(read_only: bool) -> Self {
        if read_only {
            MountMode::ReadOnly
        } else {
            MountMode::ReadWrite
        }
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `readonly` must be a boolean when present.
pub fn evaluate_mode(params: &Map<String, Value>) -> BrokerResult<MountMode> {
    match params.get("readonly") {
        None => Ok(MountMode::ReadWrite),
        Some(Value::Bool(read_only)) => Ok(MountMode::from(*read_only)),
        Some(other) => Err(BrokerError::InvalidParameters(format!(
            "\"readonly\" must be a boolean, got {}",
            other
        ))),
    }
}

/// A non-empty `mount` string wins; otherwise `<DEFAULT_CONTAINER_PATH>/<instance_id>`,
/// lexically cleaned so the default never leaves the data directory's root.
pub fn evaluate_container_path(
    params: &Map<String, Value>,
    instance_id: &str,
) -> BrokerResult<String> {
    match params.get("mount") {
        Some(Value::String(path)) if !path.is_empty() => Ok(path.clone()),
        None | Some(Value::String(_)) => Ok(clean_path(&format!(
            "{}/{}",
            DEFAULT_CONTAINER_PATH, instance_id
        ))),
        Some(other) => Err(BrokerError::InvalidParameters(format!(
            "\"mount\" must be a string, got {}",
            other
        ))),
    }
}

/// Lexical cleanup of an absolute path: repeated slashes collapse, `.` drops,
/// and `..` removes the previous segment but never climbs above `/`.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// `uid` and `gid` together, or nothing.
pub fn evaluate_id(params: &Map<String, Value>) -> BrokerResult<Option<HashMap<String, String>>> {
    let (Some(uid), Some(gid)) = (params.get("uid"), params.get("gid")) else {
        return Ok(None);
    };

    let as_string = |key: &str, value: &Value| match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(BrokerError::InvalidParameters(format!(
            "\"{}\" must be a string, got {}",
            key, other
        ))),
    };

    Ok(Some(HashMap::from([
        ("uid".to_string(), as_string("uid", uid)?),
        ("gid".to_string(), as_string("gid", gid)?),
    ])))
}

/// Bind parameters as a JSON object. Absent or `null` means no parameters.
pub fn parameter_map(raw: Option<&Value>) -> BrokerResult<Map<String, Value>> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(BrokerError::InvalidParameters(format!(
            "parameters must be a JSON object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        parameter_map(Some(&value)).unwrap()
    }

    #[test]
    fn readonly_true_is_r() {
        assert_eq!(
            evaluate_mode(&params(json!({ "readonly": true }))).unwrap(),
            MountMode::ReadOnly
        );
    }

    #[test]
    fn readonly_false_and_absent_are_rw() {
        assert_eq!(
            evaluate_mode(&params(json!({ "readonly": false }))).unwrap(),
            MountMode::ReadWrite
        );
        assert_eq!(evaluate_mode(&Map::new()).unwrap(), MountMode::ReadWrite);
    }

    #[test]
    fn readonly_wrong_type_is_invalid() {
        let err = evaluate_mode(&params(json!({ "readonly": "yes" }))).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidParameters(_)));
    }

    #[test]
    fn mount_overrides_container_path() {
        let path =
            evaluate_container_path(&params(json!({ "mount": "/custom" })), "inst-1").unwrap();
        assert_eq!(path, "/custom");
    }

    #[test]
    fn default_container_path_is_cleaned() {
        assert_eq!(
            evaluate_container_path(&Map::new(), "a/../b").unwrap(),
            "/var/vcap/data/b"
        );
        assert_eq!(
            evaluate_container_path(&Map::new(), "./x//y/").unwrap(),
            "/var/vcap/data/x/y"
        );
        assert_eq!(
            evaluate_container_path(&Map::new(), "../../../../etc").unwrap(),
            "/etc"
        );
    }

    #[test]
    fn missing_or_empty_mount_uses_default() {
        assert_eq!(
            evaluate_container_path(&Map::new(), "inst-1").unwrap(),
            "/var/vcap/data/inst-1"
        );
        assert_eq!(
            evaluate_container_path(&params(json!({ "mount": "" })), "inst-1").unwrap(),
            "/var/vcap/data/inst-1"
        );
    }

    #[test]
    fn non_string_mount_is_invalid() {
        assert!(evaluate_container_path(&params(json!({ "mount": 7 })), "i").is_err());
    }

    #[test]
    fn uid_and_gid_come_as_a_pair() {
        let ids = evaluate_id(&params(json!({ "uid": "1000", "gid": "1001" })))
            .unwrap()
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids["uid"], "1000");
        assert_eq!(ids["gid"], "1001");

        assert!(evaluate_id(&params(json!({ "uid": "1000" }))).unwrap().is_none());
        assert!(evaluate_id(&params(json!({ "gid": "1001" }))).unwrap().is_none());
    }

    #[test]
    fn numeric_uid_is_invalid() {
        assert!(evaluate_id(&params(json!({ "uid": 1000, "gid": "1" }))).is_err());
    }

    #[test]
    fn parameters_must_be_an_object() {
        assert!(parameter_map(None).unwrap().is_empty());
        assert!(parameter_map(Some(&Value::Null)).unwrap().is_empty());
        assert!(parameter_map(Some(&json!([1, 2]))).is_err());
    }

    #[test]
    fn mode_serializes_short_form() {
        assert_eq!(serde_json::to_value(MountMode::ReadOnly).unwrap(), "r");
        assert_eq!(MountMode::ReadWrite.to_string(), "rw");
    }
}
