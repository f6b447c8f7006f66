//! Type-erased record payloads.
//!
//! A store holds values it does not understand (the broker's service
//! fingerprint). While the process that wrote a value is alive the slot keeps
//! the live typed value; after a reload from disk only the generic JSON
//! document is left. Readers must accept both forms.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A live value that can still be rendered as a JSON document.
pub trait ErasedDocument: Any + Send + Sync + fmt::Debug {
    fn to_document(&self) -> serde_json::Result<Value>;

    fn as_any(&self) -> &dyn Any;
}

impl<T> ErasedDocument for T
where
    T: Serialize + Any + Send + Sync + fmt::Debug,
{
    fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, Debug)]
pub enum OpaqueValue {
    /// Typed value stored by this process.
    Native(Arc<dyn ErasedDocument>),
    /// Generic document read back from persistence.
    Document(Value),
}

impl OpaqueValue {
    pub fn native<T>(value: T) -> Self
    where
        T: Serialize + Any + Send + Sync + fmt::Debug,
    {
        OpaqueValue::Native(Arc::new(value))
    }

    /// Direct typed access. Always `None` for a reloaded document.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            OpaqueValue::Native(value) => value.as_ref().as_any().downcast_ref::<T>(),
            OpaqueValue::Document(_) => None,
        }
    }

    pub fn to_document(&self) -> serde_json::Result<Value> {
        match self {
            OpaqueValue::Native(value) => value.to_document(),
            OpaqueValue::Document(doc) => Ok(doc.clone()),
        }
    }

    /// Decode the canonical JSON form into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.to_document()?)
    }

    pub fn is_native(&self) -> bool {
        matches!(self, OpaqueValue::Native(_))
    }
}

impl Serialize for OpaqueValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let doc = self.to_document().map_err(serde::ser::Error::custom)?;
        doc.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OpaqueValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(OpaqueValue::Document)
    }
}

impl From<Value> for OpaqueValue {
    fn from(value: Value) -> Self {
        OpaqueValue::Document(value)
    }
}
