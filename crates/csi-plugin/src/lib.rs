//! Client side of the CSI volume-plugin protocol used by the broker.
//!
//! The broker only needs two remote capabilities from a plugin: the identity
//! probe and the controller's create/delete volume calls. Both are expressed
//! as object-safe traits in [`client`] so the broker can be driven by the HTTP
//! transport in [`http`] or by an in-process fake in tests.

pub mod client;
pub mod error;
pub mod http;
pub mod message;
pub mod types;

pub use client::{ControllerClient, IdentityClient, PluginConnector, PluginHandle};
pub use error::{PluginError, PluginResult};
pub use http::{HttpConnector, HttpPluginClient};
pub use message::PluginMessage;
pub use types::*;
