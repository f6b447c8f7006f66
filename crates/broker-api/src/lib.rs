//! HTTP surface of the CSI broker.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ErrorBody};
pub use server::{router, ApiServer};
