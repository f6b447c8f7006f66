use broker_store::StoreError;
use csi_plugin::PluginError;
use thiserror::Error;

use crate::registry::RegistryError;

/// Coarse class of a broker failure. Decides how the management API reports
/// it; none of them is retried by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed caller input.
    Validation,
    /// Identifier reused with different details. Never mutates state.
    Conflict,
    NotFound,
    /// Identity probe or volume RPC failed.
    Plugin,
    /// Saving or loading records failed. The in-memory record set may
    /// already reflect the operation.
    Persistence,
    Unsupported,
    Internal,
}

/// Lifecycle operation failures.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("The format of the parameters is not valid: {0}")]
    InvalidParameters(String),

    #[error("Request requires {0:?}")]
    MissingField(&'static str),

    #[error("app_guid is a required field but was not provided")]
    AppGuidNotProvided,

    #[error("Instance {0} already exists with different details")]
    InstanceAlreadyExists(String),

    #[error("Instance {0} does not exist")]
    InstanceDoesNotExist(String),

    #[error("Binding {0} already exists with different details")]
    BindingAlreadyExists(String),

    #[error("Binding {0} does not exist")]
    BindingDoesNotExist(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Plugin RPC failure, passed through verbatim.
    #[error("Plugin call `{operation}` failed: {source}")]
    Plugin {
        operation: &'static str,
        #[source]
        source: PluginError,
    },

    #[error("Stored fingerprint for instance {instance_id} is unreadable: {source}")]
    Fingerprint {
        instance_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record store operation `{operation}` failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Operation `{0}` is not supported by this broker")]
    Unsupported(&'static str),
}

impl BrokerError {
    pub fn plugin(operation: &'static str) -> impl FnOnce(PluginError) -> Self {
        move |source| BrokerError::Plugin { operation, source }
    }

    pub fn store(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| BrokerError::Store { operation, source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BrokerError::InvalidParameters(_)
            | BrokerError::MissingField(_)
            | BrokerError::AppGuidNotProvided => ErrorCategory::Validation,
            BrokerError::InstanceAlreadyExists(_) | BrokerError::BindingAlreadyExists(_) => {
                ErrorCategory::Conflict
            }
            BrokerError::InstanceDoesNotExist(_) | BrokerError::BindingDoesNotExist(_) => {
                ErrorCategory::NotFound
            }
            BrokerError::Registry(RegistryError::UnknownService(_)) => ErrorCategory::Validation,
            BrokerError::Registry(_) => ErrorCategory::Internal,
            BrokerError::Plugin { .. } => ErrorCategory::Plugin,
            BrokerError::Fingerprint { .. } => ErrorCategory::Internal,
            BrokerError::Store { .. } => ErrorCategory::Persistence,
            BrokerError::Unsupported(_) => ErrorCategory::Unsupported,
        }
    }

    /// Stable machine-readable code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::InvalidParameters(_) => "InvalidParameters",
            BrokerError::MissingField(_) => "MissingField",
            BrokerError::AppGuidNotProvided => "RequiresApp",
            BrokerError::InstanceAlreadyExists(_) => "InstanceAlreadyExists",
            BrokerError::InstanceDoesNotExist(_) => "InstanceDoesNotExist",
            BrokerError::BindingAlreadyExists(_) => "BindingAlreadyExists",
            BrokerError::BindingDoesNotExist(_) => "BindingDoesNotExist",
            BrokerError::Registry(RegistryError::UnknownService(_)) => "UnknownService",
            BrokerError::Registry(_) => "RegistryFailure",
            BrokerError::Plugin { .. } => "PluginFailure",
            BrokerError::Fingerprint { .. } => "CorruptRecord",
            BrokerError::Store { .. } => "PersistenceFailure",
            BrokerError::Unsupported(_) => "OperationNotSupported",
        }
    }
}

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;
