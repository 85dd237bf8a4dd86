//! Error types for the elastic address system
//!
//! This module defines all error types used throughout the crate, together
//! with [`ErrorKind`], the coarse taxonomy callers use to decide how to react
//! (reject, retry later, surface as conflict, ...).

use thiserror::Error;

/// Result type alias for address operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the elastic address system
#[derive(Error, Debug)]
pub enum Error {
    /// A required argument is missing
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// Arguments that cannot be combined were supplied together
    #[error("Invalid parameter combination: {0}")]
    InvalidParameterCombination(String),

    /// An argument has an unacceptable value
    #[error("Invalid parameter value: {0}")]
    InvalidParameterValue(String),

    /// The controller refused to allocate another address
    #[error("Address limit exceeded: the maximum number of addresses has been reached")]
    AddressLimitExceeded,

    /// Raw quota rejection reported by a controller client
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Allocation id unknown locally or upstream
    #[error("The allocation ID '{0}' does not exist")]
    AllocationNotFound(String),

    /// Association id unknown locally or upstream
    #[error("The association ID '{0}' does not exist")]
    AssociationNotFound(String),

    /// Generic not found (controller objects, attachment points)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Address is bound to a different attachment point
    #[error("Resource already associated: {0}")]
    ResourceAlreadyAssociated(String),

    /// Instance cannot be resolved to a single attachment point
    #[error("Invalid instance ID '{0}': instance has more than one network interface")]
    InvalidInstanceId(String),

    /// Bare public IP does not belong to the caller in this mode
    #[error("The address '{0}' does not belong to you")]
    AddressNotOwned(String),

    /// Previous disassociation is still routed; the caller should retry
    #[error("Address still disassociating: {0}")]
    AddressStillDisassociating(String),

    /// Release attempted while the address is associated
    #[error("Address {0} is in use")]
    InvalidIpAddressInUse(String),

    /// Address store errors
    #[error("Address store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Controller or probe specific error, propagated uninterpreted
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Component name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of [`Error`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected before any external call
    Validation,
    /// Allocation quota exhausted
    QuotaExceeded,
    /// Referenced object does not exist (locally or upstream)
    NotFound,
    /// Conflicting association or ambiguous target
    Conflict,
    /// Transient state; retrying later may succeed
    RetryAfter,
    /// Operation blocked by a dependent resource
    DependencyViolation,
    /// Controller, probe or transport failure
    External,
    /// Local failure (store, configuration, serialization)
    Internal,
}

impl Error {
    /// Create a missing parameter error
    pub fn missing_parameter(msg: impl Into<String>) -> Self {
        Self::MissingParameter(msg.into())
    }

    /// Create an invalid parameter combination error
    pub fn invalid_combination(msg: impl Into<String>) -> Self {
        Self::InvalidParameterCombination(msg.into())
    }

    /// Create an invalid parameter value error
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidParameterValue(msg.into())
    }

    /// Create a raw quota error (controller clients)
    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        Self::QuotaExceeded(msg.into())
    }

    /// Create an allocation-not-found error
    pub fn allocation_not_found(id: impl Into<String>) -> Self {
        Self::AllocationNotFound(id.into())
    }

    /// Create an association-not-found error
    pub fn association_not_found(id: impl Into<String>) -> Self {
        Self::AssociationNotFound(id.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an already-associated conflict
    pub fn already_associated(msg: impl Into<String>) -> Self {
        Self::ResourceAlreadyAssociated(msg.into())
    }

    /// Create a still-disassociating error
    pub fn still_disassociating(msg: impl Into<String>) -> Self {
        Self::AddressStillDisassociating(msg.into())
    }

    /// Create an address store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingParameter(_)
            | Error::InvalidParameterCombination(_)
            | Error::InvalidParameterValue(_) => ErrorKind::Validation,
            Error::AddressLimitExceeded | Error::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            Error::AllocationNotFound(_) | Error::AssociationNotFound(_) | Error::NotFound(_) => {
                ErrorKind::NotFound
            }
            Error::ResourceAlreadyAssociated(_)
            | Error::InvalidInstanceId(_)
            | Error::AddressNotOwned(_) => ErrorKind::Conflict,
            Error::AddressStillDisassociating(_) => ErrorKind::RetryAfter,
            Error::InvalidIpAddressInUse(_) => ErrorKind::DependencyViolation,
            Error::Http(_)
            | Error::Authentication(_)
            | Error::RateLimited(_)
            | Error::Provider { .. } => ErrorKind::External,
            Error::Store(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error reports a missing object
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::AddressStillDisassociating(_) | Error::RateLimited(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
