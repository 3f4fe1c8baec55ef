//! Error types for AWS store clients

use cloudtable_core::StoreError;
use thiserror::Error;

/// Errors from building an AWS store client
#[derive(Debug, Error)]
pub enum AwsStoreError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Neither the SDK config nor the store config names a region
    #[error("Missing AWS region configuration")]
    MissingRegion,
}

impl AwsStoreError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type for AWS store construction
pub type Result<T> = std::result::Result<T, AwsStoreError>;

impl From<AwsStoreError> for StoreError {
    fn from(err: AwsStoreError) -> Self {
        match err {
            AwsStoreError::InvalidConfig(_) | AwsStoreError::MissingRegion => {
                StoreError::rejected(err.to_string())
            }
        }
    }
}

/// Map an AWS error code and HTTP status onto a [`StoreError`]
///
/// Throttling, server-side failures and in-flight conflicts are transient;
/// credential problems are `Unauthorized`; anything else the service refused
/// is `Rejected`.
pub fn classify_service_error(code: Option<&str>, status: u16, message: String) -> StoreError {
    match code {
        Some("ResourceNotFoundException") => StoreError::not_found(message),
        Some(
            "AccessDeniedException"
            | "UnrecognizedClientException"
            | "InvalidSignatureException"
            | "IncompleteSignature"
            | "MissingAuthenticationTokenException"
            | "ExpiredTokenException",
        ) => StoreError::unauthorized(message),
        Some(
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded"
            | "LimitExceededException"
            | "TransactionInProgressException"
            | "TransactionConflictException"
            | "ResourceInUseException"
            | "InternalServerError"
            | "ServiceUnavailable",
        ) => StoreError::unavailable(message),
        _ => match status {
            401 | 403 => StoreError::unauthorized(message),
            429 | 500 | 502 | 503 | 504 => StoreError::unavailable(message),
            _ => StoreError::rejected(message),
        },
    }
}

/// Map the per-item reasons of a cancelled transaction onto a [`StoreError`]
///
/// A transaction cancelled only because of conflicts or throttling may succeed
/// on retry; a failed condition or validation error will not.
pub fn classify_cancellation<'a>(
    reasons: impl IntoIterator<Item = Option<&'a str>>,
    message: String,
) -> StoreError {
    let mut transient = false;
    for code in reasons.into_iter().flatten() {
        match code {
            "None" => {}
            "TransactionConflict" | "ThrottlingError" | "ProvisionedThroughputExceeded" => {
                transient = true;
            }
            _ => return StoreError::rejected(message),
        }
    }
    if transient {
        StoreError::unavailable(message)
    } else {
        StoreError::rejected(message)
    }
}
