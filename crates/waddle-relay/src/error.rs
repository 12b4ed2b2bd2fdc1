//! Error types for stanza delivery.
//!
//! Delivery errors are propagation signals rather than user-visible faults.
//! Per-target failures are collected into a [`DeliveryResult`](crate::DeliveryResult)
//! and handed to a failure strategy, which decides what the sender sees.

use std::sync::Arc;

use thiserror::Error;

/// Reason a stanza could not be (fully) delivered.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// The addressed account does not exist on this server.
    #[error("No such local user")]
    NoSuchLocalUser,

    /// The account exists but has no session and no offline receiver is configured.
    #[error("Local recipient offline")]
    LocalRecipientOffline,

    /// The stanza was handed to the offline receiver.
    ///
    /// Not a failure: it tells the relay engine not to persist the stanza a
    /// second time.
    #[error("Delivered to offline receiver")]
    DeliveredToOfflineReceiver,

    /// The routing target (engine, component, domain) is not available.
    #[error("Service not available: {0}")]
    ServiceNotAvailable(String),

    /// Any other failure, optionally wrapping its cause.
    #[error("Delivery failed: {reason}")]
    Failed {
        /// Description of the failure
        reason: String,
        /// Underlying error, if any
        #[source]
        cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },
}

impl DeliveryError {
    /// Create a new service-not-available error.
    pub fn service_not_available(msg: impl Into<String>) -> Self {
        Self::ServiceNotAvailable(msg.into())
    }

    /// Create a new generic delivery failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            cause: None,
        }
    }

    /// Wrap an underlying error as a generic delivery failure.
    pub fn wrap<E>(reason: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            reason: reason.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// The discriminant of this error.
    pub fn kind(&self) -> DeliveryErrorKind {
        match self {
            Self::NoSuchLocalUser => DeliveryErrorKind::NoSuchLocalUser,
            Self::LocalRecipientOffline => DeliveryErrorKind::LocalRecipientOffline,
            Self::DeliveredToOfflineReceiver => DeliveryErrorKind::DeliveredToOfflineReceiver,
            Self::ServiceNotAvailable(_) => DeliveryErrorKind::ServiceNotAvailable,
            Self::Failed { .. } => DeliveryErrorKind::Failed,
        }
    }

    /// Whether this error signals that the stanza already reached offline storage.
    pub fn is_delivered_offline(&self) -> bool {
        matches!(self, Self::DeliveredToOfflineReceiver)
    }
}

/// Discriminant of a [`DeliveryError`], used when matching at strategy boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryErrorKind {
    NoSuchLocalUser,
    LocalRecipientOffline,
    DeliveredToOfflineReceiver,
    ServiceNotAvailable,
    Failed,
}

impl DeliveryErrorKind {
    /// Label used in metrics and structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSuchLocalUser => "no-such-local-user",
            Self::LocalRecipientOffline => "local-recipient-offline",
            Self::DeliveredToOfflineReceiver => "delivered-to-offline-receiver",
            Self::ServiceNotAvailable => "service-not-available",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised while loading or validating relay configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// The configuration parsed but is not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The engine was constructed outside a Tokio runtime
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(DeliveryError::NoSuchLocalUser.kind(), DeliveryErrorKind::NoSuchLocalUser);
        assert_eq!(
            DeliveryError::service_not_available("x").kind(),
            DeliveryErrorKind::ServiceNotAvailable
        );
        assert_eq!(DeliveryError::failed("boom").kind(), DeliveryErrorKind::Failed);
        assert!(DeliveryError::DeliveredToOfflineReceiver.is_delivered_offline());
        assert!(!DeliveryError::LocalRecipientOffline.is_delivered_offline());
    }

    #[test]
    fn test_wrap_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = DeliveryError::wrap("offline store rejected stanza", io);

        assert_eq!(err.to_string(), "Delivery failed: offline store rejected stanza");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk gone"));
    }
}
