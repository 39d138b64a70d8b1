//! Error types for the XSI monitor

use thiserror::Error;

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while setting up or running a monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A handler failed while processing one event
    #[error("Dispatch fault for {event_type}: {message}")]
    Dispatch { event_type: String, message: String },

    /// Channel open or subscribe failed
    #[error("Subscription fault: {message}")]
    Subscription { message: String },

    /// Credential missing, invalid or expired
    #[error("Credential fault: {message}")]
    Credential { message: String },

    /// The event queue has no producers left
    #[error("Event channel closed")]
    ChannelClosed,

    /// A call-control action (reject, transfer) failed
    #[error("Call control failed for call {call_id}: {message}")]
    CallControl { call_id: String, message: String },

    /// Capability not wired in this deployment
    #[error("Feature not implemented: {feature}")]
    NotImplemented { feature: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl MonitorError {
    /// Create a dispatch error
    pub fn dispatch(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            event_type: event_type.into(),
            message: message.into(),
        }
    }

    /// Create a subscription error
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription {
            message: message.into(),
        }
    }

    /// Create a credential error
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Create a call-control error
    pub fn call_control(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallControl {
            call_id: call_id.into(),
            message: message.into(),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Why an envelope could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationFault {
    /// The envelope root is not a map
    #[error("envelope root is {found}, expected an object")]
    NotAnObject { found: &'static str },

    /// A value on the canonical path had the wrong type
    #[error("'{path}' is {found}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}
