//! Error types for the advice gateway.

use std::fmt;

use thiserror::Error;

/// Result type alias using the gateway's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// External collaborator a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamService {
    /// Permission directory (profiles and agent grants).
    PermissionDirectory,
    /// External advice-generation service.
    AdviceService,
    /// LLM text enhancement step.
    Enhancement,
}

impl UpstreamService {
    /// Stable label used in logs, metrics and error details.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDirectory => "permission_directory",
            Self::AdviceService => "advice_service",
            Self::Enhancement => "enhancement",
        }
    }
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for the advice gateway.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    #[error("{service} error: {message}")]
    Upstream {
        service: UpstreamService,
        /// HTTP status returned by the collaborator, `None` for transport failures.
        status: Option<u16>,
        message: String,
    },

    #[error("{service} timed out: {message}")]
    Timeout {
        service: UpstreamService,
        message: String,
    },

    #[error("Model provider error: {0}")]
    ModelProvider(String),

    // =========================================================================
    // Service Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Governance error: {0}")]
    Governance(String),
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an upstream error carrying the collaborator's HTTP status.
    pub fn upstream_status(service: UpstreamService, status: u16, msg: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status: Some(status),
            message: msg.into(),
        }
    }

    /// Create an upstream transport or decoding error.
    pub fn upstream(service: UpstreamService, msg: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status: None,
            message: msg.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(service: UpstreamService, msg: impl Into<String>) -> Self {
        Self::Timeout {
            service,
            message: msg.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a gateway error.
    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    /// Create a governance error.
    pub fn governance(msg: impl Into<String>) -> Self {
        Self::Governance(msg.into())
    }

    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether a single retry may succeed: timeouts, transport failures and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Upstream { status: None, .. } => true,
            Self::Upstream { status: Some(s), .. } => *s >= 500,
            _ => false,
        }
    }

    /// Collaborator the error came from, if any.
    pub fn service(&self) -> Option<UpstreamService> {
        match self {
            Self::Upstream { service, .. } | Self::Timeout { service, .. } => Some(*service),
            Self::ModelProvider(_) => Some(UpstreamService::Enhancement),
            _ => None,
        }
    }

    /// HTTP status returned by the collaborator, if any.
    pub fn upstream_http_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}
