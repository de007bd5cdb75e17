use thiserror::Error;

/// Environment variables holding the Eventuate API key pair.
pub const API_KEY_ID_ENV: &str = "EVENTUATE_API_KEY_ID";
pub const API_KEY_SECRET_ENV: &str = "EVENTUATE_API_KEY_SECRET";

/// Classified failures of the gateway reconciliation engine.
///
/// Remote failures are classified once, at the HTTP boundary in
/// [`crate::client::HttpGatewayClient`]. Everything upstream matches on the
/// variant and never looks at status codes again.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(
        "401 Unauthorized: set valid Eventuate credentials using env variables EVENTUATE_API_KEY_ID, EVENTUATE_API_KEY_SECRET"
    )]
    Unauthorized,

    #[error("Eventuate gateway not found: {space}/{gateway_id}")]
    NotFound { space: String, gateway_id: String },

    #[error("Eventuate gateway already exists: {space}/{gateway_id}")]
    Conflict { space: String, gateway_id: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No ARN for function {0}, perhaps not deployed")]
    NotDeployed(String),

    #[error("Gateway API request failed{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },

    #[error("Failed to decode gateway response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{} of {total} gateway operations failed: {}", .failed.len(), .failed.join(", "))]
    BatchFailed { failed: Vec<String>, total: usize },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl GatewayError {
    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(space: impl Into<String>, gateway_id: impl Into<String>) -> Self {
        Self::NotFound {
            space: space.into(),
            gateway_id: gateway_id.into(),
        }
    }

    pub fn conflict(space: impl Into<String>, gateway_id: impl Into<String>) -> Self {
        Self::Conflict {
            space: space.into(),
            gateway_id: gateway_id.into(),
        }
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Local precondition failures, raised before any network call.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::NotDeployed(_))
    }

    /// The HTTP status this error was classified from, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::Transport { status, .. } => *status,
            Self::Configuration(_)
            | Self::NotDeployed(_)
            | Self::Decode(_)
            | Self::BatchFailed { .. } => None,
        }
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
