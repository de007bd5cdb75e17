//! Gateway configuration types exchanged with the Eventuate gateway API.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

/// Space used when neither the declaration nor the operator names one.
pub const DEFAULT_SPACE: &str = "default";

/// Gateway type for AWS Lambda destinations.
pub const AWS_GATEWAY_TYPE: &str = "AWS";

/// Entity type name mapped to the event types routed for it.
///
/// Event type order carries no meaning; see [`crate::diff`].
pub type EntitiesAndEventTypes = BTreeMap<String, Vec<String>>;

/// Logical namespace partitioning gateway identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Space(String);

impl Space {
    /// Creates a space, falling back to `"default"` for an empty name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            Self::default()
        } else {
            Self(name)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Space {
    fn default() -> Self {
        Self(DEFAULT_SPACE.to_string())
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Option<String>> for Space {
    fn from(value: Option<String>) -> Self {
        value.map(Space::new).unwrap_or_default()
    }
}

/// AWS credentials the gateway uses to invoke the destination function.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl AwsCredentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.access_key.trim().is_empty() && !self.secret_key.trim().is_empty()
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// Dead-letter queue for events the destination could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dlq {
    pub url: String,
}

/// AWS Lambda destination of a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsDestination {
    /// Deployed function address (unqualified ARN).
    pub connection_string: String,
    pub credentials: AwsCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dlq: Option<Dlq>,
}

/// Where a gateway forwards events, tagged by `gatewayType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gatewayType")]
pub enum GatewayDestination {
    #[serde(rename = "AWS")]
    Aws(AwsDestination),
}

impl GatewayDestination {
    pub fn gateway_type(&self) -> &'static str {
        match self {
            Self::Aws(_) => AWS_GATEWAY_TYPE,
        }
    }

    pub fn connection_string(&self) -> &str {
        match self {
            Self::Aws(dest) => &dest.connection_string,
        }
    }

    pub fn dlq(&self) -> Option<&Dlq> {
        match self {
            Self::Aws(dest) => dest.dlq.as_ref(),
        }
    }

    pub fn credentials(&self) -> &AwsCredentials {
        match self {
            Self::Aws(dest) => &dest.credentials,
        }
    }
}

/// Desired gateway configuration, built fresh for every reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    pub subscriber_id: String,
    #[serde(default)]
    pub space: Space,
    pub entities_and_event_types: EntitiesAndEventTypes,
    pub gateway_destination: GatewayDestination,
}

impl GatewayConfig {
    /// Checks the local invariants that must hold before any create or update call.
    pub fn validate(&self) -> Result<()> {
        if !self.gateway_destination.credentials().is_complete() {
            return Err(GatewayError::configuration(format!(
                "gatewayDestination.credentials for subscriber \"{}\" must have non-empty accessKey and secretKey",
                self.subscriber_id
            )));
        }
        if self
            .entities_and_event_types
            .keys()
            .any(|entity| entity.trim().is_empty())
        {
            return Err(GatewayError::configuration(format!(
                "entitiesAndEventTypes for subscriber \"{}\" contains an empty entity type",
                self.subscriber_id
            )));
        }
        Ok(())
    }
}

/// Destination as reported by the remote API.
///
/// Fields outside the canonical shape land in `extra` and never take part
/// in change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDestination {
    pub gateway_type: String,
    pub connection_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dlq: Option<Dlq>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Gateway as currently stored by the remote API.
///
/// `entitiesAndEventTypes` is required: a response without it fails to
/// decode instead of being compared as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayState {
    pub subscriber_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    pub entities_and_event_types: EntitiesAndEventTypes,
    pub gateway_destination: RemoteDestination,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Acknowledgement of a mutating call, carrying the raw response body.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Ack {
    pub body: Value,
}
