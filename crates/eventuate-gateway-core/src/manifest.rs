//! Service manifest: the desired gateway declarations of each function.
//!
//! The manifest is a serverless-style YAML document. A function declares a
//! gateway through an `eventuate` entry in its `events` list:
//!
//! ```yaml
//! functions:
//!   eventHandlerLambda:
//!     handler: index.handler
//!     events:
//!       - eventuate:
//!           subscriberId: moneytransfergateway
//!           space: test
//!           entitiesAndEventTypes:
//!             net.chrisrichardson.eventstore.TestEntity:
//!               - net.chrisrichardson.eventstore.TestEntityCreated
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{GatewayError, Result};
use crate::identity::FunctionAddress;
use crate::outputs::Deployment;
use crate::types::{
    AwsCredentials, AwsDestination, Dlq, EntitiesAndEventTypes, GatewayConfig,
    GatewayDestination, Space,
};

const EVENTUATE_EVENT: &str = "eventuate";
const DEFAULT_STAGE: &str = "dev";
const DEFAULT_REGION: &str = "us-east-1";

/// AWS credentials declared on a function, in the host tool's naming.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredAwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for DeclaredAwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclaredAwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Gateway declaration attached to one function.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredGateway {
    pub subscriber_id: String,
    #[serde(default)]
    pub space: Option<String>,
    pub entities_and_event_types: EntitiesAndEventTypes,
    /// Dead-letter queue URL.
    #[serde(default)]
    pub dlq: Option<String>,
    #[serde(default)]
    pub aws_credentials: Option<DeclaredAwsCredentials>,
}

impl DeclaredGateway {
    pub fn space(&self) -> Space {
        Space::from(self.space.clone())
    }

    /// Builds the desired configuration for the function deployed at `address`.
    ///
    /// Declared credentials win over `fallback`; having neither is a
    /// configuration error.
    pub fn to_gateway_config(
        &self,
        function_name: &str,
        address: &FunctionAddress,
        fallback: Option<&AwsCredentials>,
    ) -> Result<GatewayConfig> {
        let credentials = match &self.aws_credentials {
            Some(declared) => AwsCredentials::new(
                declared.access_key_id.clone(),
                declared.secret_access_key.clone(),
            ),
            None => fallback.cloned().unwrap_or_else(|| AwsCredentials::new("", "")),
        };
        if !credentials.is_complete() {
            return Err(GatewayError::configuration(format!(
                "AWS credentials not found for the function \"{function_name}\""
            )));
        }

        Ok(GatewayConfig {
            subscriber_id: self.subscriber_id.clone(),
            space: self.space(),
            entities_and_event_types: self.entities_and_event_types.clone(),
            gateway_destination: GatewayDestination::Aws(AwsDestination {
                connection_string: address.as_str().to_string(),
                credentials,
                dlq: self.dlq.clone().map(|url| Dlq { url }),
            }),
        })
    }
}

/// Gateway settings carried in the manifest `custom` block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCustom {
    #[serde(default)]
    pub eventuate_gateway_url: Option<String>,
    #[serde(default)]
    pub eventuate_gateway_jwt_token: Option<String>,
    #[serde(default)]
    pub eventuate_gateway_debug: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ServiceName {
    Plain(String),
    Named { name: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProviderSection {
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FunctionSection {
    #[serde(default)]
    events: Vec<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    service: ServiceName,
    #[serde(default)]
    provider: ProviderSection,
    #[serde(default)]
    custom: Option<ManifestCustom>,
    #[serde(default)]
    functions: Option<IndexMap<String, Option<FunctionSection>>>,
}

/// Parsed service manifest.
#[derive(Debug, Clone)]
pub struct ServiceManifest {
    service: String,
    stage: String,
    region: String,
    custom: ManifestCustom,
    functions: IndexMap<String, Option<DeclaredGateway>>,
}

impl ServiceManifest {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawManifest = serde_yaml::from_str(content)
            .map_err(|e| GatewayError::configuration(format!("Invalid service manifest: {e}")))?;

        let service = match raw.service {
            ServiceName::Plain(name) | ServiceName::Named { name } => name,
        };

        let mut functions = IndexMap::new();
        for (name, section) in raw.functions.unwrap_or_default() {
            let gateway = match section {
                Some(section) => declared_gateway(&name, &section.events)?,
                None => None,
            };
            functions.insert(name, gateway);
        }

        Ok(Self {
            service,
            stage: raw.provider.stage.unwrap_or_else(|| DEFAULT_STAGE.to_string()),
            region: raw.provider.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            custom: raw.custom.unwrap_or_default(),
            functions,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::configuration(format!(
                "Failed to read service manifest {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn custom(&self) -> &ManifestCustom {
        &self.custom
    }

    /// Deployment of this service, with optional stage/region overrides.
    pub fn deployment(&self, stage: Option<&str>, region: Option<&str>) -> Deployment {
        Deployment::new(
            self.service.clone(),
            stage.unwrap_or(self.stage.as_str()),
            region.unwrap_or(self.region.as_str()),
        )
    }

    /// Function names in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Gateway declared by `function_name`, if any.
    pub fn declared_gateway(&self, function_name: &str) -> Option<&DeclaredGateway> {
        self.functions.get(function_name).and_then(Option::as_ref)
    }

    /// Every function that declares a gateway, in declaration order.
    pub fn declared_gateways(&self) -> impl Iterator<Item = (&str, &DeclaredGateway)> {
        self.functions
            .iter()
            .filter_map(|(name, gw)| gw.as_ref().map(|gw| (name.as_str(), gw)))
    }
}

/// The last `eventuate` entry whose value is a mapping wins.
fn declared_gateway(function_name: &str, events: &[serde_yaml::Value]) -> Result<Option<DeclaredGateway>> {
    let Some(value) = events
        .iter()
        .filter_map(|event| event.get(EVENTUATE_EVENT))
        .filter(|value| value.is_mapping())
        .last()
    else {
        return Ok(None);
    };

    serde_yaml::from_value(value.clone()).map(Some).map_err(|e| {
        GatewayError::configuration(format!(
            "Invalid eventuate configuration for function \"{function_name}\": {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
service: lambda-test-function

provider:
  name: aws
  runtime: nodejs6.10
  stage: dev
  region: us-west-1

custom:
  eventuateGatewayUrl: https://gateway.example.com
  eventuateGatewayDebug: true

functions:
  eventHandlerLambda:
    handler: index.handler
    events:
      - http: GET hello
      - eventuate:
          subscriberId: moneytransfergateway
          space: test
          dlq: https://sqs.us-west-1.amazonaws.com/0123456789/dlq
          entitiesAndEventTypes:
            net.chrisrichardson.eventstore.TestEntity:
              - net.chrisrichardson.eventstore.TestEntityCreated
  plainLambda:
    handler: plain.handler
  credentialedLambda:
    handler: cred.handler
    events:
      - eventuate: disabled
      - eventuate:
          subscriberId: credentialed
          entitiesAndEventTypes:
            Account:
              - AccountOpened
          awsCredentials:
            accessKeyId: AKIADECLARED
            secretAccessKey: declared-secret
"#;

    fn address() -> FunctionAddress {
        FunctionAddress::from_qualified_arn(
            "arn:aws:lambda:us-west-1:0123456789:function:lambda-test-function-dev-eventHandlerLambda",
        )
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
        assert_eq!(manifest.service(), "lambda-test-function");
        assert_eq!(manifest.stage(), "dev");
        assert_eq!(manifest.region(), "us-west-1");
        assert_eq!(
            manifest.custom().eventuate_gateway_url.as_deref(),
            Some("https://gateway.example.com")
        );
        assert_eq!(manifest.custom().eventuate_gateway_debug, Some(true));
        assert_eq!(
            manifest.functions().collect::<Vec<_>>(),
            vec!["eventHandlerLambda", "plainLambda", "credentialedLambda"]
        );
    }

    #[test]
    fn test_declared_gateways() {
        let manifest = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
        assert!(manifest.declared_gateway("plainLambda").is_none());
        assert!(manifest.has_function("plainLambda"));

        let gw = manifest.declared_gateway("eventHandlerLambda").unwrap();
        assert_eq!(gw.subscriber_id, "moneytransfergateway");
        assert_eq!(gw.space().as_str(), "test");

        let cred = manifest.declared_gateway("credentialedLambda").unwrap();
        assert_eq!(cred.space(), Space::default());

        let names: Vec<&str> = manifest.declared_gateways().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["eventHandlerLambda", "credentialedLambda"]);
    }

    #[test]
    fn test_gateway_config_with_fallback_credentials() {
        let manifest = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
        let gw = manifest.declared_gateway("eventHandlerLambda").unwrap();
        let fallback = AwsCredentials::new("AKIAHOST", "host-secret");

        let config = gw
            .to_gateway_config("eventHandlerLambda", &address(), Some(&fallback))
            .unwrap();
        let GatewayDestination::Aws(dest) = &config.gateway_destination;
        assert_eq!(dest.connection_string, address().as_str());
        assert_eq!(dest.credentials, fallback);
        assert_eq!(
            dest.dlq.as_ref().map(|d| d.url.as_str()),
            Some("https://sqs.us-west-1.amazonaws.com/0123456789/dlq")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_declared_credentials_win() {
        let manifest = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
        let gw = manifest.declared_gateway("credentialedLambda").unwrap();
        let fallback = AwsCredentials::new("AKIAHOST", "host-secret");

        let config = gw
            .to_gateway_config("credentialedLambda", &address(), Some(&fallback))
            .unwrap();
        assert_eq!(
            config.gateway_destination.credentials(),
            &AwsCredentials::new("AKIADECLARED", "declared-secret")
        );
    }

    #[test]
    fn test_missing_credentials() {
        let manifest = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
        let gw = manifest.declared_gateway("eventHandlerLambda").unwrap();
        let err = gw
            .to_gateway_config("eventHandlerLambda", &address(), None)
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("eventHandlerLambda"));
    }

    #[test]
    fn test_invalid_declaration_is_configuration_error() {
        let manifest = r#"
service: { name: svc }
functions:
  broken:
    events:
      - eventuate:
          space: test
"#;
        let err = ServiceManifest::from_yaml_str(manifest).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_defaults_and_deployment_overrides() {
        let manifest = ServiceManifest::from_yaml_str("service:\n  name: svc\n").unwrap();
        assert_eq!(manifest.stage(), "dev");
        assert_eq!(manifest.region(), "us-east-1");
        assert_eq!(manifest.functions().count(), 0);

        let deployment = manifest.deployment(Some("prod"), None);
        assert_eq!(deployment.stack_name(), "svc-prod");
        assert_eq!(deployment.region, "us-east-1");
    }
}
