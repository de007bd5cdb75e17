//! AWS SDK configuration shared by the stack-outputs reader and the host
//! credential lookup.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_cloudformation::config::Credentials;

use crate::types::AwsCredentials;

/// How SDK clients reach AWS. The default uses the regular endpoints and
/// the host's credential chain.
#[derive(Debug, Clone, Default)]
pub struct AwsConnection {
    pub endpoint_url: Option<String>,
    pub static_credentials: Option<AwsCredentials>,
}

impl AwsConnection {
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_static_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.static_credentials = Some(credentials);
        self
    }

    /// Loads the shared SDK configuration for `region`.
    pub async fn load(&self, region: &str) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        if let Some(credentials) = &self.static_credentials {
            loader = loader.credentials_provider(Credentials::new(
                credentials.access_key.clone(),
                credentials.secret_key.clone(),
                None,
                None,
                "eventuate-gateway",
            ));
        }
        loader.load().await
    }
}

/// Credentials of the host's default AWS credential chain, the same the
/// deploying tool uses. `None` when the chain yields nothing usable.
pub async fn host_credentials(region: &str) -> Option<AwsCredentials> {
    let config = AwsConnection::default().load(region).await;
    credentials_from(&config).await
}

pub(crate) async fn credentials_from(config: &SdkConfig) -> Option<AwsCredentials> {
    let provider = config.credentials_provider()?;
    match provider.provide_credentials().await {
        Ok(credentials) => {
            let resolved =
                AwsCredentials::new(credentials.access_key_id(), credentials.secret_access_key());
            resolved.is_complete().then_some(resolved)
        }
        Err(e) => {
            tracing::debug!(error = %e, "AWS credential chain returned no credentials");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::provider::SharedCredentialsProvider;

    #[tokio::test]
    async fn test_credentials_from_provider() {
        let config = SdkConfig::builder()
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                "AKIAPROFILE",
                "profile-secret",
                Some("session".to_string()),
                None,
                "profile",
            )))
            .build();

        let credentials = credentials_from(&config).await.expect("credentials");
        assert_eq!(credentials.access_key, "AKIAPROFILE");
        assert_eq!(credentials.secret_key, "profile-secret");
    }

    #[tokio::test]
    async fn test_no_provider_yields_none() {
        let config = SdkConfig::builder().build();
        assert!(credentials_from(&config).await.is_none());
    }

    #[tokio::test]
    async fn test_static_credentials_are_used() {
        let config = AwsConnection::default()
            .with_static_credentials(AwsCredentials::new("AKIA", "secret"))
            .load("eu-west-1")
            .await;

        assert_eq!(config.region().map(|r| r.to_string()), Some("eu-west-1".to_string()));
        let credentials = credentials_from(&config).await.expect("credentials");
        assert_eq!(credentials, AwsCredentials::new("AKIA", "secret"));
    }
}
