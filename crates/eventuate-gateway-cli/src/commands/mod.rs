pub mod gateway;
pub mod lifecycle;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use eventuate_gateway_core::{
    AddressBook, ApiAuth, CloudFormationOutputs, Deployment, DescribeStacksFile,
    HttpGatewayClient, IdentityResolver, Reconciler, ServiceManifest, StackOutputs,
};

use crate::cli::{Cli, OutputFormat};
use crate::config::{GatewaySettings, loader};

/// Everything a command needs, resolved once from flags, manifest and settings.
pub struct Context {
    pub manifest_path: PathBuf,
    pub manifest: Option<ServiceManifest>,
    pub settings: GatewaySettings,
    pub deployment: Option<Deployment>,
    pub format: OutputFormat,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let manifest = if cli.manifest.exists() {
            Some(ServiceManifest::from_path(&cli.manifest)?)
        } else {
            None
        };

        let custom = manifest
            .as_ref()
            .map(|m| m.custom().clone())
            .unwrap_or_default();
        let mut settings =
            loader::load_settings(cli.config.as_deref(), &custom).map_err(anyhow::Error::msg)?;
        if let Some(url) = &cli.url {
            settings.url = url.clone();
        }
        if let Some(outputs) = &cli.outputs {
            settings.outputs_file = Some(outputs.clone());
        }
        settings.validate().map_err(anyhow::Error::msg)?;

        let deployment = manifest
            .as_ref()
            .map(|m| m.deployment(cli.stage.as_deref(), cli.region.as_deref()));

        Ok(Self {
            manifest_path: cli.manifest.clone(),
            manifest,
            settings,
            deployment,
            format: cli.format.unwrap_or_default(),
        })
    }

    pub fn manifest(&self) -> Result<&ServiceManifest> {
        self.manifest.as_ref().with_context(|| {
            format!(
                "Service manifest not found: {}",
                self.manifest_path.display()
            )
        })
    }

    pub fn reconciler(&self) -> Result<Reconciler> {
        let auth = ApiAuth::resolve(self.settings.jwt_token.as_deref())?;
        let client = HttpGatewayClient::new(&self.settings.url, auth)?;
        tracing::debug!(url = %self.settings.url, "Using Eventuate gateway API");
        Ok(Reconciler::new(Arc::new(client)))
    }

    /// Resolver over the saved outputs file when one is configured, else
    /// over the live stack in the deployment's region.
    pub fn resolver(&self) -> Result<IdentityResolver> {
        let deployment = self.deployment()?.clone();
        let outputs: Arc<dyn StackOutputs> = match &self.settings.outputs_file {
            Some(path) => Arc::new(DescribeStacksFile::new(path)),
            None => Arc::new(CloudFormationOutputs::new()),
        };
        Ok(IdentityResolver::new(outputs, deployment))
    }

    pub fn deployment(&self) -> Result<&Deployment> {
        self.manifest()?;
        self.deployment
            .as_ref()
            .context("Deployment could not be determined from the manifest")
    }

    pub async fn address_book(&self) -> Result<Arc<AddressBook>> {
        Ok(self.resolver()?.address_book().await?)
    }
}
