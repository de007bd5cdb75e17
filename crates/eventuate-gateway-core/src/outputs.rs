//! Deployed-infrastructure metadata: stack outputs of a deployed service.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_cloudformation::error::DisplayErrorContext;
use serde::Deserialize;

use crate::aws::AwsConnection;
use crate::error::{GatewayError, Result};

/// Identifies one deployment of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub service: String,
    pub stage: String,
    pub region: String,
}

impl Deployment {
    pub fn new(
        service: impl Into<String>,
        stage: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            stage: stage.into(),
            region: region.into(),
        }
    }

    /// Stack name following the `<service>-<stage>` convention.
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.service, self.stage)
    }
}

/// Source of stack outputs (output key to output value).
#[async_trait]
pub trait StackOutputs: Send + Sync {
    async fn outputs(&self, deployment: &Deployment) -> Result<HashMap<String, String>>;
}

/// Fixed outputs, independent of the deployment.
#[derive(Debug, Clone, Default)]
pub struct StaticOutputs {
    outputs: HashMap<String, String>,
}

impl StaticOutputs {
    pub fn new(outputs: HashMap<String, String>) -> Self {
        Self { outputs }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl StackOutputs for StaticOutputs {
    async fn outputs(&self, _deployment: &Deployment) -> Result<HashMap<String, String>> {
        Ok(self.outputs.clone())
    }
}

/// Outputs of the deployed stack, fetched with CloudFormation `DescribeStacks`
/// in the deployment's region.
#[derive(Debug, Clone, Default)]
pub struct CloudFormationOutputs {
    connection: AwsConnection,
}

impl CloudFormationOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(connection: AwsConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl StackOutputs for CloudFormationOutputs {
    async fn outputs(&self, deployment: &Deployment) -> Result<HashMap<String, String>> {
        let config = self.connection.load(&deployment.region).await;
        let client = aws_sdk_cloudformation::Client::new(&config);
        let stack_name = deployment.stack_name();

        let response = client
            .describe_stacks()
            .stack_name(&stack_name)
            .send()
            .await
            .map_err(|e| {
                GatewayError::configuration(format!(
                    "Failed to describe stack \"{stack_name}\" in {}: {}",
                    deployment.region,
                    DisplayErrorContext(&e)
                ))
            })?;

        let Some(stack) = response.stacks().first() else {
            return Err(GatewayError::configuration(format!(
                "Stack \"{stack_name}\" not found in {}, perhaps not deployed",
                deployment.region
            )));
        };

        let outputs: HashMap<String, String> = stack
            .outputs()
            .iter()
            .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
            .collect();
        tracing::debug!(
            stack = %stack_name,
            region = %deployment.region,
            outputs = outputs.len(),
            "Fetched stack outputs"
        );
        Ok(outputs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksDocument {
    #[serde(default)]
    stacks: Vec<StackDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackDescription {
    #[serde(default)]
    stack_name: Option<String>,
    #[serde(default)]
    outputs: Vec<StackOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackOutput {
    output_key: String,
    output_value: String,
}

/// Outputs read from a saved `aws cloudformation describe-stacks` JSON document,
/// used instead of querying CloudFormation.
#[derive(Debug, Clone)]
pub struct DescribeStacksFile {
    path: PathBuf,
}

impl DescribeStacksFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StackOutputs for DescribeStacksFile {
    async fn outputs(&self, deployment: &Deployment) -> Result<HashMap<String, String>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            GatewayError::configuration(format!(
                "Failed to read stack outputs from {}: {e}",
                self.path.display()
            ))
        })?;
        parse_describe_stacks(&content, &deployment.stack_name())
    }
}

/// Extracts the outputs of `stack_name`, or of the first stack when no
/// stack carries that name.
pub fn parse_describe_stacks(content: &str, stack_name: &str) -> Result<HashMap<String, String>> {
    let document: DescribeStacksDocument = serde_json::from_str(content)?;
    let mut stacks = document.stacks;

    let index = stacks
        .iter()
        .position(|s| s.stack_name.as_deref() == Some(stack_name))
        .unwrap_or(0);

    if stacks.is_empty() {
        return Err(GatewayError::configuration(format!(
            "Stack \"{stack_name}\" has no outputs, perhaps not deployed"
        )));
    }

    let stack = stacks.swap_remove(index);
    tracing::debug!(
        stack = stack.stack_name.as_deref().unwrap_or("-"),
        outputs = stack.outputs.len(),
        "Loaded stack outputs"
    );

    Ok(stack
        .outputs
        .into_iter()
        .map(|o| (o.output_key, o.output_value))
        .collect())
}
