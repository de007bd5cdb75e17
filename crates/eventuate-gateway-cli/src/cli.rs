use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "eventuate-gateway")]
#[command(about = "Provision Eventuate AWS gateways for serverless functions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Service manifest declaring functions and their gateways
    #[arg(
        short,
        long,
        global = true,
        env = "EVENTUATE_GATEWAY_MANIFEST",
        default_value = "serverless.yml"
    )]
    pub manifest: PathBuf,

    /// Settings file (defaults to ./eventuate-gateway.toml, then ~/.eventuate-gateway/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Deployment stage (overrides provider.stage of the manifest)
    #[arg(short, long, global = true)]
    pub stage: Option<String>,

    /// Deployment region (overrides provider.region of the manifest)
    #[arg(short, long, global = true)]
    pub region: Option<String>,

    /// Saved `aws cloudformation describe-stacks` output of the deployed stack
    #[arg(long, global = true)]
    pub outputs: Option<PathBuf>,

    /// Gateway API base URL (overrides settings)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Output format
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update the gateway of every function (run after deploying the service)
    Deploy,
    /// Delete the gateway of every function (run when removing the service)
    Remove,
    /// View Eventuate AWS Gateway configuration
    Info(GatewayArgs),
    /// Enable Eventuate AWS Gateway
    Enable(GatewayArgs),
    /// Disable Eventuate AWS Gateway
    Disable(GatewayArgs),
    /// Delete Eventuate AWS Gateway
    Delete(GatewayArgs),
}

#[derive(clap::Args)]
pub struct GatewayArgs {
    /// The Eventuate AWS Gateway ID
    #[arg(long = "gatewayId", visible_alias = "gateway-id")]
    pub gateway_id: Option<String>,
    /// Function name
    #[arg(short = 'f', long = "functionName", visible_alias = "function-name")]
    pub function_name: Option<String>,
    /// The Eventuate AWS Gateway Space
    #[arg(long, default_value = "default")]
    pub space: String,
}
