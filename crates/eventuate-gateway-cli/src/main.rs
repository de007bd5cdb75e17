mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::Context;
use output::print_error;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::load(&cli)?;
    observability::init_tracing_with_level(ctx.settings.log_level());

    match &cli.command {
        Commands::Deploy => commands::lifecycle::deploy(&ctx).await?,
        Commands::Remove => commands::lifecycle::remove(&ctx).await?,
        Commands::Info(args) => commands::gateway::info(&ctx, args).await?,
        Commands::Enable(args) => commands::gateway::set_state(&ctx, args, true).await?,
        Commands::Disable(args) => commands::gateway::set_state(&ctx, args, false).await?,
        Commands::Delete(args) => commands::gateway::delete(&ctx, args).await?,
    }

    Ok(())
}
