use anyhow::{Result, bail};
use colored::Colorize;
use eventuate_gateway_core::{Ack, AddressBook, GatewayError, GatewayId, Space};

use super::Context;
use crate::cli::{GatewayArgs, OutputFormat};
use crate::output::{
    FunctionRow, print_absent, print_function_list, print_gateway, print_json, print_success,
};

const MISSING_TARGET: &str = "Provide \"--gatewayId\" or \"--functionName\" parameter";

/// Gateway id named by `--functionName` (looked up in `book`) or `--gatewayId`.
///
/// The function name wins when both are given.
fn gateway_id_for(args: &GatewayArgs, book: Option<&AddressBook>) -> Result<Option<GatewayId>> {
    if let Some(function_name) = &args.function_name {
        return match book.map(|b| b.gateway_id(function_name)) {
            Some(Ok(id)) => Ok(Some(id)),
            _ => Err(GatewayError::configuration(format!(
                "Can't find \"gatewayId\" for function \"{function_name}\""
            ))
            .into()),
        };
    }
    Ok(args.gateway_id.clone().map(GatewayId::new))
}

async fn resolve_target(ctx: &Context, args: &GatewayArgs) -> Result<Option<GatewayId>> {
    if args.function_name.is_some() {
        let book = ctx.address_book().await?;
        gateway_id_for(args, Some(&*book))
    } else {
        gateway_id_for(args, None)
    }
}

async fn require_target(ctx: &Context, args: &GatewayArgs) -> Result<GatewayId> {
    match resolve_target(ctx, args).await? {
        Some(id) => Ok(id),
        None => bail!(MISSING_TARGET),
    }
}

fn print_ack(message: &str, ack: &Ack, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&ack.body),
        OutputFormat::Text => {
            print_success(message);
            if !ack.body.is_null() {
                println!("{}", serde_json::to_string(&ack.body)?);
            }
            Ok(())
        }
    }
}

pub async fn info(ctx: &Context, args: &GatewayArgs) -> Result<()> {
    let Some(gateway_id) = resolve_target(ctx, args).await? else {
        return list_functions(ctx).await;
    };
    let space = Space::new(args.space.as_str());
    match ctx.reconciler()?.describe(&gateway_id, &space).await? {
        Some(state) => print_gateway(&gateway_id, &space, &state, ctx.format),
        None => print_absent(&gateway_id, &space, ctx.format),
    }
}

/// Lists every function that declares a gateway.
async fn list_functions(ctx: &Context) -> Result<()> {
    let manifest = ctx.manifest()?;
    let book = match ctx.address_book().await {
        Ok(book) => Some(book),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "Function addresses unavailable");
            None
        }
    };
    let rows: Vec<FunctionRow<'_>> = manifest
        .declared_gateways()
        .map(|(function, declared)| FunctionRow {
            function,
            gateway_id: book.as_ref().and_then(|b| b.gateway_id(function).ok()),
            declared,
        })
        .collect();
    print_function_list(&rows, ctx.format)
}

pub async fn set_state(ctx: &Context, args: &GatewayArgs, enabled: bool) -> Result<()> {
    let gateway_id = require_target(ctx, args).await?;
    let space = Space::new(args.space.as_str());
    let ack = ctx
        .reconciler()?
        .set_state(&gateway_id, &space, enabled)
        .await?;
    let verb = if enabled { "Enabled" } else { "Disabled" };
    print_ack(
        &format!("{verb} gateway {} in space {}", gateway_id.as_str().cyan(), space),
        &ack,
        ctx.format,
    )
}

pub async fn delete(ctx: &Context, args: &GatewayArgs) -> Result<()> {
    let gateway_id = require_target(ctx, args).await?;
    let space = Space::new(args.space.as_str());
    let ack = ctx.reconciler()?.delete(&gateway_id, &space).await?;
    print_ack(
        &format!("Deleted gateway {} from space {}", gateway_id.as_str().cyan(), space),
        &ack,
        ctx.format,
    )
}
