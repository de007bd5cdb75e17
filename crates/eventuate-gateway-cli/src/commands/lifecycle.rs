use anyhow::Result;
use eventuate_gateway_core::{BatchReport, GatewayConfig, GatewayError, Space, host_credentials};

use super::Context;
use crate::output::{print_remove_report, print_upsert_report};

/// Creates or updates the gateway of every function declaring one.
pub async fn deploy(ctx: &Context) -> Result<()> {
    let manifest = ctx.manifest()?;
    let book = ctx.address_book().await?;
    let fallback = if manifest
        .declared_gateways()
        .any(|(_, declared)| declared.aws_credentials.is_none())
    {
        host_credentials(&ctx.deployment()?.region).await
    } else {
        None
    };

    let mut configs: Vec<(String, GatewayConfig)> = Vec::new();
    let mut rejected = Vec::new();
    for function in manifest.functions() {
        let Some(declared) = manifest.declared_gateway(function) else {
            tracing::info!(function = %function, "Eventuate configuration not found, skipping");
            continue;
        };
        let built = book
            .resolve_address(function)
            .and_then(|address| declared.to_gateway_config(function, address, fallback.as_ref()));
        match built {
            Ok(config) => configs.push((function.to_string(), config)),
            Err(e) => {
                tracing::warn!(function = %function, error = %e, "Gateway configuration rejected");
                rejected.push((function.to_string(), Err(e)));
            }
        }
    }

    let upserted = ctx.reconciler()?.upsert_all(&book, configs).await;
    let order: Vec<&str> = manifest.functions().collect();
    let report = merge_in_order(&order, upserted, rejected);

    print_upsert_report(&report, ctx.format)?;
    report.into_result()?;
    Ok(())
}

/// Deletes the gateway of every function declaring one.
pub async fn remove(ctx: &Context) -> Result<()> {
    let manifest = ctx.manifest()?;
    let book = ctx.address_book().await?;
    let targets: Vec<(String, Space)> = manifest
        .declared_gateways()
        .map(|(function, declared)| (function.to_string(), declared.space()))
        .collect();

    let report = ctx.reconciler()?.remove_all(&book, targets).await;
    print_remove_report(&report, ctx.format)?;
    report.into_result()?;
    Ok(())
}

/// Combines batch results with pre-flight failures, ordered as `order` lists the functions.
fn merge_in_order<T>(
    order: &[&str],
    report: BatchReport<T>,
    extra: Vec<(String, Result<T, GatewayError>)>,
) -> BatchReport<T> {
    let mut results = report.results;
    results.extend(extra);
    results.sort_by_key(|(function, _)| {
        order
            .iter()
            .position(|name| *name == function.as_str())
            .unwrap_or(usize::MAX)
    });
    BatchReport { results }
}
