use anyhow::Result;
use colored::Colorize;
use eventuate_gateway_core::{
    BatchReport, DeclaredGateway, GatewayId, GatewayState, RemoveOutcome, Space, UpsertOutcome,
};
use serde::Serialize;
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn entities_json(value: &impl Serialize) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Prints the stored configuration of one gateway.
pub fn print_gateway(
    gateway_id: &GatewayId,
    space: &Space,
    state: &GatewayState,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "gatewayId": gateway_id,
            "space": space,
            "gateway": state,
        })),
        OutputFormat::Text => {
            println!("{}: {}", "Gateway ID".cyan(), gateway_id);
            println!(
                "{}: {}",
                "Connection String".cyan(),
                state.gateway_destination.connection_string
            );
            println!("{}: {}", "Subscriber ID".cyan(), state.subscriber_id);
            println!("{}: {}", "Space".cyan(), space);
            if let Some(dlq) = &state.gateway_destination.dlq {
                println!("{}: {}", "DLQ".cyan(), dlq.url);
            }
            println!(
                "{}: {}",
                "Entities and event types".cyan(),
                entities_json(&state.entities_and_event_types)
            );
            if let Some(enabled) = state.extra.get("enabled").and_then(Value::as_bool) {
                println!("{}: {}", "Enabled".cyan(), enabled);
            }
            Ok(())
        }
    }
}

/// Reports a gateway the API does not know; absence is not a failure.
pub fn print_absent(gateway_id: &GatewayId, space: &Space, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "gatewayId": gateway_id,
            "space": space,
            "gateway": Value::Null,
        })),
        OutputFormat::Text => {
            println!(
                "{} Eventuate gateway {} does not exist in space {}",
                "!".yellow(),
                gateway_id.as_str().cyan(),
                space
            );
            Ok(())
        }
    }
}

/// Row of the function listing; `gateway_id` is `None` for functions
/// that are not deployed.
pub struct FunctionRow<'a> {
    pub function: &'a str,
    pub gateway_id: Option<GatewayId>,
    pub declared: &'a DeclaredGateway,
}

pub fn print_function_list(rows: &[FunctionRow<'_>], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let items: Vec<Value> = rows
                .iter()
                .map(|row| {
                    json!({
                        "function": row.function,
                        "gatewayId": row.gateway_id,
                        "subscriberId": row.declared.subscriber_id,
                        "space": row.declared.space(),
                        "entitiesAndEventTypes": row.declared.entities_and_event_types,
                    })
                })
                .collect();
            print_json(&items)
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No functions declare an Eventuate gateway.");
                return Ok(());
            }
            let mut builder = Builder::default();
            builder.push_record(["Function", "Gateway ID", "Subscriber ID", "Space", "Entities"]);
            for row in rows {
                let gateway_id = row
                    .gateway_id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                builder.push_record([
                    row.function.to_string(),
                    gateway_id,
                    row.declared.subscriber_id.clone(),
                    row.declared.space().to_string(),
                    entities_json(&row.declared.entities_and_event_types),
                ]);
            }
            let table = builder.build().with(Style::rounded()).to_string();
            println!("{table}");
            Ok(())
        }
    }
}

fn report_json<T: Serialize>(report: &BatchReport<T>) -> Vec<Value> {
    report
        .results
        .iter()
        .map(|(function, result)| match result {
            Ok(outcome) => json!({ "function": function, "ok": true, "outcome": outcome }),
            Err(e) => json!({ "function": function, "ok": false, "error": e.to_string() }),
        })
        .collect()
}

pub fn print_upsert_report(report: &BatchReport<UpsertOutcome>, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(&report_json(report));
    }
    for (function, result) in &report.results {
        match result {
            Ok(outcome) => print_success(&format!(
                "{} {:?} gateway {} in space {}",
                function.cyan(),
                outcome.action,
                outcome.gateway_id,
                outcome.space
            )),
            Err(e) => print_error(&format!("{}: {e}", function.cyan())),
        }
    }
    Ok(())
}

pub fn print_remove_report(report: &BatchReport<RemoveOutcome>, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(&report_json(report));
    }
    for (function, result) in &report.results {
        match result {
            Ok(outcome) => print_success(&format!(
                "{} removed gateway {} from space {}",
                function.cyan(),
                outcome.gateway_id,
                outcome.space
            )),
            Err(e) => print_error(&format!("{}: {e}", function.cyan())),
        }
    }
    Ok(())
}
