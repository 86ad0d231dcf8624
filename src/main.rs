// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The `mcpez-demo` command: a small MCP server built with mcpez.

use anyhow::{Context, Result};
use clap::Parser;
use mcpez::{Config, LogLevel, PromptArgumentSpec, ResourceMetadata, ToolOptions};
use rmcp::model::{
    CallToolResult, Content, GetPromptResult, PromptMessage, PromptMessageRole,
    ReadResourceResult, ResourceContents,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Demo MCP server with an `add` tool, a `review-code` prompt and two resources
#[derive(Parser, Debug, Serialize)]
#[command(name = "mcpez-demo", version)]
struct Cli {
    /// Server name reported to clients
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// Server version reported to clients
    #[arg(long = "server-version")]
    #[serde(rename = "version", skip_serializing_if = "Option::is_none")]
    server_version: Option<String>,

    /// Call start explicitly instead of relying on the automatic start
    #[arg(long)]
    #[serde(skip)]
    manual: bool,
}

const AUDIT_LEVELS: [&str; 3] = ["info", "warning", "error"];

fn audit_entries(date: &str, level: &str) -> Option<Value> {
    let entries = match (date, level) {
        ("2024-04-01", "info") => json!([
            { "timestamp": "2024-04-01T08:00:00Z", "message": "Deployment pipeline triggered" },
            { "timestamp": "2024-04-01T08:05:12Z", "message": "Deployment completed successfully" }
        ]),
        ("2024-04-01", "warning") => json!([{
            "timestamp": "2024-04-01T09:12:33Z",
            "message": "Retrying connection to Redis leader",
            "context": { "attempts": 2 }
        }]),
        ("2024-04-01", "error") => json!([{
            "timestamp": "2024-04-01T09:15:00Z",
            "message": "Payment gateway timeout",
            "context": { "orderId": "ORD-481516" }
        }]),
        ("2024-04-02", "info") => json!([
            { "timestamp": "2024-04-02T07:45:00Z", "message": "Background sync completed" }
        ]),
        ("2024-04-02", "warning" | "error") => json!([]),
        _ => return None,
    };
    Some(entries)
}

fn json_contents(uri: String, value: &Value) -> Result<ReadResourceResult> {
    let text = serde_json::to_string_pretty(value).context("Failed to render audit log")?;
    let mut contents = ResourceContents::text(text, uri);
    if let ResourceContents::TextResourceContents { mime_type, .. } = &mut contents {
        *mime_type = Some("application/json".to_string());
    }
    Ok(ReadResourceResult {
        contents: vec![contents],
    })
}

fn register_capabilities() {
    mcpez::tool(
        "add",
        ToolOptions::new()
            .with_description("Add two numbers")
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number", "description": "First number" },
                    "b": { "type": "number", "description": "Second number" }
                },
                "required": ["a", "b"]
            })),
        |args| async move {
            let a = args
                .get("a")
                .and_then(Value::as_f64)
                .context("Argument `a` must be a number")?;
            let b = args
                .get("b")
                .and_then(Value::as_f64)
                .context("Argument `b` must be a number")?;
            Ok(CallToolResult::success(vec![Content::text(format!(
                "{a} + {b} = {}",
                a + b
            ))]))
        },
    );

    mcpez::prompt(
        "review-code",
        mcpez::PromptOptions::new()
            .with_description("Review a code snippet")
            .with_argument(PromptArgumentSpec::required("subject", "Code to review")),
        |args| async move {
            let subject = args
                .get("subject")
                .and_then(Value::as_str)
                .context("Argument `subject` must be a string")?;
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage::new_text(
                    PromptMessageRole::User,
                    format!(
                        "Please review this code:\n\n{subject}\n\nProvide feedback on style, performance, and best practices."
                    ),
                )],
            })
        },
    );

    mcpez::resource(
        "echo",
        "echo://message",
        ResourceMetadata::new().with_description("Echoes back messages as resources"),
        |uri| async move {
            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text("Resource echo: Hello!", uri)],
            })
        },
    );

    mcpez::resource_template(
        "audit-log",
        "audit-log://{date}/{level}",
        ResourceMetadata::new()
            .with_title("Audit log by date and level")
            .with_description("Audit log entries grouped by date and severity level.")
            .with_mime_type("application/json"),
        |uri, variables| async move {
            let date = variables.get("date").map(String::as_str).unwrap_or_default();
            let level = variables
                .get("level")
                .map(|level| level.to_ascii_lowercase())
                .unwrap_or_default();

            let body = if !AUDIT_LEVELS.contains(&level.as_str()) {
                json!({
                    "error": format!("Unsupported log level: {level}"),
                    "supportedLevels": AUDIT_LEVELS,
                })
            } else {
                match audit_entries(date, &level) {
                    Some(entries) => json!({
                        "date": date,
                        "level": level,
                        "count": entries.as_array().map_or(0, Vec::len),
                        "entries": entries,
                    }),
                    None => json!({
                        "error": format!("No logs found for {date}."),
                        "availableDates": ["2024-04-01", "2024-04-02"],
                    }),
                }
            };
            json_contents(uri, &body)
        },
    );

    mcpez::log(LogLevel::Info, "mcpez demo capabilities registered", Some("demo"));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol, so diagnostics go to stderr
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".to_string().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::new(&cli).context("Failed to load configuration")?;
    let manual = cli.manual || !config.auto_start;
    config.auto_start = !manual;
    let options = config.server_options();
    let name = config.name.clone();
    mcpez::configure(config);

    register_capabilities();

    if manual {
        tracing::info!(server = %name, "Starting MCP server with stdio transport");
        mcpez::start(name, options).await?;
    }

    mcpez::wait_for_close().await;
    Ok(())
}
