// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use anyhow::Result;
use mcpez::{Phase, ServerOptions, StartError, ToolOptions};
use rmcp::model::{CallToolResult, Content};
use serde_json::{json, Value};
use serial_test::serial;
use test_log::test;

mod common;
use common::{pipe, test_config};

#[test(tokio::test)]
#[serial]
async fn test_free_functions_route_through_global_registrar() -> Result<()> {
    mcpez::reset();
    mcpez::configure(test_config(false));

    mcpez::tool(
        "shout",
        ToolOptions::new().with_input_schema(json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })),
        |args| async move {
            let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
            Ok(CallToolResult::success(vec![Content::text(
                text.to_uppercase(),
            )]))
        },
    );
    mcpez::logger::notice("registered");
    assert!(mcpez::get_server().is_none());
    assert_eq!(mcpez::phase(), Phase::Unstarted);

    let (mut client, server) = pipe();
    let (started, init) = tokio::join!(
        mcpez::start_with_transport("global", ServerOptions::new(), server),
        client.initialize()
    );
    started?;
    init?;
    assert_eq!(mcpez::phase(), Phase::Connected);
    assert!(mcpez::get_server().is_some());

    let response = client.call_tool("shout", json!({ "text": "hi" })).await?;
    assert_eq!(response["result"]["content"][0]["text"], "HI");

    // Missing required argument is a protocol error, not a tool result.
    let response = client.call_tool("shout", json!({})).await?;
    assert!(response.get("error").is_some());

    client
        .wait_for_notifications("notifications/message", 1)
        .await?;
    assert_eq!(client.messages_logged(), vec![json!("registered")]);

    let (_other, other_server) = pipe();
    let err = mcpez::start_with_transport("again", ServerOptions::new(), other_server)
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::AlreadyStarted));

    mcpez::reset();
    assert!(mcpez::get_server().is_none());
    Ok(())
}

#[test(tokio::test)]
#[serial]
async fn test_notify_list_changed_reaches_client() -> Result<()> {
    mcpez::reset();
    mcpez::configure(test_config(false));

    let (mut client, server) = pipe();
    let (started, init) = tokio::join!(
        mcpez::start_with_transport("notifier", ServerOptions::new(), server),
        client.initialize()
    );
    started?;
    init?;

    mcpez::notify_prompt_list_changed();
    mcpez::notify_resource_list_changed();
    client
        .wait_for_notifications("notifications/resources/list_changed", 1)
        .await?;

    // Delivered in emission order.
    let methods: Vec<_> = client
        .notifications
        .iter()
        .filter_map(|n| n["method"].as_str())
        .collect();
    assert_eq!(
        methods,
        vec![
            "notifications/prompts/list_changed",
            "notifications/resources/list_changed"
        ]
    );

    mcpez::reset();
    Ok(())
}
