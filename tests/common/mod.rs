// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use mcpez::{BoxedReader, BoxedWriter, Config, Phase, Registrar};
use serde_json::{json, Value};
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Config for tests: never exit the test process when a transport closes.
pub fn test_config(auto_start: bool) -> Config {
    Config {
        auto_start,
        exit_on_close: false,
        ..Default::default()
    }
}

/// A minimal MCP client speaking newline-delimited JSON-RPC over an in-memory pipe.
pub struct TestClient {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    next_id: u64,
    /// Every notification received so far, in arrival order.
    pub notifications: Vec<Value>,
}

/// A client and the server end of its pipe.
pub fn pipe() -> (TestClient, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(client);
    let client = TestClient {
        lines: BufReader::new(reader).lines(),
        writer,
        next_id: 1,
        notifications: Vec::new(),
    };
    (client, server)
}

/// Route automatic starts of `registrar` to `server`, counting how often the
/// transport is requested.
pub fn auto_start_on(registrar: &Registrar, server: DuplexStream) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let slot = Mutex::new(Some(server));

    registrar.set_auto_start_transport(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let stream = slot.lock().unwrap().take();
        match stream {
            Some(stream) => {
                let (reader, writer) = tokio::io::split(stream);
                let reader: BoxedReader = Box::new(reader);
                let writer: BoxedWriter = Box::new(writer);
                (reader, writer)
            }
            None => {
                let reader: BoxedReader = Box::new(tokio::io::empty());
                let writer: BoxedWriter = Box::new(tokio::io::sink());
                (reader, writer)
            }
        }
    });
    calls
}

pub async fn wait_for_phase(registrar: &Registrar, phase: Phase) -> Result<()> {
    tokio::time::timeout(TIMEOUT, async {
        while registrar.phase() != phase {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .with_context(|| format!("Timed out waiting for phase {phase:?}"))
}

impl TestClient {
    pub async fn send(&mut self, message: Value) -> Result<()> {
        let line = format!("{}\n", serde_json::to_string(&message)?);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Value> {
        let line = tokio::time::timeout(TIMEOUT, self.lines.next_line())
            .await
            .context("Timed out waiting for a server message")??
            .context("Server closed the stream")?;
        serde_json::from_str(&line).with_context(|| format!("Invalid JSON from server: {line}"))
    }

    /// Send a request and return its response, collecting notifications that
    /// arrive in between.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await?;

        loop {
            let message = self.recv().await?;
            if message.get("id") == Some(&json!(id)) {
                return Ok(message);
            }
            if message.get("method").is_some() && message.get("id").is_none() {
                self.notifications.push(message);
                continue;
            }
            bail!("Unexpected message from server: {message}");
        }
    }

    /// Run the initialize handshake and return the initialize response.
    pub async fn initialize(&mut self) -> Result<Value> {
        let response = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "test-client", "version": "1.0.0" }
                }),
            )
            .await?;
        self.send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await?;
        Ok(response)
    }

    pub fn count(&self, method: &str) -> usize {
        self.notifications
            .iter()
            .filter(|n| n["method"] == method)
            .count()
    }

    /// Read until at least `n` notifications named `method` have arrived.
    pub async fn wait_for_notifications(&mut self, method: &str, n: usize) -> Result<()> {
        while self.count(method) < n {
            let message = self.recv().await?;
            if message.get("id").is_some() {
                bail!("Unexpected response while waiting for {method}: {message}");
            }
            self.notifications.push(message);
        }
        Ok(())
    }

    pub fn messages_logged(&self) -> Vec<Value> {
        self.notifications
            .iter()
            .filter(|n| n["method"] == "notifications/message")
            .map(|n| n["params"]["data"].clone())
            .collect()
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value> {
        self.request(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }

    pub async fn tool_names(&mut self) -> Result<Vec<String>> {
        let response = self.request("tools/list", json!({})).await?;
        Ok(response["result"]["tools"]
            .as_array()
            .context("tools/list result has no tools array")?
            .iter()
            .filter_map(|tool| tool["name"].as_str().map(str::to_string))
            .collect())
    }
}
