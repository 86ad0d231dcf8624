// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! MCP server library for mcpez.
//!
//! rmcp's [`ServerHandler`](rmcp::ServerHandler) is a static trait; this crate
//! provides [`McpServer`], a handler whose tools, prompts, resources and
//! resource templates are registered at runtime, plus the notification plumbing
//! for protocol logging and list-changed signals.
//!
//! # Quick Start
//!
//! ```ignore
//! use mcpez_server::{tool_handler, McpServer, RegistrationTarget, ToolOptions};
//! use rmcp::model::{CallToolResult, Content};
//!
//! let server = McpServer::builder("greeter").build();
//! server.register_tool(
//!     "greet".to_string(),
//!     ToolOptions::new().with_description("Greet the user"),
//!     tool_handler(|_args| async move {
//!         Ok(CallToolResult::success(vec![Content::text("Hello!")]))
//!     }),
//! );
//!
//! let running = rmcp::service::serve_server(server.clone(), rmcp::transport::stdio()).await?;
//! server.store_peer_if_empty(running.peer().clone());
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

mod notify;
mod prompts;
mod resources;
mod server;
mod target;
mod tools;

pub use notify::{ListChanged, LogLevel, LogMessage, NotConnected};
pub use prompts::{prompt_handler, PromptArgumentSpec, PromptHandler, PromptOptions};
pub use resources::{
    resource_reader, template_reader, ResourceMetadata, ResourceReadCallback, ResourceTemplate,
    ResourceTemplateReadCallback, TemplateVariables,
};
pub use server::{normalize_capabilities, McpServer, McpServerBuilder, DEFAULT_VERSION};
pub use target::RegistrationTarget;
pub use tools::{tool_handler, ToolHandler, ToolOptions};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
