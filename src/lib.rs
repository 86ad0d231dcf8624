// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Declare MCP tools, prompts and resources from anywhere in a program; the
//! server picks them up whenever it starts.
//!
//! Registrations made before [`start`] are queued and replayed in order once
//! the server is built. If nothing calls [`start`], the first registration
//! schedules an automatic start on stdio that runs as soon as the current task
//! yields. Protocol log messages emitted before a client is connected are held
//! and delivered after the handshake.
//!
//! # Example
//!
//! ```ignore
//! use mcpez::{ServerOptions, ToolOptions};
//! use rmcp::model::{CallToolResult, Content};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     mcpez::tool("greet", ToolOptions::new().with_description("Say hello"), |_args| async move {
//!         Ok(CallToolResult::success(vec![Content::text("Hello!")]))
//!     });
//!     mcpez::start("greeter", ServerOptions::new().with_version("1.0.0")).await?;
//!     mcpez::wait_for_close().await;
//!     Ok(())
//! }
//! ```
//!
//! The free functions act on one process-wide [`Registrar`]. Build separate
//! registrars with [`Registrar::new`] when isolation is needed.

use std::future::Future;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use rmcp::model::{CallToolResult, GetPromptResult, JsonObject, ReadResourceResult};
use rmcp::transport::IntoTransport;
use rmcp::RoleServer;
use serde_json::Value;

pub mod config;
mod error;
pub mod logger;
mod queue;
mod registrar;
mod scheduler;
mod start;
mod state;

pub use config::Config;
pub use error::StartError;
pub use mcpez_server::{
    ListChanged, LogLevel, LogMessage, McpServer, PromptArgumentSpec, PromptOptions,
    ResourceMetadata, ResourceTemplate, TemplateVariables, ToolOptions, DEFAULT_VERSION,
};
pub use queue::{DeferredRegistration, FlushReport, RegistrationQueue, ResourceLocation};
pub use registrar::Registrar;
pub use scheduler::AutoStartScheduler;
pub use start::{stdio_transport, BoxedReader, BoxedWriter, ServerOptions, TransportFactory};
pub use state::{LifecycleState, Phase};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

static REGISTRAR: LazyLock<Registrar> = LazyLock::new(Registrar::new);

/// The process-wide registrar behind the free functions.
pub fn registrar() -> &'static Registrar {
    &REGISTRAR
}

/// Replace the configuration of the process-wide registrar.
///
/// Call before the first registration for `auto_start` and `name` to apply to
/// an automatic start.
pub fn configure(config: Config) {
    REGISTRAR.configure(config);
}

/// Forget the process-wide server and queue. Intended for tests.
pub fn reset() {
    REGISTRAR.reset();
}

/// Start the server on stdin/stdout. See [`Registrar::start_with_transport`].
pub async fn start(name: impl Into<String>, options: ServerOptions) -> Result<(), StartError> {
    REGISTRAR.start(name, options).await
}

/// Start the server on `transport`. See [`Registrar::start_with_transport`].
pub async fn start_with_transport<T, E, A>(
    name: impl Into<String>,
    options: ServerOptions,
    transport: T,
) -> Result<(), StartError>
where
    T: IntoTransport<RoleServer, E, A>,
    E: std::error::Error + Send + Sync + 'static,
{
    REGISTRAR
        .start_with_transport(name, options, transport)
        .await
}

pub fn register_prompt<F, Fut>(name: impl Into<String>, options: PromptOptions, handler: F)
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<GetPromptResult>> + Send + 'static,
{
    REGISTRAR.register_prompt(name, options, handler);
}

pub fn register_tool<F, Fut>(name: impl Into<String>, options: ToolOptions, handler: F)
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CallToolResult>> + Send + 'static,
{
    REGISTRAR.register_tool(name, options, handler);
}

pub fn register_resource<F, Fut>(
    name: impl Into<String>,
    uri: impl Into<String>,
    metadata: ResourceMetadata,
    read: F,
) where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
{
    REGISTRAR.register_resource(name, uri, metadata, read);
}

pub fn register_resource_template<F, Fut>(
    name: impl Into<String>,
    template: impl Into<ResourceTemplate>,
    metadata: ResourceMetadata,
    read: F,
) where
    F: Fn(String, TemplateVariables) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
{
    REGISTRAR.register_resource_template(name, template, metadata, read);
}

/// Alias for [`register_prompt`].
pub fn prompt<F, Fut>(name: impl Into<String>, options: PromptOptions, handler: F)
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<GetPromptResult>> + Send + 'static,
{
    register_prompt(name, options, handler);
}

/// Alias for [`register_tool`].
pub fn tool<F, Fut>(name: impl Into<String>, options: ToolOptions, handler: F)
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CallToolResult>> + Send + 'static,
{
    register_tool(name, options, handler);
}

/// Alias for [`register_resource`].
pub fn resource<F, Fut>(
    name: impl Into<String>,
    uri: impl Into<String>,
    metadata: ResourceMetadata,
    read: F,
) where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
{
    register_resource(name, uri, metadata, read);
}

/// Alias for [`register_resource_template`].
pub fn resource_template<F, Fut>(
    name: impl Into<String>,
    template: impl Into<ResourceTemplate>,
    metadata: ResourceMetadata,
    read: F,
) where
    F: Fn(String, TemplateVariables) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
{
    register_resource_template(name, template, metadata, read);
}

/// Send a `notifications/message` to the client, now or once one is connected.
pub fn log(level: LogLevel, data: impl Into<Value>, logger: Option<&str>) {
    REGISTRAR.log(level, data, logger);
}

pub fn notify_resource_list_changed() {
    REGISTRAR.notify_resource_list_changed();
}

pub fn notify_tool_list_changed() {
    REGISTRAR.notify_tool_list_changed();
}

pub fn notify_prompt_list_changed() {
    REGISTRAR.notify_prompt_list_changed();
}

/// The live server, if one was started.
pub fn get_server() -> Option<McpServer> {
    REGISTRAR.get_server()
}

pub fn phase() -> Phase {
    REGISTRAR.phase()
}

/// Resolves once the transport of the started server closes.
pub async fn wait_for_close() {
    REGISTRAR.wait_for_close().await;
}
