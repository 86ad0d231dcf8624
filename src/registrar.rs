// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The registration context: lifecycle state, the deferred queue and the
//! automatic start, wired together.

use std::future::Future;
use std::sync::{Arc, Mutex};

use mcpez_server::{
    prompt_handler, resource_reader, template_reader, tool_handler, ListChanged, LogLevel,
    LogMessage, McpServer, PromptOptions, ResourceMetadata, ResourceTemplate, TemplateVariables,
    ToolOptions,
};
use rmcp::model::{CallToolResult, GetPromptResult, JsonObject, ReadResourceResult};
use rmcp::service::{serve_server, RunningService};
use rmcp::transport::IntoTransport;
use rmcp::RoleServer;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::StartError;
use crate::lock;
use crate::queue::{DeferredRegistration, RegistrationQueue, ResourceLocation};
use crate::scheduler::AutoStartScheduler;
use crate::start::{stdio_transport, BoxedReader, BoxedWriter, ServerOptions, TransportFactory};
use crate::state::{LifecycleState, Phase};

struct Inner {
    config: Mutex<Config>,
    state: LifecycleState,
    queue: RegistrationQueue,
    scheduler: AutoStartScheduler,
    closed: Mutex<CancellationToken>,
    auto_start_transport: Mutex<Option<TransportFactory>>,
}

/// Registers tools, prompts and resources whether or not the server exists yet.
///
/// Before a server is started, registrations are queued and, unless disabled in
/// [`Config`], the first one schedules an automatic start. Once a server exists
/// they are forwarded to it directly.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct Registrar {
    inner: Arc<Inner>,
}

impl Default for Registrar {
    fn default() -> Self {
        Self::new()
    }
}

impl Registrar {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let inner = Arc::new(Inner {
            config: Mutex::new(config),
            state: LifecycleState::new(),
            queue: RegistrationQueue::new(),
            scheduler: AutoStartScheduler::new(),
            closed: Mutex::new(CancellationToken::new()),
            auto_start_transport: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        inner.queue.set_on_enqueue(move || {
            if let Some(inner) = weak.upgrade() {
                Registrar { inner }.schedule_automatic_start();
            }
        });

        Self { inner }
    }

    /// Replace the configuration. Affects automatic starts that have not fired yet.
    pub fn configure(&self, config: Config) {
        *lock(&self.inner.config) = config;
    }

    pub fn config(&self) -> Config {
        lock(&self.inner.config).clone()
    }

    /// Use `factory` instead of stdio for automatic starts.
    pub fn set_auto_start_transport<F>(&self, factory: F)
    where
        F: Fn() -> (BoxedReader, BoxedWriter) + Send + Sync + 'static,
    {
        *lock(&self.inner.auto_start_transport) = Some(Box::new(factory));
    }

    /// Forget the server, the queue and any pending automatic start.
    ///
    /// A transport that is still running keeps serving its client, but this
    /// registrar no longer refers to it.
    pub fn reset(&self) {
        self.inner.scheduler.cancel();
        self.inner.queue.clear();
        self.inner.state.reset();
        let closed = std::mem::replace(&mut *lock(&self.inner.closed), CancellationToken::new());
        closed.cancel();
        tracing::debug!("Registrar reset");
    }

    pub fn get_server(&self) -> Option<McpServer> {
        self.inner.state.get_server_instance()
    }

    pub fn has_server_started(&self) -> bool {
        self.inner.state.has_server_started()
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.phase()
    }

    /// Number of registrations waiting for a server or a connected client.
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// Whether an automatic start is scheduled and has not fired yet.
    pub fn is_auto_start_pending(&self) -> bool {
        self.inner.scheduler.is_pending()
    }

    /// Resolves once the transport of the started server closes.
    ///
    /// Never resolves if no server is ever started.
    pub async fn wait_for_close(&self) {
        let closed = lock(&self.inner.closed).clone();
        closed.cancelled().await;
    }

    /// Start the server on stdin/stdout.
    pub async fn start(
        &self,
        name: impl Into<String>,
        options: ServerOptions,
    ) -> Result<(), StartError> {
        self.start_with_transport(name, options, stdio_transport())
            .await
    }

    /// Build the server, attach queued registrations and connect `transport`.
    ///
    /// Resolves once the MCP handshake completed. Fails with
    /// [`StartError::AlreadyStarted`] if a server was built before, by an
    /// explicit or an automatic start.
    pub async fn start_with_transport<T, E, A>(
        &self,
        name: impl Into<String>,
        options: ServerOptions,
        transport: T,
    ) -> Result<(), StartError>
    where
        T: IntoTransport<RoleServer, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.inner.scheduler.cancel();
        if self.has_server_started() {
            return Err(StartError::AlreadyStarted);
        }

        let name = name.into();
        let server = options.build_server(name.clone());
        let generation = self.inner.state.install(server.clone())?;
        tracing::info!(server = %name, "MCP server constructed");

        self.inner.queue.flush(&server);

        let running = serve_server(server.clone(), transport)
            .await
            .map_err(StartError::Connect)?;
        server.store_peer_if_empty(running.peer().clone());
        self.inner.state.advance(generation, Phase::Connected);
        tracing::info!(server = %name, "MCP server connected");

        self.inner.queue.flush(&server);
        self.watch_for_close(generation, server, running);
        Ok(())
    }

    fn watch_for_close(
        &self,
        generation: u64,
        server: McpServer,
        running: RunningService<RoleServer, McpServer>,
    ) {
        let inner = Arc::clone(&self.inner);
        let closed = lock(&self.inner.closed).clone();

        tokio::spawn(async move {
            match running.waiting().await {
                Ok(reason) => tracing::info!(?reason, "MCP transport closed"),
                Err(e) => tracing::warn!(error = %e, "MCP service task failed"),
            }
            server.detach_peer();
            inner.state.advance(generation, Phase::Closed);
            // Nothing held back for the client can be delivered any more.
            let report = inner.queue.flush(&server);
            if report.requeued > 0 {
                inner.queue.clear();
                tracing::debug!(
                    dropped = report.requeued,
                    "Dropped messages held for the closed transport"
                );
            }
            closed.cancel();

            if lock(&inner.config).exit_on_close {
                tracing::info!("Exiting after transport close");
                std::process::exit(0);
            }
        });
    }

    fn schedule_automatic_start(&self) {
        if !lock(&self.inner.config).auto_start || self.has_server_started() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.schedule(move || async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let registrar = Registrar { inner };
            if registrar.has_server_started() {
                return;
            }

            let config = registrar.config();
            let transport = registrar.auto_start_transport();
            tracing::info!(server = %config.name, "Starting MCP server automatically");
            let start: std::pin::Pin<
                Box<dyn Future<Output = Result<(), StartError>> + Send + '_>,
            > = Box::pin(registrar.start_with_transport(
                config.name.clone(),
                config.server_options(),
                transport,
            ));
            if let Err(e) = start.await {
                tracing::error!(error = %e, "Automatic start of MCP server failed");
            }
        });
    }

    fn auto_start_transport(&self) -> (BoxedReader, BoxedWriter) {
        let factory = lock(&self.inner.auto_start_transport);
        match factory.as_ref() {
            Some(make) => make(),
            None => stdio_transport(),
        }
    }

    /// Forward `item` to the server, or queue it until it can be delivered.
    ///
    /// Items go straight to the server only when nothing is queued ahead of
    /// them, which keeps declaration order.
    ///
    /// After the transport closed there is no client left to wait for, so
    /// whatever the server cannot take is dropped instead of queued.
    fn submit(&self, item: DeferredRegistration) {
        let closed = self.phase() == Phase::Closed;
        let item = match self.get_server() {
            Some(server) if closed || self.inner.queue.is_empty() => {
                match item.dispatch(&server) {
                    None => return,
                    Some(item) => item,
                }
            }
            _ => item,
        };

        if closed {
            tracing::debug!(kind = item.kind(), "Transport closed; registration dropped");
            return;
        }

        self.inner.queue.enqueue(item);
        // A start may have installed the server while we were queueing.
        if let Some(server) = self.get_server() {
            self.inner.queue.flush(&server);
        }
    }

    pub fn register_prompt<F, Fut>(&self, name: impl Into<String>, options: PromptOptions, handler: F)
    where
        F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<GetPromptResult>> + Send + 'static,
    {
        self.submit(DeferredRegistration::Prompt {
            name: name.into(),
            options,
            handler: prompt_handler(handler),
        });
    }

    pub fn register_tool<F, Fut>(&self, name: impl Into<String>, options: ToolOptions, handler: F)
    where
        F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<CallToolResult>> + Send + 'static,
    {
        self.submit(DeferredRegistration::Tool {
            name: name.into(),
            options,
            handler: tool_handler(handler),
        });
    }

    /// Register a resource served at one fixed `uri`.
    pub fn register_resource<F, Fut>(
        &self,
        name: impl Into<String>,
        uri: impl Into<String>,
        metadata: ResourceMetadata,
        read: F,
    ) where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
    {
        self.submit(DeferredRegistration::Resource {
            name: name.into(),
            location: ResourceLocation::Uri {
                uri: uri.into(),
                read: resource_reader(read),
            },
            metadata,
        });
    }

    /// Register a resource served at every URI matching `template`.
    pub fn register_resource_template<F, Fut>(
        &self,
        name: impl Into<String>,
        template: impl Into<ResourceTemplate>,
        metadata: ResourceMetadata,
        read: F,
    ) where
        F: Fn(String, TemplateVariables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
    {
        self.submit(DeferredRegistration::Resource {
            name: name.into(),
            location: ResourceLocation::Template {
                template: template.into(),
                read: template_reader(read),
            },
            metadata,
        });
    }

    /// Send a protocol log message, or hold it until a client is connected.
    pub fn log(&self, level: LogLevel, data: impl Into<Value>, logger: Option<&str>) {
        let mut message = LogMessage::new(level, data);
        if let Some(logger) = logger {
            message = message.with_logger(logger);
        }
        self.submit(DeferredRegistration::Log(message));
    }

    pub fn notify_resource_list_changed(&self) {
        self.submit(DeferredRegistration::ListChanged(ListChanged::Resources));
    }

    pub fn notify_tool_list_changed(&self) {
        self.submit(DeferredRegistration::ListChanged(ListChanged::Tools));
    }

    pub fn notify_prompt_list_changed(&self) {
        self.submit(DeferredRegistration::ListChanged(ListChanged::Prompts));
    }
}
