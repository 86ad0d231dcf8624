// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! MCP server whose capabilities can be registered while it runs.
//!
//! [`McpServer`] implements rmcp's [`ServerHandler`] on top of registries that
//! are filled at runtime through [`RegistrationTarget`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ErrorData, GetPromptRequestParam,
    GetPromptResult, Implementation, JsonObject, ListPromptsResult, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, PaginatedRequestParam, Prompt, PromptsCapability,
    ReadResourceRequestParam, ReadResourceResult, Resource, ResourcesCapability,
    ServerCapabilities, ServerInfo, SetLevelRequestParam, Tool, ToolsCapability,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{Peer, ServerHandler};
use tokio::sync::mpsc;

use crate::lock;
use crate::notify::{spawn_pump, ListChanged, LogLevel, LogMessage, NotConnected, Notification};
use crate::prompts::{PromptHandler, PromptOptions, RegisteredPrompt};
use crate::resources::{
    RegisteredResource, RegisteredTemplate, ResourceMetadata, ResourceReadCallback,
    ResourceTemplate, ResourceTemplateReadCallback,
};
use crate::target::RegistrationTarget;
use crate::tools::{RegisteredTool, ToolHandler, ToolOptions};

/// Version reported when none is configured.
pub const DEFAULT_VERSION: &str = "1.0.0";

#[derive(Default)]
struct Registry {
    tools: Vec<(String, RegisteredTool)>,
    prompts: Vec<(String, RegisteredPrompt)>,
    resources: Vec<(String, RegisteredResource)>,
    templates: Vec<(String, RegisteredTemplate)>,
}

/// Insert or replace by name. Replacing keeps the original position.
fn upsert<T>(entries: &mut Vec<(String, T)>, name: String, value: T, kind: &'static str) {
    match entries.iter_mut().find(|(existing, _)| *existing == name) {
        Some(slot) => {
            tracing::warn!(kind, name = %name, "Replacing previously registered entry");
            slot.1 = value;
        }
        None => {
            tracing::debug!(kind, name = %name, "Registered");
            entries.push((name, value));
        }
    }
}

fn find<T: Clone>(entries: &[(String, T)], name: &str) -> Option<T> {
    entries
        .iter()
        .find(|(existing, _)| existing == name)
        .map(|(_, value)| value.clone())
}

fn describe_error(e: serde_json::Error) -> ErrorData {
    ErrorData::internal_error(format!("Failed to describe entry: {e}"), None)
}

struct Session {
    peer: Peer<RoleServer>,
    outbox: mpsc::UnboundedSender<Notification>,
}

/// MCP server with runtime registration of tools, prompts and resources.
///
/// Clones share the same registries and client session.
///
/// # Example
///
/// ```ignore
/// use mcpez_server::{tool_handler, McpServer, RegistrationTarget, ToolOptions};
///
/// let server = McpServer::builder("calculator").with_version("2.0.0").build();
/// server.register_tool(
///     "add".to_string(),
///     ToolOptions::new().with_description("Add two numbers"),
///     tool_handler(|args| async move { /* ... */ }),
/// );
/// let running = rmcp::service::serve_server(server.clone(), rmcp::transport::stdio()).await?;
/// server.store_peer_if_empty(running.peer().clone());
/// ```
#[derive(Clone)]
pub struct McpServer {
    info: ServerInfo,
    registry: Arc<Mutex<Registry>>,
    session: Arc<Mutex<Option<Session>>>,
    min_log_level: Arc<Mutex<Option<LogLevel>>>,
}

impl McpServer {
    /// Creates a server with default version and capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> McpServerBuilder {
        McpServerBuilder::new(name)
    }

    /// Server identity and capabilities as sent in the initialize response.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Drop the client session, e.g. after the transport closed.
    pub fn detach_peer(&self) {
        if lock(&self.session).take().is_some() {
            tracing::info!(server = %self.info.server_info.name, "Client session detached");
        }
    }

    /// Store the peer for background notifications unless a session is already
    /// attached. Called on every request.
    pub fn store_peer_if_empty(&self, peer: Peer<RoleServer>) {
        let mut session = lock(&self.session);
        if session.is_none() {
            let outbox = spawn_pump(peer.clone());
            *session = Some(Session { peer, outbox });
            tracing::info!(server = %self.info.server_info.name, "Client session attached");
        }
    }

    /// Get a clone of the attached peer if available.
    pub fn get_peer(&self) -> Option<Peer<RoleServer>> {
        lock(&self.session)
            .as_ref()
            .map(|session| session.peer.clone())
    }

    /// Minimum level requested by the client through `logging/setLevel`.
    pub fn log_level(&self) -> Option<LogLevel> {
        *lock(&self.min_log_level)
    }

    fn outbox(&self) -> Option<mpsc::UnboundedSender<Notification>> {
        lock(&self.session)
            .as_ref()
            .map(|session| session.outbox.clone())
            .filter(|outbox| !outbox.is_closed())
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        lock(&self.registry)
    }

    fn announce(&self, list: ListChanged) {
        if self.is_connected() {
            self.send_list_changed(list);
        }
    }

    pub fn tool_list(&self) -> Result<Vec<Tool>, ErrorData> {
        self.registry()
            .tools
            .iter()
            .map(|(name, tool)| tool.options.describe(name).map_err(describe_error))
            .collect()
    }

    pub fn prompt_list(&self) -> Result<Vec<Prompt>, ErrorData> {
        self.registry()
            .prompts
            .iter()
            .map(|(name, prompt)| prompt.options.describe(name).map_err(describe_error))
            .collect()
    }

    pub fn resource_list(&self) -> Result<Vec<Resource>, ErrorData> {
        self.registry()
            .resources
            .iter()
            .map(|(name, resource)| {
                resource
                    .metadata
                    .describe_resource(name, &resource.uri)
                    .map_err(describe_error)
            })
            .collect()
    }

    pub fn resource_template_list(
        &self,
    ) -> Result<Vec<rmcp::model::ResourceTemplate>, ErrorData> {
        self.registry()
            .templates
            .iter()
            .map(|(name, template)| {
                template
                    .metadata
                    .describe_template(name, &template.template)
                    .map_err(describe_error)
            })
            .collect()
    }

    /// Run the tool registered under `name`.
    pub async fn invoke_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ErrorData> {
        let tool = find(&self.registry().tools, name)
            .ok_or_else(|| ErrorData::invalid_params(format!("Tool {name} not found"), None))?;

        let arguments = arguments.unwrap_or_default();
        let missing = tool.options.missing_required(&arguments);
        if !missing.is_empty() {
            return Err(ErrorData::invalid_params(
                format!(
                    "Tool {name} is missing required arguments: {}",
                    missing.join(", ")
                ),
                None,
            ));
        }

        match (tool.handler)(arguments).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool handler failed");
                Ok(CallToolResult::error(vec![Content::text(format!("{e:#}"))]))
            }
        }
    }

    /// Render the prompt registered under `name`.
    pub async fn render_prompt(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<GetPromptResult, ErrorData> {
        let prompt = find(&self.registry().prompts, name)
            .ok_or_else(|| ErrorData::invalid_params(format!("Prompt {name} not found"), None))?;

        let arguments = arguments.unwrap_or_default();
        let missing = prompt.options.missing_required(&arguments);
        if !missing.is_empty() {
            return Err(ErrorData::invalid_params(
                format!(
                    "Prompt {name} is missing required arguments: {}",
                    missing.join(", ")
                ),
                None,
            ));
        }

        (prompt.handler)(arguments)
            .await
            .map_err(|e| ErrorData::internal_error(format!("Prompt {name} failed: {e:#}"), None))
    }

    /// Read `uri`, trying static resources before templates.
    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        let target = {
            let registry = self.registry();
            match registry.resources.iter().find(|(_, r)| r.uri == uri) {
                Some((_, resource)) => Some(ReadTarget::Static(resource.read.clone())),
                None => registry.templates.iter().find_map(|(_, t)| {
                    t.template
                        .match_uri(uri)
                        .map(|variables| ReadTarget::Template(t.read.clone(), variables))
                }),
            }
        };

        let result = match target {
            Some(ReadTarget::Static(read)) => read(uri.to_string()).await,
            Some(ReadTarget::Template(read, variables)) => read(uri.to_string(), variables).await,
            None => {
                return Err(ErrorData::resource_not_found(
                    format!("Resource {uri} not found"),
                    None,
                ))
            }
        };
        result.map_err(|e| {
            ErrorData::internal_error(format!("Reading resource {uri} failed: {e:#}"), None)
        })
    }
}

enum ReadTarget {
    Static(ResourceReadCallback),
    Template(ResourceTemplateReadCallback, crate::TemplateVariables),
}

impl RegistrationTarget for McpServer {
    fn register_prompt(&self, name: String, options: PromptOptions, handler: PromptHandler) {
        upsert(
            &mut self.registry().prompts,
            name,
            RegisteredPrompt { options, handler },
            "prompt",
        );
        self.announce(ListChanged::Prompts);
    }

    fn register_tool(&self, name: String, options: ToolOptions, handler: ToolHandler) {
        upsert(
            &mut self.registry().tools,
            name,
            RegisteredTool { options, handler },
            "tool",
        );
        self.announce(ListChanged::Tools);
    }

    fn register_resource(
        &self,
        name: String,
        uri: String,
        metadata: ResourceMetadata,
        read: ResourceReadCallback,
    ) {
        upsert(
            &mut self.registry().resources,
            name,
            RegisteredResource {
                uri,
                metadata,
                read,
            },
            "resource",
        );
        self.announce(ListChanged::Resources);
    }

    fn register_resource_template(
        &self,
        name: String,
        template: ResourceTemplate,
        metadata: ResourceMetadata,
        read: ResourceTemplateReadCallback,
    ) {
        upsert(
            &mut self.registry().templates,
            name,
            RegisteredTemplate {
                template,
                metadata,
                read,
            },
            "resource template",
        );
        self.announce(ListChanged::Resources);
    }

    fn send_logging_message(&self, message: LogMessage) -> Result<(), NotConnected> {
        if let Some(min) = self.log_level() {
            if message.level < min {
                tracing::trace!(level = %message.level, %min, "Log message below client level");
                return Ok(());
            }
        }

        let Some(outbox) = self.outbox() else {
            return Err(NotConnected(message));
        };
        if outbox.send(Notification::Log(message)).is_err() {
            tracing::warn!("Notification pump stopped; log message dropped");
        }
        Ok(())
    }

    fn send_list_changed(&self, list: ListChanged) {
        match self.outbox() {
            Some(outbox) => {
                if outbox.send(Notification::ListChanged(list)).is_err() {
                    tracing::warn!(list = list.as_str(), "Notification pump stopped");
                }
            }
            None => {
                tracing::debug!(
                    list = list.as_str(),
                    "No client session; list_changed notification skipped"
                );
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.outbox().is_some()
    }
}

#[allow(refining_impl_trait_reachable)]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        self.info.clone()
    }

    fn call_tool<'a>(
        &'a self,
        params: CallToolRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<CallToolResult, ErrorData>> + Send + 'a>> {
        self.store_peer_if_empty(ctx.peer.clone());

        Box::pin(async move {
            let start_time = std::time::Instant::now();
            let result = self.invoke_tool(&params.name, params.arguments).await;
            tracing::debug!(
                tool = %params.name,
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Tool call finished"
            );
            result
        })
    }

    fn list_tools<'a>(
        &'a self,
        _params: Option<PaginatedRequestParam>,
        ctx: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<ListToolsResult, ErrorData>> + Send + 'a>> {
        self.store_peer_if_empty(ctx.peer.clone());

        Box::pin(async move { self.tool_list().map(ListToolsResult::with_all_items) })
    }

    fn list_prompts<'a>(
        &'a self,
        _params: Option<PaginatedRequestParam>,
        ctx: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<ListPromptsResult, ErrorData>> + Send + 'a>> {
        self.store_peer_if_empty(ctx.peer.clone());

        Box::pin(async move { self.prompt_list().map(ListPromptsResult::with_all_items) })
    }

    fn get_prompt<'a>(
        &'a self,
        params: GetPromptRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<GetPromptResult, ErrorData>> + Send + 'a>> {
        self.store_peer_if_empty(ctx.peer.clone());

        Box::pin(async move { self.render_prompt(&params.name, params.arguments).await })
    }

    fn list_resources<'a>(
        &'a self,
        _params: Option<PaginatedRequestParam>,
        ctx: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<ListResourcesResult, ErrorData>> + Send + 'a>> {
        self.store_peer_if_empty(ctx.peer.clone());

        Box::pin(async move { self.resource_list().map(ListResourcesResult::with_all_items) })
    }

    fn list_resource_templates<'a>(
        &'a self,
        _params: Option<PaginatedRequestParam>,
        ctx: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<ListResourceTemplatesResult, ErrorData>> + Send + 'a>>
    {
        self.store_peer_if_empty(ctx.peer.clone());

        Box::pin(async move {
            self.resource_template_list()
                .map(ListResourceTemplatesResult::with_all_items)
        })
    }

    fn read_resource<'a>(
        &'a self,
        params: ReadResourceRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<ReadResourceResult, ErrorData>> + Send + 'a>> {
        self.store_peer_if_empty(ctx.peer.clone());

        Box::pin(async move { self.read(&params.uri).await })
    }

    fn set_level<'a>(
        &'a self,
        params: SetLevelRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ErrorData>> + Send + 'a>> {
        self.store_peer_if_empty(ctx.peer.clone());

        Box::pin(async move {
            let level = LogLevel::from(params.level);
            tracing::debug!(%level, "Client requested log level");
            *lock(&self.min_log_level) = Some(level);
            Ok(())
        })
    }
}

/// Fill in what every server built here supports: logging (as an empty
/// object) and list-changed-capable tools, prompts and resources.
pub fn normalize_capabilities(mut capabilities: ServerCapabilities) -> ServerCapabilities {
    if capabilities.logging.is_none() {
        capabilities.logging = Some(JsonObject::new());
    }
    if capabilities.tools.is_none() {
        capabilities.tools = Some(ToolsCapability {
            list_changed: Some(true),
        });
    }
    if capabilities.prompts.is_none() {
        capabilities.prompts = Some(PromptsCapability {
            list_changed: Some(true),
        });
    }
    if capabilities.resources.is_none() {
        capabilities.resources = Some(ResourcesCapability {
            subscribe: None,
            list_changed: Some(true),
        });
    }
    capabilities
}

/// Builder for [`McpServer`].
///
/// # Example
///
/// ```ignore
/// let server = McpServer::builder("code-reviewer")
///     .with_version("1.2.0")
///     .with_instructions("Reviews code snippets")
///     .build();
/// ```
pub struct McpServerBuilder {
    name: String,
    version: Option<String>,
    title: Option<String>,
    instructions: Option<String>,
    capabilities: Option<ServerCapabilities>,
}

impl McpServerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            title: None,
            instructions: None,
            capabilities: None,
        }
    }

    /// Version reported to clients. Defaults to [`DEFAULT_VERSION`].
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_version_opt(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Set server instructions shown to MCP clients.
    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Base capabilities; missing entries are filled by [`normalize_capabilities`].
    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn build(self) -> McpServer {
        let mut server_info = Implementation::from_build_env();
        server_info.name = self.name;
        server_info.version = self
            .version
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        server_info.title = self.title;

        McpServer {
            info: ServerInfo {
                capabilities: normalize_capabilities(self.capabilities.unwrap_or_default()),
                server_info,
                instructions: self.instructions,
                ..Default::default()
            },
            registry: Arc::new(Mutex::new(Registry::default())),
            session: Arc::new(Mutex::new(None)),
            min_log_level: Arc::new(Mutex::new(None)),
        }
    }
}
