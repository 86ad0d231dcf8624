// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Server construction options and the transport used by automatic starts.

use mcpez_server::McpServer;
use rmcp::model::ServerCapabilities;
use tokio::io::{AsyncRead, AsyncWrite};

/// Read half of a transport built for an automatic start.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Write half of a transport built for an automatic start.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Produces the transport for an automatic start. Called at most once per start.
pub type TransportFactory = Box<dyn Fn() -> (BoxedReader, BoxedWriter) + Send + Sync>;

/// stdin/stdout, the transport used when none is given.
pub fn stdio_transport() -> (BoxedReader, BoxedWriter) {
    let (stdin, stdout) = rmcp::transport::stdio();
    (Box::new(stdin), Box::new(stdout))
}

/// Identity and capabilities of the server built by the start sequence.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub version: Option<String>,
    pub title: Option<String>,
    pub instructions: Option<String>,
    /// Missing `logging`, `tools`, `prompts` and `resources` entries are filled in.
    pub capabilities: Option<ServerCapabilities>,
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub(crate) fn build_server(self, name: impl Into<String>) -> McpServer {
        let builder = McpServer::builder(name)
            .with_version_opt(self.version)
            .with_title(self.title)
            .with_instructions(self.instructions);
        match self.capabilities {
            Some(capabilities) => builder.with_capabilities(capabilities),
            None => builder,
        }
        .build()
    }
}

#[cfg(test)]
mod tests {
    use mcpez_server::DEFAULT_VERSION;
    use rmcp::model::JsonObject;

    use super::*;

    #[test]
    fn test_defaults_applied() {
        let server = ServerOptions::new().build_server("calculator");
        let info = server.info();

        assert_eq!(info.server_info.name, "calculator");
        assert_eq!(info.server_info.version, DEFAULT_VERSION);
        assert_eq!(info.capabilities.logging, Some(JsonObject::new()));
        assert!(info.instructions.is_none());
    }

    #[test]
    fn test_options_carried_into_server() {
        let server = ServerOptions::new()
            .with_version("3.1.4")
            .with_title("Calculator")
            .with_instructions("Adds numbers")
            .build_server("calculator");
        let info = server.info();

        assert_eq!(info.server_info.version, "3.1.4");
        assert_eq!(info.server_info.title.as_deref(), Some("Calculator"));
        assert_eq!(info.instructions.as_deref(), Some("Adds numbers"));
    }

    #[test]
    fn test_partial_capabilities_are_completed() {
        let capabilities = ServerCapabilities {
            experimental: None,
            ..Default::default()
        };
        let server = ServerOptions::new()
            .with_capabilities(capabilities)
            .build_server("s");

        let capabilities = &server.info().capabilities;
        assert!(capabilities.logging.is_some());
        assert!(capabilities.tools.is_some());
    }
}
