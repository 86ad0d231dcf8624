// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The registration surface a live server exposes to code that replays
//! declarations made before it existed.

use crate::notify::{ListChanged, LogMessage, NotConnected};
use crate::prompts::{PromptHandler, PromptOptions};
use crate::resources::{
    ResourceMetadata, ResourceReadCallback, ResourceTemplate, ResourceTemplateReadCallback,
};
use crate::tools::{ToolHandler, ToolOptions};

/// Something tools, prompts and resources can be attached to, and that can
/// emit notifications to a connected client.
///
/// [`McpServer`](crate::McpServer) is the production implementation.
pub trait RegistrationTarget {
    fn register_prompt(&self, name: String, options: PromptOptions, handler: PromptHandler);

    fn register_tool(&self, name: String, options: ToolOptions, handler: ToolHandler);

    fn register_resource(
        &self,
        name: String,
        uri: String,
        metadata: ResourceMetadata,
        read: ResourceReadCallback,
    );

    fn register_resource_template(
        &self,
        name: String,
        template: ResourceTemplate,
        metadata: ResourceMetadata,
        read: ResourceTemplateReadCallback,
    );

    /// Send a `notifications/message`. Fails with the message when no client
    /// session is active yet.
    fn send_logging_message(&self, message: LogMessage) -> Result<(), NotConnected>;

    /// Send the matching `notifications/*/list_changed`. Without a client
    /// session there is nobody to tell, so this never fails.
    fn send_list_changed(&self, list: ListChanged);

    /// Whether a client session is attached.
    fn is_connected(&self) -> bool;
}
