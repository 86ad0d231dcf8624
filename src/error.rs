// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Errors surfaced by the start sequence.

use rmcp::service::ServerInitializeError;

/// Why a call to start the server failed.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// A server was already constructed by an earlier start, explicit or automatic.
    #[error("MCP server already started. start must be called only once.")]
    AlreadyStarted,

    /// The transport handshake failed. The server handle stays installed.
    #[error("Failed to connect MCP transport")]
    Connect(#[source] ServerInitializeError),
}
