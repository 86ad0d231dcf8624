// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Server-to-client notifications: protocol log messages and list-changed signals.
//!
//! Once a client session is attached, every notification goes through a single
//! pump task so that the client observes them in emission order.

use std::fmt;
use std::str::FromStr;

use rmcp::model::{LoggingLevel, LoggingMessageNotificationParam};
use rmcp::{Peer, RoleServer};
use serde_json::Value;
use tokio::sync::mpsc;

/// Severity of a protocol log message, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    /// Wire name of the level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "notice" => Ok(Self::Notice),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "emergency" => Ok(Self::Emergency),
            _ => Err(anyhow::anyhow!("Unknown log level: {}", value)),
        }
    }
}

impl From<LogLevel> for LoggingLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Notice => Self::Notice,
            LogLevel::Warning => Self::Warning,
            LogLevel::Error => Self::Error,
            LogLevel::Critical => Self::Critical,
            LogLevel::Alert => Self::Alert,
            LogLevel::Emergency => Self::Emergency,
        }
    }
}

impl From<LoggingLevel> for LogLevel {
    fn from(level: LoggingLevel) -> Self {
        match level {
            LoggingLevel::Debug => Self::Debug,
            LoggingLevel::Info => Self::Info,
            LoggingLevel::Notice => Self::Notice,
            LoggingLevel::Warning => Self::Warning,
            LoggingLevel::Error => Self::Error,
            LoggingLevel::Critical => Self::Critical,
            LoggingLevel::Alert => Self::Alert,
            LoggingLevel::Emergency => Self::Emergency,
        }
    }
}

/// A `notifications/message` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub level: LogLevel,
    pub data: Value,
    /// Name of the component that produced the message.
    pub logger: Option<String>,
}

impl LogMessage {
    pub fn new(level: LogLevel, data: impl Into<Value>) -> Self {
        Self {
            level,
            data: data.into(),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    fn to_param(&self) -> LoggingMessageNotificationParam {
        LoggingMessageNotificationParam {
            level: self.level.into(),
            logger: self.logger.clone(),
            data: self.data.clone(),
        }
    }
}

/// Which capability list a `list_changed` notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListChanged {
    Resources,
    Tools,
    Prompts,
}

impl ListChanged {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::Tools => "tools",
            Self::Prompts => "prompts",
        }
    }
}

/// Returned when a log message cannot be delivered because no client session is
/// active. The message is handed back so the caller can retry it later.
#[derive(Debug, Clone, PartialEq)]
pub struct NotConnected(pub LogMessage);

impl fmt::Display for NotConnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no client session is connected; {} message not delivered",
            self.0.level
        )
    }
}

impl std::error::Error for NotConnected {}

#[derive(Debug)]
pub(crate) enum Notification {
    Log(LogMessage),
    ListChanged(ListChanged),
}

/// Spawn the task that forwards queued notifications to `peer`, one at a time.
///
/// The task ends when the returned sender is dropped.
pub(crate) fn spawn_pump(peer: Peer<RoleServer>) -> mpsc::UnboundedSender<Notification> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            deliver(&peer, notification).await;
        }
        tracing::debug!("Notification pump stopped");
    });
    tx
}

async fn deliver(peer: &Peer<RoleServer>, notification: Notification) {
    let result = match &notification {
        Notification::Log(message) => peer.notify_logging_message(message.to_param()).await,
        Notification::ListChanged(ListChanged::Tools) => peer.notify_tool_list_changed().await,
        Notification::ListChanged(ListChanged::Prompts) => peer.notify_prompt_list_changed().await,
        Notification::ListChanged(ListChanged::Resources) => {
            peer.notify_resource_list_changed().await
        }
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, ?notification, "Failed to deliver notification");
    }
}
