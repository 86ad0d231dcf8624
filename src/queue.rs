// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Declarations made before a server exists, and their replay once it does.
//!
//! Replay preserves declaration order. Structural registrations always succeed
//! against a constructed server; log messages need a connected client and are
//! kept for the next flush until one is attached.

use std::fmt;
use std::sync::{Arc, Mutex};

use mcpez_server::{
    ListChanged, LogMessage, NotConnected, PromptHandler, PromptOptions, RegistrationTarget,
    ResourceMetadata, ResourceReadCallback, ResourceTemplate, ResourceTemplateReadCallback,
    ToolHandler, ToolOptions,
};

use crate::lock;

/// Where a resource lives: one fixed URI, or every URI matching a template.
#[derive(Clone)]
pub enum ResourceLocation {
    Uri {
        uri: String,
        read: ResourceReadCallback,
    },
    Template {
        template: ResourceTemplate,
        read: ResourceTemplateReadCallback,
    },
}

/// A capability or notification recorded before the server existed.
#[derive(Clone)]
pub enum DeferredRegistration {
    Prompt {
        name: String,
        options: PromptOptions,
        handler: PromptHandler,
    },
    Tool {
        name: String,
        options: ToolOptions,
        handler: ToolHandler,
    },
    Resource {
        name: String,
        location: ResourceLocation,
        metadata: ResourceMetadata,
    },
    Log(LogMessage),
    ListChanged(ListChanged),
}

impl DeferredRegistration {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Prompt { .. } => "prompt",
            Self::Tool { .. } => "tool",
            Self::Resource {
                location: ResourceLocation::Uri { .. },
                ..
            } => "resource",
            Self::Resource {
                location: ResourceLocation::Template { .. },
                ..
            } => "resource template",
            Self::Log(_) => "log",
            Self::ListChanged(_) => "list changed",
        }
    }

    /// Replay onto `target`. Returns the item back if it must wait for a
    /// connected client.
    pub(crate) fn dispatch(self, target: &impl RegistrationTarget) -> Option<Self> {
        match self {
            Self::Prompt {
                name,
                options,
                handler,
            } => target.register_prompt(name, options, handler),
            Self::Tool {
                name,
                options,
                handler,
            } => target.register_tool(name, options, handler),
            Self::Resource {
                name,
                location: ResourceLocation::Uri { uri, read },
                metadata,
            } => target.register_resource(name, uri, metadata, read),
            Self::Resource {
                name,
                location: ResourceLocation::Template { template, read },
                metadata,
            } => target.register_resource_template(name, template, metadata, read),
            Self::Log(message) => {
                if let Err(NotConnected(message)) = target.send_logging_message(message) {
                    return Some(Self::Log(message));
                }
            }
            Self::ListChanged(list) => target.send_list_changed(list),
        }
        None
    }
}

impl fmt::Debug for DeferredRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("DeferredRegistration");
        out.field("kind", &self.kind());
        match self {
            Self::Prompt { name, .. } | Self::Tool { name, .. } | Self::Resource { name, .. } => {
                out.field("name", name);
            }
            Self::Log(message) => {
                out.field("level", &message.level);
            }
            Self::ListChanged(list) => {
                out.field("list", &list.as_str());
            }
        }
        out.finish()
    }
}

/// Outcome of one [`RegistrationQueue::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    pub requeued: usize,
}

type EnqueueHook = Arc<dyn Fn() + Send + Sync>;

/// FIFO buffer of [`DeferredRegistration`]s with partial drain.
#[derive(Default)]
pub struct RegistrationQueue {
    items: Mutex<Vec<DeferredRegistration>>,
    on_enqueue: Mutex<Option<EnqueueHook>>,
}

impl RegistrationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the callback run after every [`enqueue`](Self::enqueue).
    /// Replaces any previous callback.
    pub fn set_on_enqueue(&self, hook: impl Fn() + Send + Sync + 'static) {
        *lock(&self.on_enqueue) = Some(Arc::new(hook));
    }

    pub fn enqueue(&self, item: DeferredRegistration) {
        tracing::debug!(?item, "Queued until the server starts");
        lock(&self.items).push(item);

        let hook = lock(&self.on_enqueue).clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.items).clear();
    }

    /// Replay every queued item onto `target` in order. Items that cannot be
    /// delivered yet stay queued ahead of anything enqueued during the flush.
    pub fn flush(&self, target: &impl RegistrationTarget) -> FlushReport {
        let pending = std::mem::take(&mut *lock(&self.items));
        let mut report = FlushReport::default();
        let mut requeue = Vec::new();

        for item in pending {
            match item.dispatch(target) {
                Some(item) => requeue.push(item),
                None => report.delivered += 1,
            }
        }
        report.requeued = requeue.len();

        if !requeue.is_empty() {
            let mut items = lock(&self.items);
            requeue.append(&mut items);
            *items = requeue;
        }

        tracing::debug!(
            delivered = report.delivered,
            requeued = report.requeued,
            "Flushed deferred registrations"
        );
        report
    }
}
