// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Tool registration types.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rmcp::model::{CallToolResult, JsonObject, Tool, ToolAnnotations};
use serde_json::{json, Value};

/// Async callback invoked for `tools/call`. Receives the call arguments.
///
/// Returning an error produces a tool result flagged `is_error` whose content is
/// the error text, so the model sees the failure instead of a protocol error.
pub type ToolHandler =
    Arc<dyn Fn(JsonObject) -> BoxFuture<'static, anyhow::Result<CallToolResult>> + Send + Sync>;

/// Wrap an async closure as a [`ToolHandler`].
pub fn tool_handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CallToolResult>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// Descriptive options for a tool.
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    /// JSON Schema for the arguments. Anything other than an object is
    /// replaced by an empty object schema when the tool is listed.
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub annotations: Option<ToolAnnotations>,
}

impl ToolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    fn input_schema_object(&self) -> Value {
        match &self.input_schema {
            Some(schema @ Value::Object(_)) => schema.clone(),
            _ => json!({ "type": "object", "properties": {} }),
        }
    }

    /// Names listed under `required` in the input schema that `args` lacks.
    pub(crate) fn missing_required(&self, args: &JsonObject) -> Vec<String> {
        self.input_schema
            .as_ref()
            .and_then(|schema| schema.get("required"))
            .and_then(Value::as_array)
            .map(|required| {
                required
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|key| !args.contains_key(*key))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn describe(&self, name: &str) -> Result<Tool, serde_json::Error> {
        let mut raw = json!({
            "name": name,
            "inputSchema": self.input_schema_object(),
        });
        if let Some(title) = &self.title {
            raw["title"] = json!(title);
        }
        if let Some(description) = &self.description {
            raw["description"] = json!(description);
        }
        if let Some(schema @ Value::Object(_)) = &self.output_schema {
            raw["outputSchema"] = schema.clone();
        }
        if let Some(annotations) = &self.annotations {
            raw["annotations"] = serde_json::to_value(annotations)?;
        }
        serde_json::from_value(raw)
    }
}

#[derive(Clone)]
pub(crate) struct RegisteredTool {
    pub(crate) options: ToolOptions,
    pub(crate) handler: ToolHandler,
}
