// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Prompt registration types.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rmcp::model::{GetPromptResult, JsonObject, Prompt};
use serde_json::{json, Value};

/// Async callback invoked for `prompts/get`. Receives the prompt arguments.
pub type PromptHandler =
    Arc<dyn Fn(JsonObject) -> BoxFuture<'static, anyhow::Result<GetPromptResult>> + Send + Sync>;

/// Wrap an async closure as a [`PromptHandler`].
pub fn prompt_handler<F, Fut>(f: F) -> PromptHandler
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<GetPromptResult>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// One named argument a prompt accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptArgumentSpec {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

impl PromptArgumentSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            required: false,
        }
    }
}

/// Descriptive options for a prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub arguments: Vec<PromptArgumentSpec>,
}

impl PromptOptions {
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

    pub fn with_argument(mut self, argument: PromptArgumentSpec) -> Self {
        self.arguments.push(argument);
        self
    }

    pub(crate) fn missing_required(&self, args: &JsonObject) -> Vec<String> {
        self.arguments
            .iter()
            .filter(|arg| arg.required && !args.contains_key(&arg.name))
            .map(|arg| arg.name.clone())
            .collect()
    }

    pub(crate) fn describe(&self, name: &str) -> Result<Prompt, serde_json::Error> {
        let arguments: Vec<Value> = self
            .arguments
            .iter()
            .map(|arg| {
                let mut raw = json!({ "name": arg.name, "required": arg.required });
                if let Some(description) = &arg.description {
                    raw["description"] = json!(description);
                }
                raw
            })
            .collect();

        let mut raw = json!({ "name": name });
        if let Some(title) = &self.title {
            raw["title"] = json!(title);
        }
        if let Some(description) = &self.description {
            raw["description"] = json!(description);
        }
        if !arguments.is_empty() {
            raw["arguments"] = Value::Array(arguments);
        }
        serde_json::from_value(raw)
    }
}

#[derive(Clone)]
pub(crate) struct RegisteredPrompt {
    pub(crate) options: PromptOptions,
    pub(crate) handler: PromptHandler,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_prompt_with_arguments() {
        let options = PromptOptions::new()
            .with_description("Review code and provide feedback")
            .with_argument(PromptArgumentSpec::required("subject", "Code to review"));

        let prompt = options.describe("review-code").unwrap();
        assert_eq!(prompt.name, "review-code");
        let arguments = prompt.arguments.unwrap();
        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments[0].name, "subject");
        assert_eq!(arguments[0].required, Some(true));
    }

    #[test]
    fn test_missing_required_ignores_optional_arguments() {
        let options = PromptOptions::new()
            .with_argument(PromptArgumentSpec::required("subject", "Code"))
            .with_argument(PromptArgumentSpec::optional("language", "Language"));

        assert_eq!(options.missing_required(&JsonObject::new()), vec!["subject"]);
    }
}
