// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Resource and resource-template registration types.
//!
//! Templates use simple `{name}` expressions. A variable matches one or more
//! characters up to the next literal part and never spans a `/`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rmcp::model::{ReadResourceResult, Resource};
use serde_json::json;

/// Values bound to template variables, keyed by variable name.
pub type TemplateVariables = HashMap<String, String>;

/// Async callback invoked for `resources/read` on a static URI.
pub type ResourceReadCallback =
    Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<ReadResourceResult>> + Send + Sync>;

/// Async callback invoked for `resources/read` on a URI matching a template.
pub type ResourceTemplateReadCallback = Arc<
    dyn Fn(String, TemplateVariables) -> BoxFuture<'static, anyhow::Result<ReadResourceResult>>
        + Send
        + Sync,
>;

/// Wrap an async closure as a [`ResourceReadCallback`].
pub fn resource_reader<F, Fut>(f: F) -> ResourceReadCallback
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
{
    Arc::new(move |uri| f(uri).boxed())
}

/// Wrap an async closure as a [`ResourceTemplateReadCallback`].
pub fn template_reader<F, Fut>(f: F) -> ResourceTemplateReadCallback
where
    F: Fn(String, TemplateVariables) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
{
    Arc::new(move |uri, variables| f(uri, variables).boxed())
}

/// Descriptive metadata shared by resources and resource templates.
#[derive(Debug, Clone, Default)]
pub struct ResourceMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
}

impl ResourceMetadata {
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

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    fn apply(&self, raw: &mut serde_json::Value) {
        if let Some(title) = &self.title {
            raw["title"] = json!(title);
        }
        if let Some(description) = &self.description {
            raw["description"] = json!(description);
        }
        if let Some(mime_type) = &self.mime_type {
            raw["mimeType"] = json!(mime_type);
        }
    }

    pub(crate) fn describe_resource(
        &self,
        name: &str,
        uri: &str,
    ) -> Result<Resource, serde_json::Error> {
        let mut raw = json!({ "uri": uri, "name": name });
        self.apply(&mut raw);
        serde_json::from_value(raw)
    }

    pub(crate) fn describe_template(
        &self,
        name: &str,
        template: &ResourceTemplate,
    ) -> Result<rmcp::model::ResourceTemplate, serde_json::Error> {
        let mut raw = json!({ "uriTemplate": template.uri_template(), "name": name });
        self.apply(&mut raw);
        serde_json::from_value(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A URI template such as `audit-log://{date}/{level}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTemplate {
    uri_template: String,
    segments: Vec<Segment>,
}

impl ResourceTemplate {
    /// Parse a template. An unterminated `{` is kept as literal text.
    pub fn new(uri_template: impl Into<String>) -> Self {
        let uri_template = uri_template.into();
        let mut segments = Vec::new();
        let mut rest = uri_template.as_str();

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            segments.push(Segment::Variable(rest[open + 1..close].trim().to_string()));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Self {
            uri_template,
            segments,
        }
    }

    pub fn uri_template(&self) -> &str {
        &self.uri_template
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute `variables` into the template. Unbound variables expand to
    /// the empty string.
    pub fn expand(&self, variables: &TemplateVariables) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Variable(name) => variables.get(name).map_or("", String::as_str),
            })
            .collect()
    }

    /// Match `uri` against the template, returning the bound variables.
    ///
    /// Two variables with no literal between them cannot be separated and
    /// never match.
    pub fn match_uri(&self, uri: &str) -> Option<TemplateVariables> {
        let mut variables = TemplateVariables::new();
        let mut rest = uri;
        let mut segments = self.segments.iter().peekable();

        while let Some(segment) = segments.next() {
            match segment {
                Segment::Literal(text) => {
                    rest = rest.strip_prefix(text.as_str())?;
                }
                Segment::Variable(name) => {
                    let end = match segments.peek() {
                        None => rest.len(),
                        Some(Segment::Literal(next)) => {
                            // Values are non-empty, so search from the second char.
                            let first = rest.chars().next()?.len_utf8();
                            first + rest[first..].find(next.as_str())?
                        }
                        Some(Segment::Variable(_)) => return None,
                    };
                    let value = &rest[..end];
                    if value.is_empty() || value.contains('/') {
                        return None;
                    }
                    variables.insert(name.clone(), value.to_string());
                    rest = &rest[end..];
                }
            }
        }

        rest.is_empty().then_some(variables)
    }
}

impl From<&str> for ResourceTemplate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceTemplate {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[derive(Clone)]
pub(crate) struct RegisteredResource {
    pub(crate) uri: String,
    pub(crate) metadata: ResourceMetadata,
    pub(crate) read: ResourceReadCallback,
}

#[derive(Clone)]
pub(crate) struct RegisteredTemplate {
    pub(crate) template: ResourceTemplate,
    pub(crate) metadata: ResourceMetadata,
    pub(crate) read: ResourceTemplateReadCallback,
}
