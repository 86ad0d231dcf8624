// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! One function per protocol log level, sending through the global registrar.
//!
//! ```ignore
//! mcpez::logger::info("cache warmed");
//! mcpez::logger::error(serde_json::json!({ "code": 42, "reason": "disk full" }));
//! ```

use serde_json::Value;

use crate::LogLevel;

pub fn debug(data: impl Into<Value>) {
    crate::log(LogLevel::Debug, data, None);
}

pub fn info(data: impl Into<Value>) {
    crate::log(LogLevel::Info, data, None);
}

pub fn notice(data: impl Into<Value>) {
    crate::log(LogLevel::Notice, data, None);
}

pub fn warning(data: impl Into<Value>) {
    crate::log(LogLevel::Warning, data, None);
}

pub fn error(data: impl Into<Value>) {
    crate::log(LogLevel::Error, data, None);
}

pub fn critical(data: impl Into<Value>) {
    crate::log(LogLevel::Critical, data, None);
}

pub fn alert(data: impl Into<Value>) {
    crate::log(LogLevel::Alert, data, None);
}

pub fn emergency(data: impl Into<Value>) {
    crate::log(LogLevel::Emergency, data, None);
}
