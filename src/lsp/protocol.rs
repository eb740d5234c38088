/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! JSON-RPC 2.0 messages and the `Content-Length` stdio framing.
//!
//! Over the bridge WebSocket each frame carries one bare JSON-RPC body;
//! only the language server's stdio uses header framing.

use anyhow::{Context, Result, bail};
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version string sent with every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Error code for a request the receiver does not implement.
pub const METHOD_NOT_FOUND: i64 = -32601;

const HEADER_END: &[u8] = b"\r\n\r\n";

fn default_null() -> Value {
    Value::Null
}

/// A request or response id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// A call that expects a response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequestMessage {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Correlates the response.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Parameters, `null` when absent.
    #[serde(default = "default_null")]
    pub params: Value,
}

impl RequestMessage {
    /// Builds a request.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.to_string(),
            params,
        }
    }
}

/// The answer to a request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResponseMessage {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Id of the answered request.
    pub id: Option<RequestId>,
    /// Result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl ResponseMessage {
    /// Builds an error response for `id`.
    #[must_use]
    pub fn error(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A one-way message.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationMessage {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Parameters, `null` when absent.
    #[serde(default = "default_null")]
    pub params: Value,
}

impl NotificationMessage {
    /// Builds a notification.
    #[must_use]
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// Error object of a failed response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResponseError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
    /// Extra data, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An inbound JSON-RPC message, classified by shape.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Has both `id` and `method`.
    Request(RequestMessage),
    /// Has `id` but no `method`.
    Response(ResponseMessage),
    /// Has `method` but no `id`.
    Notification(NotificationMessage),
}

impl Incoming {
    /// Classifies and decodes a JSON-RPC body.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is neither a request, a response nor a
    /// notification.
    pub fn from_value(value: Value) -> Result<Self> {
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").is_some();
        Ok(match (has_id, has_method) {
            (true, true) => Self::Request(serde_json::from_value(value)?),
            (_, false) if value.get("result").is_some() || value.get("error").is_some() => {
                Self::Response(serde_json::from_value(value)?)
            }
            (false, true) => Self::Notification(serde_json::from_value(value)?),
            _ => bail!("Not a JSON-RPC message: {value}"),
        })
    }
}

/// Wraps a JSON body in a `Content-Length` header.
#[must_use]
pub fn encode_frame(body: &str) -> Vec<u8> {
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(body.as_bytes());
    frame
}

/// Takes one complete framed body off the front of `buffer`.
///
/// Returns `Ok(None)` until a whole frame has arrived; the partial bytes
/// stay in the buffer.
///
/// # Errors
///
/// Returns an error if the headers are not UTF-8, lack a `Content-Length`,
/// declare a length that cannot be addressed, or the body is not UTF-8.
pub fn decode_frame(buffer: &mut BytesMut) -> Result<Option<String>> {
    let Some(header_len) = buffer
        .windows(HEADER_END.len())
        .position(|w| w == HEADER_END)
    else {
        return Ok(None);
    };

    let headers =
        std::str::from_utf8(&buffer[..header_len]).context("Failed to parse headers as UTF-8")?;
    let content_len = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>())
        })
        .context("Frame has no Content-Length header")?
        .context("Invalid Content-Length header")?;

    let body_start = header_len + HEADER_END.len();
    let Some(frame_end) = body_start.checked_add(content_len) else {
        bail!("Content-Length {content_len} is too large");
    };
    if buffer.len() < frame_end {
        return Ok(None);
    }

    buffer.advance(body_start);
    let body = buffer.split_to(content_len);
    Ok(Some(
        String::from_utf8(body.to_vec()).context("Frame body is not UTF-8")?,
    ))
}
