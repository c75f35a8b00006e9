//! Wire messages exchanged between the host editor and the output webview.
//!
//! Inbound (`HostMessage`) and outbound (`WebviewMessage`) enums are tagged
//! by a `type` field. The tag strings are part of the protocol and must not
//! change; note the historical kebab-case `did-scroll-wheel` among otherwise
//! camelCase tags.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::base64::{deserialize_payload, serialize_payload};

/// Error type for message decode failures.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to parse message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Where a renderer module is loaded from.
///
/// A renderer whose entrypoint declares `extends` does not render outputs on
/// its own; it augments the renderer named by `extends` and is therefore
/// skipped during mime-type matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RendererEntrypoint {
    /// Module URI, resolved by the embedder's module loader.
    pub uri: String,
    /// Id of the renderer this entrypoint extends, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub extends: Option<String>,
}

/// Static description of one output renderer, owned by the host.
///
/// Metadata is replaced wholesale on update, never mutated in place. Two
/// values are equal iff every field matches, including the *order* of
/// `mime_types` (derived `PartialEq` gives exactly that).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RendererMetadata {
    /// Unique renderer id.
    pub id: String,
    pub entrypoint: RendererEntrypoint,
    /// Mime types this renderer can paint, in preference order.
    pub mime_types: Vec<String>,
    /// Whether the renderer is given a host message channel at activation.
    #[serde(default)]
    pub requires_messaging: bool,
}

/// One mime representation of a logical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OutputItemDescriptor {
    pub mime: String,
    /// Raw payload, base64-encoded on the wire.
    #[serde(
        default,
        serialize_with = "serialize_payload",
        deserialize_with = "deserialize_payload"
    )]
    #[ts(type = "string")]
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "unknown")]
    pub metadata: Option<Value>,
}

/// A logical cell output announced by the host, with one item per mime
/// representation. An output always carries at least one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OutputDescriptor {
    pub output_id: String,
    pub items: Vec<OutputItemDescriptor>,
}

/// Messages sent by the host into the webview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export)]
pub enum HostMessage {
    /// Replace the renderer set with `renderer_data`.
    #[serde(rename_all = "camelCase")]
    UpdateRenderers { renderer_data: Vec<RendererMetadata> },

    /// Splice the ordered output list: delete a range, then append new
    /// outputs. Either half may be absent.
    #[serde(rename_all = "camelCase")]
    OutputChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        new_outputs: Option<Vec<OutputDescriptor>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        delete_start: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        delete_count: Option<usize>,
    },

    /// Payload relay addressed to a single renderer.
    #[serde(rename_all = "camelCase")]
    CustomRendererMessage {
        renderer_id: String,
        #[ts(type = "unknown")]
        message: Value,
    },

    /// Ask the webview to render outputs with a different preferred mime
    /// type.
    #[serde(rename_all = "camelCase")]
    ChangePreferredMimetype {
        output_id: String,
        mime_type: String,
    },

    /// Payload relay fanned out to every kernel preload module.
    CustomKernelMessage {
        #[ts(type = "unknown")]
        message: Value,
    },

    /// Load kernel preload modules, in order.
    Preload { resources: Vec<String> },

    /// Sync notebook style variables onto the document root.
    NotebookStyles { styles: HashMap<String, String> },
}

/// Messages sent by the webview back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export)]
pub enum WebviewMessage {
    /// Sent exactly once, after the webview's message handling is in place.
    Initialized,

    /// Content height report: once after each successful render, and again
    /// on every observed layout change.
    #[serde(rename_all = "camelCase")]
    DidRenderOutput { content_height: f64 },

    /// A wheel event the webview could not consume locally.
    #[serde(rename = "did-scroll-wheel", rename_all = "camelCase")]
    DidScrollWheel { delta_x: f64, delta_y: f64 },

    /// A text input element inside the webview gained or lost focus.
    #[serde(rename_all = "camelCase")]
    InputFocusChanged { focused: bool },

    /// Payload relay from a kernel preload module.
    CustomKernelMessage {
        #[ts(type = "unknown")]
        message: Value,
    },

    /// Payload relay from a renderer module.
    #[serde(rename_all = "camelCase")]
    CustomRendererMessage {
        renderer_id: String,
        #[ts(type = "unknown")]
        message: Value,
    },
}

impl HostMessage {
    /// Decode a single JSON-encoded host message.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(text)?)
    }
}

impl WebviewMessage {
    /// Encode as a single-line JSON string.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
