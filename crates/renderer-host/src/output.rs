//! Output data model.
//!
//! An output is one notebook result: an ordered list of alternative
//! representations of the same value (`text/plain` next to `text/html` next
//! to `image/png`), of which at most one is on screen at a time.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use webview_protocol::{OutputDescriptor, OutputItemDescriptor};

use crate::surface::ElementHandle;

/// Raised when a descriptor arrives with no content items.
#[derive(Debug, Error)]
#[error("output {output_id} has no content items")]
pub struct EmptyOutput {
    pub output_id: String,
}

/// One representation of an output, addressed by MIME type.
///
/// The views (`text`, `json`) re-derive from the byte payload on every
/// call rather than caching, so renderers always see the bytes as stored.
#[derive(Debug, Clone)]
pub struct OutputItem {
    id: String,
    mime: String,
    metadata: Value,
    data: Bytes,
}

impl OutputItem {
    pub fn new(
        id: impl Into<String>,
        mime: impl Into<String>,
        metadata: Value,
        data: Bytes,
    ) -> Self {
        Self {
            id: id.into(),
            mime: mime.into(),
            metadata,
            data,
        }
    }

    fn from_descriptor(output_id: &str, descriptor: OutputItemDescriptor) -> Self {
        Self {
            id: output_id.to_string(),
            mime: descriptor.mime,
            metadata: descriptor.metadata.unwrap_or(Value::Null),
            data: descriptor.data,
        }
    }

    /// Id of the owning output.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// The raw payload.
    pub fn data(&self) -> Bytes {
        self.data.clone()
    }

    /// Payload decoded as text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Payload parsed as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

/// A live output: its items, its mount element, and which item a renderer
/// last put on screen.
#[derive(Debug)]
pub struct Output {
    id: String,
    items: Arc<Vec<OutputItem>>,
    element: ElementHandle,
    renderer_id: Option<String>,
    rendered_item: Option<usize>,
}

/// Outputs are shared between the dispatch loop and in-flight render tasks.
pub type SharedOutput = Arc<Mutex<Output>>;

impl Output {
    /// Build from a wire descriptor. Descriptors without items are invalid.
    pub fn from_descriptor(
        descriptor: OutputDescriptor,
        element: ElementHandle,
    ) -> Result<Self, EmptyOutput> {
        if descriptor.items.is_empty() {
            return Err(EmptyOutput {
                output_id: descriptor.output_id,
            });
        }
        let items = descriptor
            .items
            .into_iter()
            .map(|item| OutputItem::from_descriptor(&descriptor.output_id, item))
            .collect();
        Ok(Self {
            id: descriptor.output_id,
            items: Arc::new(items),
            element,
            renderer_id: None,
            rendered_item: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn items(&self) -> Arc<Vec<OutputItem>> {
        Arc::clone(&self.items)
    }

    pub fn element(&self) -> &ElementHandle {
        &self.element
    }

    /// Renderer that produced the current content, once one has succeeded.
    pub fn renderer_id(&self) -> Option<&str> {
        self.renderer_id.as_deref()
    }

    pub fn set_renderer(&mut self, renderer_id: Option<String>) {
        self.renderer_id = renderer_id;
    }

    pub fn rendered_item(&self) -> Option<usize> {
        self.rendered_item
    }

    pub fn set_rendered_item(&mut self, index: Option<usize>) {
        self.rendered_item = index;
    }

    /// Pick the item to try first: an explicit MIME preference wins, then
    /// the item already on screen, then the first item.
    pub fn select_item(&self, preferred_mime: Option<&str>) -> usize {
        if let Some(mime) = preferred_mime {
            if let Some(index) = self.items.iter().position(|item| item.mime() == mime) {
                return index;
            }
        }
        if let Some(index) = self.rendered_item {
            if index < self.items.len() {
                return index;
            }
        }
        0
    }
}
