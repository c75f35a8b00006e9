//! Host document abstraction.
//!
//! ## Why a trait
//!
//! The engine never touches a real DOM. Everything it needs from the
//! document (output mount points, content height, resize and input events,
//! root style properties) sits behind [`DocumentSurface`], so the same
//! dispatch and rendering logic runs against a webview binding in
//! production and [`MemorySurface`] in tests and the stdio harness.
//!
//! ## Elements
//!
//! An [`ElementHandle`] is a cheap clone of one output's mount point.
//! Renderers write into it, the fallback walk replaces whatever partial
//! content a failed renderer left behind, and tests inspect it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::emitter::{Emitter, EventStream};
use crate::scroll::WheelEvent;

/// What an output's mount element currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementContent {
    Empty,
    /// Markup written by a renderer.
    Html(String),
    /// Error block: a message plus the raw text of the item that failed.
    Error { message: String, raw_output: String },
}

#[derive(Debug)]
struct ElementState {
    content: ElementContent,
}

/// Mount point for one output. Clones share the same underlying element.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    output_id: String,
    state: Arc<Mutex<ElementState>>,
}

impl ElementHandle {
    pub fn new(output_id: impl Into<String>) -> Self {
        Self {
            output_id: output_id.into(),
            state: Arc::new(Mutex::new(ElementState {
                content: ElementContent::Empty,
            })),
        }
    }

    pub fn output_id(&self) -> &str {
        &self.output_id
    }

    /// Replace the element's content with renderer-produced markup.
    pub fn set_html(&self, html: impl Into<String>) {
        self.state.lock().unwrap().content = ElementContent::Html(html.into());
    }

    /// Replace the element's content with an error block. Discards any
    /// partial content a failed renderer left behind.
    pub fn show_error(&self, message: impl Into<String>, raw_output: impl Into<String>) {
        self.state.lock().unwrap().content = ElementContent::Error {
            message: message.into(),
            raw_output: raw_output.into(),
        };
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().content = ElementContent::Empty;
    }

    pub fn content(&self) -> ElementContent {
        self.state.lock().unwrap().content.clone()
    }
}

/// Pointer- and focus-level events the surface observes on the document.
#[derive(Debug, Clone)]
pub enum UiEvent {
    Wheel(WheelEvent),
    /// Focus moved onto or off an element; `text_input` marks editable ones.
    Focus { focused: bool, text_input: bool },
}

/// The document as the engine sees it.
#[async_trait]
pub trait DocumentSurface: Send + Sync {
    /// Create (or replace) the mount element for `output_id`.
    fn create_output_element(&self, output_id: &str) -> ElementHandle;

    /// Remove the mount element for `output_id`, if present.
    fn remove_output_element(&self, output_id: &str);

    /// Resolve once every image currently in the document has loaded or
    /// failed. Resolves immediately when there are none.
    async fn images_settled(&self);

    /// Current height of the rendered content in CSS pixels.
    fn content_height(&self) -> f64;

    /// Stream of content height changes after layout settles.
    fn resize_events(&self) -> EventStream<f64>;

    /// Stream of wheel and focus events.
    fn ui_events(&self) -> EventStream<UiEvent>;

    /// Names of custom properties currently set on the document root.
    fn root_property_names(&self) -> Vec<String>;

    fn set_root_property(&self, name: &str, value: &str);

    fn remove_root_property(&self, name: &str);
}

/// In-memory surface used by tests and the stdio harness.
///
/// Test code drives it through the `dispatch_*` and image helpers and
/// inspects elements with [`MemorySurface::element`].
pub struct MemorySurface {
    elements: Mutex<HashMap<String, ElementHandle>>,
    root_properties: Mutex<BTreeMap<String, String>>,
    content_height: Mutex<f64>,
    pending_images: watch::Sender<usize>,
    resize: Emitter<f64>,
    ui: Emitter<UiEvent>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            elements: Mutex::new(HashMap::new()),
            root_properties: Mutex::new(BTreeMap::new()),
            content_height: Mutex::new(0.0),
            pending_images: watch::channel(0).0,
            resize: Emitter::new(),
            ui: Emitter::new(),
        }
    }

    /// Look up a live mount element, for assertions.
    pub fn element(&self, output_id: &str) -> Option<ElementHandle> {
        self.elements.lock().unwrap().get(output_id).cloned()
    }

    pub fn root_property(&self, name: &str) -> Option<String> {
        self.root_properties.lock().unwrap().get(name).cloned()
    }

    /// Mark one more image as still loading.
    pub fn add_pending_image(&self) {
        self.pending_images.send_modify(|count| *count += 1);
    }

    /// Mark one pending image as loaded or failed.
    pub fn complete_image(&self) {
        self.pending_images
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    pub fn set_content_height(&self, height: f64) {
        *self.content_height.lock().unwrap() = height;
    }

    /// Change the content height and notify resize listeners.
    pub fn emit_resize(&self, height: f64) {
        self.set_content_height(height);
        self.resize.fire(height);
    }

    pub fn dispatch_wheel(&self, event: WheelEvent) {
        self.ui.fire(UiEvent::Wheel(event));
    }

    pub fn dispatch_focus(&self, focused: bool, text_input: bool) {
        self.ui.fire(UiEvent::Focus {
            focused,
            text_input,
        });
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentSurface for MemorySurface {
    fn create_output_element(&self, output_id: &str) -> ElementHandle {
        let element = ElementHandle::new(output_id);
        self.elements
            .lock()
            .unwrap()
            .insert(output_id.to_string(), element.clone());
        element
    }

    fn remove_output_element(&self, output_id: &str) {
        self.elements.lock().unwrap().remove(output_id);
    }

    async fn images_settled(&self) {
        let mut pending = self.pending_images.subscribe();
        let _ = pending.wait_for(|count| *count == 0).await;
    }

    fn content_height(&self) -> f64 {
        *self.content_height.lock().unwrap()
    }

    fn resize_events(&self) -> EventStream<f64> {
        self.resize.subscribe()
    }

    fn ui_events(&self) -> EventStream<UiEvent> {
        self.ui.subscribe()
    }

    fn root_property_names(&self) -> Vec<String> {
        self.root_properties.lock().unwrap().keys().cloned().collect()
    }

    fn set_root_property(&self, name: &str, value: &str) {
        self.root_properties
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    fn remove_root_property(&self, name: &str) {
        self.root_properties.lock().unwrap().remove(name);
    }
}
