//! Host message dispatch.
//!
//! ## Shape
//!
//! [`spawn_bridge`] wires the registry, the preload manager, and the
//! document surface together, then runs one task that owns all mutable
//! view state. Host messages are handled strictly in arrival order; only
//! the render walks they start run concurrently, one task per output, each
//! holding a cancellation token that the next render of the same output
//! trips.
//!
//! The first message out is always `initialized`, before any host message
//! is processed.

use std::collections::HashMap;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use webview_protocol::{HostMessage, OutputDescriptor, WebviewMessage};

use crate::loader::ModuleLoader;
use crate::output::{Output, SharedOutput};
use crate::preload::KernelPreloadManager;
use crate::registry::RendererRegistry;
use crate::render::{self, RenderEnv};
use crate::scroll;
use crate::settings::RenderSettings;
use crate::state::StateStore;
use crate::surface::{DocumentSurface, UiEvent};

/// Channels into and out of a running bridge.
pub struct BridgeHandle {
    /// Feed messages from the host into the dispatch loop.
    pub host_messages: mpsc::Sender<HostMessage>,
    /// Messages the engine addresses to the host.
    pub webview_messages: mpsc::Receiver<WebviewMessage>,
    /// The dispatch task. Finishes once the host channel closes.
    pub task: JoinHandle<()>,
}

/// Start the dispatch loop over the given document surface.
pub fn spawn_bridge(
    loader: Arc<dyn ModuleLoader>,
    surface: Arc<dyn DocumentSurface>,
    state: Arc<dyn StateStore>,
    settings: RenderSettings,
) -> BridgeHandle {
    let (host_tx, host_rx) = mpsc::channel(100);
    let (out_tx, out_rx) = mpsc::channel(100);

    let preloads = Arc::new(KernelPreloadManager::new(
        Arc::clone(&loader),
        out_tx.clone(),
    ));
    let registry = RendererRegistry::new(
        loader,
        Arc::clone(&preloads),
        state,
        settings,
        out_tx.clone(),
    );
    let env = RenderEnv::new(Arc::clone(&registry), Arc::clone(&surface), out_tx.clone());

    let bridge = Bridge {
        registry,
        preloads,
        surface,
        env,
        to_host: out_tx,
        outputs: Vec::new(),
        render_tokens: HashMap::new(),
    };
    let task = tokio::spawn(bridge.run(host_rx));

    BridgeHandle {
        host_messages: host_tx,
        webview_messages: out_rx,
        task,
    }
}

struct Bridge {
    registry: Arc<RendererRegistry>,
    preloads: Arc<KernelPreloadManager>,
    surface: Arc<dyn DocumentSurface>,
    env: RenderEnv,
    to_host: mpsc::Sender<WebviewMessage>,
    /// Live outputs in document order.
    outputs: Vec<SharedOutput>,
    /// Cancellation token of the latest render per output id.
    render_tokens: HashMap<String, CancellationToken>,
}

impl Bridge {
    async fn run(mut self, mut host_rx: mpsc::Receiver<HostMessage>) {
        self.send(WebviewMessage::Initialized).await;
        info!("[bridge] ready");

        let mut ui_events = self.surface.ui_events();
        let mut ui_open = true;
        loop {
            tokio::select! {
                message = host_rx.recv() => match message {
                    Some(message) => self.handle_host_message(message).await,
                    None => {
                        info!("[bridge] host channel closed, shutting down");
                        break;
                    }
                },
                event = ui_events.recv(), if ui_open => match event {
                    Some(event) => self.handle_ui_event(event).await,
                    None => ui_open = false,
                },
            }
        }

        for token in self.render_tokens.values() {
            token.cancel();
        }
        self.registry.clear_all();
    }

    async fn handle_host_message(&mut self, message: HostMessage) {
        match message {
            HostMessage::UpdateRenderers { renderer_data } => {
                info!("[bridge] updating {} renderers", renderer_data.len());
                self.registry.update(renderer_data);
            }
            HostMessage::OutputChanged {
                new_outputs,
                delete_start,
                delete_count,
            } => {
                self.outputs_changed(new_outputs, delete_start, delete_count);
            }
            HostMessage::CustomRendererMessage {
                renderer_id,
                message,
            } => match self.registry.get_renderer(&renderer_id) {
                Some(instance) => instance.receive_message(message),
                None => warn!("[bridge] message for unknown renderer {renderer_id}"),
            },
            HostMessage::ChangePreferredMimetype {
                output_id,
                mime_type,
            } => {
                self.change_preferred_mimetype(&output_id, mime_type);
            }
            HostMessage::CustomKernelMessage { message } => {
                self.preloads.receive_kernel_message(message);
            }
            HostMessage::Preload { resources } => {
                for uri in resources {
                    let task = self.preloads.load(&uri);
                    tokio::spawn(task);
                }
            }
            HostMessage::NotebookStyles { styles } => self.apply_styles(styles),
        }
    }

    async fn handle_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Wheel(wheel) => {
                if !scroll::consumed_locally(&wheel) {
                    self.send(WebviewMessage::DidScrollWheel {
                        delta_x: wheel.delta_x,
                        delta_y: wheel.delta_y,
                    })
                    .await;
                }
            }
            UiEvent::Focus {
                focused,
                text_input,
            } => {
                // Only focus moves on editable elements matter to the host.
                if text_input {
                    self.send(WebviewMessage::InputFocusChanged { focused }).await;
                }
            }
        }
    }

    /// Apply a splice: delete a range of outputs, then append new ones,
    /// rendering each as it lands.
    fn outputs_changed(
        &mut self,
        new_outputs: Option<Vec<OutputDescriptor>>,
        delete_start: Option<usize>,
        delete_count: Option<usize>,
    ) {
        if let (Some(start), Some(count)) = (delete_start, delete_count) {
            let start = start.min(self.outputs.len());
            let end = start.saturating_add(count).min(self.outputs.len());
            let removed: Vec<SharedOutput> = self.outputs.drain(start..end).collect();
            for output in removed {
                self.destroy_output(output);
            }
        }
        for descriptor in new_outputs.unwrap_or_default() {
            let Some(output) = self.create_output(descriptor) else {
                continue;
            };
            self.outputs.push(Arc::clone(&output));
            self.spawn_render(output, None, None);
        }
    }

    fn create_output(&self, descriptor: OutputDescriptor) -> Option<SharedOutput> {
        if descriptor.items.is_empty() {
            warn!(
                "[bridge] dropping output {} with no content items",
                descriptor.output_id
            );
            return None;
        }
        let element = self.surface.create_output_element(&descriptor.output_id);
        let output = Output::from_descriptor(descriptor, element).ok()?;
        Some(Arc::new(std::sync::Mutex::new(output)))
    }

    fn destroy_output(&mut self, output: SharedOutput) {
        let (output_id, renderer_id) = {
            let output = output.lock().unwrap();
            (
                output.id().to_string(),
                output.renderer_id().map(str::to_string),
            )
        };
        info!("[bridge] removing output {output_id}");
        if let Some(token) = self.render_tokens.remove(&output_id) {
            token.cancel();
        }
        self.surface.remove_output_element(&output_id);
        if let Some(renderer_id) = renderer_id {
            self.registry.clear_output(&renderer_id, &output_id);
        }
    }

    /// Start a render task for `output`, superseding any render of the
    /// same output still in flight.
    fn spawn_render(
        &mut self,
        output: SharedOutput,
        preferred_mime: Option<String>,
        preferred_renderer: Option<String>,
    ) {
        let output_id = output.lock().unwrap().id().to_string();
        let token = CancellationToken::new();
        if let Some(previous) = self.render_tokens.insert(output_id.clone(), token.clone()) {
            previous.cancel();
        }
        let env = self.env.clone();
        tokio::spawn(async move {
            if let Err(err) =
                render::render_output(output, preferred_mime, preferred_renderer, token, env).await
            {
                error!("[render] output {output_id} failed: {err:#}");
            }
        });
    }

    fn change_preferred_mimetype(&mut self, output_id: &str, mime_type: String) {
        info!(
            "[bridge] switching output {output_id} preference to {mime_type}; re-rendering all outputs"
        );
        // The request names one output, but hosts expect the whole view to
        // refresh with the new preference, not a single-output repaint.
        let outputs: Vec<SharedOutput> = self.outputs.clone();
        for output in outputs {
            {
                let mut output = output.lock().unwrap();
                output.set_renderer(None);
                output.set_rendered_item(None);
                output.element().clear();
            }
            self.spawn_render(output, Some(mime_type.clone()), None);
        }
    }

    /// Reset `--notebook-*` properties on the document root, then apply the
    /// new set. Keys arrive without the leading dashes.
    fn apply_styles(&self, styles: HashMap<String, String>) {
        for name in self.surface.root_property_names() {
            if name.starts_with("--notebook-") {
                self.surface.remove_root_property(&name);
            }
        }
        for (name, value) in styles {
            self.surface.set_root_property(&format!("--{name}"), &value);
        }
    }

    async fn send(&self, message: WebviewMessage) {
        if let Err(err) = self.to_host.send(message).await {
            error!("[bridge] failed to forward message to host: {err}");
        }
    }
}
