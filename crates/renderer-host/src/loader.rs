//! Renderer module contracts.
//!
//! ## Module loading
//!
//! Renderer bundles are opaque to the engine. A [`ModuleLoader`] fetches
//! the module behind an entrypoint URI and runs its activation hook,
//! returning the [`RendererApi`] the module exports (or nothing, for
//! kernel preloads). Production hosts back this with a script runtime;
//! tests and the stdio harness use [`StaticModuleLoader`].
//!
//! ## Contexts
//!
//! Activation hands each module a context scoped to it: settings, private
//! persisted state, cross-renderer lookup, and a messaging channel that
//! exists only for renderers that declared `requiresMessaging`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use anyhow::bail;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::error;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use webview_protocol::WebviewMessage;

use crate::emitter::{Emitter, EventStream};
use crate::output::OutputItem;
use crate::registry::RendererRegistry;
use crate::settings::RenderSettings;
use crate::state::StateStore;
use crate::surface::ElementHandle;

/// How a single render attempt ended, beyond success.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The renderer declined this item; try the next candidate.
    #[error("renderer requested fallback")]
    Fallback,
    /// The render was superseded; stop silently.
    #[error("render cancelled")]
    Cancelled,
    /// The renderer itself broke. Not part of the fallback walk.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// What a renderer module exports after activation.
#[async_trait]
pub trait RendererApi: Send + Sync {
    /// Paint `item` into `element`. Long renders should poll `token` and
    /// bail out with [`RenderError::Cancelled`] once it trips.
    async fn render_output_item(
        &self,
        item: &OutputItem,
        element: &ElementHandle,
        token: &CancellationToken,
    ) -> Result<(), RenderError>;

    /// Release resources for one output, or for all outputs when `None`.
    /// Optional; the default does nothing.
    fn dispose_output_item(&self, _item_id: Option<&str>) {}
}

/// Messaging channel for renderers that declared `requiresMessaging`.
#[derive(Clone)]
pub struct RendererMessaging {
    renderer_id: String,
    from_host: Emitter<Value>,
    to_host: mpsc::Sender<WebviewMessage>,
}

impl RendererMessaging {
    pub(crate) fn new(
        renderer_id: String,
        from_host: Emitter<Value>,
        to_host: mpsc::Sender<WebviewMessage>,
    ) -> Self {
        Self {
            renderer_id,
            from_host,
            to_host,
        }
    }

    /// Messages the host addressed to this renderer.
    pub fn on_message(&self) -> EventStream<Value> {
        self.from_host.subscribe()
    }

    /// Send a message to this renderer's host-side counterpart.
    pub fn post_message(&self, message: Value) {
        let outbound = WebviewMessage::CustomRendererMessage {
            renderer_id: self.renderer_id.clone(),
            message,
        };
        if let Err(err) = self.to_host.try_send(outbound) {
            error!("[loader] failed to queue renderer message: {}", err);
        }
    }
}

/// Context handed to a renderer module's activation hook.
pub struct RendererContext {
    settings: RenderSettings,
    renderer_id: String,
    state: Arc<dyn StateStore>,
    registry: Weak<RendererRegistry>,
    messaging: Option<RendererMessaging>,
}

impl RendererContext {
    pub(crate) fn new(
        settings: RenderSettings,
        renderer_id: String,
        state: Arc<dyn StateStore>,
        registry: Weak<RendererRegistry>,
        messaging: Option<RendererMessaging>,
    ) -> Self {
        Self {
            settings,
            renderer_id,
            state,
            registry,
            messaging,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn renderer_id(&self) -> &str {
        &self.renderer_id
    }

    /// This renderer's persisted state, if any.
    pub fn get_state(&self) -> Option<Value> {
        self.state.get(&self.renderer_id)
    }

    /// Persist state under this renderer's id.
    pub fn set_state(&self, value: Value) {
        self.state.set(&self.renderer_id, value);
    }

    /// Activate another registered renderer and borrow its api, for
    /// renderers that build on each other.
    pub async fn renderer_api(&self, renderer_id: &str) -> Option<Arc<dyn RendererApi>> {
        let registry = self.registry.upgrade()?;
        let instance = registry.get_renderer(renderer_id)?;
        instance.activate(&registry).await.ok()
    }

    /// `None` unless the renderer declared `requiresMessaging`.
    pub fn messaging(&self) -> Option<&RendererMessaging> {
        self.messaging.as_ref()
    }
}

/// Context handed to a kernel preload module's activation hook.
pub struct KernelContext {
    kernel_messages: Emitter<Value>,
    to_host: mpsc::Sender<WebviewMessage>,
}

impl KernelContext {
    pub(crate) fn new(
        kernel_messages: Emitter<Value>,
        to_host: mpsc::Sender<WebviewMessage>,
    ) -> Self {
        Self {
            kernel_messages,
            to_host,
        }
    }

    /// Messages arriving from the kernel, fanned out to every preload.
    pub fn on_kernel_message(&self) -> EventStream<Value> {
        self.kernel_messages.subscribe()
    }

    /// Send a message toward the kernel.
    pub fn post_kernel_message(&self, message: Value) {
        let outbound = WebviewMessage::CustomKernelMessage { message };
        if let Err(err) = self.to_host.try_send(outbound) {
            error!("[loader] failed to queue kernel message: {}", err);
        }
    }
}

/// Loads the module behind an entrypoint URI and runs its activation hook.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn activate_renderer(
        &self,
        uri: &str,
        context: RendererContext,
    ) -> anyhow::Result<Arc<dyn RendererApi>>;

    async fn activate_preload(&self, uri: &str, context: KernelContext) -> anyhow::Result<()>;
}

type RendererFactory =
    Arc<dyn Fn(RendererContext) -> BoxFuture<'static, anyhow::Result<Arc<dyn RendererApi>>> + Send + Sync>;
type PreloadFactory =
    Arc<dyn Fn(KernelContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// [`ModuleLoader`] over a fixed URI table, built up front.
#[derive(Default)]
pub struct StaticModuleLoader {
    renderers: HashMap<String, RendererFactory>,
    preloads: HashMap<String, PreloadFactory>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer<F, Fut>(mut self, uri: impl Into<String>, factory: F) -> Self
    where
        F: Fn(RendererContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Arc<dyn RendererApi>>> + Send + 'static,
    {
        self.renderers
            .insert(uri.into(), Arc::new(move |context| factory(context).boxed()));
        self
    }

    pub fn with_preload<F, Fut>(mut self, uri: impl Into<String>, factory: F) -> Self
    where
        F: Fn(KernelContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.preloads
            .insert(uri.into(), Arc::new(move |context| factory(context).boxed()));
        self
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn activate_renderer(
        &self,
        uri: &str,
        context: RendererContext,
    ) -> anyhow::Result<Arc<dyn RendererApi>> {
        let Some(factory) = self.renderers.get(uri) else {
            bail!("no renderer module registered for {uri}");
        };
        factory(context).await
    }

    async fn activate_preload(&self, uri: &str, context: KernelContext) -> anyhow::Result<()> {
        let Some(factory) = self.preloads.get(uri) else {
            bail!("no preload module registered for {uri}");
        };
        factory(context).await
    }
}
