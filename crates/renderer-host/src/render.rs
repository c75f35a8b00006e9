//! Output rendering and MIME fallback.
//!
//! ## The walk
//!
//! One render call owns one output. It picks the item to show, resolves a
//! renderer for it, and runs the renderer. A renderer that cannot handle
//! the item declines with [`RenderError::Fallback`]; the walk then tries
//! the output's other items in order. When nothing renders, the mount
//! element shows an error block with the raw text of the last item tried.
//!
//! Cancellation is checked between candidates. A superseded render stops
//! silently and leaves the element to its successor; only a renderer's own
//! failure is an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use webview_protocol::WebviewMessage;

use crate::loader::RenderError;
use crate::output::{OutputItem, SharedOutput};
use crate::registry::{RendererInstance, RendererRegistry};
use crate::surface::{DocumentSurface, ElementHandle};

/// Everything a render task needs besides the output itself. Cloning is
/// cheap; all clones share one resize-forwarder guard.
#[derive(Clone)]
pub struct RenderEnv {
    registry: Arc<RendererRegistry>,
    surface: Arc<dyn DocumentSurface>,
    to_host: mpsc::Sender<WebviewMessage>,
    resize_reporting: Arc<AtomicBool>,
}

impl RenderEnv {
    pub fn new(
        registry: Arc<RendererRegistry>,
        surface: Arc<dyn DocumentSurface>,
        to_host: mpsc::Sender<WebviewMessage>,
    ) -> Self {
        Self {
            registry,
            surface,
            to_host,
            resize_reporting: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Render one output, walking fallbacks as needed.
///
/// Resolves `Ok` for every outcome the walk itself handles (success, error
/// block, cancellation). Only a renderer blowing up mid-render surfaces as
/// an error, which the caller is expected to log.
pub async fn render_output(
    output: SharedOutput,
    preferred_mime: Option<String>,
    preferred_renderer: Option<String>,
    token: CancellationToken,
    env: RenderEnv,
) -> Result<(), RenderError> {
    if token.is_cancelled() {
        return Ok(());
    }

    let (items, element, selected) = {
        let output = output.lock().unwrap();
        let selected = output.select_item(preferred_mime.as_deref());
        (output.items(), output.element().clone(), selected)
    };
    let item = &items[selected];

    let Some(primary) = env.registry.find_renderer(preferred_renderer.as_deref(), item) else {
        warn!(
            "[render] no renderer found for output {} type {}",
            item.id(),
            item.mime()
        );
        element.show_error(
            format!("No renderer found for output type: {}", item.mime()),
            item.text(),
        );
        return Ok(());
    };

    match attempt(&primary, item, &element, &token, &env).await {
        Ok(()) => {
            finish_success(&output, selected, primary.id(), &env).await;
            return Ok(());
        }
        Err(RenderError::Cancelled) => return Ok(()),
        Err(RenderError::Fallback) => {
            debug!(
                "[render] renderer {} declined {}; walking fallbacks",
                primary.id(),
                item.mime()
            );
        }
        Err(fatal) => return Err(fatal),
    }

    let mut last_attempted = selected;
    for (index, item) in items.iter().enumerate() {
        if index == selected {
            continue;
        }
        if token.is_cancelled() {
            return Ok(());
        }
        let Some(renderer) = env.registry.find_renderer(None, item) else {
            continue;
        };
        last_attempted = index;
        match attempt(&renderer, item, &element, &token, &env).await {
            Ok(()) => {
                finish_success(&output, index, renderer.id(), &env).await;
                return Ok(());
            }
            Err(RenderError::Cancelled) => return Ok(()),
            Err(RenderError::Fallback) => continue,
            Err(fatal) => return Err(fatal),
        }
    }

    warn!(
        "[render] every candidate declined output {}",
        items[last_attempted].id()
    );
    element.show_error(
        "No fallback renderers found or all failed",
        items[last_attempted].text(),
    );
    Ok(())
}

async fn attempt(
    renderer: &Arc<RendererInstance>,
    item: &OutputItem,
    element: &ElementHandle,
    token: &CancellationToken,
    env: &RenderEnv,
) -> Result<(), RenderError> {
    let api = renderer
        .activate(&env.registry)
        .await
        .map_err(|err| RenderError::Failed(anyhow::Error::new(err)))?;
    api.render_output_item(item, element, token).await
}

async fn finish_success(output: &SharedOutput, index: usize, renderer_id: &str, env: &RenderEnv) {
    {
        let mut output = output.lock().unwrap();
        output.set_renderer(Some(renderer_id.to_string()));
        output.set_rendered_item(Some(index));
    }
    report_height(env).await;
}

/// Wait for images to settle, then tell the host the content height. The
/// first successful render also starts forwarding later resizes.
async fn report_height(env: &RenderEnv) {
    env.surface.images_settled().await;
    let content_height = env.surface.content_height();
    if env
        .to_host
        .send(WebviewMessage::DidRenderOutput { content_height })
        .await
        .is_err()
    {
        debug!("[render] host channel closed while reporting height");
    }
    install_resize_forwarder(env);
}

fn install_resize_forwarder(env: &RenderEnv) {
    if env.resize_reporting.swap(true, Ordering::SeqCst) {
        return;
    }
    let mut resizes = env.surface.resize_events();
    let to_host = env.to_host.clone();
    tokio::spawn(async move {
        while let Some(content_height) = resizes.recv().await {
            if to_host
                .send(WebviewMessage::DidRenderOutput { content_height })
                .await
                .is_err()
            {
                break;
            }
        }
    });
}
