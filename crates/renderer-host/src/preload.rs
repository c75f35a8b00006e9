//! Kernel preload scripts.
//!
//! Preloads are kernel-side companion modules (widget managers, comm
//! handlers) that must finish activating before any renderer runs. Each is
//! loaded at most once; later requests get the same shared task. A preload
//! failure is recorded as a value, so waiters observe completion rather
//! than a rejection, and rendering proceeds without the preload.

use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use log::warn;
use serde_json::Value;
use tokio::sync::mpsc;
use webview_protocol::WebviewMessage;

use crate::emitter::Emitter;
use crate::loader::{KernelContext, ModuleLoader};

/// A preload that failed to activate.
#[derive(Debug, Clone, thiserror::Error)]
#[error("kernel preload {uri} failed: {message}")]
pub struct PreloadError {
    pub uri: String,
    pub message: String,
}

/// Shared handle to one preload's activation. Cloning is cheap and every
/// clone resolves to the same result.
pub type PreloadTask = Shared<BoxFuture<'static, Result<(), PreloadError>>>;

/// Tracks every requested preload and fans kernel messages out to them.
pub struct KernelPreloadManager {
    loader: Arc<dyn ModuleLoader>,
    to_host: mpsc::Sender<WebviewMessage>,
    preloads: Mutex<Vec<(String, PreloadTask)>>,
    kernel_messages: Emitter<Value>,
}

impl KernelPreloadManager {
    pub fn new(loader: Arc<dyn ModuleLoader>, to_host: mpsc::Sender<WebviewMessage>) -> Self {
        Self {
            loader,
            to_host,
            preloads: Mutex::new(Vec::new()),
            kernel_messages: Emitter::new(),
        }
    }

    /// Request the preload at `uri`. The returned task combines the
    /// module's activation with waiting for every preload requested before
    /// it, so preloads observe each other in request order. Calling again
    /// with the same URI returns the original task.
    pub fn load(&self, uri: &str) -> PreloadTask {
        let mut preloads = self.preloads.lock().unwrap();
        if let Some((_, task)) = preloads.iter().find(|(existing, _)| existing == uri) {
            return task.clone();
        }

        let previous: Vec<PreloadTask> =
            preloads.iter().map(|(_, task)| task.clone()).collect();
        let loader = Arc::clone(&self.loader);
        let context = KernelContext::new(self.kernel_messages.clone(), self.to_host.clone());
        let uri = uri.to_string();
        let key = uri.clone();

        let task: PreloadTask = async move {
            let (activated, ()) = future::join(
                loader.activate_preload(&uri, context),
                settle_all(previous),
            )
            .await;
            activated.map_err(|err| {
                let failure = PreloadError {
                    uri: uri.clone(),
                    message: format!("{err:#}"),
                };
                warn!("[preload] {failure}");
                failure
            })
        }
        .boxed()
        .shared();

        preloads.push((key, task.clone()));
        task
    }

    /// Resolves once every preload requested so far has settled, whether it
    /// activated or failed. Preloads requested after this call are not
    /// waited for.
    pub fn wait_for_all_current(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let tasks: Vec<PreloadTask> = self
            .preloads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, task)| task.clone())
            .collect();
        settle_all(tasks)
    }

    /// Deliver a kernel message to every preload listening.
    pub fn receive_kernel_message(&self, message: Value) {
        self.kernel_messages.fire(message);
    }
}

async fn settle_all(tasks: Vec<PreloadTask>) {
    future::join_all(tasks).await;
}
