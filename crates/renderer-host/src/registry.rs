//! Renderer registry.
//!
//! ## Lifecycle
//!
//! The host owns the set of available renderers and pushes the full list on
//! every change. [`RendererRegistry::update`] diffs that list against the
//! live set: unchanged entries keep their instance (and any loaded module),
//! changed entries are disposed and replaced in place, absent entries are
//! disposed and dropped. Each instance remembers its first registration
//! position, so replacement never reorders MIME dispatch.
//!
//! ## Activation
//!
//! A renderer's module is loaded lazily on first use and exactly once.
//! Activation waits for all kernel preloads requested so far, then runs the
//! module's activation hook; the result (success or failure) is shared with
//! every caller.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use webview_protocol::{RendererMetadata, WebviewMessage};

use crate::emitter::Emitter;
use crate::loader::{ModuleLoader, RendererApi, RendererContext, RendererMessaging};
use crate::output::OutputItem;
use crate::preload::KernelPreloadManager;
use crate::settings::RenderSettings;
use crate::state::StateStore;

/// A renderer module whose activation hook threw.
#[derive(Debug, Clone, thiserror::Error)]
#[error("renderer {renderer_id} failed to activate: {message}")]
pub struct ActivationError {
    pub renderer_id: String,
    pub message: String,
}

pub type ActivationResult = Result<Arc<dyn RendererApi>, ActivationError>;

/// Shared handle to one renderer's activation.
pub type ActivationTask = Shared<BoxFuture<'static, ActivationResult>>;

/// One registered renderer: its metadata, its messaging channel, and the
/// memoized activation of its module.
pub struct RendererInstance {
    metadata: RendererMetadata,
    seq: u64,
    messages: Emitter<Value>,
    activation: Mutex<Option<ActivationTask>>,
}

impl RendererInstance {
    fn new(metadata: RendererMetadata, seq: u64) -> Self {
        Self {
            metadata,
            seq,
            messages: Emitter::new(),
            activation: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn metadata(&self) -> &RendererMetadata {
        &self.metadata
    }

    /// Load and activate this renderer's module, once. Every caller gets a
    /// clone of the same task, failures included.
    pub fn activate(&self, registry: &Arc<RendererRegistry>) -> ActivationTask {
        let mut slot = self.activation.lock().unwrap();
        if let Some(task) = slot.as_ref() {
            return task.clone();
        }

        let context = registry.renderer_context(self);
        let loader = Arc::clone(&registry.loader);
        let preloads = Arc::clone(&registry.preloads);
        let uri = self.metadata.entrypoint.uri.clone();
        let renderer_id = self.metadata.id.clone();

        let task: ActivationTask = async move {
            preloads.wait_for_all_current().await;
            loader
                .activate_renderer(&uri, context)
                .await
                .map_err(|err| {
                    let failure = ActivationError {
                        renderer_id,
                        message: format!("{err:#}"),
                    };
                    warn!("[registry] {failure}");
                    failure
                })
        }
        .boxed()
        .shared();

        *slot = Some(task.clone());
        task
    }

    /// The module's api, if activation has already completed successfully.
    pub fn loaded(&self) -> Option<Arc<dyn RendererApi>> {
        self.activation
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|task| task.peek())
            .and_then(|result| result.as_ref().ok().cloned())
    }

    /// Run the module's dispose hook for all outputs, if it ever loaded.
    pub fn dispose(&self) {
        if let Some(api) = self.loaded() {
            api.dispose_output_item(None);
        }
    }

    /// Deliver a host message to this renderer's subscribers.
    pub fn receive_message(&self, message: Value) {
        if !self.metadata.requires_messaging {
            debug!(
                "[registry] renderer {} received a message but did not request messaging",
                self.metadata.id
            );
        }
        self.messages.fire(message);
    }
}

/// The live renderer set plus everything activation needs.
pub struct RendererRegistry {
    instances: Mutex<HashMap<String, Arc<RendererInstance>>>,
    next_seq: AtomicU64,
    loader: Arc<dyn ModuleLoader>,
    preloads: Arc<KernelPreloadManager>,
    state: Arc<dyn StateStore>,
    settings: RenderSettings,
    to_host: mpsc::Sender<WebviewMessage>,
}

impl RendererRegistry {
    pub fn new(
        loader: Arc<dyn ModuleLoader>,
        preloads: Arc<KernelPreloadManager>,
        state: Arc<dyn StateStore>,
        settings: RenderSettings,
        to_host: mpsc::Sender<WebviewMessage>,
    ) -> Arc<Self> {
        Arc::new(Self {
            instances: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            loader,
            preloads,
            state,
            settings,
            to_host,
        })
    }

    /// Insert a renderer keyed by id, replacing and disposing any prior
    /// instance with that id. Unlike [`RendererRegistry::update`] this
    /// never skips on equal metadata. Replacement keeps the original
    /// registry position; new ids append.
    pub fn add_or_replace(&self, metadata: RendererMetadata) {
        let disposed = {
            let mut instances = self.instances.lock().unwrap();
            let previous = instances.get(&metadata.id).map(Arc::clone);
            let seq = match &previous {
                Some(existing) => existing.seq,
                None => self.next_seq.fetch_add(1, Ordering::SeqCst),
            };
            instances.insert(
                metadata.id.clone(),
                Arc::new(RendererInstance::new(metadata, seq)),
            );
            previous
        };
        if let Some(instance) = disposed {
            instance.dispose();
        }
    }

    /// Replace the renderer set with `renderers`, the host's full list.
    pub fn update(&self, renderers: Vec<RendererMetadata>) {
        let mut disposed = Vec::new();
        {
            let mut instances = self.instances.lock().unwrap();

            let incoming: HashSet<&str> = renderers.iter().map(|m| m.id.as_str()).collect();
            let stale: Vec<String> = instances
                .keys()
                .filter(|id| !incoming.contains(id.as_str()))
                .cloned()
                .collect();
            for id in stale {
                if let Some(instance) = instances.remove(&id) {
                    info!("[registry] removing renderer {id}");
                    disposed.push(instance);
                }
            }

            for metadata in renderers {
                match instances.get(&metadata.id) {
                    Some(existing) if existing.metadata == metadata => continue,
                    Some(existing) => {
                        info!("[registry] replacing renderer {}", metadata.id);
                        let seq = existing.seq;
                        disposed.push(Arc::clone(existing));
                        instances.insert(
                            metadata.id.clone(),
                            Arc::new(RendererInstance::new(metadata, seq)),
                        );
                    }
                    None => {
                        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                        instances.insert(
                            metadata.id.clone(),
                            Arc::new(RendererInstance::new(metadata, seq)),
                        );
                    }
                }
            }
        }
        for instance in disposed {
            instance.dispose();
        }
    }

    pub fn get_renderer(&self, renderer_id: &str) -> Option<Arc<RendererInstance>> {
        self.instances.lock().unwrap().get(renderer_id).cloned()
    }

    /// Pick the renderer for `item`. An explicit preference either resolves
    /// to that exact renderer or to nothing; otherwise the first registered
    /// renderer claiming the item's MIME type wins. Renderers that extend
    /// another renderer never render on their own.
    pub fn find_renderer(
        &self,
        preferred_id: Option<&str>,
        item: &OutputItem,
    ) -> Option<Arc<RendererInstance>> {
        let instances = self.instances.lock().unwrap();
        if let Some(preferred) = preferred_id {
            return instances.get(preferred).cloned();
        }
        instances
            .values()
            .filter(|instance| instance.metadata.entrypoint.extends.is_none())
            .filter(|instance| {
                instance
                    .metadata
                    .mime_types
                    .iter()
                    .any(|mime| mime == item.mime())
            })
            .min_by_key(|instance| instance.seq)
            .cloned()
    }

    /// Renderer ids in registration order.
    pub fn renderer_ids(&self) -> Vec<String> {
        let instances = self.instances.lock().unwrap();
        let mut ordered: Vec<&Arc<RendererInstance>> = instances.values().collect();
        ordered.sort_by_key(|instance| instance.seq);
        ordered.iter().map(|instance| instance.id().to_string()).collect()
    }

    /// Run the dispose hook of one renderer for one output, if loaded.
    pub fn clear_output(&self, renderer_id: &str, output_id: &str) {
        if let Some(api) = self.get_renderer(renderer_id).and_then(|i| i.loaded()) {
            api.dispose_output_item(Some(output_id));
        }
    }

    /// Run every loaded renderer's dispose hook, keeping the set intact.
    pub fn clear_all(&self) {
        let instances: Vec<Arc<RendererInstance>> =
            self.instances.lock().unwrap().values().cloned().collect();
        for instance in instances {
            instance.dispose();
        }
    }

    fn renderer_context(self: &Arc<Self>, instance: &RendererInstance) -> RendererContext {
        let messaging = instance.metadata.requires_messaging.then(|| {
            RendererMessaging::new(
                instance.metadata.id.clone(),
                instance.messages.clone(),
                self.to_host.clone(),
            )
        });
        RendererContext::new(
            self.settings.clone(),
            instance.metadata.id.clone(),
            Arc::clone(&self.state),
            Arc::downgrade(self),
            messaging,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{RenderError, StaticModuleLoader};
    use crate::state::MemoryStateStore;
    use crate::surface::ElementHandle;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;
    use webview_protocol::RendererEntrypoint;

    struct RecordingRenderer {
        disposed: Arc<Mutex<Vec<Option<String>>>>,
    }

    #[async_trait]
    impl RendererApi for RecordingRenderer {
        async fn render_output_item(
            &self,
            _item: &OutputItem,
            _element: &ElementHandle,
            _token: &CancellationToken,
        ) -> Result<(), RenderError> {
            Ok(())
        }

        fn dispose_output_item(&self, item_id: Option<&str>) {
            self.disposed
                .lock()
                .unwrap()
                .push(item_id.map(str::to_string));
        }
    }

    fn metadata(id: &str, uri: &str, mimes: &[&str]) -> RendererMetadata {
        RendererMetadata {
            id: id.to_string(),
            entrypoint: RendererEntrypoint {
                uri: uri.to_string(),
                extends: None,
            },
            mime_types: mimes.iter().map(|m| m.to_string()).collect(),
            requires_messaging: false,
        }
    }

    fn extension_metadata(id: &str, uri: &str, extends: &str, mimes: &[&str]) -> RendererMetadata {
        let mut metadata = metadata(id, uri, mimes);
        metadata.entrypoint.extends = Some(extends.to_string());
        metadata
    }

    fn item(mime: &str) -> OutputItem {
        OutputItem::new("out-1", mime, Value::Null, Bytes::from_static(b"x"))
    }

    struct Fixture {
        registry: Arc<RendererRegistry>,
        activations: Arc<AtomicUsize>,
        disposed: Arc<Mutex<Vec<Option<String>>>>,
    }

    fn fixture(gate: Option<Arc<Notify>>) -> Fixture {
        let activations = Arc::new(AtomicUsize::new(0));
        let disposed = Arc::new(Mutex::new(Vec::new()));

        let counter = activations.clone();
        let dispose_log = disposed.clone();
        let loader = StaticModuleLoader::new()
            .with_renderer("mem:module", move |_context| {
                let counter = counter.clone();
                let dispose_log = dispose_log.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(RecordingRenderer {
                        disposed: dispose_log,
                    }) as Arc<dyn RendererApi>)
                }
            })
            .with_preload("mem:gated", move |_context| {
                let gate = gate.clone();
                async move {
                    if let Some(gate) = gate {
                        gate.notified().await;
                    }
                    Ok(())
                }
            })
            .with_renderer("mem:broken", |_context| async {
                anyhow::bail!("no exports")
            });

        let loader: Arc<dyn ModuleLoader> = Arc::new(loader);
        let (to_host, _rx) = mpsc::channel(16);
        let preloads = Arc::new(KernelPreloadManager::new(loader.clone(), to_host.clone()));
        let registry = RendererRegistry::new(
            loader,
            preloads,
            Arc::new(MemoryStateStore::new()),
            RenderSettings::default(),
            to_host,
        );
        Fixture {
            registry,
            activations,
            disposed,
        }
    }

    #[tokio::test]
    async fn test_unchanged_metadata_keeps_the_loaded_instance() {
        let fx = fixture(None);
        fx.registry
            .update(vec![metadata("vendor.json", "mem:module", &["application/json"])]);

        let before = fx.registry.get_renderer("vendor.json").unwrap();
        before.activate(&fx.registry).await.unwrap();

        fx.registry
            .update(vec![metadata("vendor.json", "mem:module", &["application/json"])]);
        let after = fx.registry.get_renderer("vendor.json").unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        after.activate(&fx.registry).await.unwrap();
        assert_eq!(fx.activations.load(Ordering::SeqCst), 1);
        assert!(fx.disposed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changed_metadata_disposes_and_keeps_position() {
        let fx = fixture(None);
        fx.registry.update(vec![
            metadata("vendor.a", "mem:module", &["text/plain"]),
            metadata("vendor.b", "mem:module", &["text/plain"]),
        ]);
        let original = fx.registry.get_renderer("vendor.a").unwrap();
        original.activate(&fx.registry).await.unwrap();

        fx.registry.update(vec![
            metadata("vendor.a", "mem:module", &["text/plain", "text/html"]),
            metadata("vendor.b", "mem:module", &["text/plain"]),
        ]);

        assert_eq!(*fx.disposed.lock().unwrap(), vec![None]);
        let replaced = fx.registry.get_renderer("vendor.a").unwrap();
        assert!(!Arc::ptr_eq(&original, &replaced));

        // Replacement keeps the original position, so vendor.a still wins
        // the text/plain dispatch.
        let chosen = fx.registry.find_renderer(None, &item("text/plain")).unwrap();
        assert_eq!(chosen.id(), "vendor.a");
    }

    #[tokio::test]
    async fn test_add_or_replace_always_replaces() {
        let fx = fixture(None);
        fx.registry.update(vec![
            metadata("vendor.a", "mem:module", &["text/plain"]),
            metadata("vendor.b", "mem:module", &["text/html"]),
        ]);
        let original = fx.registry.get_renderer("vendor.a").unwrap();
        original.activate(&fx.registry).await.unwrap();

        // Identical metadata still replaces, unlike update().
        fx.registry
            .add_or_replace(metadata("vendor.a", "mem:module", &["text/plain"]));
        let replaced = fx.registry.get_renderer("vendor.a").unwrap();
        assert!(!Arc::ptr_eq(&original, &replaced));
        assert_eq!(*fx.disposed.lock().unwrap(), vec![None]);
        assert_eq!(fx.registry.renderer_ids(), vec!["vendor.a", "vendor.b"]);

        fx.registry
            .add_or_replace(metadata("vendor.c", "mem:module", &["image/png"]));
        assert_eq!(
            fx.registry.renderer_ids(),
            vec!["vendor.a", "vendor.b", "vendor.c"]
        );
    }

    #[tokio::test]
    async fn test_reordered_equal_metadata_changes_nothing() {
        let fx = fixture(None);
        let a = metadata("vendor.a", "mem:module", &["text/plain"]);
        let b = metadata("vendor.b", "mem:module", &["text/plain"]);
        fx.registry.update(vec![a.clone(), b.clone()]);
        fx.registry.update(vec![b, a]);

        assert_eq!(fx.registry.renderer_ids(), vec!["vendor.a", "vendor.b"]);
        let chosen = fx.registry.find_renderer(None, &item("text/plain")).unwrap();
        assert_eq!(chosen.id(), "vendor.a");
    }

    #[tokio::test]
    async fn test_mime_list_order_matters_for_equality() {
        let fx = fixture(None);
        let mut first = metadata("vendor.a", "mem:module", &["text/plain", "text/html"]);
        fx.registry.update(vec![first.clone()]);
        let before = fx.registry.get_renderer("vendor.a").unwrap();

        first.mime_types.reverse();
        fx.registry.update(vec![first]);
        let after = fx.registry.get_renderer("vendor.a").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_absent_renderers_are_disposed_and_dropped() {
        let fx = fixture(None);
        fx.registry.update(vec![
            metadata("vendor.a", "mem:module", &["text/plain"]),
            metadata("vendor.b", "mem:module", &["text/html"]),
        ]);
        let doomed = fx.registry.get_renderer("vendor.b").unwrap();
        doomed.activate(&fx.registry).await.unwrap();

        fx.registry
            .update(vec![metadata("vendor.a", "mem:module", &["text/plain"])]);

        assert!(fx.registry.get_renderer("vendor.b").is_none());
        assert_eq!(*fx.disposed.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_preferred_id_wins_or_resolves_to_nothing() {
        let fx = fixture(None);
        fx.registry.update(vec![
            metadata("vendor.text", "mem:module", &["text/plain"]),
            metadata("vendor.html", "mem:module", &["text/html"]),
        ]);

        // The preference is honored even though the item's MIME type is not
        // in the renderer's list.
        let chosen = fx
            .registry
            .find_renderer(Some("vendor.html"), &item("text/plain"))
            .unwrap();
        assert_eq!(chosen.id(), "vendor.html");

        assert!(fx
            .registry
            .find_renderer(Some("vendor.gone"), &item("text/plain"))
            .is_none());
    }

    #[tokio::test]
    async fn test_extension_renderers_never_render_alone() {
        let fx = fixture(None);
        fx.registry.update(vec![
            extension_metadata("vendor.ext", "mem:module", "vendor.base", &["text/plain"]),
            metadata("vendor.base", "mem:module", &["text/plain"]),
        ]);

        let chosen = fx.registry.find_renderer(None, &item("text/plain")).unwrap();
        assert_eq!(chosen.id(), "vendor.base");
    }

    #[tokio::test]
    async fn test_activation_waits_for_pending_preloads() {
        let gate = Arc::new(Notify::new());
        let fx = fixture(Some(gate.clone()));
        fx.registry
            .update(vec![metadata("vendor.widgets", "mem:module", &["text/plain"])]);

        let preload = tokio::spawn(fx.registry.preloads.load("mem:gated"));

        let instance = fx.registry.get_renderer("vendor.widgets").unwrap();
        let activation = tokio::spawn(instance.activate(&fx.registry));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!activation.is_finished());
        assert_eq!(fx.activations.load(Ordering::SeqCst), 0);

        gate.notify_one();
        preload.await.unwrap().unwrap();
        activation.await.unwrap().unwrap();
        assert_eq!(fx.activations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_activation_failure_is_memoized() {
        let fx = fixture(None);
        fx.registry
            .update(vec![metadata("vendor.broken", "mem:broken", &["text/plain"])]);
        let instance = fx.registry.get_renderer("vendor.broken").unwrap();

        let first = instance.activate(&fx.registry).await.map(|_| ()).unwrap_err();
        let second = instance.activate(&fx.registry).await.map(|_| ()).unwrap_err();
        assert_eq!(first.renderer_id, "vendor.broken");
        assert!(first.message.contains("no exports"));
        assert_eq!(first.message, second.message);
        assert!(instance.loaded().is_none());
    }

    #[tokio::test]
    async fn test_renderer_contexts_reach_other_renderers() {
        let reached = Arc::new(AtomicUsize::new(0));
        let reached_in_factory = reached.clone();
        let loader = StaticModuleLoader::new()
            .with_renderer("mem:base", |_context| async {
                Ok(Arc::new(RecordingRenderer {
                    disposed: Arc::new(Mutex::new(Vec::new())),
                }) as Arc<dyn RendererApi>)
            })
            .with_renderer("mem:derived", move |context| {
                let reached = reached_in_factory.clone();
                async move {
                    if context.renderer_api("vendor.base").await.is_some() {
                        reached.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(Arc::new(RecordingRenderer {
                        disposed: Arc::new(Mutex::new(Vec::new())),
                    }) as Arc<dyn RendererApi>)
                }
            });
        let loader: Arc<dyn ModuleLoader> = Arc::new(loader);
        let (to_host, _rx) = mpsc::channel(16);
        let preloads = Arc::new(KernelPreloadManager::new(loader.clone(), to_host.clone()));
        let registry = RendererRegistry::new(
            loader,
            preloads,
            Arc::new(MemoryStateStore::new()),
            RenderSettings::default(),
            to_host,
        );
        registry.update(vec![
            metadata("vendor.base", "mem:base", &["text/plain"]),
            metadata("vendor.derived", "mem:derived", &["text/html"]),
        ]);

        let derived = registry.get_renderer("vendor.derived").unwrap();
        derived.activate(&registry).await.unwrap();
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_renderer_state_is_namespaced_by_id() {
        use serde_json::json;

        let loader = StaticModuleLoader::new().with_renderer("mem:stateful", |context| async move {
            let seen_before = context.get_state();
            context.set_state(json!({"owner": context.renderer_id(), "seen": seen_before}));
            Ok(Arc::new(RecordingRenderer {
                disposed: Arc::new(Mutex::new(Vec::new())),
            }) as Arc<dyn RendererApi>)
        });
        let loader: Arc<dyn ModuleLoader> = Arc::new(loader);
        let store = Arc::new(MemoryStateStore::new());
        let (to_host, _rx) = mpsc::channel(16);
        let preloads = Arc::new(KernelPreloadManager::new(loader.clone(), to_host.clone()));
        let registry = RendererRegistry::new(
            loader,
            preloads,
            store.clone(),
            RenderSettings::default(),
            to_host,
        );
        registry.update(vec![
            metadata("vendor.a", "mem:stateful", &["text/plain"]),
            metadata("vendor.b", "mem:stateful", &["text/html"]),
        ]);

        for id in ["vendor.a", "vendor.b"] {
            let instance = registry.get_renderer(id).unwrap();
            instance.activate(&registry).await.unwrap();
        }

        assert_eq!(
            store.get("vendor.a"),
            Some(json!({"owner": "vendor.a", "seen": null}))
        );
        assert_eq!(
            store.get("vendor.b"),
            Some(json!({"owner": "vendor.b", "seen": null}))
        );
    }

    #[tokio::test]
    async fn test_messaging_exists_only_when_declared() {
        let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in_factory = seen.clone();
        let loader = StaticModuleLoader::new().with_renderer("mem:any", move |context| {
            let seen = seen_in_factory.clone();
            async move {
                seen.lock().unwrap().push((
                    context.renderer_id().to_string(),
                    context.messaging().is_some(),
                ));
                Ok(Arc::new(RecordingRenderer {
                    disposed: Arc::new(Mutex::new(Vec::new())),
                }) as Arc<dyn RendererApi>)
            }
        });
        let loader: Arc<dyn ModuleLoader> = Arc::new(loader);
        let (to_host, _rx) = mpsc::channel(16);
        let preloads = Arc::new(KernelPreloadManager::new(loader.clone(), to_host.clone()));
        let registry = RendererRegistry::new(
            loader,
            preloads,
            Arc::new(MemoryStateStore::new()),
            RenderSettings::default(),
            to_host,
        );
        let mut chatty = metadata("vendor.chatty", "mem:any", &["text/html"]);
        chatty.requires_messaging = true;
        registry.update(vec![
            metadata("vendor.quiet", "mem:any", &["text/plain"]),
            chatty,
        ]);

        for id in ["vendor.quiet", "vendor.chatty"] {
            let instance = registry.get_renderer(id).unwrap();
            instance.activate(&registry).await.unwrap();
        }

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&("vendor.quiet".to_string(), false)));
        assert!(seen.contains(&("vendor.chatty".to_string(), true)));
    }

    #[tokio::test]
    async fn test_clear_output_reaches_only_loaded_renderers() {
        let fx = fixture(None);
        fx.registry.update(vec![
            metadata("vendor.a", "mem:module", &["text/plain"]),
            metadata("vendor.b", "mem:module", &["text/html"]),
        ]);

        // vendor.b never activates, so clearing through it is a no-op.
        fx.registry.clear_output("vendor.b", "out-1");
        assert!(fx.disposed.lock().unwrap().is_empty());

        let instance = fx.registry.get_renderer("vendor.a").unwrap();
        instance.activate(&fx.registry).await.unwrap();
        fx.registry.clear_output("vendor.a", "out-1");
        assert_eq!(
            *fx.disposed.lock().unwrap(),
            vec![Some("out-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_clear_all_disposes_loaded_and_keeps_entries() {
        let fx = fixture(None);
        fx.registry.update(vec![
            metadata("vendor.a", "mem:module", &["text/plain"]),
            metadata("vendor.b", "mem:module", &["text/html"]),
        ]);
        let loaded = fx.registry.get_renderer("vendor.a").unwrap();
        loaded.activate(&fx.registry).await.unwrap();

        fx.registry.clear_all();

        // Only the loaded module's hook runs, with no item id; vendor.b is
        // not activated on clear_all's account.
        assert_eq!(*fx.disposed.lock().unwrap(), vec![None]);
        assert_eq!(fx.activations.load(Ordering::SeqCst), 1);

        // Both entries survive, and the activated module stays loaded.
        assert_eq!(fx.registry.renderer_ids(), vec!["vendor.a", "vendor.b"]);
        let kept = fx.registry.get_renderer("vendor.a").unwrap();
        assert!(Arc::ptr_eq(&loaded, &kept));
        assert!(kept.loaded().is_some());
    }
}
