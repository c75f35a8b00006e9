//! Notebook output rendering engine for sandboxed webviews.
//!
//! The engine runs inside an isolated document and talks to its host over
//! the message protocol defined in `webview-protocol`. The host streams
//! cell outputs and renderer metadata in; the engine picks renderer
//! modules by MIME type, walks fallbacks when a renderer declines, and
//! reports sizing, focus, and scroll state back out.
//!
//! The pieces:
//!
//! - [`bridge`]: the dispatch loop, one task owning all view state
//! - [`registry`]: the live renderer set and lazy module activation
//! - [`render`]: the per-output render walk with MIME fallback
//! - [`preload`]: kernel preload scripts and kernel message fan-out
//! - [`loader`]: the module contracts renderer bundles are written against
//! - [`surface`]: the document abstraction the engine draws through
//! - [`output`], [`scroll`], [`settings`], [`state`], [`emitter`]: the
//!   supporting data model

pub mod bridge;
pub mod emitter;
pub mod loader;
pub mod output;
pub mod preload;
pub mod registry;
pub mod render;
pub mod scroll;
pub mod settings;
pub mod state;
pub mod surface;

pub use bridge::{spawn_bridge, BridgeHandle};
pub use emitter::{Emitter, EventStream};
pub use loader::{
    KernelContext, ModuleLoader, RenderError, RendererApi, RendererContext, RendererMessaging,
    StaticModuleLoader,
};
pub use output::{EmptyOutput, Output, OutputItem, SharedOutput};
pub use preload::{KernelPreloadManager, PreloadError, PreloadTask};
pub use registry::{ActivationError, ActivationResult, RendererInstance, RendererRegistry};
pub use render::{render_output, RenderEnv};
pub use scroll::{consumed_locally, ScrollMetrics, WheelEvent};
pub use settings::RenderSettings;
pub use state::{default_state_path, FileStateStore, MemoryStateStore, StateStore};
pub use surface::{DocumentSurface, ElementContent, ElementHandle, MemorySurface, UiEvent};
