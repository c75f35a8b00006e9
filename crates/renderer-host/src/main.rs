//! Standalone renderer host speaking JSON lines over stdio.
//!
//! Each stdin line is one host message; each stdout line is one message
//! from the engine. Renderer metadata may point at the built-in modules
//! (`builtin:text`, `builtin:json`) or at URIs registered by an embedding
//! binary. Mostly useful for driving the engine from scripts and for
//! poking at the protocol by hand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use renderer_host::{
    default_state_path, spawn_bridge, BridgeHandle, ElementHandle, FileStateStore,
    MemoryStateStore, MemorySurface, OutputItem, RenderError, RenderSettings, RendererApi,
    StateStore, StaticModuleLoader,
};
use webview_protocol::HostMessage;

#[derive(Parser, Debug)]
#[command(
    name = "renderer-host",
    about = "Notebook output renderer host speaking JSON lines over stdio",
    version
)]
struct Cli {
    /// Maximum text lines per rendered output.
    #[arg(long, default_value_t = 30)]
    line_limit: u32,

    /// Scroll long outputs inside a fixed-height container.
    #[arg(long)]
    output_scrolling: bool,

    /// Soft-wrap long lines in text outputs.
    #[arg(long)]
    output_word_wrap: bool,

    /// Where to persist renderer state. Defaults to the user config dir.
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let settings = RenderSettings {
        line_limit: cli.line_limit,
        output_scrolling: cli.output_scrolling,
        output_word_wrap: cli.output_word_wrap,
    };
    let state: Arc<dyn StateStore> = match cli.state_file.or_else(default_state_path) {
        Some(path) => {
            info!("[host] persisting renderer state to {}", path.display());
            Arc::new(FileStateStore::load_or_default(path))
        }
        None => {
            warn!("[host] no config directory found, renderer state is ephemeral");
            Arc::new(MemoryStateStore::new())
        }
    };

    let BridgeHandle {
        host_messages,
        mut webview_messages,
        task,
    } = spawn_bridge(
        Arc::new(builtin_loader()),
        Arc::new(MemorySurface::new()),
        state,
        settings,
    );

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = webview_messages.recv().await {
            match message.encode() {
                Ok(line) => {
                    if stdout.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdout.write_all(b"\n").await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(err) => warn!("[host] failed to encode outbound message: {err}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match HostMessage::decode(line.as_bytes()) {
            Ok(message) => {
                if host_messages.send(message).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!("[host] ignoring malformed host message: {err}"),
        }
    }

    info!("[host] stdin closed, shutting down");
    drop(host_messages);
    task.await?;
    writer.await?;
    Ok(())
}

/// Loader serving the built-in renderer modules.
fn builtin_loader() -> StaticModuleLoader {
    StaticModuleLoader::new()
        .with_renderer("builtin:text", |context| {
            let line_limit = context.settings().line_limit;
            async move { Ok(Arc::new(TextRenderer { line_limit }) as Arc<dyn RendererApi>) }
        })
        .with_renderer("builtin:json", |_context| async {
            Ok(Arc::new(JsonRenderer) as Arc<dyn RendererApi>)
        })
}

/// Plain text into `<pre>`, truncated at the configured line limit.
struct TextRenderer {
    line_limit: u32,
}

#[async_trait]
impl RendererApi for TextRenderer {
    async fn render_output_item(
        &self,
        item: &OutputItem,
        element: &ElementHandle,
        _token: &CancellationToken,
    ) -> Result<(), RenderError> {
        let text = item.text();
        let mut lines: Vec<&str> = text.lines().collect();
        let truncated = lines.len() > self.line_limit as usize;
        if truncated {
            lines.truncate(self.line_limit as usize);
        }
        let mut body = escape_html(&lines.join("\n"));
        if truncated {
            body.push_str("\n…");
        }
        element.set_html(format!("<pre>{body}</pre>"));
        Ok(())
    }
}

/// Pretty-printed JSON. Declines items whose payload is not valid JSON so
/// the fallback walk can hand them to the text renderer.
struct JsonRenderer;

#[async_trait]
impl RendererApi for JsonRenderer {
    async fn render_output_item(
        &self,
        item: &OutputItem,
        element: &ElementHandle,
        _token: &CancellationToken,
    ) -> Result<(), RenderError> {
        let value = match item.json() {
            Ok(value) => value,
            Err(_) => return Err(RenderError::Fallback),
        };
        let pretty = serde_json::to_string_pretty(&value).map_err(anyhow::Error::new)?;
        element.set_html(format!("<pre class=\"json\">{}</pre>", escape_html(&pretty)));
        Ok(())
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
