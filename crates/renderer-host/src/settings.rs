//! Render settings handed to renderer modules at activation.

use serde::{Deserialize, Serialize};

/// Presentation knobs the host controls and renderers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderSettings {
    /// Maximum number of text lines a renderer should paint before truncating.
    pub line_limit: u32,
    /// Whether long outputs scroll inside a fixed-height container.
    pub output_scrolling: bool,
    /// Whether text outputs soft-wrap instead of scrolling horizontally.
    pub output_word_wrap: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            line_limit: 30,
            output_scrolling: false,
            output_word_wrap: false,
        }
    }
}
