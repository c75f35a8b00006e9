//! Wheel-scroll arbitration.
//!
//! A wheel event inside the webview belongs to the innermost scrollable
//! container that still has room in the wheel's direction. When no element
//! on the hit path can take the scroll, the host document owns it and the
//! event is forwarded out as a `did-scroll-wheel` message.

/// Scroll geometry of one element on the event path, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub scroll_height: f64,
    pub scroll_width: f64,
    pub client_height: f64,
    pub client_width: f64,
}

impl ScrollMetrics {
    /// Whether this element can absorb a vertical wheel delta.
    /// Positive delta scrolls content down, negative scrolls up.
    fn takes_vertical(&self, delta_y: f64) -> bool {
        if self.scroll_height <= self.client_height {
            return false;
        }
        if delta_y < 0.0 {
            self.scroll_top > 0.0
        } else {
            self.scroll_top + self.client_height < self.scroll_height
        }
    }

    fn takes_horizontal(&self, delta_x: f64) -> bool {
        if self.scroll_width <= self.client_width {
            return false;
        }
        if delta_x < 0.0 {
            self.scroll_left > 0.0
        } else {
            self.scroll_left + self.client_width < self.scroll_width
        }
    }
}

/// A wheel event plus the scroll geometry of the target's ancestor chain,
/// innermost first.
#[derive(Debug, Clone, Default)]
pub struct WheelEvent {
    pub delta_x: f64,
    pub delta_y: f64,
    pub ancestors: Vec<ScrollMetrics>,
}

/// True when some ancestor still has room in the wheel's direction, meaning
/// the browser will scroll locally and the host must not be told.
pub fn consumed_locally(event: &WheelEvent) -> bool {
    event.ancestors.iter().any(|metrics| {
        (event.delta_y != 0.0 && metrics.takes_vertical(event.delta_y))
            || (event.delta_x != 0.0 && metrics.takes_horizontal(event.delta_x))
    })
}
