//! Camera transform: pan, cursor-anchored zoom, fit-to-content.

use crate::model::{Table, Viewport};

/// Assumed on-screen footprint of a table box when fitting imported content.
const FIT_TABLE_WIDTH: f64 = 200.0;
const FIT_TABLE_HEIGHT: f64 = 150.0;
const FIT_PADDING: f64 = 100.0;
const FIT_MIN_SCALE: f64 = 0.2;
const FIT_MAX_SCALE: f64 = 1.0;

/// Allowed zoom range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self { min: 0.2, max: 4.0 }
    }
}

impl ScaleRange {
    pub fn clamp(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return 1.0_f64.clamp(self.min, self.max);
        }
        scale.clamp(self.min, self.max)
    }
}

impl Viewport {
    /// Zoom to `scale` keeping the world point under the cursor fixed.
    pub fn zoom_at(&self, scale: f64, cursor_x: f64, cursor_y: f64, range: ScaleRange) -> Self {
        let clamped = range.clamp(scale);
        let ratio = clamped / range.clamp(self.scale);

        Self {
            x: cursor_x - (cursor_x - self.x) * ratio,
            y: cursor_y - (cursor_y - self.y) * ratio,
            scale: clamped,
        }
    }

    /// Center `tables` on a screen of the given size, zooming out (never in
    /// past 100%) so everything fits.
    pub fn fit(tables: &[Table], screen_width: f64, screen_height: f64) -> Self {
        if tables.is_empty() {
            return Self::default();
        }

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for table in tables {
            let (x, y) = table.position();
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x + FIT_TABLE_WIDTH);
            max_y = max_y.max(y + FIT_TABLE_HEIGHT);
        }

        let content_width = max_x - min_x;
        let content_height = max_y - min_y;
        let center_x = min_x + content_width / 2.0;
        let center_y = min_y + content_height / 2.0;

        let scale_x = (screen_width - FIT_PADDING * 2.0) / content_width;
        let scale_y = (screen_height - FIT_PADDING * 2.0) / content_height;
        let scale = scale_x.min(scale_y).clamp(FIT_MIN_SCALE, FIT_MAX_SCALE);

        Self {
            x: screen_width / 2.0 - center_x * scale,
            y: screen_height / 2.0 - center_y * scale,
            scale,
        }
    }
}
