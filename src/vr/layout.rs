//! Foveated viewport geometry.
//!
//! Pure function of the runtime's recommended per-view size and the
//! foveation settings. Inputs are not clamped: a non-positive or oversized
//! scale produces a degenerate layout, which callers must reject (see
//! [`ViewLayout::is_renderable`]) before allocating anything.

use super::settings::FoveationSettings;

/// Pixel sizes of the center (high-res) and peripheral (low-res) targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewLayout {
    pub high_res_width: u32,
    pub high_res_height: u32,
    pub low_res_width: u32,
    pub low_res_height: u32,
}

impl ViewLayout {
    /// Compute the layout for a base recommended size. Single precision,
    /// multiplied left to right, truncated toward zero.
    pub fn compute(base_width: u32, base_height: u32, settings: &FoveationSettings) -> Self {
        let center = settings.center_resolution_scale;
        let peripheral = settings.peripheral_resolution_scale;
        Self {
            high_res_width: scaled(base_width, settings.center_size_x, center),
            high_res_height: scaled(base_height, settings.center_size_y, center),
            low_res_width: scaled(base_width, peripheral, 1.0),
            low_res_height: scaled(base_height, peripheral, 1.0),
        }
    }

    /// Non-zero in every dimension and within the runtime's per-view maximum.
    pub fn is_renderable(&self, max_width: u32, max_height: u32) -> bool {
        let dims = [
            (self.high_res_width, max_width),
            (self.high_res_height, max_height),
            (self.low_res_width, max_width),
            (self.low_res_height, max_height),
        ];
        dims.iter().all(|&(v, max)| v > 0 && (max == 0 || v <= max))
    }

    pub fn high_res_str(&self) -> String {
        format!("{}x{}", self.high_res_width, self.high_res_height)
    }

    pub fn low_res_str(&self) -> String {
        format!("{}x{}", self.low_res_width, self.low_res_height)
    }

    pub fn to_sexp(&self) -> String {
        format!(
            "(:high-res (:w {} :h {}) :low-res (:w {} :h {}))",
            self.high_res_width, self.high_res_height, self.low_res_width, self.low_res_height,
        )
    }
}

// `as` saturates: negative and NaN products land on 0, huge ones on u32::MAX.
fn scaled(base: u32, fraction: f32, scale: f32) -> u32 {
    (base as f32 * fraction * scale) as u32
}
