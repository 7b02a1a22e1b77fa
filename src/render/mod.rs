//! Scene backends
//!
//! Both backends consume the same `Scene`. The braille rasterizer targets a
//! terminal cell grid; the SVG writer produces a standalone document at the
//! logical surface size.

pub mod braille;
pub mod svg;

use crate::projection::ScreenPoint;
use crate::scene::{SURFACE_HEIGHT, SURFACE_WIDTH};

/// Braille dots per cell, horizontally and vertically.
pub const DOTS_X: usize = 2;
pub const DOTS_Y: usize = 4;

/// Fits the logical surface into a cell grid, aspect preserved and centered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    cols: u16,
    rows: u16,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    pub fn fit(cols: u16, rows: u16) -> Self {
        let dots_w = (cols as usize * DOTS_X) as f64;
        let dots_h = (rows as usize * DOTS_Y) as f64;
        let scale = (dots_w / SURFACE_WIDTH).min(dots_h / SURFACE_HEIGHT);
        Self {
            cols,
            rows,
            scale,
            offset_x: (dots_w - SURFACE_WIDTH * scale) / 2.0,
            offset_y: (dots_h - SURFACE_HEIGHT * scale) / 2.0,
        }
    }

    pub fn cells(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    pub fn dots(&self) -> (usize, usize) {
        (self.cols as usize * DOTS_X, self.rows as usize * DOTS_Y)
    }

    /// Dots per surface unit
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn to_dot(&self, point: ScreenPoint) -> (f64, f64) {
        (self.offset_x + point.x * self.scale, self.offset_y + point.y * self.scale)
    }

    pub fn to_cell(&self, point: ScreenPoint) -> (i32, i32) {
        let (x, y) = self.to_dot(point);
        ((x / DOTS_X as f64).floor() as i32, (y / DOTS_Y as f64).floor() as i32)
    }

    /// Surface point under the middle of a cell.
    pub fn cell_to_surface(&self, col: u16, row: u16) -> ScreenPoint {
        let x = col as f64 * DOTS_X as f64 + DOTS_X as f64 / 2.0;
        let y = row as f64 * DOTS_Y as f64 + DOTS_Y as f64 / 2.0;
        if self.scale <= 0.0 {
            return ScreenPoint::default();
        }
        ScreenPoint::new((x - self.offset_x) / self.scale, (y - self.offset_y) / self.scale)
    }
}
