//! Braille rasterizer
//!
//! Each terminal cell holds a 2x4 dot matrix. Paths become Bresenham lines
//! (dash patterns honoured), circles become filled discs and closed fills a
//! sparse dot pattern. A cell takes the colour of the last dot drawn into
//! it, so later layers win. Plates and text sit above the dot layer.

use super::{Viewport, DOTS_X, DOTS_Y};
use crate::colors::{palette, Rgb};
use crate::projection::ScreenPoint;
use crate::scene::{Fill, Scene, Shape, Stroke};
use crate::terminal::Terminal;

/// Anything fainter than this is not drawn.
const MIN_OPACITY: f64 = 0.05;

const DOT_BITS: [[u8; DOTS_X]; DOTS_Y] = [[0x01, 0x08], [0x02, 0x10], [0x04, 0x20], [0x40, 0x80]];

#[derive(Clone, Copy, Debug, PartialEq)]
struct Dot {
    color: Rgb,
    z: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Glyph {
    ch: char,
    color: Rgb,
}

pub struct BrailleCanvas {
    viewport: Viewport,
    width: usize,
    height: usize,
    dots: Vec<Option<Dot>>,
    plates: Vec<Option<Rgb>>,
    glyphs: Vec<Option<Glyph>>,
    background: Rgb,
    z: u32,
}

impl BrailleCanvas {
    pub fn new(viewport: Viewport) -> Self {
        let (width, height) = viewport.dots();
        let (cols, rows) = viewport.cells();
        let cells = cols as usize * rows as usize;
        Self {
            viewport,
            width,
            height,
            dots: vec![None; width * height],
            plates: vec![None; cells],
            glyphs: vec![None; cells],
            background: palette::BACKGROUND,
            z: 0,
        }
    }

    pub fn draw(&mut self, scene: &Scene) {
        for command in &scene.commands {
            self.z += 1;
            match &command.shape {
                Shape::Path { points, closed, fill, stroke } => {
                    if let (Some(fill), true) = (fill, *closed) {
                        self.fill_polygon(points, fill);
                    }
                    if let Some(stroke) = stroke {
                        self.stroke_path(points, *closed, stroke);
                    }
                }
                Shape::Circle { center, radius, fill, stroke, blur } => {
                    let paint = fill
                        .map(|f| (f.color, f.opacity))
                        .or_else(|| stroke.map(|s| (s.color, s.opacity)));
                    if let Some((color, opacity)) = paint {
                        // blurred halos read as a dimmer, slightly larger disc
                        let opacity = if *blur > 0.0 { opacity * 0.6 } else { opacity };
                        self.disc(*center, *radius, color, opacity);
                    }
                }
                Shape::Plate { origin, width, height, fill, .. } => {
                    self.plate(*origin, *width, *height, fill);
                }
                Shape::Text { anchor, text, color, opacity, .. } => {
                    self.text(*anchor, text, *color, *opacity);
                }
            }
        }
    }

    fn tint(&self, color: Rgb, opacity: f64) -> Option<Rgb> {
        (opacity >= MIN_OPACITY).then(|| color.over(self.background, opacity))
    }

    fn plot(&mut self, x: i32, y: i32, color: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.dots[y as usize * self.width + x as usize] = Some(Dot { color, z: self.z });
        }
    }

    fn stroke_path(&mut self, points: &[ScreenPoint], closed: bool, stroke: &Stroke) {
        // blurred strokes only widen the glow; the crisp stroke above carries the line
        if stroke.blur > 0.0 {
            return;
        }
        let Some(color) = self.tint(stroke.color, stroke.opacity) else {
            return;
        };
        let dash = stroke.dash.map(|(on, off)| {
            let scale = self.viewport.scale().max(f64::EPSILON);
            ((on * scale).max(1.0), (off * scale).max(1.0))
        });
        let mut travelled = 0.0;
        let dots: Vec<(f64, f64)> = points.iter().map(|p| self.viewport.to_dot(*p)).collect();
        for pair in dots.windows(2) {
            self.line(pair[0], pair[1], color, dash, &mut travelled);
        }
        if closed && dots.len() > 2 {
            if let (Some(&last), Some(&first)) = (dots.last(), dots.first()) {
                self.line(last, first, color, dash, &mut travelled);
            }
        }
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb, dash: Option<(f64, f64)>, travelled: &mut f64) {
        let x0 = from.0.floor() as i32;
        let y0 = from.1.floor() as i32;
        let x1 = to.0.floor() as i32;
        let y1 = to.1.floor() as i32;

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let mut x = x0;
        let mut y = y0;

        loop {
            let draw = match dash {
                Some((on, off)) => travelled.rem_euclid(on + off) < on,
                None => true,
            };
            if draw {
                self.plot(x, y, color);
            }

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                if x == x1 {
                    break;
                }
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                if y == y1 {
                    break;
                }
                err += dx;
                y += sy;
            }
            *travelled += 1.0;
        }
    }

    /// Even-odd scanline fill on every other dot.
    fn fill_polygon(&mut self, points: &[ScreenPoint], fill: &Fill) {
        let Some(color) = self.tint(fill.color, fill.opacity * 0.6) else {
            return;
        };
        if points.len() < 3 {
            return;
        }
        let dots: Vec<(f64, f64)> = points.iter().map(|p| self.viewport.to_dot(*p)).collect();
        let min_y = dots.iter().map(|d| d.1).fold(f64::INFINITY, f64::min).max(0.0) as usize;
        let max_y = dots
            .iter()
            .map(|d| d.1)
            .fold(f64::NEG_INFINITY, f64::max)
            .min(self.height as f64 - 1.0);
        if max_y < 0.0 {
            return;
        }

        let mut crossings = Vec::new();
        for y in (min_y..=max_y as usize).filter(|y| y % 2 == 0) {
            let scan = y as f64 + 0.5;
            crossings.clear();
            for (i, a) in dots.iter().enumerate() {
                let b = dots[(i + 1) % dots.len()];
                if (a.1 <= scan) != (b.1 <= scan) {
                    crossings.push(a.0 + (scan - a.1) / (b.1 - a.1) * (b.0 - a.0));
                }
            }
            crossings.sort_by(f64::total_cmp);
            for span in crossings.chunks_exact(2) {
                let start = span[0].max(0.0).ceil() as i32;
                let end = span[1].min(self.width as f64 - 1.0).floor() as i32;
                let mut x = start + (start + y as i32 / 2) % 2;
                while x <= end {
                    self.plot(x, y as i32, color);
                    x += 2;
                }
            }
        }
    }

    fn disc(&mut self, center: ScreenPoint, radius: f64, color: Rgb, opacity: f64) {
        let Some(color) = self.tint(color, opacity) else {
            return;
        };
        let (cx, cy) = self.viewport.to_dot(center);
        let r = radius * self.viewport.scale();
        if r < 0.75 {
            self.plot(cx.floor() as i32, cy.floor() as i32, color);
            return;
        }
        let reach = r.ceil() as i32;
        let (ix, iy) = (cx.floor() as i32, cy.floor() as i32);
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let px = (ix + dx) as f64 + 0.5 - cx;
                let py = (iy + dy) as f64 + 0.5 - cy;
                if px * px + py * py <= r * r {
                    self.plot(ix + dx, iy + dy, color);
                }
            }
        }
    }

    fn cell_index(&self, col: i32, row: i32) -> Option<usize> {
        let (cols, rows) = self.viewport.cells();
        (col >= 0 && row >= 0 && col < cols as i32 && row < rows as i32)
            .then(|| row as usize * cols as usize + col as usize)
    }

    fn plate(&mut self, origin: ScreenPoint, width: f64, height: f64, fill: &Fill) {
        let Some(color) = self.tint(fill.color, fill.opacity) else {
            return;
        };
        let (c0, r0) = self.viewport.to_cell(origin);
        let (c1, r1) = self.viewport.to_cell(ScreenPoint::new(origin.x + width, origin.y + height));
        for row in r0..=r1.max(r0) {
            for col in c0..=c1.max(c0) {
                if let Some(idx) = self.cell_index(col, row) {
                    self.plates[idx] = Some(color);
                    self.glyphs[idx] = None;
                }
            }
        }
    }

    fn text(&mut self, anchor: ScreenPoint, text: &str, color: Rgb, opacity: f64) {
        let Some(color) = self.tint(color, opacity) else {
            return;
        };
        let (col, row) = self.viewport.to_cell(anchor);
        let len = text.chars().count() as i32;
        let start = col - len / 2;
        for (i, ch) in text.chars().enumerate() {
            if let Some(idx) = self.cell_index(start + i as i32, row) {
                self.glyphs[idx] = Some(Glyph { ch, color });
            }
        }
    }

    /// Pack dots into braille characters and copy them into `term` at
    /// (`left`, `top`).
    pub fn blit(&self, term: &mut Terminal, left: i32, top: i32) {
        let (cols, rows) = self.viewport.cells();
        for row in 0..rows as usize {
            for col in 0..cols as usize {
                let x = left + col as i32;
                let y = top + row as i32;
                let idx = row * cols as usize + col;

                if let Some(plate) = self.plates[idx] {
                    term.set(x, y, ' ', None, false);
                    term.set_bg(x, y, Some(plate.to_color()));
                }
                if let Some(glyph) = self.glyphs[idx] {
                    term.set(x, y, glyph.ch, Some(glyph.color.to_color()), true);
                    continue;
                }
                if self.plates[idx].is_some() {
                    continue;
                }

                let mut bits: u8 = 0;
                let mut top_dot: Option<Dot> = None;
                for (dy, row_bits) in DOT_BITS.iter().enumerate() {
                    for (dx, bit) in row_bits.iter().enumerate() {
                        let px = col * DOTS_X + dx;
                        let py = row * DOTS_Y + dy;
                        if let Some(dot) = self.dots[py * self.width + px] {
                            bits |= bit;
                            if top_dot.map_or(true, |t| dot.z >= t.z) {
                                top_dot = Some(dot);
                            }
                        }
                    }
                }
                if let Some(dot) = top_dot {
                    let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
                    term.set(x, y, ch, Some(dot.color.to_color()), false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{DrawCommand, Element};

    impl BrailleCanvas {
        fn lit(&self) -> usize {
            self.dots.iter().filter(|d| d.is_some()).count()
        }
    }

    fn scene(shapes: Vec<Shape>) -> Scene {
        Scene {
            commands: shapes
                .into_iter()
                .map(|shape| DrawCommand { element: Element::Sphere, shape })
                .collect(),
            ..Scene::default()
        }
    }

    fn stroke(opacity: f64, dash: Option<(f64, f64)>) -> Stroke {
        Stroke { color: palette::LINK_ACTIVE, width: 1.0, opacity, dash, blur: 0.0 }
    }

    fn horizontal(stroke: Stroke) -> Shape {
        Shape::Path {
            points: vec![ScreenPoint::new(0.0, 250.0), ScreenPoint::new(799.0, 250.0)],
            closed: false,
            fill: None,
            stroke: Some(stroke),
        }
    }

    #[test]
    fn solid_line_spans_canvas() {
        let mut canvas = BrailleCanvas::new(Viewport::fit(100, 25));
        canvas.draw(&scene(vec![horizontal(stroke(1.0, None))]));
        // 200 dots across, scale 0.2 from the height: 160 dots of line
        assert!(canvas.lit() >= 159);
    }

    #[test]
    fn dashed_line_has_gaps() {
        let mut solid = BrailleCanvas::new(Viewport::fit(100, 25));
        solid.draw(&scene(vec![horizontal(stroke(1.0, None))]));
        let mut dashed = BrailleCanvas::new(Viewport::fit(100, 25));
        dashed.draw(&scene(vec![horizontal(stroke(1.0, Some((10.0, 10.0))))]));
        assert!(dashed.lit() > 0);
        assert!(dashed.lit() < solid.lit());
    }

    #[test]
    fn invisible_strokes_are_skipped() {
        let mut canvas = BrailleCanvas::new(Viewport::fit(100, 25));
        canvas.draw(&scene(vec![horizontal(stroke(0.0, None))]));
        assert_eq!(canvas.lit(), 0);
    }

    #[test]
    fn disc_covers_its_area() {
        let mut canvas = BrailleCanvas::new(Viewport::fit(100, 25));
        canvas.draw(&scene(vec![Shape::Circle {
            center: ScreenPoint::new(400.0, 250.0),
            radius: 20.0,
            fill: Some(Fill { color: palette::SERVER, opacity: 1.0 }),
            stroke: None,
            blur: 0.0,
        }]));
        // radius 4 dots
        let lit = canvas.lit();
        assert!((40..=60).contains(&lit), "{lit}");
    }

    #[test]
    fn text_and_plate_land_in_cells() {
        let mut canvas = BrailleCanvas::new(Viewport::fit(100, 25));
        canvas.draw(&scene(vec![
            Shape::Plate {
                origin: ScreenPoint::new(380.0, 240.0),
                width: 40.0,
                height: 20.0,
                fill: Fill { color: palette::PLATE, opacity: 0.9 },
                stroke: None,
            },
            Shape::Text {
                anchor: ScreenPoint::new(400.0, 250.0),
                text: "Tokyo".into(),
                size: 11.0,
                color: palette::TEXT,
                opacity: 1.0,
            },
        ]));
        let mut term = Terminal::headless(100, 25);
        canvas.blit(&mut term, 0, 0);
        let (col, row) = canvas.viewport.to_cell(ScreenPoint::new(400.0, 250.0));
        let text: String = (col - 2..col + 3)
            .filter_map(|c| term.get(c, row).map(|cell| cell.ch))
            .collect();
        assert_eq!(text, "Tokyo");
        assert!(term.get(col, row).and_then(|c| c.bg).is_some());
    }

    #[test]
    fn later_layers_win_cell_colour() {
        let mut canvas = BrailleCanvas::new(Viewport::fit(100, 25));
        let under = Stroke { color: Rgb(255, 0, 0), ..stroke(1.0, None) };
        let over = Stroke { color: Rgb(0, 0, 255), ..stroke(1.0, None) };
        canvas.draw(&scene(vec![horizontal(under), horizontal(over)]));
        let mut term = Terminal::headless(100, 25);
        canvas.blit(&mut term, 0, 0);
        let (col, row) = canvas.viewport.to_cell(ScreenPoint::new(400.0, 250.0));
        assert_eq!(term.get(col, row).and_then(|c| c.fg), Some(Rgb(0, 0, 255).to_color()));
    }

    #[test]
    fn closed_fill_is_sparse() {
        let mut canvas = BrailleCanvas::new(Viewport::fit(100, 25));
        let square = vec![
            ScreenPoint::new(300.0, 150.0),
            ScreenPoint::new(500.0, 150.0),
            ScreenPoint::new(500.0, 350.0),
            ScreenPoint::new(300.0, 350.0),
        ];
        canvas.draw(&scene(vec![Shape::Path {
            points: square,
            closed: true,
            fill: Some(Fill { color: palette::LAND, opacity: 1.0 }),
            stroke: None,
        }]));
        // 40x40 dot square, a quarter of it lit
        let lit = canvas.lit();
        assert!((300..=500).contains(&lit), "{lit}");
    }
}
