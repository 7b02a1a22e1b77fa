//! Standalone SVG document from a scene

use crate::colors::palette;
use crate::projection::ScreenPoint;
use crate::scene::{Fill, Layer, Scene, Shape, Stroke, SURFACE_HEIGHT, SURFACE_WIDTH};

const W: f64 = SURFACE_WIDTH;
const H: f64 = SURFACE_HEIGHT;

fn layer_class(layer: Layer) -> &'static str {
    match layer {
        Layer::Graticule => "graticule",
        Layer::Countries => "countries",
        Layer::Sphere => "sphere",
        Layer::Links => "links",
        Layer::Packets => "packets",
        Layer::Nodes => "nodes",
        Layer::Labels => "labels",
    }
}

/// Filter id for a blur radius; radii are rounded to a tenth.
fn blur_id(blur: f64) -> String {
    format!("blur{}", (blur * 10.0).round() as i64)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

fn path_data(points: &[ScreenPoint], closed: bool) -> String {
    let mut d = String::new();
    for (i, ScreenPoint { x, y }) in points.iter().enumerate() {
        if i == 0 {
            d.push_str(&format!("M{x:.2},{y:.2}"));
        } else {
            d.push_str(&format!("L{x:.2},{y:.2}"));
        }
    }
    if closed {
        d.push('Z');
    }
    d
}

fn fill_attrs(fill: Option<&Fill>) -> String {
    match fill {
        Some(fill) => format!(" fill='{}' fill-opacity='{:.2}'", fill.color.hex(), fill.opacity),
        None => " fill='none'".to_string(),
    }
}

fn stroke_attrs(stroke: Option<&Stroke>) -> String {
    let Some(stroke) = stroke else {
        return String::new();
    };
    let mut s = format!(
        " stroke='{}' stroke-width='{:.2}' stroke-opacity='{:.2}' stroke-linecap='round'",
        stroke.color.hex(),
        stroke.width,
        stroke.opacity
    );
    if let Some((on, off)) = stroke.dash {
        s.push_str(&format!(" stroke-dasharray='{on},{off}'"));
    }
    if stroke.blur > 0.0 {
        s.push_str(&format!(" filter='url(#{})'", blur_id(stroke.blur)));
    }
    s
}

pub fn to_svg(scene: &Scene) -> String {
    let mut s = String::with_capacity(64 << 10);

    s.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{W}" height="{H}" viewBox="0 0 {W} {H}">
  <title>Network topology</title>
"#
    ));

    let mut blurs: Vec<f64> = scene
        .commands
        .iter()
        .filter_map(|c| match &c.shape {
            Shape::Path { stroke: Some(stroke), .. } if stroke.blur > 0.0 => Some(stroke.blur),
            Shape::Circle { blur, .. } if *blur > 0.0 => Some(*blur),
            _ => None,
        })
        .collect();
    blurs.sort_by(f64::total_cmp);
    blurs.dedup_by(|a, b| blur_id(*a) == blur_id(*b));
    if !blurs.is_empty() {
        s.push_str("  <defs>\n");
        for blur in &blurs {
            s.push_str(&format!(
                "    <filter id='{}' x='-50%' y='-50%' width='200%' height='200%'><feGaussianBlur stdDeviation='{blur:.1}'/></filter>\n",
                blur_id(*blur)
            ));
        }
        s.push_str("  </defs>\n");
    }

    s.push_str(&format!("  <rect width='{W}' height='{H}' fill='{}'/>\n", palette::BACKGROUND.hex()));

    let mut open: Option<Layer> = None;
    for command in &scene.commands {
        let layer = command.layer();
        if open != Some(layer) {
            if open.is_some() {
                s.push_str("  </g>\n");
            }
            s.push_str(&format!("  <g class='{}'>\n", layer_class(layer)));
            open = Some(layer);
        }

        match &command.shape {
            Shape::Path { points, closed, fill, stroke } => {
                if points.len() < 2 {
                    continue;
                }
                s.push_str(&format!(
                    "    <path d='{}'{}{}/>\n",
                    path_data(points, *closed),
                    fill_attrs(fill.as_ref()),
                    stroke_attrs(stroke.as_ref())
                ));
            }
            Shape::Circle { center, radius, fill, stroke, blur } => {
                let filter = if *blur > 0.0 {
                    format!(" filter='url(#{})'", blur_id(*blur))
                } else {
                    String::new()
                };
                s.push_str(&format!(
                    "    <circle cx='{:.2}' cy='{:.2}' r='{radius:.2}'{}{}{filter}/>\n",
                    center.x,
                    center.y,
                    fill_attrs(fill.as_ref()),
                    stroke_attrs(stroke.as_ref())
                ));
            }
            Shape::Plate { origin, width, height, fill, stroke } => {
                s.push_str(&format!(
                    "    <rect x='{:.2}' y='{:.2}' width='{width:.2}' height='{height:.2}' rx='4'{}{}/>\n",
                    origin.x,
                    origin.y,
                    fill_attrs(Some(fill)),
                    stroke_attrs(stroke.as_ref())
                ));
            }
            Shape::Text { anchor, text, size, color, opacity } => {
                s.push_str(&format!(
                    "    <text x='{:.2}' y='{:.2}' font-family='monospace' font-size='{size}' text-anchor='middle' dominant-baseline='central' fill='{}' fill-opacity='{opacity:.2}'>{}</text>\n",
                    anchor.x,
                    anchor.y,
                    color.hex(),
                    escape(text)
                ));
            }
        }
    }
    if open.is_some() {
        s.push_str("  </g>\n");
    }

    s.push_str("</svg>\n");
    s
}
