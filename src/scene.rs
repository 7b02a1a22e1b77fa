//! Scene composition
//!
//! `compose` is a pure function from one frame's state to an ordered list of
//! draw commands. Every element is computed independently; an element that
//! fails (unknown node, unprojectable point, non-finite geometry) is recorded
//! in `Scene::skipped` and the rest of the frame is still produced.

use crate::arc::{arc_path, is_visible};
use crate::colors::{palette, Rgb};
use crate::geo::{graticule, Feature, GeoPoint, GreatCircle};
use crate::path::{PathBuilder, Polyline};
use crate::projection::{BlendedProjection, Projection, Rotation, ScreenPoint};
use crate::topology::{NetworkLink, NetworkNode, NodeStatus, Role, TopologyData};
use log::debug;
use std::f64::consts::TAU;

pub const SURFACE_WIDTH: f64 = 800.0;
pub const SURFACE_HEIGHT: f64 = 500.0;
pub const SURFACE_CENTER: ScreenPoint = ScreenPoint::new(SURFACE_WIDTH / 2.0, SURFACE_HEIGHT / 2.0);

/// Beyond this blend progress hemisphere culling is switched off.
pub const FLATTEN_THRESHOLD: f64 = 0.3;

pub const GLOBE_SCALE: f64 = 220.0;
pub const MAP_SCALE: f64 = SURFACE_WIDTH / TAU;
/// Max chord deviation when densifying paths, in surface units
const PATH_PRECISION: f64 = 0.5;

const TRAFFIC_PER_PACKET: f64 = 40.0;
const GRATICULE_STEP: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("link references unknown node {0}")]
    UnknownNode(String),
    #[error("point {0} does not project")]
    Unprojectable(String),
    #[error("non-finite {0}")]
    NonFinite(&'static str),
    #[error("arc {0} has fewer than two projected samples")]
    DegenerateArc(String),
}

/// Everything about the view that changes frame to frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewState {
    /// 0 is the globe, 1 the flat map.
    pub progress: f64,
    pub rotation: Rotation,
    /// Pan offset from the surface centre.
    pub translation: ScreenPoint,
    /// Packet animation phase in [0, 100).
    pub packet_phase: f64,
}

/// Immutable snapshot handed to `compose`.
pub struct FrameState<'a> {
    pub world: &'a [Feature],
    pub topology: &'a TopologyData,
    pub view: ViewState,
    pub hovered: Option<&'a str>,
}

/// The blended projection for a view: scale eases from the globe radius to
/// the map width as the view flattens.
pub fn projection_for(view: &ViewState) -> BlendedProjection {
    let mut projection = BlendedProjection::globe_to_map();
    projection.set_blend(view.progress);
    let t = projection.blend();
    projection.set_scale(GLOBE_SCALE + (MAP_SCALE - GLOBE_SCALE) * t);
    projection.set_translate(ScreenPoint::new(
        SURFACE_CENTER.x + view.translation.x,
        SURFACE_CENTER.y + view.translation.y,
    ));
    projection.set_rotation(view.rotation);
    projection.set_precision(PATH_PRECISION);
    projection
}

// ============================================================================
// Draw commands
// ============================================================================

/// Back-to-front drawing order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Graticule,
    Countries,
    Sphere,
    Links,
    Packets,
    Nodes,
    Labels,
}

/// What a command was drawn for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Element {
    Graticule,
    Country(usize),
    Sphere,
    Link(usize),
    Packet { link: usize, index: usize },
    Node(String),
    Label(String),
}

impl Element {
    pub fn layer(&self) -> Layer {
        match self {
            Element::Graticule => Layer::Graticule,
            Element::Country(_) => Layer::Countries,
            Element::Sphere => Layer::Sphere,
            Element::Link(_) => Layer::Links,
            Element::Packet { .. } => Layer::Packets,
            Element::Node(_) => Layer::Nodes,
            Element::Label(_) => Layer::Labels,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: Rgb,
    pub width: f64,
    pub opacity: f64,
    /// (dash, gap) in surface units
    pub dash: Option<(f64, f64)>,
    /// Gaussian blur radius; 0 for a crisp line.
    pub blur: f64,
}

impl Stroke {
    fn solid(color: Rgb, width: f64, opacity: f64) -> Self {
        Self { color, width, opacity, dash: None, blur: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fill {
    pub color: Rgb,
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Path {
        points: Vec<ScreenPoint>,
        closed: bool,
        fill: Option<Fill>,
        stroke: Option<Stroke>,
    },
    Circle {
        center: ScreenPoint,
        radius: f64,
        fill: Option<Fill>,
        stroke: Option<Stroke>,
        blur: f64,
    },
    /// Rounded background rectangle behind a label.
    Plate {
        origin: ScreenPoint,
        width: f64,
        height: f64,
        fill: Fill,
        stroke: Option<Stroke>,
    },
    /// Centered text.
    Text {
        anchor: ScreenPoint,
        text: String,
        size: f64,
        color: Rgb,
        opacity: f64,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub element: Element,
    pub shape: Shape,
}

impl DrawCommand {
    pub fn layer(&self) -> Layer {
        self.element.layer()
    }
}

/// Hover region of a drawn node.
#[derive(Clone, Debug, PartialEq)]
pub struct HitTarget {
    pub node_id: String,
    pub center: ScreenPoint,
    pub radius: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub commands: Vec<DrawCommand>,
    pub hit_targets: Vec<HitTarget>,
    pub skipped: Vec<(Element, RenderError)>,
}

impl Scene {
    fn push(&mut self, element: &Element, shape: Shape) {
        self.commands.push(DrawCommand { element: element.clone(), shape });
    }

    fn skip(&mut self, element: Element, err: RenderError) {
        debug!("skipped {element:?}: {err}");
        self.skipped.push((element, err));
    }

    fn commit(&mut self, element: Element, result: Result<Vec<Shape>, RenderError>) {
        match result {
            Ok(shapes) => {
                for shape in shapes {
                    self.push(&element, shape);
                }
            }
            Err(err) => self.skip(element, err),
        }
    }

    /// Topmost node within `slack` units of its marker.
    pub fn hit_test(&self, point: ScreenPoint, slack: f64) -> Option<&HitTarget> {
        self.hit_targets
            .iter()
            .rev()
            .find(|target| target.center.distance_to(point) <= target.radius + slack)
    }

    pub fn count(&self, layer: Layer) -> usize {
        self.commands.iter().filter(|c| c.layer() == layer).count()
    }
}

// ============================================================================
// Packet stagger
// ============================================================================

/// Markers on a link: none when idle, else one per 40 units of traffic,
/// at least one.
pub fn packet_count(traffic: f64) -> usize {
    if traffic > 0.0 {
        ((traffic / TRAFFIC_PER_PACKET).floor() as usize).max(1)
    } else {
        0
    }
}

pub fn packet_offset(link_index: usize, marker_index: usize) -> f64 {
    ((link_index * 17 + marker_index * 33) % 100) as f64
}

/// Fraction of the way along the link, in [0, 1).
pub fn packet_position(phase: f64, offset: f64) -> f64 {
    (phase + offset).rem_euclid(100.0) / 100.0
}

// ============================================================================
// Node styling
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeStyle {
    pub radius: f64,
    pub fill: Fill,
    pub stroke: Stroke,
}

pub fn node_style(role: Role, status: NodeStatus, hovered: bool) -> NodeStyle {
    let (radius, color, stroke) = match role {
        Role::Server => (7.0, palette::SERVER, Stroke::solid(palette::ACCENT, 1.5, 0.9)),
        Role::Router => (6.0, palette::ROUTER, Stroke::solid(palette::ACCENT, 1.5, 0.9)),
        Role::Client => (4.0, palette::CLIENT, Stroke::solid(palette::TEXT, 1.0, 0.6)),
    };
    let fill = match status {
        NodeStatus::Active => Fill { color, opacity: 0.95 },
        NodeStatus::Idle => Fill { color: palette::IDLE, opacity: 0.5 },
        NodeStatus::Warning => Fill { color: palette::WARNING, opacity: 0.95 },
    };
    if hovered {
        NodeStyle {
            radius: radius + 3.0,
            fill,
            stroke: Stroke { width: stroke.width + 1.0, opacity: 1.0, ..stroke },
        }
    } else {
        NodeStyle { radius, fill, stroke }
    }
}

/// Link stroke width from traffic, floored so quiet links stay visible.
pub fn link_width(traffic: f64) -> f64 {
    (traffic / 50.0).clamp(1.5, 6.0)
}

// ============================================================================
// Composition
// ============================================================================

struct Composer<'a> {
    frame: &'a FrameState<'a>,
    projection: BlendedProjection,
    flattened: bool,
}

impl<'a> Composer<'a> {
    fn visible(&self, point: GeoPoint) -> bool {
        self.flattened || is_visible(&self.projection, point, self.projection.translate())
    }

    fn endpoints(&self, link: &NetworkLink) -> Result<(&'a NetworkNode, &'a NetworkNode), RenderError> {
        let topology = self.frame.topology;
        let source = topology
            .node(&link.source)
            .ok_or_else(|| RenderError::UnknownNode(link.source.clone()))?;
        let target = topology
            .node(&link.target)
            .ok_or_else(|| RenderError::UnknownNode(link.target.clone()))?;
        Ok((source, target))
    }

    fn graticule(&self, scene: &mut Scene) {
        let builder = PathBuilder::new(&self.projection);
        let stroke = Stroke::solid(palette::GRATICULE, 0.5, 0.6);
        for line in graticule(GRATICULE_STEP) {
            let result = builder.line(&line).and_then(|polylines| {
                polylines
                    .into_iter()
                    .map(|p| outline(p, None, Some(stroke), "graticule path"))
                    .collect()
            });
            scene.commit(Element::Graticule, result);
        }
    }

    fn country(&self, feature: &Feature) -> Result<Vec<Shape>, RenderError> {
        let builder = PathBuilder::new(&self.projection);
        let land = Fill { color: palette::LAND, opacity: 0.85 };
        let border = Stroke::solid(palette::BORDER, 0.5, 0.8);
        let mut shapes = Vec::new();
        for ring in feature.geometry.rings() {
            for polyline in builder.ring(ring)? {
                let fill = polyline.closed.then_some(land);
                shapes.push(outline(polyline, fill, Some(border), "country path")?);
            }
        }
        Ok(shapes)
    }

    fn sphere(&self) -> Result<Vec<Shape>, RenderError> {
        let polyline = PathBuilder::new(&self.projection).sphere()?;
        let stroke = Stroke::solid(palette::SPHERE, 1.5, 0.6);
        Ok(vec![outline(polyline, None, Some(stroke), "sphere outline")?])
    }

    fn link(&self, index: usize, link: &NetworkLink) -> Result<Vec<Shape>, RenderError> {
        let (source, target) = self.endpoints(link)?;
        let shown = self.visible(source.position) || self.visible(target.position);
        let opacity = if shown { 1.0 } else { 0.0 };

        let points = arc_path(&self.projection, source.position, target.position)
            .ok_or_else(|| RenderError::DegenerateArc(format!("{}->{} (#{index})", link.source, link.target)))?;
        if points.iter().any(|p| !p.is_finite()) {
            return Err(RenderError::NonFinite("link arc"));
        }

        let path = |stroke: Stroke| Shape::Path {
            points: points.clone(),
            closed: false,
            fill: None,
            stroke: Some(stroke),
        };

        if link.is_active() {
            let width = link_width(link.traffic);
            let glow = Stroke {
                color: palette::LINK_ACTIVE,
                width: width * 3.0,
                opacity: 0.3 * opacity,
                dash: None,
                blur: 4.0,
            };
            let core = Stroke::solid(palette::LINK_ACTIVE, width, 0.9 * opacity);
            Ok(vec![path(glow), path(core)])
        } else {
            let idle = Stroke {
                color: palette::LINK_IDLE,
                width: 1.0,
                opacity: 0.4 * opacity,
                dash: Some((4.0, 4.0)),
                blur: 0.0,
            };
            Ok(vec![path(idle)])
        }
    }

    fn packets(&self, index: usize, link: &NetworkLink, scene: &mut Scene) {
        if !link.is_active() {
            return;
        }
        let Ok((source, target)) = self.endpoints(link) else {
            return;
        };
        let circle = GreatCircle::new(source.position, target.position);
        for marker in 0..packet_count(link.traffic) {
            let element = Element::Packet { link: index, index: marker };
            let t = packet_position(self.frame.view.packet_phase, packet_offset(index, marker));
            let point = circle.at(t);
            if !point.is_finite() {
                scene.skip(element, RenderError::NonFinite("packet position"));
                continue;
            }
            let Some(center) = self.projection.project(point) else {
                scene.skip(element, RenderError::Unprojectable(format!("{:.3},{:.3}", point.lon, point.lat)));
                continue;
            };
            scene.push(
                &element,
                Shape::Circle {
                    center,
                    radius: 5.0,
                    fill: Some(Fill { color: palette::PACKET, opacity: 0.35 }),
                    stroke: None,
                    blur: 3.0,
                },
            );
            scene.push(
                &element,
                Shape::Circle {
                    center,
                    radius: 2.0,
                    fill: Some(Fill { color: palette::PACKET_CORE, opacity: 1.0 }),
                    stroke: None,
                    blur: 0.0,
                },
            );
        }
    }

    /// `Ok(None)` when the node is culled.
    fn node(&self, node: &NetworkNode) -> Result<Option<(Shape, HitTarget)>, RenderError> {
        let center = self
            .projection
            .project(node.position)
            .ok_or_else(|| RenderError::Unprojectable(node.id.clone()))?;
        if !self.visible(node.position) {
            return Ok(None);
        }
        let hovered = self.frame.hovered == Some(node.id.as_str());
        let style = node_style(node.role, node.status, hovered);
        let shape = Shape::Circle {
            center,
            radius: style.radius,
            fill: Some(style.fill),
            stroke: Some(style.stroke),
            blur: 0.0,
        };
        let target = HitTarget {
            node_id: node.id.clone(),
            center,
            radius: style.radius,
        };
        Ok(Some((shape, target)))
    }

    fn label(&self, node: &NetworkNode) -> Result<Vec<Shape>, RenderError> {
        if node.role == Role::Client || !self.visible(node.position) {
            return Ok(Vec::new());
        }
        let center = self
            .projection
            .project(node.position)
            .ok_or_else(|| RenderError::Unprojectable(node.id.clone()))?;
        let token = node.name.split_whitespace().next().unwrap_or_default();
        if token.is_empty() {
            return Ok(Vec::new());
        }
        let hovered = self.frame.hovered == Some(node.id.as_str());
        let radius = node_style(node.role, node.status, hovered).radius;
        let width = token.chars().count() as f64 * 6.5 + 10.0;
        let height = 16.0;
        let top = center.y - radius - 6.0 - height;
        Ok(vec![
            Shape::Plate {
                origin: ScreenPoint::new(center.x - width / 2.0, top),
                width,
                height,
                fill: Fill { color: palette::PLATE, opacity: 0.85 },
                stroke: Some(Stroke::solid(palette::SERVER, 0.5, 0.5)),
            },
            Shape::Text {
                anchor: ScreenPoint::new(center.x, top + height / 2.0),
                text: token.to_string(),
                size: 11.0,
                color: palette::TEXT,
                opacity: 1.0,
            },
        ])
    }
}

fn outline(
    polyline: Polyline,
    fill: Option<Fill>,
    stroke: Option<Stroke>,
    what: &'static str,
) -> Result<Shape, RenderError> {
    if polyline.points.iter().any(|p| !p.is_finite()) {
        return Err(RenderError::NonFinite(what));
    }
    Ok(Shape::Path {
        points: polyline.points,
        closed: polyline.closed,
        fill,
        stroke,
    })
}

/// Build the whole scene for one frame.
pub fn compose(frame: &FrameState) -> Scene {
    let composer = Composer {
        frame,
        projection: projection_for(&frame.view),
        flattened: frame.view.progress > FLATTEN_THRESHOLD,
    };
    let mut scene = Scene::default();

    composer.graticule(&mut scene);

    for (index, feature) in frame.world.iter().enumerate() {
        scene.commit(Element::Country(index), composer.country(feature));
    }

    scene.commit(Element::Sphere, composer.sphere());

    for (index, link) in frame.topology.links.iter().enumerate() {
        scene.commit(Element::Link(index), composer.link(index, link));
    }

    for (index, link) in frame.topology.links.iter().enumerate() {
        composer.packets(index, link, &mut scene);
    }

    for node in &frame.topology.nodes {
        let element = Element::Node(node.id.clone());
        match composer.node(node) {
            Ok(Some((shape, target))) => {
                scene.push(&element, shape);
                scene.hit_targets.push(target);
            }
            Ok(None) => {}
            Err(err) => scene.skip(element, err),
        }
    }

    for node in &frame.topology.nodes {
        scene.commit(Element::Label(node.id.clone()), composer.label(node));
    }

    scene
}
