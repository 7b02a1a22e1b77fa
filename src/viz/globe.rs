//! Network topology on a globe that unrolls into a flat map
//!
//! The loop polls input, advances the controller, commits any finished
//! background work (topology refresh, world load), composes a scene and
//! rasterizes it to braille. Fetches never block a frame.

use super::{KeyAction, VizState};
use crate::colors::{status_color, StatusColor};
use crate::config::{GlobeConfig, SourceKind};
use crate::controller::Controller;
use crate::geo::Feature;
use crate::help::{render_help_overlay, HELP};
use crate::render::braille::BrailleCanvas;
use crate::render::Viewport;
use crate::scene::{compose, FrameState, Scene, ViewState};
use crate::terminal::Terminal;
use crate::topology::capture::{spawn_reader, TrafficAggregator};
use crate::topology::source::{
    CaptureSource, Connectivity, HttpSource, OfflineSource, TopologyFeed, TopologySource, TopologyState,
};
use crate::topology::{NetworkNode, TopologyData};
use crate::world::{placeholder_world, WorldLoader};
use crossterm::event::{
    DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event, MouseButton,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::style::Color;
use log::{debug, info};
use std::io::{self, BufReader};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Extra hover radius around node markers, in surface units
const HOVER_SLACK: f64 = 4.0;

struct MouseCaptureGuard;

impl MouseCaptureGuard {
    fn enable() -> io::Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnableMouseCapture, EnableFocusChange)?;
        Ok(Self)
    }
}

impl Drop for MouseCaptureGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, DisableFocusChange, DisableMouseCapture);
    }
}

fn open_source(config: &GlobeConfig) -> Arc<dyn TopologySource> {
    match &config.source {
        SourceKind::Http(endpoint) => Arc::new(HttpSource::new(endpoint, config.timeout)),
        SourceKind::Stdin => {
            let aggregator = TrafficAggregator::shared();
            spawn_reader(BufReader::new(io::stdin()), Arc::clone(&aggregator));
            Arc::new(CaptureSource::new(aggregator))
        }
        SourceKind::Offline => Arc::new(OfflineSource),
    }
}

/// Map area: every row except the status bar.
fn map_viewport(width: u16, height: u16) -> Viewport {
    Viewport::fit(width, height.saturating_sub(1).max(1))
}

pub fn run(term: &mut Terminal, config: &GlobeConfig) -> io::Result<()> {
    let mut state = VizState::new(config.time_step);
    let mut controller = Controller::new(config.refresh);

    let mut feed = TopologyFeed::new(open_source(config));
    let mut topology = TopologyState::demo();

    let mut world: Vec<Feature> = placeholder_world();
    let mut loader = config
        .world
        .as_ref()
        .map(|url| WorldLoader::spawn(url.clone(), config.timeout));

    let _mouse_guard = MouseCaptureGuard::enable()?;

    let (mut prev_w, mut prev_h) = term.size();
    let mut viewport = map_viewport(prev_w, prev_h);
    let mut scene = Scene::default();

    while controller.is_running() {
        let (width, height) = crossterm::terminal::size().unwrap_or(term.size());
        if width != prev_w || height != prev_h {
            term.resize(width, height);
            term.clear_screen()?;
            prev_w = width;
            prev_h = height;
            viewport = map_viewport(width, height);
        }

        while let Some(event) = term.next_event(Duration::ZERO)? {
            match event {
                Event::Key(key) => match state.handle_key(key.code, key.modifiers) {
                    KeyAction::Quit => controller.teardown(),
                    KeyAction::ToggleBlend => {
                        if controller.toggle_blend(Instant::now()) {
                            debug!("blend toggled: {}", controller.blend.label());
                        }
                    }
                    KeyAction::Reset => controller.reset(),
                    KeyAction::TogglePause => controller.toggle_pause(),
                    KeyAction::Rotate(d_lon, d_lat) => controller.interaction.rotate(d_lon, d_lat),
                    KeyAction::Pan(dx, dy) => controller.interaction.pan(dx, dy),
                    KeyAction::None => {}
                },
                Event::Mouse(mouse) => {
                    let at = viewport.cell_to_surface(mouse.column, mouse.row);
                    match mouse.kind {
                        MouseEventKind::Down(MouseButton::Left) => controller.pointer_down(at),
                        MouseEventKind::Drag(MouseButton::Left) => {
                            controller.pointer_move(at);
                        }
                        MouseEventKind::Up(MouseButton::Left) => controller.pointer_up(),
                        MouseEventKind::Moved => {
                            let hit = scene.hit_test(at, HOVER_SLACK).map(|t| t.node_id.clone());
                            controller.hover(hit.as_deref(), at);
                        }
                        _ => {}
                    }
                }
                Event::FocusLost => controller.pointer_leave(),
                _ => {}
            }
        }
        if !controller.is_running() {
            break;
        }

        let tick = controller.tick(Instant::now());
        if tick.refresh {
            feed.request();
        }
        if let Some(result) = feed.poll() {
            topology.apply(result);
        }
        if let Some(features) = loader.as_mut().and_then(WorldLoader::poll) {
            info!("world geometry ready: {} features", features.len());
            world = features;
            loader = None;
        }

        let frame = FrameState {
            world: &world,
            topology: topology.data(),
            view: controller.view(),
            hovered: controller.tooltip.node_id.as_deref(),
        };
        scene = compose(&frame);

        term.clear();
        let mut canvas = BrailleCanvas::new(viewport);
        canvas.draw(&scene);
        canvas.blit(term, 0, 0);

        if controller.tooltip.visible {
            let node = controller
                .tooltip
                .node_id
                .as_deref()
                .and_then(|id| topology.data().node(id));
            if let Some(node) = node {
                let (col, row) = viewport.to_cell(controller.tooltip.position);
                draw_tooltip(term, &tooltip_lines(node), col, row);
            }
        }

        let loading = loader.as_ref().is_some_and(WorldLoader::is_loading);
        draw_status_bar(term, &topology, &controller, loading);

        if state.show_help {
            render_help_overlay(term, width, height, HELP);
        }

        term.present()?;
        term.sleep(state.speed);
    }

    controller.teardown();
    Ok(())
}

/// Render one frame into a headless buffer.
pub fn render_snapshot(world: &[Feature], topology: &TopologyData, view: ViewState, cols: u16, rows: u16) -> Terminal {
    let mut term = Terminal::headless(cols, rows);
    let frame = FrameState {
        world,
        topology,
        view,
        hovered: None,
    };
    let scene = compose(&frame);
    let mut canvas = BrailleCanvas::new(Viewport::fit(cols, rows));
    canvas.draw(&scene);
    canvas.blit(&mut term, 0, 0);
    term
}

pub fn tooltip_lines(node: &NetworkNode) -> Vec<String> {
    vec![
        node.name.clone(),
        node.address.clone(),
        format!("{} · {}", node.role.label(), node.status.label()),
        format!("{:.2}°, {:.2}°", node.position.lat, node.position.lon),
    ]
}

/// Box beside the pointer, flipped left/up when it would leave the screen.
fn draw_tooltip(term: &mut Terminal, lines: &[String], col: i32, row: i32) {
    let (width, height) = term.size();
    let inner = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;
    let box_w = inner + 2;
    let box_h = lines.len() as i32;

    let mut x = col + 2;
    if x + box_w > width as i32 {
        x = col - 2 - box_w;
    }
    let mut y = row + 1;
    if y + box_h > height as i32 - 1 {
        y = row - box_h;
    }
    let x = x.max(0);
    let y = y.max(0);

    let bg = Some(Color::Rgb { r: 0x0f, g: 0x17, b: 0x2a });
    for (i, line) in lines.iter().enumerate() {
        let ly = y + i as i32;
        for dx in 0..box_w {
            term.set(x + dx, ly, ' ', None, false);
            term.set_bg(x + dx, ly, bg);
        }
        let (fg, bold) = if i == 0 {
            (Some(Color::White), true)
        } else {
            (Some(Color::Grey), false)
        };
        term.set_str(x + 1, ly, line, fg, bold);
    }
}

pub fn status_line(topology: &TopologyState, controller: &Controller, loading_world: bool) -> String {
    let stats = topology.data().stats();
    let mut parts = vec![
        format!(" {}", topology.connectivity().label()),
        format!("nodes {}", stats.total_nodes),
        format!("active {}", stats.active_connections),
        format!("packets {:.0}", stats.total_packets),
        format!("[u] {}", controller.blend.label()),
    ];
    if controller.is_paused() {
        parts.push("PAUSED".to_string());
    }
    if loading_world {
        parts.push("loading map".to_string());
    }
    if let Some(updated) = topology.updated() {
        parts.push(format!("updated {}", updated.format("%H:%M:%S")));
    }
    parts.push("? help".to_string());
    parts.join(" │ ")
}

fn draw_status_bar(term: &mut Terminal, topology: &TopologyState, controller: &Controller, loading_world: bool) {
    let (width, height) = term.size();
    let y = height as i32 - 1;
    let line = status_line(topology, controller, loading_world);
    let bg = Some(Color::Rgb { r: 0x11, g: 0x18, b: 0x27 });
    for x in 0..width as i32 {
        term.set(x, y, ' ', None, false);
        term.set_bg(x, y, bg);
    }
    term.set_str(0, y, &line, Some(Color::Grey), false);

    let color = match topology.connectivity() {
        Connectivity::Live => StatusColor::Good,
        Connectivity::Connecting => StatusColor::Info,
        Connectivity::Demo => StatusColor::Warning,
    };
    let label = topology.connectivity().label();
    term.set_str(1, y, label, Some(status_color(color)), true);
}
