//! Interaction and animation state
//!
//! Everything that changes between frames lives here and is advanced by an
//! explicit `tick`. The frame loop reads a `ViewState` snapshot out of the
//! controller and hands it to the compositor; nothing in here draws.

use crate::projection::{Rotation, ScreenPoint};
use crate::scene::ViewState;
use log::debug;
use std::time::{Duration, Instant};

pub const BLEND_DURATION: Duration = Duration::from_millis(2000);
pub const PACKET_STEP: f64 = 0.5;
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(2500);

const GLOBE_SENSITIVITY: f64 = 0.4;
const MAP_SENSITIVITY: f64 = 0.2;
const MAX_TILT: f64 = 90.0;

/// Symmetric quadratic ease-in-out on [0, 1].
pub fn ease_in_out_quad(x: f64) -> f64 {
    if x < 0.5 {
        2.0 * x * x
    } else {
        -1.0 + (4.0 - 2.0 * x) * x
    }
}

/// Drag-to-rotate plus pan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InteractionState {
    pub dragging: bool,
    pub last: Option<ScreenPoint>,
    pub rotation: Rotation,
    pub translation: ScreenPoint,
}

impl InteractionState {
    pub fn pointer_down(&mut self, at: ScreenPoint) {
        self.dragging = true;
        self.last = Some(at);
    }

    /// Rotate by the pointer delta; returns true if the rotation changed.
    pub fn pointer_move(&mut self, at: ScreenPoint, progress: f64) -> bool {
        if !self.dragging {
            return false;
        }
        let Some(last) = self.last.replace(at) else {
            return false;
        };
        let sensitivity = if progress < 0.5 { GLOBE_SENSITIVITY } else { MAP_SENSITIVITY };
        let dx = at.x - last.x;
        let dy = at.y - last.y;
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        self.rotate(dx * sensitivity, -dy * sensitivity);
        true
    }

    pub fn pointer_up(&mut self) {
        self.dragging = false;
        self.last = None;
    }

    /// Rotate by degrees, keeping tilt within the poles.
    pub fn rotate(&mut self, d_lon: f64, d_lat: f64) {
        self.rotation = Rotation::new(
            self.rotation.lambda + d_lon,
            (self.rotation.phi + d_lat).clamp(-MAX_TILT, MAX_TILT),
        );
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.translation = ScreenPoint::new(self.translation.x + dx, self.translation.y + dy);
    }

    /// Clear rotation and pan. Blend progress is not touched.
    pub fn reset(&mut self) {
        self.rotation = Rotation::default();
        self.translation = ScreenPoint::default();
        self.pointer_up();
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Run {
    start: Instant,
    from: f64,
    to: f64,
}

/// Globe/map toggle animation.
#[derive(Clone, Debug, PartialEq)]
pub struct BlendAnimation {
    progress: f64,
    target: f64,
    run: Option<Run>,
}

impl Default for BlendAnimation {
    fn default() -> Self {
        Self { progress: 0.0, target: 0.0, run: None }
    }
}

impl BlendAnimation {
    pub fn at(progress: f64) -> Self {
        let progress = if progress >= 0.5 { 1.0 } else { 0.0 };
        Self { progress, target: progress, run: None }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Start toward the other end. Ignored while already running.
    pub fn toggle(&mut self, now: Instant) -> bool {
        if self.run.is_some() {
            debug!("toggle ignored, animation in progress");
            return false;
        }
        let to = if self.target < 0.5 { 1.0 } else { 0.0 };
        debug!("blend animation {} -> {}", self.progress, to);
        self.run = Some(Run { start: now, from: self.progress, to });
        self.target = to;
        true
    }

    /// Advance to `now`; returns true while the progress is moving.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(run) = self.run else {
            return false;
        };
        let elapsed = now.saturating_duration_since(run.start);
        if elapsed >= BLEND_DURATION {
            self.progress = run.to;
            self.run = None;
        } else {
            let x = elapsed.as_secs_f64() / BLEND_DURATION.as_secs_f64();
            self.progress = run.from + (run.to - run.from) * ease_in_out_quad(x);
        }
        true
    }

    /// Toggle control caption.
    pub fn label(&self) -> &'static str {
        if self.target < 0.5 {
            "Unroll Globe"
        } else {
            "Roll to Globe"
        }
    }
}

/// Packet phase, advanced a fixed step per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PacketClock {
    phase: f64,
}

impl PacketClock {
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn advance(&mut self) -> f64 {
        self.phase = (self.phase + PACKET_STEP) % 100.0;
        self.phase
    }
}

/// Fires once immediately, then every `period` until cancelled.
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalTimer {
    period: Duration,
    next: Option<Instant>,
    cancelled: bool,
}

impl IntervalTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None, cancelled: false }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if self.cancelled {
            return false;
        }
        match self.next {
            Some(due) if now < due => false,
            _ => {
                self.next = Some(now + self.period);
                true
            }
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TooltipState {
    pub visible: bool,
    pub position: ScreenPoint,
    pub node_id: Option<String>,
}

impl TooltipState {
    pub fn show(&mut self, node_id: &str, position: ScreenPoint) {
        self.visible = true;
        self.position = position;
        self.node_id = Some(node_id.to_string());
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.node_id = None;
    }
}

/// What a tick asks the frame loop to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tick {
    pub refresh: bool,
    pub redraw: bool,
}

pub struct Controller {
    pub interaction: InteractionState,
    pub blend: BlendAnimation,
    pub packets: PacketClock,
    pub refresh: IntervalTimer,
    pub tooltip: TooltipState,
    paused: bool,
    running: bool,
}

impl Controller {
    pub fn new(refresh_period: Duration) -> Self {
        Self {
            interaction: InteractionState::default(),
            blend: BlendAnimation::default(),
            packets: PacketClock::default(),
            refresh: IntervalTimer::new(refresh_period),
            tooltip: TooltipState::default(),
            paused: false,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// One frame of scheduled work.
    pub fn tick(&mut self, now: Instant) -> Tick {
        if !self.running {
            return Tick::default();
        }
        let moving = self.blend.tick(now);
        if !self.paused {
            self.packets.advance();
        }
        Tick {
            refresh: self.refresh.poll(now),
            redraw: moving || !self.paused,
        }
    }

    pub fn view(&self) -> ViewState {
        ViewState {
            progress: self.blend.progress(),
            rotation: self.interaction.rotation,
            translation: self.interaction.translation,
            packet_phase: self.packets.phase(),
        }
    }

    pub fn toggle_blend(&mut self, now: Instant) -> bool {
        self.blend.toggle(now)
    }

    pub fn reset(&mut self) {
        self.interaction.reset();
    }

    pub fn pointer_down(&mut self, at: ScreenPoint) {
        self.interaction.pointer_down(at);
    }

    pub fn pointer_move(&mut self, at: ScreenPoint) -> bool {
        self.interaction.pointer_move(at, self.blend.progress())
    }

    pub fn pointer_up(&mut self) {
        self.interaction.pointer_up();
    }

    /// Pointer left the surface: end any drag and close the tooltip.
    pub fn pointer_leave(&mut self) {
        self.interaction.pointer_up();
        self.tooltip.hide();
    }

    /// Update the tooltip from a hit test result.
    pub fn hover(&mut self, node_id: Option<&str>, at: ScreenPoint) {
        match node_id {
            Some(id) => self.tooltip.show(id, at),
            None => self.tooltip.hide(),
        }
    }

    /// Stop frame work and the refresh timer.
    pub fn teardown(&mut self) {
        self.running = false;
        self.refresh.cancel();
        self.tooltip.hide();
    }
}
