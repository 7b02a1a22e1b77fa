//! Interactive visualization
//!
//! The globe view owns the frame loop; this module holds the key mapping
//! shared by it.

pub mod globe;

use crossterm::event::{KeyCode, KeyModifiers};

/// Degrees per arrow-key press
const NUDGE: f64 = 5.0;
/// Surface units per shifted arrow-key press
const PAN_STEP: f64 = 20.0;

/// What a key press asks the view to do
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyAction {
    Quit,
    ToggleBlend,
    Reset,
    TogglePause,
    Rotate(f64, f64),
    Pan(f64, f64),
    None,
}

/// Runtime state for interactive controls
pub struct VizState {
    pub speed: f32,        // Seconds per frame
    pub show_help: bool,
}

impl VizState {
    pub fn new(initial_speed: f32) -> Self {
        Self {
            speed: initial_speed,
            show_help: false,
        }
    }

    /// Map a key press. Help toggling is handled here; the rest is returned.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
        let shifted = modifiers.contains(KeyModifiers::SHIFT);
        match normalize_key(code, modifiers) {
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                KeyAction::None
            }
            KeyCode::Char('u') | KeyCode::Char('U') | KeyCode::Enter => KeyAction::ToggleBlend,
            KeyCode::Char('r') | KeyCode::Char('R') => KeyAction::Reset,
            KeyCode::Char(' ') => KeyAction::TogglePause,
            KeyCode::Left if shifted => KeyAction::Pan(-PAN_STEP, 0.0),
            KeyCode::Right if shifted => KeyAction::Pan(PAN_STEP, 0.0),
            KeyCode::Up if shifted => KeyAction::Pan(0.0, -PAN_STEP),
            KeyCode::Down if shifted => KeyAction::Pan(0.0, PAN_STEP),
            KeyCode::Left => KeyAction::Rotate(-NUDGE, 0.0),
            KeyCode::Right => KeyAction::Rotate(NUDGE, 0.0),
            KeyCode::Up => KeyAction::Rotate(0.0, NUDGE),
            KeyCode::Down => KeyAction::Rotate(0.0, -NUDGE),
            _ => KeyAction::None,
        }
    }
}

fn normalize_key(code: KeyCode, mods: KeyModifiers) -> KeyCode {
    if code == KeyCode::Char('/') && mods.contains(KeyModifiers::SHIFT) {
        KeyCode::Char('?')
    } else {
        code
    }
}
