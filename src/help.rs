use crate::terminal::Terminal;
use crossterm::style::Color;

pub const HELP: &str = "\
NETGLOBE
─────────────────────
 u/Enter  Unroll / roll globe
 Drag     Rotate
 Arrows   Nudge rotation
 S-Arrows Pan
 r        Reset rotation and pan
 Space    Pause packets
 ?        Close help
 q/Esc    Quit
─────────────────────";

/// Render a centered help overlay box with the provided text.
pub fn render_help_overlay(term: &mut Terminal, width: u16, height: u16, help_text: &str) {
    if help_text.is_empty() {
        return;
    }

    let lines: Vec<&str> = help_text.lines().collect();
    let max_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_width = max_width + 4;
    let box_height = lines.len() + 2;

    let start_x = (width as usize).saturating_sub(box_width) / 2;
    let start_y = (height as usize).saturating_sub(box_height) / 2;

    let border = Some(Color::White);
    let text = Some(Color::Grey);
    let fill = Some(Color::Black);

    let right = (start_x + box_width - 1) as i32;
    let bottom = (start_y + box_height - 1) as i32;
    let top = start_y as i32;
    let left = start_x as i32;

    for y in top..=bottom {
        for x in left..=right {
            term.set(x, y, ' ', None, false);
            term.set_bg(x, y, fill);
        }
    }

    for x in left + 1..right {
        term.set(x, top, '─', border, false);
        term.set(x, bottom, '─', border, false);
    }
    term.set(left, top, '┌', border, false);
    term.set(right, top, '┐', border, false);
    term.set(left, bottom, '└', border, false);
    term.set(right, bottom, '┘', border, false);

    for (i, line) in lines.iter().enumerate() {
        let y = top + 1 + i as i32;
        term.set(left, y, '│', border, false);
        term.set_str(left + 2, y, line, text, i == 0);
        term.set(right, y, '│', border, false);
    }
}
