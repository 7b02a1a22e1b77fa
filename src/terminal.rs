use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{poll, read, Event},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::fmt::Write as _;
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Terminal abstraction for rendering
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
    alternate_screen: bool,
}

/// A single cell in the terminal buffer
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bg: None,
            bold: false,
        }
    }
}

impl Terminal {
    /// Initialize the terminal for drawing
    pub fn new(alternate_screen: bool) -> io::Result<Self> {
        let (width, height) = size()?;

        if alternate_screen {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide)?;
        }

        Ok(Self::with_size(width, height, alternate_screen))
    }

    /// A buffer that never touches the real terminal (print mode, tests)
    pub fn headless(width: u16, height: u16) -> Self {
        Self::with_size(width, height, false)
    }

    fn with_size(width: u16, height: u16, alternate_screen: bool) -> Self {
        Self {
            width,
            height,
            buffer: vec![vec![Cell::default(); width as usize]; height as usize],
            alternate_screen,
        }
    }

    /// Get terminal dimensions
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.buffer = vec![vec![Cell::default(); width as usize]; height as usize];
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            for cell in row {
                *cell = Cell::default();
            }
        }
    }

    /// Clear the actual terminal
    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(stdout(), Clear(ClearType::All))?;
        Ok(())
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        self.buffer.get(y as usize)?.get(x as usize)
    }

    /// Set a character at position with optional color
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            let cell = &mut self.buffer[y as usize][x as usize];
            cell.ch = ch;
            cell.fg = fg;
            cell.bold = bold;
        }
    }

    /// Set the background of a cell, keeping its glyph
    pub fn set_bg(&mut self, x: i32, y: i32, bg: Option<Color>) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize][x as usize].bg = bg;
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    /// Render the entire buffer to screen
    pub fn present(&self) -> io::Result<()> {
        let mut stdout = stdout();
        for (y, row) in self.buffer.iter().enumerate() {
            queue!(stdout, MoveTo(0, y as u16))?;

            for cell in row {
                if cell.bold {
                    queue!(stdout, SetAttribute(Attribute::Bold))?;
                }
                if let Some(bg) = cell.bg {
                    queue!(stdout, SetBackgroundColor(bg))?;
                }
                if let Some(color) = cell.fg {
                    queue!(stdout, SetForegroundColor(color))?;
                }
                queue!(stdout, Print(cell.ch))?;
                if cell.bold || cell.bg.is_some() || cell.fg.is_some() {
                    queue!(stdout, SetAttribute(Attribute::Reset), ResetColor)?;
                }
            }
        }

        stdout.flush()?;
        Ok(())
    }

    /// Next input event, waiting at most `timeout`
    pub fn next_event(&self, timeout: Duration) -> io::Result<Option<Event>> {
        if poll(timeout)? {
            return Ok(Some(read()?));
        }
        Ok(None)
    }

    /// Sleep for specified duration
    pub fn sleep(&self, seconds: f32) {
        std::thread::sleep(Duration::from_secs_f32(seconds));
    }

    /// Buffer as text with ANSI colors (for print mode)
    pub fn to_ansi(&self) -> String {
        let mut out = String::new();
        for row in &self.buffer {
            for cell in row {
                if cell.ch == ' ' && cell.bg.is_none() {
                    out.push(' ');
                    continue;
                }

                if cell.bold {
                    out.push_str("\x1b[1m");
                }
                if let Some(color) = cell.bg {
                    out.push_str(&ansi_color(color, true));
                }
                if let Some(color) = cell.fg {
                    out.push_str(&ansi_color(color, false));
                }

                out.push(cell.ch);
                out.push_str("\x1b[0m");
            }
            out.push('\n');
        }
        out
    }

    /// Print buffer to stdout with ANSI colors (for print mode)
    pub fn print_to_stdout(&self) -> io::Result<()> {
        let mut stdout = stdout();
        stdout.write_all(self.to_ansi().as_bytes())?;
        stdout.flush()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            let _ = execute!(stdout(), Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}

fn ansi_color(color: Color, background: bool) -> String {
    let base = if background { 40 } else { 30 };
    let mut code = String::new();
    match color {
        Color::Rgb { r, g, b } => {
            let _ = write!(code, "\x1b[{};2;{};{};{}m", base + 8, r, g, b);
        }
        Color::AnsiValue(v) => {
            let _ = write!(code, "\x1b[{};5;{}m", base + 8, v);
        }
        // Standard colors (0-7)
        Color::Black => code = format!("\x1b[{}m", base),
        Color::DarkRed => code = format!("\x1b[{}m", base + 1),
        Color::DarkGreen => code = format!("\x1b[{}m", base + 2),
        Color::DarkYellow => code = format!("\x1b[{}m", base + 3),
        Color::DarkBlue => code = format!("\x1b[{}m", base + 4),
        Color::DarkMagenta => code = format!("\x1b[{}m", base + 5),
        Color::DarkCyan => code = format!("\x1b[{}m", base + 6),
        Color::Grey => code = format!("\x1b[{}m", base + 7),
        // Bright colors (8-15)
        Color::DarkGrey => code = format!("\x1b[{}m", base + 60),
        Color::Red => code = format!("\x1b[{}m", base + 61),
        Color::Green => code = format!("\x1b[{}m", base + 62),
        Color::Yellow => code = format!("\x1b[{}m", base + 63),
        Color::Blue => code = format!("\x1b[{}m", base + 64),
        Color::Magenta => code = format!("\x1b[{}m", base + 65),
        Color::Cyan => code = format!("\x1b[{}m", base + 66),
        Color::White => code = format!("\x1b[{}m", base + 67),
        _ => {}
    }
    code
}
