use crossterm::style::Color;

/// 24-bit colour used by every draw command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// Mix toward `background`; opacity 1.0 is the colour itself.
    pub fn over(&self, background: Rgb, opacity: f64) -> Rgb {
        let a = opacity.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| (fg as f64 * a + bg as f64 * (1.0 - a)).round() as u8;
        Rgb(mix(self.0, background.0), mix(self.1, background.1), mix(self.2, background.2))
    }

    pub fn to_color(self) -> Color {
        Color::Rgb { r: self.0, g: self.1, b: self.2 }
    }
}

/// Scene palette
pub mod palette {
    use super::Rgb;

    pub const BACKGROUND: Rgb = Rgb(0x0b, 0x10, 0x20);
    pub const GRATICULE: Rgb = Rgb(0x1e, 0x29, 0x3b);
    pub const LAND: Rgb = Rgb(0x1e, 0x3a, 0x5f);
    pub const BORDER: Rgb = Rgb(0x33, 0x55, 0x80);
    pub const SPHERE: Rgb = Rgb(0x38, 0xbd, 0xf8);

    pub const LINK_ACTIVE: Rgb = Rgb(0x22, 0xd3, 0xee);
    pub const LINK_IDLE: Rgb = Rgb(0x47, 0x55, 0x69);
    pub const PACKET: Rgb = Rgb(0xfb, 0xbf, 0x24);
    pub const PACKET_CORE: Rgb = Rgb(0xff, 0xf7, 0xd6);

    pub const SERVER: Rgb = Rgb(0x06, 0xb6, 0xd4);
    pub const ROUTER: Rgb = Rgb(0x8b, 0x5c, 0xf6);
    pub const CLIENT: Rgb = Rgb(0x10, 0xb9, 0x81);
    pub const ACCENT: Rgb = Rgb(0x67, 0xe8, 0xf9);
    pub const IDLE: Rgb = Rgb(0x64, 0x74, 0x8b);
    pub const WARNING: Rgb = Rgb(0xf5, 0x9e, 0x0b);

    pub const PLATE: Rgb = Rgb(0x0f, 0x17, 0x2a);
    pub const TEXT: Rgb = Rgb(0xe2, 0xe8, 0xf0);
}

/// Map semantic status color to a terminal color
pub fn status_color(status: StatusColor) -> Color {
    match status {
        StatusColor::Good => Color::Green,
        StatusColor::Warning => Color::Yellow,
        StatusColor::Info => Color::Cyan,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusColor {
    Good,
    Warning,
    Info,
}
