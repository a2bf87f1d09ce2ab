/// Color palettes, resolved once at startup
use crossterm::style::Color;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown theme '{0}' (expected 'dark' or 'light')")]
pub struct UnknownTheme(pub String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemeKind {
    #[default]
    Dark,
    Light,
}

impl FromStr for ThemeKind {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(ThemeKind::Dark),
            "light" => Ok(ThemeKind::Light),
            _ => Err(UnknownTheme(s.to_string())),
        }
    }
}

impl fmt::Display for ThemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThemeKind::Dark => "dark",
            ThemeKind::Light => "light",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub panel_bg: Color,
    pub panel_fg: Color,
    pub title: Color,
    pub muted: Color,
    pub accent: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub menu_bg: Color,
    pub menu_fg: Color,
    pub mesh: Color,
    pub mesh_highlight: Color,
    pub axis_x: Color,
    pub axis_y: Color,
    pub axis_z: Color,
    pub info: Color,
    pub warning: Color,
    pub error: Color,
}

impl Palette {
    pub const DARK: Palette = Palette {
        background: Color::Rgb { r: 20, g: 20, b: 26 },
        panel_bg: Color::Rgb { r: 26, g: 26, b: 31 },
        panel_fg: Color::Rgb { r: 220, g: 220, b: 225 },
        title: Color::White,
        muted: Color::Rgb { r: 120, g: 120, b: 130 },
        accent: Color::Rgb { r: 102, g: 178, b: 255 },
        selection_bg: Color::Rgb { r: 51, g: 51, b: 64 },
        selection_fg: Color::Rgb { r: 102, g: 178, b: 255 },
        menu_bg: Color::Rgb { r: 38, g: 38, b: 46 },
        menu_fg: Color::Rgb { r: 230, g: 230, b: 235 },
        mesh: Color::Rgb { r: 190, g: 190, b: 200 },
        mesh_highlight: Color::Rgb { r: 255, g: 170, b: 60 },
        axis_x: Color::Red,
        axis_y: Color::Green,
        axis_z: Color::Blue,
        info: Color::Rgb { r: 200, g: 200, b: 210 },
        warning: Color::Yellow,
        error: Color::Rgb { r: 255, g: 90, b: 90 },
    };

    pub const LIGHT: Palette = Palette {
        background: Color::Rgb { r: 240, g: 240, b: 243 },
        panel_bg: Color::Rgb { r: 228, g: 228, b: 232 },
        panel_fg: Color::Rgb { r: 30, g: 30, b: 35 },
        title: Color::Black,
        muted: Color::Rgb { r: 110, g: 110, b: 120 },
        accent: Color::Rgb { r: 0, g: 100, b: 200 },
        selection_bg: Color::Rgb { r: 200, g: 215, b: 240 },
        selection_fg: Color::Rgb { r: 0, g: 70, b: 160 },
        menu_bg: Color::Rgb { r: 215, g: 215, b: 220 },
        menu_fg: Color::Rgb { r: 20, g: 20, b: 25 },
        mesh: Color::Rgb { r: 60, g: 60, b: 70 },
        mesh_highlight: Color::Rgb { r: 210, g: 110, b: 0 },
        axis_x: Color::DarkRed,
        axis_y: Color::DarkGreen,
        axis_z: Color::DarkBlue,
        info: Color::Rgb { r: 40, g: 40, b: 50 },
        warning: Color::Rgb { r: 170, g: 120, b: 0 },
        error: Color::Rgb { r: 190, g: 20, b: 20 },
    };
}

/// Read-only after construction; components only query it.
#[derive(Debug, Clone)]
pub struct ThemeManager {
    kind: ThemeKind,
    palette: Palette,
}

impl ThemeManager {
    pub fn new(kind: ThemeKind) -> Self {
        let palette = match kind {
            ThemeKind::Dark => Palette::DARK,
            ThemeKind::Light => Palette::LIGHT,
        };
        tracing::info!("Theme '{}' selected", kind);
        Self { kind, palette }
    }

    /// Resolve a theme by name, falling back to the dark theme.
    pub fn from_name(name: &str) -> Self {
        match name.parse() {
            Ok(kind) => Self::new(kind),
            Err(e) => {
                tracing::warn!("{e}; using dark theme");
                Self::new(ThemeKind::Dark)
            }
        }
    }

    pub fn kind(&self) -> ThemeKind {
        self.kind
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }
}

impl Default for ThemeManager {
    fn default() -> Self {
        Self::new(ThemeKind::default())
    }
}
