//! The four panels of the viewer

pub mod controls_panel;
pub mod info_panel;
pub mod menu_bar;
pub mod viewport;

pub use controls_panel::ControlsPanel;
pub use info_panel::InfoPanel;
pub use menu_bar::MenuBar;
pub use viewport::ViewportComponent;

use crossterm::style::Color;

use crate::canvas::{Canvas, Rect};

/// Horizontal rule across `area` at row `y`.
pub(crate) fn separator(canvas: &mut Canvas, area: Rect, y: u16, fg: Color, bg: Color) {
    let rule: String = "\u{2500}".repeat(area.width.saturating_sub(2) as usize);
    canvas.put_str(area.x + 1, y, &rule, fg, bg, area);
}
