/// Screen regions for each panel
use crate::canvas::Rect;
use mv3d_core::config::UiSettings;

/// Narrowest viewport for which the side panels are still shown
const MIN_VIEWPORT_WIDTH: u16 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    pub menu: Rect,
    pub controls: Rect,
    pub viewport: Rect,
    pub info: Rect,
    pub status: Rect,
}

impl Layout {
    /// Menu bar on the first row, status bar on the last, controls left,
    /// info right, viewport in between. Side panels are dropped when the
    /// terminal is too narrow to keep a usable viewport.
    pub fn compute(width: u16, height: u16, ui: &UiSettings) -> Self {
        if width == 0 || height == 0 {
            return Self::default();
        }
        let menu = Rect::new(0, 0, width, 1);
        if height < 3 {
            return Self {
                menu,
                ..Self::default()
            };
        }
        let status = Rect::new(0, height - 1, width, 1);
        let body_height = height - 2;

        let sides = ui.controls_width.saturating_add(ui.info_width);
        let (controls_width, info_width) = if width >= sides.saturating_add(MIN_VIEWPORT_WIDTH) {
            (ui.controls_width, ui.info_width)
        } else {
            (0, 0)
        };
        let viewport_width = width - controls_width - info_width;

        Self {
            menu,
            controls: Rect::new(0, 1, controls_width, body_height),
            viewport: Rect::new(controls_width, 1, viewport_width, body_height),
            info: Rect::new(controls_width + viewport_width, 1, info_width, body_height),
            status,
        }
    }
}
