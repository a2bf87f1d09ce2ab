/// Left panel: actions, view options and the mesh list
use crossterm::event::{Event, MouseButton, MouseEventKind};
use mv3d_core::{MeshId, UiState, ViewOption};
use tracing::debug;

use super::separator;
use crate::canvas::{Canvas, Cell, Rect};
use crate::component::{AppAction, Component, ComponentBase, ComponentError, EventResult, FrameContext};

/// Columns of the visibility checkbox, relative to the panel
const CHECKBOX_COLUMNS: std::ops::Range<u16> = 1..4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlItem {
    LoadMesh,
    DeleteSelected,
    ResetView,
    Toggle(ViewOption),
    Mesh(MeshId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Rule,
    Button { enabled: bool },
    Text,
    Mesh { selected: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    text: String,
    style: Style,
    item: Option<ControlItem>,
}

impl Line {
    fn new(text: impl Into<String>, style: Style, item: Option<ControlItem>) -> Self {
        Self {
            text: text.into(),
            style,
            item,
        }
    }
}

pub struct ControlsPanel {
    base: ComponentBase,
    area: Rect,
    /// First mesh shown in the list
    scroll: usize,
    /// Screen row of every clickable line, from the last draw
    rows: Vec<(u16, ControlItem)>,
}

impl ControlsPanel {
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(),
            area: Rect::default(),
            scroll: 0,
            rows: Vec::new(),
        }
    }

    pub fn row_of(&self, item: ControlItem) -> Option<u16> {
        self.rows.iter().find(|(_, i)| *i == item).map(|(row, _)| *row)
    }

    fn header(state: &UiState) -> Vec<Line> {
        let options = state.view_options();
        let check = |on: bool| if on { "[x]" } else { "[ ]" };
        vec![
            Line::new(" Controls", Style::Title, None),
            Line::new("", Style::Rule, None),
            Line::new(" > Load Mesh...", Style::Button { enabled: true }, Some(ControlItem::LoadMesh)),
            Line::new(
                " > Delete Selected",
                Style::Button {
                    enabled: state.selected().is_some(),
                },
                Some(ControlItem::DeleteSelected),
            ),
            Line::new(" > Reset View", Style::Button { enabled: true }, Some(ControlItem::ResetView)),
            Line::new("", Style::Rule, None),
            Line::new(
                format!(" {} Wireframe", check(options.wireframe)),
                Style::Text,
                Some(ControlItem::Toggle(ViewOption::Wireframe)),
            ),
            Line::new(
                format!(" {} Show Axes", check(options.show_axes)),
                Style::Text,
                Some(ControlItem::Toggle(ViewOption::ShowAxes)),
            ),
            Line::new("", Style::Rule, None),
            Line::new(format!(" Meshes ({})", state.meshes().len()), Style::Title, None),
        ]
    }

    fn mesh_lines(state: &UiState) -> Vec<Line> {
        if state.meshes().is_empty() {
            return vec![Line::new(" No meshes loaded.", Style::Text, None)];
        }
        state
            .meshes()
            .iter()
            .map(|mesh| {
                let selected = state.selected() == Some(mesh.id);
                let check = if mesh.visible { "[x]" } else { "[ ]" };
                let marker = if selected { '\u{25a0}' } else { '\u{25a1}' };
                Line::new(
                    format!(" {} {} {}", check, marker, mesh.name),
                    Style::Mesh { selected },
                    Some(ControlItem::Mesh(mesh.id)),
                )
            })
            .collect()
    }

    fn activate(
        &mut self,
        item: ControlItem,
        column: u16,
        cx: &mut FrameContext<'_>,
    ) -> Result<(), ComponentError> {
        debug!("Controls: {:?}", item);
        match item {
            ControlItem::LoadMesh => cx.actions.push(AppAction::OpenLoadPrompt),
            ControlItem::DeleteSelected => {
                if cx.state.get_selected().is_some() {
                    cx.actions.push(AppAction::DeleteSelected);
                }
            }
            ControlItem::ResetView => cx.actions.push(AppAction::ResetView),
            ControlItem::Toggle(option) => cx.state.toggle_view_option(option.name())?,
            ControlItem::Mesh(id) => {
                if CHECKBOX_COLUMNS.contains(&column.saturating_sub(self.area.x)) {
                    let visible = cx.state.is_visible(id)?;
                    cx.state.set_visible(id, !visible)?;
                } else if cx.state.get_selected() == Some(id) {
                    cx.state.select(None)?;
                } else {
                    cx.state.select(Some(id))?;
                }
            }
        }
        Ok(())
    }
}

impl Default for ControlsPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for ControlsPanel {
    fn name(&self) -> &'static str {
        "ControlsPanel"
    }

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn handle_event(
        &mut self,
        event: &Event,
        cx: &mut FrameContext<'_>,
    ) -> Result<EventResult, ComponentError> {
        let Event::Mouse(mouse) = event else {
            return Ok(EventResult::Ignored);
        };
        if !self.area.contains(mouse.column, mouse.row) {
            return Ok(EventResult::Ignored);
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let item = self
                    .rows
                    .iter()
                    .find(|(row, _)| *row == mouse.row)
                    .map(|(_, item)| *item);
                if let Some(item) = item {
                    self.activate(item, mouse.column, cx)?;
                }
            }
            MouseEventKind::ScrollDown => self.scroll += 1,
            MouseEventKind::ScrollUp => self.scroll = self.scroll.saturating_sub(1),
            _ => {}
        }
        Ok(EventResult::Consumed)
    }

    fn update(&mut self, cx: &mut FrameContext<'_>, canvas: &mut Canvas) -> Result<(), ComponentError> {
        self.area = cx.area;
        self.rows.clear();
        let palette = cx.theme.palette();
        let area = self.area;
        canvas.fill(area, Cell::new(' ', palette.panel_fg, palette.panel_bg));
        if area.is_empty() {
            return Ok(());
        }

        let state = cx.state.state();
        let header = Self::header(state);
        let meshes = Self::mesh_lines(state);
        let room = (area.height as usize).saturating_sub(header.len());
        self.scroll = self.scroll.min(meshes.len().saturating_sub(room.max(1)));

        let lines = header.iter().chain(meshes.iter().skip(self.scroll));
        for (offset, line) in lines.enumerate().take(area.height as usize) {
            let y = area.y + offset as u16;
            let (fg, bg) = match line.style {
                Style::Title => (palette.title, palette.panel_bg),
                Style::Rule => {
                    separator(canvas, area, y, palette.muted, palette.panel_bg);
                    continue;
                }
                Style::Button { enabled: true } => (palette.accent, palette.panel_bg),
                Style::Button { enabled: false } => (palette.muted, palette.panel_bg),
                Style::Text => (palette.panel_fg, palette.panel_bg),
                Style::Mesh { selected: true } => {
                    canvas.fill(
                        Rect::new(area.x, y, area.width, 1),
                        Cell::new(' ', palette.selection_fg, palette.selection_bg),
                    );
                    (palette.selection_fg, palette.selection_bg)
                }
                Style::Mesh { selected: false } => (palette.panel_fg, palette.panel_bg),
            };
            canvas.put_str(area.x, y, &line.text, fg, bg, area);
            if let Some(item) = line.item {
                self.rows.push((y, item));
            }
        }
        Ok(())
    }
}
