//! Top menu bar with File and View menus, plus the inline load prompt
//!
//! Dropdowns are drawn over whatever sits below the bar, so the bar is
//! updated after every other panel.

use std::path::PathBuf;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use mv3d_core::{UiStateManager, ViewOption};
use tracing::debug;

use crate::canvas::{Canvas, Cell, Rect};
use crate::component::{
    AppAction, Component, ComponentBase, ComponentError, EventResult, FrameContext, StatusLevel,
};
use crate::theme::Palette;

/// Column of the first menu title
const FIRST_TITLE_X: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    LoadMesh,
    ClearAll,
    Exit,
    Toggle(ViewOption),
    ResetViewOptions,
    ResetView,
}

struct Entry {
    label: &'static str,
    shortcut: &'static str,
    command: Command,
}

struct Menu {
    title: &'static str,
    entries: &'static [Entry],
}

const MENUS: [Menu; 2] = [
    Menu {
        title: "File",
        entries: &[
            Entry {
                label: "Load Mesh...",
                shortcut: "Ctrl+O",
                command: Command::LoadMesh,
            },
            Entry {
                label: "Clear All Meshes",
                shortcut: "",
                command: Command::ClearAll,
            },
            Entry {
                label: "Exit",
                shortcut: "q",
                command: Command::Exit,
            },
        ],
    },
    Menu {
        title: "View",
        entries: &[
            Entry {
                label: "Wireframe",
                shortcut: "w",
                command: Command::Toggle(ViewOption::Wireframe),
            },
            Entry {
                label: "Show Axes",
                shortcut: "x",
                command: Command::Toggle(ViewOption::ShowAxes),
            },
            Entry {
                label: "Reset View Options",
                shortcut: "",
                command: Command::ResetViewOptions,
            },
            Entry {
                label: "Reset View",
                shortcut: "r",
                command: Command::ResetView,
            },
        ],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Closed,
    Open { menu: usize, item: usize },
    Prompt { input: String },
}

/// Split a `;`-separated list of paths typed at the prompt.
///
/// Surrounding quotes are stripped and a leading `~/` is expanded from `HOME`.
pub fn parse_paths(input: &str) -> Vec<PathBuf> {
    input
        .split(';')
        .map(|part| {
            part.trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
        })
        .filter(|part| !part.is_empty())
        .map(expand_home)
        .collect()
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

pub struct MenuBar {
    base: ComponentBase,
    mode: Mode,
    area: Rect,
}

impl MenuBar {
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(),
            mode: Mode::Closed,
            area: Rect::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.mode, Mode::Open { .. })
    }

    pub fn is_prompting(&self) -> bool {
        matches!(self.mode, Mode::Prompt { .. })
    }

    /// Replace any open menu with an empty path prompt.
    pub fn open_prompt(&mut self) {
        self.mode = Mode::Prompt { input: String::new() };
    }

    pub fn close(&mut self) {
        self.mode = Mode::Closed;
    }

    /// Open `menu` with its first entry highlighted.
    pub fn open_menu(&mut self, menu: usize) {
        if menu < MENUS.len() {
            self.mode = Mode::Open { menu, item: 0 };
        }
    }

    fn title_span(&self, menu: usize) -> (u16, u16) {
        let x = MENUS[..menu]
            .iter()
            .fold(self.area.x + FIRST_TITLE_X, |x, m| x + m.title.len() as u16 + 2);
        (x, MENUS[menu].title.len() as u16 + 2)
    }

    fn dropdown_rect(&self, menu: usize) -> Rect {
        let (x, _) = self.title_span(menu);
        let width = MENUS[menu]
            .entries
            .iter()
            .map(|e| e.label.len() + e.shortcut.len())
            .max()
            .unwrap_or(0) as u16
            + 10;
        Rect::new(x, self.area.y + 1, width, MENUS[menu].entries.len() as u16)
    }

    fn title_at(&self, column: u16, row: u16) -> Option<usize> {
        if row != self.area.y {
            return None;
        }
        (0..MENUS.len()).find(|&menu| {
            let (x, width) = self.title_span(menu);
            column >= x && column < x + width
        })
    }

    fn execute(&mut self, command: Command, cx: &mut FrameContext<'_>) -> Result<(), ComponentError> {
        debug!("Menu command {:?}", command);
        self.close();
        match command {
            Command::LoadMesh => self.open_prompt(),
            Command::ClearAll => cx.actions.push(AppAction::ClearAll),
            Command::Exit => cx.actions.push(AppAction::Quit),
            Command::Toggle(option) => cx.state.toggle_view_option(option.name())?,
            Command::ResetViewOptions => cx.state.reset_view_options()?,
            Command::ResetView => cx.actions.push(AppAction::ResetView),
        }
        Ok(())
    }

    fn prompt_key(&mut self, key: &KeyEvent, cx: &mut FrameContext<'_>) {
        let Mode::Prompt { input } = &mut self.mode else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.mode = Mode::Closed,
            KeyCode::Enter => {
                let paths = parse_paths(input);
                self.mode = Mode::Closed;
                if paths.is_empty() {
                    cx.notify(StatusLevel::Warning, "No file given");
                } else {
                    cx.actions.push(AppAction::Load(paths));
                }
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => input.push(c),
            _ => {}
        }
    }

    fn menu_key(&mut self, code: KeyCode, cx: &mut FrameContext<'_>) -> Result<EventResult, ComponentError> {
        let Mode::Open { menu, item } = self.mode else {
            return Ok(EventResult::Ignored);
        };
        let count = MENUS[menu].entries.len();
        match code {
            KeyCode::Esc => self.close(),
            KeyCode::Up => {
                self.mode = Mode::Open {
                    menu,
                    item: (item + count - 1) % count,
                }
            }
            KeyCode::Down => {
                self.mode = Mode::Open {
                    menu,
                    item: (item + 1) % count,
                }
            }
            KeyCode::Left => self.open_menu((menu + MENUS.len() - 1) % MENUS.len()),
            KeyCode::Right => self.open_menu((menu + 1) % MENUS.len()),
            KeyCode::Enter => self.execute(MENUS[menu].entries[item].command, cx)?,
            _ => {}
        }
        Ok(EventResult::Consumed)
    }

    fn mouse(&mut self, mouse: &MouseEvent, cx: &mut FrameContext<'_>) -> Result<EventResult, ComponentError> {
        let open = match self.mode {
            Mode::Open { menu, .. } => Some(menu),
            _ => None,
        };
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(menu) = self.title_at(mouse.column, mouse.row) {
                    if open == Some(menu) {
                        self.close();
                    } else {
                        self.open_menu(menu);
                    }
                    return Ok(EventResult::Consumed);
                }
                let Some(menu) = open else {
                    return Ok(EventResult::Ignored);
                };
                let dropdown = self.dropdown_rect(menu);
                if dropdown.contains(mouse.column, mouse.row) {
                    let item = (mouse.row - dropdown.y) as usize;
                    self.execute(MENUS[menu].entries[item].command, cx)?;
                } else {
                    self.close();
                }
                Ok(EventResult::Consumed)
            }
            MouseEventKind::Moved => {
                let Some(menu) = open else {
                    return Ok(EventResult::Ignored);
                };
                let dropdown = self.dropdown_rect(menu);
                if dropdown.contains(mouse.column, mouse.row) {
                    self.mode = Mode::Open {
                        menu,
                        item: (mouse.row - dropdown.y) as usize,
                    };
                }
                Ok(EventResult::Consumed)
            }
            _ if open.is_some() => Ok(EventResult::Consumed),
            _ => Ok(EventResult::Ignored),
        }
    }

    fn draw_dropdown(
        &self,
        menu: usize,
        item: usize,
        state: &UiStateManager,
        palette: &Palette,
        canvas: &mut Canvas,
    ) {
        let rect = self.dropdown_rect(menu);
        let clip = canvas.area();
        let options = state.get_view_options();
        for (row, entry) in MENUS[menu].entries.iter().enumerate() {
            let y = rect.y + row as u16;
            let (fg, bg) = if row == item {
                (palette.selection_fg, palette.selection_bg)
            } else {
                (palette.menu_fg, palette.menu_bg)
            };
            canvas.fill(Rect::new(rect.x, y, rect.width, 1), Cell::new(' ', fg, bg));
            let mark = match entry.command {
                Command::Toggle(option) if options.get(option) => "[x] ",
                Command::Toggle(_) => "[ ] ",
                _ => "    ",
            };
            canvas.put_str(rect.x + 1, y, &format!("{}{}", mark, entry.label), fg, bg, clip);
            let shortcut_x = rect.right().saturating_sub(entry.shortcut.len() as u16 + 1);
            canvas.put_str(shortcut_x, y, entry.shortcut, palette.muted, bg, clip);
        }
    }
}

impl Default for MenuBar {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for MenuBar {
    fn name(&self) -> &'static str {
        "MenuBar"
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
        let prompting = self.is_prompting();
        match event {
            Event::Key(key) if prompting => {
                self.prompt_key(key, cx);
                Ok(EventResult::Consumed)
            }
            Event::Key(key) if self.is_open() => self.menu_key(key.code, cx),
            Event::Key(key) if key.code == KeyCode::F(10) => {
                self.open_menu(0);
                Ok(EventResult::Consumed)
            }
            Event::Mouse(mouse) if !prompting => self.mouse(mouse, cx),
            _ => Ok(EventResult::Ignored),
        }
    }

    fn update(&mut self, cx: &mut FrameContext<'_>, canvas: &mut Canvas) -> Result<(), ComponentError> {
        self.area = cx.area;
        let palette = cx.theme.palette();
        let area = self.area;
        canvas.fill(area, Cell::new(' ', palette.menu_fg, palette.menu_bg));
        if area.is_empty() {
            return Ok(());
        }

        if let Mode::Prompt { input } = &self.mode {
            let label = "Load: ";
            let mut x = canvas.put_str(area.x + 1, area.y, label, palette.accent, palette.menu_bg, area);
            x = canvas.put_str(x, area.y, input, palette.menu_fg, palette.menu_bg, area);
            x = canvas.put_str(x, area.y, "_", palette.accent, palette.menu_bg, area);
            canvas.put_str(
                x + 2,
                area.y,
                "(Enter to load, Esc to cancel, ';' between files)",
                palette.muted,
                palette.menu_bg,
                area,
            );
            return Ok(());
        }

        let open = match self.mode {
            Mode::Open { menu, item } => Some((menu, item)),
            _ => None,
        };
        for (index, menu) in MENUS.iter().enumerate() {
            let (x, _) = self.title_span(index);
            let (fg, bg) = if open.map(|(m, _)| m) == Some(index) {
                (palette.selection_fg, palette.selection_bg)
            } else {
                (palette.menu_fg, palette.menu_bg)
            };
            canvas.put_str(x, area.y, &format!(" {} ", menu.title), fg, bg, area);
        }
        let title = "mv3d";
        let x = area.right().saturating_sub(title.len() as u16 + 1);
        canvas.put_str(x, area.y, title, palette.title, palette.menu_bg, area);

        if let Some((menu, item)) = open {
            self.draw_dropdown(menu, item, cx.state, palette, canvas);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeManager;
    use mv3d_core::AppConfig;

    struct Fixture {
        state: UiStateManager,
        scene: mv3d_core::Scene,
        theme: ThemeManager,
        config: AppConfig,
        actions: Vec<AppAction>,
        canvas: Canvas,
        bar: MenuBar,
    }

    impl Fixture {
        fn new() -> Self {
            let mut fixture = Self {
                state: UiStateManager::new(),
                scene: mv3d_core::Scene::new(),
                theme: ThemeManager::default(),
                config: AppConfig::default(),
                actions: Vec::new(),
                canvas: Canvas::new(80, 12),
                bar: MenuBar::new(),
            };
            fixture.draw();
            fixture
        }

        fn draw(&mut self) {
            let mut cx = FrameContext {
                state: &mut self.state,
                scene: &self.scene,
                theme: &self.theme,
                config: &self.config,
                area: Rect::new(0, 0, 80, 1),
                frame: 1,
                actions: &mut self.actions,
            };
            self.bar.update(&mut cx, &mut self.canvas).unwrap();
        }

        fn send(&mut self, event: Event) -> EventResult {
            let mut cx = FrameContext {
                state: &mut self.state,
                scene: &self.scene,
                theme: &self.theme,
                config: &self.config,
                area: Rect::new(0, 0, 80, 1),
                frame: 1,
                actions: &mut self.actions,
            };
            let result = self.bar.handle_event(&event, &mut cx).unwrap();
            self.draw();
            result
        }

        fn key(&mut self, code: KeyCode) -> EventResult {
            self.send(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
        }

        fn click(&mut self, column: u16, row: u16) -> EventResult {
            self.send(Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column,
                row,
                modifiers: KeyModifiers::NONE,
            }))
        }

        fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                self.key(KeyCode::Char(c));
            }
        }
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            parse_paths(" a.stl ; \"b c.stl\";;'d.stl' "),
            vec![PathBuf::from("a.stl"), PathBuf::from("b c.stl"), PathBuf::from("d.stl")]
        );
        assert!(parse_paths("  ;  ").is_empty());
        let expected = match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join("m.stl"),
            None => PathBuf::from("~/m.stl"),
        };
        assert_eq!(parse_paths("~/m.stl"), vec![expected]);
    }

    #[test]
    fn test_titles_drawn() {
        let fixture = Fixture::new();
        let row = fixture.canvas.row_text(0);
        assert!(row.starts_with("  File  View "));
        assert!(row.trim_end().ends_with("mv3d"));
    }

    #[test]
    fn test_click_title_opens_and_closes() {
        let mut fixture = Fixture::new();
        assert_eq!(fixture.click(2, 0), EventResult::Consumed);
        assert!(fixture.bar.is_open());
        assert!(fixture.canvas.row_text(1).contains("Load Mesh..."));
        assert!(fixture.canvas.row_text(1).contains("Ctrl+O"));

        fixture.click(2, 0);
        assert!(!fixture.bar.is_open());
        // Clicks elsewhere pass through while closed
        assert_eq!(fixture.click(30, 5), EventResult::Ignored);
    }

    #[test]
    fn test_click_outside_closes_menu() {
        let mut fixture = Fixture::new();
        fixture.click(2, 0);
        assert_eq!(fixture.click(60, 8), EventResult::Consumed);
        assert!(!fixture.bar.is_open());
        assert!(fixture.actions.is_empty());
    }

    #[test]
    fn test_keyboard_navigation_toggles_wireframe() {
        let mut fixture = Fixture::new();
        fixture.key(KeyCode::F(10));
        fixture.key(KeyCode::Right);
        assert!(fixture.canvas.row_text(1).contains("[ ] Wireframe"));
        fixture.key(KeyCode::Enter);
        assert!(!fixture.bar.is_open());
        assert!(fixture.state.get_view_options().wireframe);
    }

    #[test]
    fn test_up_wraps_to_last_entry() {
        let mut fixture = Fixture::new();
        fixture.key(KeyCode::F(10));
        fixture.key(KeyCode::Up);
        fixture.key(KeyCode::Enter);
        assert_eq!(fixture.actions, vec![AppAction::Quit]);
    }

    #[test]
    fn test_click_entry_runs_command() {
        let mut fixture = Fixture::new();
        fixture.click(2, 0);
        // Second entry of File
        fixture.click(4, 2);
        assert_eq!(fixture.actions, vec![AppAction::ClearAll]);
    }

    #[test]
    fn test_prompt_produces_load() {
        let mut fixture = Fixture::new();
        fixture.click(2, 0);
        fixture.key(KeyCode::Enter);
        assert!(fixture.bar.is_prompting());

        fixture.type_text("a.stl;bb");
        fixture.key(KeyCode::Backspace);
        assert!(fixture.canvas.row_text(0).contains("Load: a.stl;b_"));
        // Keys never leak while typing
        assert_eq!(fixture.key(KeyCode::Char('q')), EventResult::Consumed);
        fixture.key(KeyCode::Enter);

        assert!(!fixture.bar.is_prompting());
        assert_eq!(
            fixture.actions,
            vec![AppAction::Load(vec![PathBuf::from("a.stl"), PathBuf::from("bq")])]
        );
    }

    #[test]
    fn test_empty_prompt_warns() {
        let mut fixture = Fixture::new();
        fixture.bar.open_prompt();
        fixture.key(KeyCode::Enter);
        assert!(matches!(
            fixture.actions.as_slice(),
            [AppAction::Notify(StatusLevel::Warning, _)]
        ));

        fixture.bar.open_prompt();
        fixture.type_text("x.stl");
        fixture.key(KeyCode::Esc);
        assert_eq!(fixture.actions.len(), 1);
    }
}
