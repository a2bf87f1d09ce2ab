//! Terminal front end for the mesh viewer
//!
//! [`TerminalApp`] owns the state manager, the scene and every panel. Each
//! frame it drains finished loads, routes input to the panels, lets every
//! panel draw into a [`Canvas`] and presents the canvas.
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent,
    },
    execute, terminal,
};
use std::cell::RefCell;
use std::io::{self, stdout, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use mv3d_core::loader::display_name;
use mv3d_core::{
    AppConfig, LoadEvent, LoadedMesh, MeshId, MeshLoader, MeshRecord, Notification, Scene,
    StateChange, StateError, StateObserver, SubscriptionHandle, UiStateManager, ViewOption,
};

pub mod canvas;
pub mod component;
pub mod components;
pub mod layout;
pub mod renderer;
pub mod theme;

pub use canvas::{Canvas, Cell, Rect};
pub use component::{AppAction, Component, ComponentFailure, StatusLevel};
pub use components::{ControlsPanel, InfoPanel, MenuBar, ViewportComponent};
pub use layout::Layout;
pub use renderer::AsciiRenderer;
pub use theme::{ThemeKind, ThemeManager};

use component::{EventResult, FrameContext, InitContext};

const KEY_HINT: &str = "o:open  w:wire  x:axes  r:reset  Del:delete  Tab:next  q:quit";

/// Drops geometry for meshes the state no longer lists.
#[derive(Default)]
struct SceneSync {
    removed: RefCell<Vec<MeshId>>,
}

impl StateObserver for SceneSync {
    fn on_state_changed(&self, change: &StateChange, _cx: &mut Notification<'_>) {
        if let StateChange::MeshRemoved { id } = change {
            self.removed.borrow_mut().push(*id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    MenuBar,
    Controls,
    Info,
    Viewport,
}

impl Target {
    fn area(self, layout: &Layout) -> Rect {
        match self {
            Target::MenuBar => layout.menu,
            Target::Controls => layout.controls,
            Target::Info => layout.info,
            Target::Viewport => layout.viewport,
        }
    }
}

struct Panels {
    menu_bar: MenuBar,
    controls: ControlsPanel,
    info: InfoPanel,
    viewport: ViewportComponent,
}

impl Panels {
    fn new(config: &AppConfig) -> Self {
        Self {
            menu_bar: MenuBar::new(),
            controls: ControlsPanel::new(),
            info: InfoPanel::new(),
            viewport: ViewportComponent::new(config),
        }
    }

    fn get(&mut self, target: Target) -> &mut dyn Component {
        match target {
            Target::MenuBar => &mut self.menu_bar,
            Target::Controls => &mut self.controls,
            Target::Info => &mut self.info,
            Target::Viewport => &mut self.viewport,
        }
    }
}

/// Update order. The menu bar goes last so its dropdown is drawn on top.
const UPDATE_ORDER: [Target; 4] = [
    Target::Viewport,
    Target::Controls,
    Target::Info,
    Target::MenuBar,
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusMessage {
    level: StatusLevel,
    text: String,
    /// Frame after which the message disappears
    expires: u64,
}

#[derive(Debug, Default)]
struct StatusLine {
    message: Option<StatusMessage>,
    progress: Option<(f32, String)>,
}

/// Next mesh after `current` in registration order, wrapping around.
pub fn next_selection(meshes: &[MeshRecord], current: Option<MeshId>) -> Option<MeshId> {
    let position = current.and_then(|id| meshes.iter().position(|m| m.id == id));
    match position {
        Some(index) => meshes.get((index + 1) % meshes.len()).map(|m| m.id),
        None => meshes.first().map(|m| m.id),
    }
}

/// Main application struct for the terminal viewer
pub struct TerminalApp {
    config: AppConfig,
    state: UiStateManager,
    scene: Scene,
    theme: ThemeManager,
    loader: MeshLoader,
    panels: Panels,
    canvas: Canvas,
    layout: Layout,
    status: StatusLine,
    scene_sync: Rc<SceneSync>,
    sync_handle: Option<SubscriptionHandle>,
    /// Requested paths that have not arrived yet
    pending: Vec<PathBuf>,
    /// Failures in the load requests still running
    failed: usize,
    actions: Vec<AppAction>,
    frame: u64,
    running: bool,
}

impl TerminalApp {
    /// Build the app for a `width` x `height` screen. Nothing touches the
    /// terminal until [`TerminalApp::run`].
    pub fn new(config: AppConfig, theme: ThemeManager, width: u16, height: u16) -> Self {
        let mut state = UiStateManager::new();
        let scene_sync = Rc::new(SceneSync::default());
        let sync_handle = state.subscribe(&scene_sync);

        let mut panels = Panels::new(&config);
        let mut init = InitContext {
            state: &mut state,
            theme: &theme,
            config: &config,
        };
        for target in UPDATE_ORDER {
            if let Some(failure) = component::initialize(panels.get(target), &mut init) {
                error!("{}", failure);
            }
        }

        let loader = MeshLoader::new(config.files.clone(), config.mesh.clone());
        let layout = Layout::compute(width, height, &config.ui);
        info!("Viewer ready ({}x{}, {} theme)", width, height, theme.kind());

        Self {
            config,
            state,
            scene: Scene::new(),
            theme,
            loader,
            panels,
            canvas: Canvas::new(width, height),
            layout,
            status: StatusLine::default(),
            scene_sync,
            sync_handle: Some(sync_handle),
            pending: Vec::new(),
            failed: 0,
            actions: Vec::new(),
            frame: 0,
            running: true,
        }
    }

    pub fn state(&self) -> &UiStateManager {
        &self.state
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn viewport(&self) -> &ViewportComponent {
        &self.panels.viewport
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_busy()
    }

    /// Current transient message, if it has not expired
    pub fn status(&self) -> Option<(StatusLevel, &str)> {
        self.status
            .message
            .as_ref()
            .map(|m| (m.level, m.text.as_str()))
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        debug!("Resize to {}x{}", width, height);
        self.canvas.resize(width, height);
        self.layout = Layout::compute(width, height, &self.config.ui);
    }

    /// Queue `paths` for background loading. Paths already loaded or still
    /// in flight are skipped with a warning.
    pub fn load(&mut self, paths: Vec<PathBuf>) {
        let mut accepted: Vec<PathBuf> = Vec::new();
        for path in paths {
            let path = std::fs::canonicalize(&path).unwrap_or(path);
            if self.scene.contains_source(&path)
                || self.pending.contains(&path)
                || accepted.contains(&path)
            {
                warn!("{} is already loaded, skipping", path.display());
                self.set_status(
                    StatusLevel::Warning,
                    format!("{} is already loaded", display_name(&path)),
                );
                continue;
            }
            accepted.push(path);
        }
        if accepted.is_empty() {
            return;
        }

        match self.loader.request(accepted.clone()) {
            Ok(request) => {
                info!("Load request {:?}: {} file(s)", request, accepted.len());
                self.status.progress = Some((0.0, "Loading...".to_string()));
                self.pending.extend(accepted);
            }
            Err(e) => {
                error!("Failed to start the loader: {}", e);
                self.set_status(StatusLevel::Error, format!("Could not start loading: {}", e));
            }
        }
    }

    /// Hand finished loads to the state manager.
    pub fn poll_loader(&mut self) {
        for event in self.loader.poll() {
            match event {
                LoadEvent::Progress {
                    fraction, message, ..
                } => self.status.progress = Some((fraction, message)),
                LoadEvent::Loaded(loaded) => self.register_loaded(*loaded),
                LoadEvent::Failed { path, message, .. } => {
                    self.pending.retain(|p| p != &path);
                    self.failed += 1;
                    self.set_status(
                        StatusLevel::Error,
                        format!("Failed to load {}: {}", display_name(&path), message),
                    );
                }
                LoadEvent::Finished {
                    request,
                    loaded,
                    canceled,
                } => {
                    debug!("Load request {:?} finished", request);
                    if !self.loader.is_busy() {
                        self.status.progress = None;
                        self.pending.clear();
                    }
                    let failed = std::mem::take(&mut self.failed);
                    if canceled {
                        self.set_status(
                            StatusLevel::Warning,
                            format!("Load canceled after {} mesh(es)", loaded),
                        );
                    } else if failed == 0 {
                        self.set_status(StatusLevel::Info, format!("Loaded {} mesh(es)", loaded));
                    } else if loaded > 0 {
                        self.set_status(
                            StatusLevel::Warning,
                            format!("Loaded {} mesh(es), {} failed", loaded, failed),
                        );
                    }
                }
            }
        }
        self.sync_scene();
    }

    fn register_loaded(&mut self, loaded: LoadedMesh) {
        let LoadedMesh {
            id, name, path, mesh, ..
        } = loaded;
        self.pending.retain(|p| p != &path);
        // A taken id must not touch the geometry already stored under it
        if self.state.state().contains(id) {
            let e = StateError::DuplicateIdentifier(id);
            error!("Could not register {}: {}", path.display(), e);
            self.set_status(StatusLevel::Error, e.to_string());
            return;
        }
        // Geometry first, so observers of MeshAdded can see it
        self.scene.insert(id, mesh);
        if let Err(e) = self.state.register_mesh(id, name) {
            self.scene.remove(id);
            error!("Could not register {}: {}", path.display(), e);
            self.set_status(StatusLevel::Error, e.to_string());
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match &event {
            Event::Resize(width, height) => {
                self.resize(*width, *height);
                return;
            }
            Event::Key(key) if key.kind == KeyEventKind::Release => return,
            _ => {}
        }

        if !self.dispatch(Target::MenuBar, &event) {
            match &event {
                Event::Key(key) => {
                    if !self.handle_global_key(key) {
                        self.dispatch(Target::Viewport, &event);
                    }
                }
                Event::Mouse(mouse) => self.route_mouse(mouse, &event),
                _ => {}
            }
        }
        self.apply_actions();
    }

    fn route_mouse(&mut self, mouse: &MouseEvent, event: &Event) {
        // A press in the viewport keeps the pointer until release
        if self.panels.viewport.is_interacting() {
            self.dispatch(Target::Viewport, event);
            return;
        }
        for target in [Target::Controls, Target::Info, Target::Viewport] {
            if target.area(&self.layout).contains(mouse.column, mouse.row) {
                self.dispatch(target, event);
                return;
            }
        }
    }

    /// Offer `event` to one panel. Returns whether it was consumed.
    fn dispatch(&mut self, target: Target, event: &Event) -> bool {
        let area = target.area(&self.layout);
        let mut cx = FrameContext {
            state: &mut self.state,
            scene: &self.scene,
            theme: &self.theme,
            config: &self.config,
            area,
            frame: self.frame,
            actions: &mut self.actions,
        };
        match component::dispatch_event(self.panels.get(target), event, &mut cx) {
            Ok(EventResult::Consumed) => true,
            Ok(EventResult::Ignored) => false,
            Err(failure) => {
                warn!("{}", failure);
                cx.notify(StatusLevel::Error, failure.message);
                true
            }
        }
    }

    fn handle_global_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('o') => self.actions.push(AppAction::OpenLoadPrompt),
            KeyCode::Char('c') if ctrl => self.actions.push(AppAction::Quit),
            _ if ctrl => return false,
            KeyCode::Char('q') => self.actions.push(AppAction::Quit),
            KeyCode::Char('w') => self.toggle(ViewOption::Wireframe),
            KeyCode::Char('x') => self.toggle(ViewOption::ShowAxes),
            KeyCode::Char('r') => self.actions.push(AppAction::ResetView),
            KeyCode::Delete => self.actions.push(AppAction::DeleteSelected),
            KeyCode::Tab => {
                let next = next_selection(self.state.get_meshes(), self.state.get_selected());
                if let Err(e) = self.state.select(next) {
                    self.report(e);
                }
            }
            KeyCode::Esc if self.loader.is_busy() => self.actions.push(AppAction::CancelLoad),
            _ => return false,
        }
        true
    }

    fn toggle(&mut self, option: ViewOption) {
        if let Err(e) = self.state.toggle_view_option(option.name()) {
            self.report(e);
        }
    }

    fn apply_actions(&mut self) {
        while !self.actions.is_empty() {
            for action in std::mem::take(&mut self.actions) {
                self.apply(action);
            }
        }
        self.sync_scene();
    }

    fn apply(&mut self, action: AppAction) {
        debug!("Action {:?}", action);
        match action {
            AppAction::OpenLoadPrompt => self.panels.menu_bar.open_prompt(),
            AppAction::Load(paths) => self.load(paths),
            AppAction::CancelLoad => {
                if let Some(request) = self.loader.current_request() {
                    self.loader.cancel(request);
                    self.set_status(StatusLevel::Warning, "Canceling load...");
                }
            }
            AppAction::DeleteSelected => self.delete_selected(),
            AppAction::ClearAll => self.clear_all(),
            AppAction::ResetView => {
                self.panels.viewport.reset_view(&self.scene, self.state.state());
                self.set_status(StatusLevel::Info, "View reset");
            }
            AppAction::Notify(level, text) => self.set_status(level, text),
            AppAction::Quit => {
                info!("Quit requested");
                self.running = false;
            }
        }
    }

    fn delete_selected(&mut self) {
        let Some(id) = self.state.get_selected() else {
            self.set_status(StatusLevel::Warning, "No mesh selected");
            return;
        };
        let name = self
            .state
            .state()
            .mesh(id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| id.to_string());
        match self.state.remove_mesh(id) {
            Ok(()) => {
                info!("Removed mesh {} ({})", id, name);
                self.set_status(StatusLevel::Info, format!("Deleted {}", name));
            }
            Err(e) => self.report(e),
        }
    }

    fn clear_all(&mut self) {
        let count = self.state.get_meshes().len();
        if count == 0 {
            return;
        }
        match self.state.clear_meshes() {
            Ok(()) => {
                info!("Cleared {} mesh(es)", count);
                self.set_status(StatusLevel::Info, format!("Cleared {} mesh(es)", count));
            }
            Err(e) => self.report(e),
        }
    }

    fn sync_scene(&mut self) {
        let removed = std::mem::take(&mut *self.scene_sync.removed.borrow_mut());
        for id in removed {
            if self.scene.remove(id).is_some() {
                debug!("Dropped geometry of mesh {}", id);
            }
        }
    }

    fn report(&mut self, error: StateError) {
        warn!("UI action failed: {}", error);
        self.set_status(StatusLevel::Error, error.to_string());
    }

    fn set_status(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.status.message = Some(StatusMessage {
            level,
            text: text.into(),
            expires: self.frame + u64::from(self.config.ui.message_frames),
        });
    }

    /// Update every panel into the canvas. Failures are isolated per panel.
    pub fn render_frame(&mut self) {
        self.frame += 1;
        if self
            .status
            .message
            .as_ref()
            .is_some_and(|m| self.frame > m.expires)
        {
            self.status.message = None;
        }

        self.canvas.clear(self.theme.palette().background);
        for target in UPDATE_ORDER {
            let panel = self.panels.get(target);
            component::begin_frame(panel);
            let mut cx = FrameContext {
                state: &mut self.state,
                scene: &self.scene,
                theme: &self.theme,
                config: &self.config,
                area: target.area(&self.layout),
                frame: self.frame,
                actions: &mut self.actions,
            };
            if let Some(failure) = component::run_update(panel, &mut cx, &mut self.canvas) {
                error!("{}", failure);
                cx.notify(
                    StatusLevel::Error,
                    format!("{} failed: {}", failure.component, failure.message),
                );
            }
        }
        self.apply_actions();
        self.draw_status_bar();
    }

    fn draw_status_bar(&mut self) {
        let area = self.layout.status;
        if area.is_empty() {
            return;
        }
        let palette = self.theme.palette();
        self.canvas
            .fill(area, Cell::new(' ', palette.menu_fg, palette.menu_bg));

        let mut x = area.x + 1;
        if let Some((fraction, message)) = &self.status.progress {
            let text = format!("[{:>3.0}%] {}  ", fraction * 100.0, message);
            x = self
                .canvas
                .put_str(x, area.y, &text, palette.accent, palette.menu_bg, area);
        }
        match &self.status.message {
            Some(message) => {
                let fg = match message.level {
                    StatusLevel::Info => palette.info,
                    StatusLevel::Warning => palette.warning,
                    StatusLevel::Error => palette.error,
                };
                self.canvas
                    .put_str(x, area.y, &message.text, fg, palette.menu_bg, area);
            }
            None if self.status.progress.is_none() => {
                self.canvas
                    .put_str(x, area.y, KEY_HINT, palette.muted, palette.menu_bg, area);
            }
            None => {}
        }
    }

    /// Take over the terminal and run until quit. The terminal is restored
    /// even when the loop fails.
    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut out = stdout();
        if let Err(e) = execute!(
            out,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        ) {
            let _ = terminal::disable_raw_mode();
            return Err(e);
        }

        let result = self.main_loop(&mut out);

        // Cleanup
        let restored = execute!(
            out,
            cursor::Show,
            DisableMouseCapture,
            terminal::LeaveAlternateScreen
        );
        let raw = terminal::disable_raw_mode();
        self.shutdown();
        result.and(restored).and(raw)
    }

    fn main_loop(&mut self, out: &mut impl Write) -> io::Result<()> {
        let (width, height) = terminal::size()?;
        self.resize(width, height);
        let fps = self.config.ui.target_fps.max(1);
        let target_frame_time = Duration::from_secs_f64(1.0 / f64::from(fps));

        while self.running {
            let frame_start = Instant::now();

            self.poll_loader();
            while event::poll(Duration::ZERO)? {
                let event = event::read()?;
                self.handle_event(event);
            }

            self.render_frame();
            self.canvas.present(out)?;
            out.flush()?;

            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }
        }
        Ok(())
    }

    /// Unregister every observer and stop background loads.
    pub fn shutdown(&mut self) {
        for target in UPDATE_ORDER {
            self.panels.get(target).teardown(&mut self.state);
        }
        if let Some(handle) = self.sync_handle.take() {
            self.state.unsubscribe(handle);
        }
        self.loader.cancel_all();
        debug!("Shut down after {} frames", self.frame);
    }
}
