//! 3D viewport: orbit camera input, picking and the render list

use std::cell::Cell;
use std::rc::Rc;

use crossterm::event::{Event, KeyCode, MouseButton, MouseEvent, MouseEventKind};
use mv3d_core::config::{AppConfig, InputSettings, PickMode};
use mv3d_core::pick::pick;
use mv3d_core::{
    MeshId, Notification, OrbitCamera, Scene, SceneFit, StateChange, StateError, StateObserver,
    SubscriptionHandle, UiState, UiStateManager, ViewTransform,
};
use nalgebra::{Matrix4, Point3};
use tracing::{debug, info};

use crate::canvas::{Canvas, Cell as CanvasCell, Rect};
use crate::component::{
    Component, ComponentBase, ComponentError, EventResult, FrameContext, InitContext,
};
use crate::renderer::{AsciiRenderer, RenderEntry, RenderOptions};

/// Orbit step for the arrow keys, radians
const KEY_ORBIT_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Orbit,
    Pan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interaction {
    Idle,
    /// Button down, not moved past the drag threshold yet
    Pressed {
        button: MouseButton,
        column: u16,
        row: u16,
    },
    Dragging {
        mode: DragMode,
        column: u16,
        row: u16,
    },
}

/// Requests a re-fit of the view whenever the set of meshes changes.
#[derive(Default)]
struct RefitOnChange {
    pending: Cell<bool>,
}

impl StateObserver for RefitOnChange {
    fn on_state_changed(&self, change: &StateChange, _cx: &mut Notification<'_>) {
        if matches!(
            change,
            StateChange::MeshAdded { .. } | StateChange::MeshRemoved { .. }
        ) {
            self.pending.set(true);
        }
    }
}

pub struct ViewportComponent {
    base: ComponentBase,
    camera: OrbitCamera,
    input: InputSettings,
    pick_mode: PickMode,
    cell_aspect: f32,
    axis_scale: f32,
    ambient: f32,
    reset_multiplier: f32,
    fit: SceneFit,
    interaction: Interaction,
    area: Rect,
    renderer: AsciiRenderer,
    refit: Rc<RefitOnChange>,
    subscription: Option<SubscriptionHandle>,
}

impl ViewportComponent {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            base: ComponentBase::new(),
            camera: OrbitCamera::new(&config.camera),
            input: config.input.clone(),
            pick_mode: config.rendering.pick_mode,
            cell_aspect: config.ui.cell_aspect,
            axis_scale: config.rendering.axis_scale,
            ambient: config.rendering.ambient,
            reset_multiplier: config.camera.reset_zoom_multiplier,
            fit: SceneFit::default(),
            interaction: Interaction::Idle,
            area: Rect::default(),
            renderer: AsciiRenderer::new(0, 0),
            refit: Rc::new(RefitOnChange::default()),
            subscription: None,
        }
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.interaction, Interaction::Dragging { .. })
    }

    /// A button went down in the viewport and has not been released yet
    pub fn is_interacting(&self) -> bool {
        self.interaction != Interaction::Idle
    }

    /// Resize the viewport; keeps the projection aspect in step.
    pub fn set_area(&mut self, area: Rect) {
        if area == self.area {
            return;
        }
        self.area = area;
        self.camera
            .projection
            .set_viewport(area.width as u32, area.height as u32, self.cell_aspect);
        self.renderer.resize(area.width as usize, area.height as usize);
    }

    pub fn view_transform(&self) -> ViewTransform {
        self.camera
            .view_transform(self.area.width as u32, self.area.height as u32)
    }

    pub fn begin_drag(&mut self, mode: DragMode) {
        self.interaction = Interaction::Dragging {
            mode,
            column: 0,
            row: 0,
        };
    }

    pub fn end_drag(&mut self) {
        self.interaction = Interaction::Idle;
    }

    /// Apply a pointer movement in cells. Ignored unless a drag is active.
    pub fn on_drag(&mut self, delta_x: f32, delta_y: f32) {
        let Interaction::Dragging { mode, .. } = self.interaction else {
            return;
        };
        let limit = self.input.max_drag_delta.abs();
        let dx = clamp_delta(delta_x, limit);
        let dy = clamp_delta(delta_y, limit);

        match mode {
            DragMode::Orbit => {
                let sensitivity = self.input.rotation_sensitivity;
                let limits = self.camera.limits;
                self.camera
                    .state
                    .orbit(-dx * sensitivity, dy * sensitivity, &limits);
            }
            DragMode::Pan => {
                let scale = self.fit.extent * self.input.pan_sensitivity;
                self.camera.state.pan(-dx * scale, dy * scale);
            }
        }
    }

    /// Exponential zoom; negative deltas move closer.
    pub fn on_scroll(&mut self, delta: f32) {
        let factor = (delta * self.input.zoom_sensitivity).exp();
        let limits = self.camera.limits;
        self.camera.state.zoom(factor, &limits);
    }

    /// Pick the mesh under a viewport-local cell and select it (or nothing).
    pub fn on_click(
        &mut self,
        screen_x: f32,
        screen_y: f32,
        state: &mut UiStateManager,
        scene: &Scene,
    ) -> Result<Option<MeshId>, StateError> {
        let hit = self.pick_at(screen_x, screen_y, state.state(), scene);
        debug!("Pick at ({:.1}, {:.1}): {:?}", screen_x, screen_y, hit);
        state.select(hit)?;
        Ok(hit)
    }

    fn pick_at(&self, screen_x: f32, screen_y: f32, state: &UiState, scene: &Scene) -> Option<MeshId> {
        let ray = self.view_transform().screen_ray(screen_x, screen_y)?;
        let visible = state
            .meshes()
            .iter()
            .filter(|m| m.visible)
            .filter_map(|m| scene.get(m.id).map(|mesh| (m.id, mesh)));
        pick(&ray, visible, self.pick_mode)
    }

    pub fn on_pointer_down(&mut self, button: MouseButton, column: u16, row: u16) {
        self.interaction = Interaction::Pressed {
            button,
            column,
            row,
        };
    }

    pub fn on_pointer_move(&mut self, column: u16, row: u16) {
        match self.interaction {
            Interaction::Idle => {}
            Interaction::Pressed {
                button,
                column: start_column,
                row: start_row,
            } => {
                let dx = column as f32 - start_column as f32;
                let dy = row as f32 - start_row as f32;
                if dx.hypot(dy) > self.input.drag_threshold {
                    let mode = match button {
                        MouseButton::Right | MouseButton::Middle => DragMode::Pan,
                        MouseButton::Left => DragMode::Orbit,
                    };
                    self.interaction = Interaction::Dragging { mode, column, row };
                    self.on_drag(dx, dy);
                }
            }
            Interaction::Dragging {
                mode,
                column: last_column,
                row: last_row,
            } => {
                let dx = column as f32 - last_column as f32;
                let dy = row as f32 - last_row as f32;
                self.on_drag(dx, dy);
                self.interaction = Interaction::Dragging { mode, column, row };
            }
        }
    }

    /// Ends the interaction. A left press that never became a drag is a click.
    pub fn on_pointer_up(
        &mut self,
        column: u16,
        row: u16,
        state: &mut UiStateManager,
        scene: &Scene,
    ) -> Result<Option<MeshId>, StateError> {
        let interaction = std::mem::replace(&mut self.interaction, Interaction::Idle);
        match interaction {
            Interaction::Pressed {
                button: MouseButton::Left,
                ..
            } => {
                let x = column.saturating_sub(self.area.x) as f32 + 0.5;
                let y = row.saturating_sub(self.area.y) as f32 + 0.5;
                self.on_click(x, y, state, scene)
            }
            _ => Ok(None),
        }
    }

    /// Visible meshes in registration order, paired with the current transform.
    pub fn produce_render_list(&self, state: &UiState) -> Vec<RenderEntry> {
        let view_projection = self.view_transform().view_projection();
        let selected = state.selected();
        state
            .meshes()
            .iter()
            .filter(|m| m.visible)
            .map(|m| RenderEntry {
                id: m.id,
                model: Matrix4::identity(),
                view_projection,
                highlighted: selected == Some(m.id),
            })
            .collect()
    }

    /// Frame the visible meshes from the default angles.
    pub fn reset_view(&mut self, scene: &Scene, state: &UiState) {
        let visible = state.meshes().iter().filter(|m| m.visible).map(|m| m.id);
        self.fit = scene.fit(visible);
        self.camera
            .reset(self.fit.center, self.fit.extent * self.reset_multiplier);
        self.interaction = Interaction::Idle;
        info!(
            "View reset: center ({:.2}, {:.2}, {:.2}), distance {:.2}",
            self.fit.center.x, self.fit.center.y, self.fit.center.z, self.camera.state.distance
        );
    }

    fn handle_mouse(
        &mut self,
        mouse: &MouseEvent,
        cx: &mut FrameContext<'_>,
    ) -> Result<EventResult, ComponentError> {
        let inside = self.area.contains(mouse.column, mouse.row);
        let active = self.interaction != Interaction::Idle;
        match mouse.kind {
            MouseEventKind::Down(button) if inside => {
                self.on_pointer_down(button, mouse.column, mouse.row);
            }
            MouseEventKind::Drag(_) if active => {
                self.on_pointer_move(mouse.column, mouse.row);
            }
            MouseEventKind::Up(_) if active => {
                self.on_pointer_up(mouse.column, mouse.row, cx.state, cx.scene)?;
            }
            MouseEventKind::ScrollUp if inside => self.on_scroll(-1.0),
            MouseEventKind::ScrollDown if inside => self.on_scroll(1.0),
            _ => return Ok(EventResult::Ignored),
        }
        Ok(EventResult::Consumed)
    }

    fn handle_key(&mut self, code: KeyCode) -> EventResult {
        let (azimuth, elevation) = match code {
            KeyCode::Left => (KEY_ORBIT_STEP, 0.0),
            KeyCode::Right => (-KEY_ORBIT_STEP, 0.0),
            KeyCode::Up => (0.0, KEY_ORBIT_STEP),
            KeyCode::Down => (0.0, -KEY_ORBIT_STEP),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.on_scroll(-1.0);
                return EventResult::Consumed;
            }
            KeyCode::Char('-') => {
                self.on_scroll(1.0);
                return EventResult::Consumed;
            }
            _ => return EventResult::Ignored,
        };
        let limits = self.camera.limits;
        self.camera.state.orbit(azimuth, elevation, &limits);
        EventResult::Consumed
    }

    fn draw_overlay(&self, cx: &FrameContext<'_>, canvas: &mut Canvas) {
        let palette = cx.theme.palette();
        let area = self.area;
        if cx.state.get_meshes().is_empty() {
            let hint = "No meshes loaded. Press o to open a file.";
            let x = area.x + area.width.saturating_sub(hint.len() as u16) / 2;
            let y = area.y + area.height / 2;
            canvas.put_str(x, y, hint, palette.muted, palette.background, area);
        }

        let state = &self.camera.state;
        let readout = format!(
            " az {:.0}\u{b0} el {:.0}\u{b0} d {:.2} ",
            state.azimuth.to_degrees(),
            state.elevation.to_degrees(),
            state.distance
        );
        let y = area.bottom().saturating_sub(1);
        canvas.put_str(area.x, y, &readout, palette.muted, palette.background, area);
    }
}

fn clamp_delta(delta: f32, limit: f32) -> f32 {
    if delta.is_nan() {
        0.0
    } else {
        delta.clamp(-limit, limit)
    }
}

impl Component for ViewportComponent {
    fn name(&self) -> &'static str {
        "Viewport"
    }

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self, cx: &mut InitContext<'_>) -> Result<(), ComponentError> {
        self.subscription = Some(cx.state.subscribe(&self.refit));
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: &Event,
        cx: &mut FrameContext<'_>,
    ) -> Result<EventResult, ComponentError> {
        match event {
            Event::Mouse(mouse) => self.handle_mouse(mouse, cx),
            Event::Key(key) => Ok(self.handle_key(key.code)),
            _ => Ok(EventResult::Ignored),
        }
    }

    fn update(&mut self, cx: &mut FrameContext<'_>, canvas: &mut Canvas) -> Result<(), ComponentError> {
        self.set_area(cx.area);
        if self.refit.pending.take() {
            self.reset_view(cx.scene, cx.state.state());
        }

        let palette = cx.theme.palette();
        let view_options = cx.state.get_view_options();
        let options = RenderOptions {
            wireframe: view_options.wireframe,
            show_axes: view_options.show_axes,
            light: self.camera.state.offset_direction(),
            ambient: self.ambient,
            axis_origin: Point3::origin(),
            axis_length: self.fit.extent * self.axis_scale,
        };
        let entries = self.produce_render_list(cx.state.state());
        let transform = self.view_transform();

        self.renderer.clear();
        self.renderer
            .render(&entries, cx.scene, &transform, &options, palette);

        canvas.fill(self.area, CanvasCell::new(' ', palette.panel_fg, palette.background));
        self.renderer.blit(canvas, self.area, palette.background);
        self.draw_overlay(cx, canvas);
        Ok(())
    }

    fn teardown(&mut self, state: &mut UiStateManager) {
        if let Some(handle) = self.subscription.take() {
            state.unsubscribe(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeManager;
    use crossterm::event::KeyModifiers;
    use mv3d_core::{Mesh, SceneMesh};
    use proptest::prelude::*;
    use std::cell::RefCell;

    const AREA: Rect = Rect::new(0, 0, 40, 20);

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.camera.min_distance = 1.0;
        config.camera.max_distance = 50.0;
        config.camera.default_distance = 5.0;
        config
    }

    fn viewport() -> ViewportComponent {
        let mut viewport = ViewportComponent::new(&config());
        viewport.set_area(AREA);
        viewport
    }

    fn scene_and_state(ids: &[u64]) -> (Scene, UiStateManager) {
        let mut scene = Scene::new();
        let mut state = UiStateManager::new();
        for &raw in ids {
            let id = MeshId::new(raw);
            scene.insert(id, SceneMesh::new(Mesh::cube(2.0), None).unwrap());
            state.register_mesh(id, format!("mesh{raw}")).unwrap();
        }
        (scene, state)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_scroll_clamps_to_min_distance_exactly() {
        let mut viewport = viewport();
        assert_eq!(viewport.camera().state.distance, 5.0);
        viewport.on_scroll(-1000.0);
        assert_eq!(viewport.camera().state.distance, 1.0);
        viewport.on_scroll(1000.0);
        assert_eq!(viewport.camera().state.distance, 50.0);
    }

    #[test]
    fn test_drag_needs_an_active_drag() {
        let mut viewport = viewport();
        let before = viewport.camera().state;
        viewport.on_drag(30.0, 10.0);
        assert_eq!(viewport.camera().state, before);

        viewport.begin_drag(DragMode::Orbit);
        viewport.on_drag(30.0, 10.0);
        assert_ne!(viewport.camera().state.azimuth, before.azimuth);
        viewport.end_drag();

        let after = viewport.camera().state;
        viewport.on_drag(5.0, 5.0);
        assert_eq!(viewport.camera().state, after);
    }

    #[test]
    fn test_pan_moves_target_only() {
        let mut viewport = viewport();
        let before = viewport.camera().state;
        viewport.begin_drag(DragMode::Pan);
        viewport.on_drag(10.0, 0.0);
        let after = viewport.camera().state;
        assert_ne!(after.target, before.target);
        assert_eq!(after.azimuth, before.azimuth);
        assert_eq!(after.distance, before.distance);
    }

    #[test]
    fn test_click_on_nothing_selects_none() {
        let mut viewport = viewport();
        let (scene, mut state) = scene_and_state(&[1]);
        state.select(Some(MeshId::new(1))).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = {
            let seen = Rc::clone(&seen);
            Rc::new(move |change: &StateChange, _cx: &mut Notification<'_>| {
                seen.borrow_mut().push(*change)
            })
        };
        state.subscribe(&recorder);

        let hit = viewport.on_click(0.5, 0.5, &mut state, &scene).unwrap();
        assert_eq!(hit, None);
        assert_eq!(state.get_selected(), None);
        assert_eq!(
            *seen.borrow(),
            vec![StateChange::SelectionChanged {
                previous: Some(MeshId::new(1)),
                current: None,
            }]
        );
    }

    #[test]
    fn test_click_picks_lowest_id_on_overlap() {
        let mut viewport = viewport();
        let (scene, mut state) = scene_and_state(&[5, 2]);
        let hit = viewport.on_click(20.5, 10.5, &mut state, &scene).unwrap();
        assert_eq!(hit, Some(MeshId::new(2)));
        assert_eq!(state.get_selected(), Some(MeshId::new(2)));
    }

    #[test]
    fn test_hidden_meshes_are_not_picked() {
        let mut viewport = viewport();
        let (scene, mut state) = scene_and_state(&[1]);
        state.set_visible(MeshId::new(1), false).unwrap();
        let hit = viewport.on_click(20.5, 10.5, &mut state, &scene).unwrap();
        assert_eq!(hit, None);
    }

    #[test]
    fn test_press_release_is_a_click_and_drag_is_not() {
        let mut viewport = viewport();
        let (scene, mut state) = scene_and_state(&[1]);

        viewport.on_pointer_down(MouseButton::Left, 20, 10);
        let hit = viewport.on_pointer_up(20, 10, &mut state, &scene).unwrap();
        assert_eq!(hit, Some(MeshId::new(1)));

        state.select(None).unwrap();
        let before = viewport.camera().state;
        viewport.on_pointer_down(MouseButton::Left, 20, 10);
        viewport.on_pointer_move(25, 10);
        assert!(viewport.is_dragging());
        let hit = viewport.on_pointer_up(25, 10, &mut state, &scene).unwrap();
        assert_eq!(hit, None);
        assert_eq!(state.get_selected(), None);
        assert_ne!(viewport.camera().state.azimuth, before.azimuth);
        assert!(!viewport.is_dragging());
    }

    #[test]
    fn test_render_list_is_pure_and_ordered() {
        let viewport = viewport();
        let (_scene, mut state) = scene_and_state(&[9, 3, 7]);
        state.set_visible(MeshId::new(3), false).unwrap();
        state.select(Some(MeshId::new(7))).unwrap();

        let first = viewport.produce_render_list(state.state());
        let second = viewport.produce_render_list(state.state());
        assert_eq!(first, second);

        let ids: Vec<MeshId> = first.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![MeshId::new(9), MeshId::new(7)]);
        assert!(!first[0].highlighted);
        assert!(first[1].highlighted);
        assert_eq!(first[0].view_projection, viewport.view_transform().view_projection());
    }

    #[test]
    fn test_mesh_changes_refit_the_view() {
        let config = config();
        let theme = ThemeManager::default();
        let mut viewport = ViewportComponent::new(&config);
        let mut state = UiStateManager::new();
        let mut scene = Scene::new();
        {
            let mut cx = InitContext {
                state: &mut state,
                theme: &theme,
                config: &config,
            };
            viewport.initialize(&mut cx).unwrap();
        }

        let mut mesh = Mesh::cube(4.0);
        for triangle in &mut mesh.triangles {
            for vertex in &mut triangle.vertices {
                vertex.position.x += 10.0;
            }
        }
        scene.insert(MeshId::new(1), SceneMesh::new(mesh, None).unwrap());
        state.register_mesh(MeshId::new(1), "offset").unwrap();

        let mut canvas = Canvas::new(40, 20);
        let mut actions = Vec::new();
        let mut cx = FrameContext {
            state: &mut state,
            scene: &scene,
            theme: &theme,
            config: &config,
            area: AREA,
            frame: 1,
            actions: &mut actions,
        };
        viewport.update(&mut cx, &mut canvas).unwrap();

        let camera = viewport.camera().state;
        assert!((camera.target - Point3::new(10.0, 0.0, 0.0)).norm() < 1e-5);
        assert!((camera.distance - 4.0 * 2.5).abs() < 1e-4);

        viewport.teardown(&mut state);
        assert_eq!(state.observer_count(), 0);
    }

    #[test]
    fn test_arrow_keys_orbit() {
        let mut viewport = viewport();
        let before = viewport.camera().state;
        assert_eq!(viewport.handle_key(KeyCode::Up), EventResult::Consumed);
        assert!(viewport.camera().state.elevation > before.elevation);
        assert_eq!(viewport.handle_key(KeyCode::Char('q')), EventResult::Ignored);
    }

    #[test]
    fn test_mouse_outside_area_is_ignored() {
        let mut viewport = viewport();
        viewport.set_area(Rect::new(10, 1, 20, 10));
        let (scene, mut state) = scene_and_state(&[]);
        let theme = ThemeManager::default();
        let config = config();
        let mut actions = Vec::new();
        let mut cx = FrameContext {
            state: &mut state,
            scene: &scene,
            theme: &theme,
            config: &config,
            area: Rect::new(10, 1, 20, 10),
            frame: 1,
            actions: &mut actions,
        };
        let result = viewport
            .handle_mouse(&mouse(MouseEventKind::Down(MouseButton::Left), 2, 2), &mut cx)
            .unwrap();
        assert_eq!(result, EventResult::Ignored);
        let result = viewport
            .handle_mouse(&mouse(MouseEventKind::ScrollUp, 15, 5), &mut cx)
            .unwrap();
        assert_eq!(result, EventResult::Consumed);
    }

    proptest! {
        #[test]
        fn prop_camera_stays_in_range(
            drags in proptest::collection::vec((-1e5f32..1e5, -1e5f32..1e5), 0..24),
            scrolls in proptest::collection::vec(-1e4f32..1e4, 0..24),
        ) {
            let mut viewport = viewport();
            viewport.begin_drag(DragMode::Orbit);
            for (dx, dy) in drags {
                viewport.on_drag(dx, dy);
                let elevation = viewport.camera().state.elevation;
                prop_assert!(elevation > -std::f32::consts::FRAC_PI_2);
                prop_assert!(elevation < std::f32::consts::FRAC_PI_2);
            }
            for delta in scrolls {
                viewport.on_scroll(delta);
                let distance = viewport.camera().state.distance;
                prop_assert!((1.0..=50.0).contains(&distance));
            }
        }
    }
}
