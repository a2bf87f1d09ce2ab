/// Right panel: details of the selected mesh
use mv3d_core::{Scene, UiStateManager};

use super::separator;
use crate::canvas::{Canvas, Cell, Rect};
use crate::component::{Component, ComponentBase, ComponentError, FrameContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Title,
    Text,
}

/// Lines shown for the current selection, or a placeholder
pub fn describe(state: &UiStateManager, scene: &Scene) -> Vec<String> {
    let Some(id) = state.get_selected() else {
        return vec!["No mesh selected.".to_string()];
    };
    let Some(record) = state.state().mesh(id) else {
        return vec!["No mesh selected.".to_string()];
    };

    let mut lines = vec![format!("Selected: {}", record.name)];
    match scene.get(id) {
        Some(mesh) => {
            let stats = &mesh.stats;
            let size = stats.bounds.size();
            lines.push(format!("Triangles: {}", group_thousands(stats.triangles)));
            lines.push(format!("Vertices: {}", group_thousands(stats.vertices)));
            lines.push(String::new());
            lines.push("Bounding Box:".to_string());
            lines.push(format!("  Size: {:.2} x {:.2} x {:.2}", size.x, size.y, size.z));
            lines.push(String::new());
            lines.push(format!("Surface Area: {:.2}", stats.surface_area));
            if stats.volume > 0.0 {
                lines.push(format!("Volume: {:.2}", stats.volume));
            }
            lines.push(format!("Visible: {}", if record.visible { "Yes" } else { "No" }));
            if let Some(source) = &mesh.source {
                lines.push(String::new());
                lines.push(format!("File: {}", source.display()));
            }
        }
        None => lines.push("Geometry not available.".to_string()),
    }
    lines
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn footer(state: &UiStateManager) -> Vec<String> {
    let summary = state.summary();
    let on_off = |on: bool| if on { "on" } else { "off" };
    vec![
        format!("Meshes: {} ({} visible)", summary.meshes, summary.visible),
        format!(
            "Wireframe: {}  Axes: {}",
            on_off(summary.view_options.wireframe),
            on_off(summary.view_options.show_axes)
        ),
    ]
}

#[derive(Default)]
pub struct InfoPanel {
    base: ComponentBase,
}

impl InfoPanel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for InfoPanel {
    fn name(&self) -> &'static str {
        "InfoPanel"
    }

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn update(&mut self, cx: &mut FrameContext<'_>, canvas: &mut Canvas) -> Result<(), ComponentError> {
        let area = cx.area;
        let palette = cx.theme.palette();
        canvas.fill(area, Cell::new(' ', palette.panel_fg, palette.panel_bg));
        if area.is_empty() {
            return Ok(());
        }

        // Second row is left for the rule under the title
        let mut lines: Vec<(Tone, String)> = vec![
            (Tone::Title, "Mesh Information".to_string()),
            (Tone::Text, String::new()),
        ];
        lines.extend(describe(cx.state, cx.scene).into_iter().map(|l| (Tone::Text, l)));

        let inner = Rect::new(area.x + 1, area.y, area.width.saturating_sub(1), area.height);
        for (offset, (tone, text)) in lines.iter().enumerate().take(area.height as usize) {
            let y = area.y + offset as u16;
            let fg = match tone {
                Tone::Title => palette.title,
                Tone::Text => palette.panel_fg,
            };
            canvas.put_str(inner.x, y, text, fg, palette.panel_bg, inner);
            if offset == 0 && area.height > 1 {
                separator(canvas, area, y + 1, palette.muted, palette.panel_bg);
            }
        }

        // Summary pinned to the bottom when there is room below the details
        let footer = footer(cx.state);
        let needed = lines.len() as u16 + footer.len() as u16 + 2;
        if area.height >= needed {
            let top = area.bottom() - footer.len() as u16;
            separator(canvas, area, top - 1, palette.muted, palette.panel_bg);
            for (offset, text) in footer.iter().enumerate() {
                canvas.put_str(inner.x, top + offset as u16, text, palette.muted, palette.panel_bg, inner);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::AppAction;
    use crate::theme::ThemeManager;
    use mv3d_core::{AppConfig, Mesh, MeshId, SceneMesh};
    use std::path::PathBuf;

    fn loaded(size: f32) -> (UiStateManager, Scene, MeshId) {
        let id = MeshId::new(1);
        let mut state = UiStateManager::new();
        let mut scene = Scene::new();
        scene.insert(
            id,
            SceneMesh::new(Mesh::cube(size), Some(PathBuf::from("/models/cube.stl"))).unwrap(),
        );
        state.register_mesh(id, "cube.stl").unwrap();
        (state, scene, id)
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_placeholder_without_selection() {
        let (state, scene, _) = loaded(2.0);
        assert_eq!(describe(&state, &scene), vec!["No mesh selected.".to_string()]);
    }

    #[test]
    fn test_describes_selected_mesh() {
        let (mut state, scene, id) = loaded(2.0);
        state.select(Some(id)).unwrap();
        let lines = describe(&state, &scene);
        assert_eq!(lines[0], "Selected: cube.stl");
        assert!(lines.contains(&"Triangles: 12".to_string()));
        assert!(lines.contains(&"  Size: 2.00 x 2.00 x 2.00".to_string()));
        assert!(lines.contains(&"Surface Area: 24.00".to_string()));
        assert!(lines.contains(&"Visible: Yes".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("File: ") && l.ends_with("cube.stl")));

        state.set_visible(id, false).unwrap();
        assert!(describe(&state, &scene).contains(&"Visible: No".to_string()));
    }

    #[test]
    fn test_draws_into_area() {
        let (mut state, scene, id) = loaded(1.0);
        state.select(Some(id)).unwrap();
        let theme = ThemeManager::default();
        let config = AppConfig::default();
        let mut actions: Vec<AppAction> = Vec::new();
        let mut canvas = Canvas::new(40, 30);
        let mut cx = FrameContext {
            state: &mut state,
            scene: &scene,
            theme: &theme,
            config: &config,
            area: Rect::new(10, 0, 30, 30),
            frame: 0,
            actions: &mut actions,
        };
        InfoPanel::new().update(&mut cx, &mut canvas).unwrap();

        assert!(canvas.row_text(0).contains("Mesh Information"));
        assert!(canvas.row_text(2).contains("Selected: cube.stl"));
        assert!(canvas.row_text(29).contains("Wireframe: off  Axes: on"));
        // Nothing outside the panel is touched
        assert!(canvas.row_text(2)[..10].trim().is_empty());
    }
}
