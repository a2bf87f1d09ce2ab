/// ASCII rasterizer for terminal rendering
use crossterm::style::Color;
use mv3d_core::{Axis, MeshId, Scene, Transform, Triangle, ViewTransform};
use nalgebra::{Matrix4, Point3, Vector3};

use crate::canvas::{Canvas, Cell, Rect};
use crate::theme::Palette;

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Lines are drawn slightly in front of surfaces at the same depth
const LINE_DEPTH_BIAS: f32 = 1e-4;
/// Labels sit in front of the line cell they end on
const LABEL_DEPTH_BIAS: f32 = 2.0 * LINE_DEPTH_BIAS;

/// One mesh to draw this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderEntry {
    pub id: MeshId,
    pub model: Matrix4<f32>,
    pub view_projection: Matrix4<f32>,
    pub highlighted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub wireframe: bool,
    pub show_axes: bool,
    /// Unit vector towards the light, world space
    pub light: Vector3<f32>,
    pub ambient: f32,
    pub axis_origin: Point3<f32>,
    pub axis_length: f32,
}

type ScreenPoint = (f32, f32, f32);

/// ASCII renderer that converts 3D meshes to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
    color_buffer: Vec<Color>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
            color_buffer: vec![Color::Reset; size],
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
        self.color_buffer.fill(Color::Reset);
    }

    /// Draw every entry, then the axes overlay if enabled.
    pub fn render(
        &mut self,
        entries: &[RenderEntry],
        scene: &Scene,
        transform: &ViewTransform,
        options: &RenderOptions,
        palette: &Palette,
    ) {
        for entry in entries {
            let Some(mesh) = scene.get(entry.id) else {
                continue;
            };
            let mvp = entry.view_projection * entry.model;
            let color = if entry.highlighted {
                palette.mesh_highlight
            } else {
                palette.mesh
            };
            for triangle in &mesh.mesh.triangles {
                if options.wireframe {
                    self.render_edges(triangle, &mvp, transform, color);
                } else {
                    self.render_triangle(triangle, &entry.model, &mvp, transform, options, color);
                }
            }
        }

        if options.show_axes {
            self.render_axes(transform, options, palette);
        }
    }

    fn project(
        &self,
        transform: &ViewTransform,
        mvp: &Matrix4<f32>,
        triangle: &Triangle,
    ) -> Option<[ScreenPoint; 3]> {
        let mut screen = [(0.0, 0.0, 0.0); 3];
        for (out, vertex) in screen.iter_mut().zip(&triangle.vertices) {
            let point = transform.project_with(mvp, &vertex.position)?;
            // Outside the clip volume in depth
            if !(-1.0..=1.0).contains(&point.2) {
                return None;
            }
            *out = point;
        }
        Some(screen)
    }

    fn render_triangle(
        &mut self,
        triangle: &Triangle,
        model: &Matrix4<f32>,
        mvp: &Matrix4<f32>,
        transform: &ViewTransform,
        options: &RenderOptions,
        color: Color,
    ) {
        let Some(screen) = self.project(transform, mvp, triangle) else {
            return;
        };

        // Headlight shading, double sided
        let normal = model.transform_vector(&triangle.calculate_normal());
        let diffuse = normal
            .try_normalize(f32::EPSILON)
            .map_or(0.0, |n| n.dot(&options.light).abs());
        let ambient = options.ambient.clamp(0.0, 1.0);
        let brightness = ambient + (1.0 - ambient) * diffuse;

        // Index 0 is blank, keep every visible face printable
        let last = LUMINOSITY_RAMP.len() - 1;
        let char_index = ((brightness * last as f32) as usize).clamp(1, last);
        self.rasterize_triangle(&screen, LUMINOSITY_RAMP[char_index], color);
    }

    fn render_edges(
        &mut self,
        triangle: &Triangle,
        mvp: &Matrix4<f32>,
        transform: &ViewTransform,
        color: Color,
    ) {
        let Some([a, b, c]) = self.project(transform, mvp, triangle) else {
            return;
        };
        for (from, to) in [(a, b), (b, c), (c, a)] {
            self.draw_line(from, to, color);
        }
    }

    fn render_axes(&mut self, transform: &ViewTransform, options: &RenderOptions, palette: &Palette) {
        for axis in Axis::ALL {
            let model = Transform::axis_matrix(axis, options.axis_origin, options.axis_length);
            let mvp = Transform::mvp_matrix(&model, &transform.view, &transform.projection);
            let (Some(start), Some(end)) = (
                transform.project_with(&mvp, &Point3::origin()),
                transform.project_with(&mvp, &Point3::new(0.0, 0.0, 1.0)),
            ) else {
                continue;
            };
            let color = match axis {
                Axis::X => palette.axis_x,
                Axis::Y => palette.axis_y,
                Axis::Z => palette.axis_z,
            };
            self.draw_line(start, end, color);
            self.plot(end.0, end.1, end.2 - LABEL_DEPTH_BIAS, axis.label(), color);
        }
    }

    fn rasterize_triangle(&mut self, coords: &[ScreenPoint; 3], character: char, color: Color) {
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                if let Some((w0, w1, w2)) =
                    barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), (px, py))
                {
                    if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                        let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                        self.write(x as usize, y as usize, depth, character, color);
                    }
                }
            }
        }
    }

    /// DDA line with interpolated depth, drawn with a character that
    /// follows its slope.
    fn draw_line(&mut self, from: ScreenPoint, to: ScreenPoint, color: Color) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let character = slope_char(dx, dy);

        let steps = dx.abs().max(dy.abs()).ceil().max(1.0);
        // Lines far off screen are not worth walking
        if !steps.is_finite() || steps > 4.0 * (self.width + self.height) as f32 + 1e4 {
            return;
        }
        let steps = steps as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = from.0 + dx * t;
            let y = from.1 + dy * t;
            let depth = from.2 + (to.2 - from.2) * t - LINE_DEPTH_BIAS;
            self.plot(x, y, depth, character, color);
        }
    }

    fn plot(&mut self, x: f32, y: f32, depth: f32, character: char, color: Color) {
        if x < 0.0 || y < 0.0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x < self.width && y < self.height {
            self.write(x, y, depth, character, color);
        }
    }

    fn write(&mut self, x: usize, y: usize, depth: f32, character: char, color: Color) {
        let idx = y * self.width + x;
        if depth < self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.char_buffer[idx] = character;
            self.color_buffer[idx] = color;
        }
    }

    pub fn char_at(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.char_buffer[y * self.width + x])
    }

    pub fn color_at(&self, x: usize, y: usize) -> Option<Color> {
        (x < self.width && y < self.height).then(|| self.color_buffer[y * self.width + x])
    }

    /// Copy the frame into `area` of the canvas.
    pub fn blit(&self, canvas: &mut Canvas, area: Rect, background: Color) {
        for y in 0..self.height.min(area.height as usize) {
            for x in 0..self.width.min(area.width as usize) {
                let idx = y * self.width + x;
                let cell = Cell::new(self.char_buffer[idx], self.color_buffer[idx], background);
                canvas.put(area.x + x as u16, area.y + y as u16, cell);
            }
        }
    }
}

fn slope_char(dx: f32, dy: f32) -> char {
    if dx.abs() > 2.0 * dy.abs() {
        '-'
    } else if dy.abs() > 2.0 * dx.abs() {
        '|'
    } else if (dx > 0.0) == (dy > 0.0) {
        '\\'
    } else {
        '/'
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
