//! Projection parameters and screen-space mapping

use nalgebra::{Matrix4, Point3, Vector4};

use crate::config::CameraSettings;
use crate::pick::Ray;

/// Perspective field of view, aspect and clip planes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn from_settings(settings: &CameraSettings) -> Self {
        let near = settings.near_plane.max(1e-4);
        Self {
            fov: settings.field_of_view.clamp(1.0, 179.0).to_radians(),
            aspect: 1.0,
            near,
            far: settings.far_plane.max(near * 2.0),
        }
    }

    /// Aspect of a `width` x `height` cell grid whose cells are
    /// `cell_aspect` times as wide as they are tall.
    pub fn set_viewport(&mut self, width: u32, height: u32, cell_aspect: f32) {
        self.aspect = if width == 0 || height == 0 {
            1.0
        } else {
            (width as f32 * cell_aspect) / height as f32
        };
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}

/// View and projection for one frame, bound to a screen size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub width: u32,
    pub height: u32,
}

impl ViewTransform {
    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view
    }

    /// Project a 3D point to screen space: `(x, y, ndc depth)`.
    ///
    /// Points behind the eye are rejected; points off-screen are not.
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
    ) -> Option<(f32, f32, f32)> {
        let mvp = self.projection * self.view * model_matrix;
        self.project_with(&mvp, point)
    }

    /// Same as [`project_to_screen`](Self::project_to_screen) with the
    /// model-view-projection matrix already composed.
    pub fn project_with(&self, mvp: &Matrix4<f32>, point: &Point3<f32>) -> Option<(f32, f32, f32)> {
        let clip = mvp * point.to_homogeneous();

        // Prevent division by near-zero depth values
        if clip.w < 1e-6 {
            return None;
        }

        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let depth = clip.z / clip.w;

        let screen_x = (ndc_x + 1.0) * 0.5 * self.width as f32;
        let screen_y = (1.0 - ndc_y) * 0.5 * self.height as f32;

        Some((screen_x, screen_y, depth))
    }

    /// World-space ray through a screen position (cell centers sit at `.5`).
    pub fn screen_ray(&self, screen_x: f32, screen_y: f32) -> Option<Ray> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let inverse = self.view_projection().try_inverse()?;

        let ndc_x = 2.0 * screen_x / self.width as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * screen_y / self.height as f32;

        let unproject = |z: f32| {
            let p = inverse * Vector4::new(ndc_x, ndc_y, z, 1.0);
            (p.w.abs() > f32::EPSILON).then(|| Point3::new(p.x / p.w, p.y / p.w, p.z / p.w))
        };
        let near = unproject(-1.0)?;
        let far = unproject(1.0)?;
        Ray::between(near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn looking_down_z(width: u32, height: u32) -> ViewTransform {
        let mut projection = Projection::default();
        projection.set_viewport(width, height, 1.0);
        ViewTransform {
            view: Matrix4::look_at_rh(
                &Point3::new(0.0, 0.0, 5.0),
                &Point3::origin(),
                &Vector3::y(),
            ),
            projection: projection.matrix(),
            width,
            height,
        }
    }

    #[test]
    fn test_projection_from_settings() {
        let projection = Projection::default();
        assert!((projection.fov - 45f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn test_cell_aspect() {
        let mut projection = Projection::default();
        projection.set_viewport(80, 20, 0.5);
        assert!((projection.aspect - 2.0).abs() < 1e-6);
        projection.set_viewport(80, 0, 0.5);
        assert_eq!(projection.aspect, 1.0);
    }

    #[test]
    fn test_target_projects_to_center() {
        let transform = looking_down_z(100, 50);
        let (x, y, depth) = transform
            .project_to_screen(&Point3::origin(), &Matrix4::identity())
            .unwrap();
        assert!((x - 50.0).abs() < 1e-3);
        assert!((y - 25.0).abs() < 1e-3);
        assert!(depth > -1.0 && depth < 1.0);
    }

    #[test]
    fn test_point_behind_eye_is_rejected() {
        let transform = looking_down_z(100, 50);
        assert!(transform
            .project_to_screen(&Point3::new(0.0, 0.0, 10.0), &Matrix4::identity())
            .is_none());
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let transform = looking_down_z(100, 50);
        let ray = transform.screen_ray(50.0, 25.0).unwrap();
        assert!((ray.direction - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-4);
        assert!(ray.origin.x.abs() < 1e-4 && ray.origin.y.abs() < 1e-4);
    }

    #[test]
    fn test_ray_and_projection_agree() {
        let transform = looking_down_z(120, 40);
        let point = Point3::new(0.7, -0.4, 0.3);
        let (x, y, _) = transform
            .project_to_screen(&point, &Matrix4::identity())
            .unwrap();
        let ray = transform.screen_ray(x, y).unwrap();
        let to_point = point - ray.origin;
        let off_axis = (to_point - ray.direction * to_point.dot(&ray.direction)).norm();
        assert!(off_axis < 1e-3);
    }
}
