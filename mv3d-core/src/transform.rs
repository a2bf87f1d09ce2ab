//! Model transforms and matrix composition

use nalgebra::{Matrix4, Point3, Vector3};

/// World axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn label(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    pub fn identity() -> Matrix4<f32> {
        Matrix4::identity()
    }

    /// Create a translation matrix
    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// Create a scale matrix
    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    /// Maps the unit +Z segment onto `axis`, scaled to `length` and
    /// starting at `origin`.
    pub fn axis_matrix(axis: Axis, origin: Point3<f32>, length: f32) -> Matrix4<f32> {
        let rotation = match axis {
            Axis::X => Matrix4::new_rotation(Vector3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0)),
            Axis::Y => Matrix4::new_rotation(Vector3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0)),
            Axis::Z => Matrix4::identity(),
        };
        Self::translation_matrix(origin.x, origin.y, origin.z)
            * rotation
            * Self::scale_matrix(length, length, length)
    }

    /// Create a model-view-projection matrix
    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_matrix_maps_unit_z() {
        let tip = Point3::new(0.0, 0.0, 1.0);
        let origin = Point3::new(1.0, 2.0, 3.0);
        for (axis, expected) in [
            (Axis::X, Vector3::x()),
            (Axis::Y, Vector3::y()),
            (Axis::Z, Vector3::z()),
        ] {
            let m = Transform::axis_matrix(axis, origin, 2.0);
            let end = m.transform_point(&tip);
            assert!((end - (origin + expected * 2.0)).norm() < 1e-5, "{:?}", axis);
            assert!((m.transform_point(&Point3::origin()) - origin).norm() < 1e-6);
        }
    }

    #[test]
    fn test_mvp_order() {
        let model = Transform::translation_matrix(1.0, 0.0, 0.0);
        let view = Transform::scale_matrix(2.0, 2.0, 2.0);
        let mvp = Transform::mvp_matrix(&model, &view, &Transform::identity());
        let p = mvp.transform_point(&Point3::origin());
        assert!((p - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-6);
    }
}
