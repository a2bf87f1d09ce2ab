//! Orbit camera: azimuth, elevation and distance around a target point

use std::f32::consts::{FRAC_PI_2, PI};

use nalgebra::{Matrix4, Point3, Vector3};

use crate::config::CameraSettings;
use crate::projection::{Projection, ViewTransform};

/// Elevation never gets closer than this to the poles (radians).
const POLE_MARGIN: f32 = 1e-3;
const MIN_DISTANCE_FLOOR: f32 = 1e-4;

/// Clamp ranges for [`CameraState`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraLimits {
    pub min_distance: f32,
    pub max_distance: f32,
    /// Largest allowed |elevation|, strictly below pi/2
    pub max_elevation: f32,
}

impl CameraLimits {
    pub fn new(min_distance: f32, max_distance: f32, max_elevation_deg: f32) -> Self {
        let min_distance = if min_distance.is_finite() {
            min_distance.max(MIN_DISTANCE_FLOOR)
        } else {
            MIN_DISTANCE_FLOOR
        };
        let max_distance = if max_distance.is_nan() {
            min_distance
        } else {
            max_distance.max(min_distance)
        };
        let max_elevation = if max_elevation_deg.is_finite() {
            max_elevation_deg.to_radians().clamp(0.0, FRAC_PI_2 - POLE_MARGIN)
        } else {
            FRAC_PI_2 - POLE_MARGIN
        };
        Self {
            min_distance,
            max_distance,
            max_elevation,
        }
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self::new(
            settings.min_distance,
            settings.max_distance,
            settings.max_elevation,
        )
    }

    pub fn clamp_distance(&self, distance: f32) -> f32 {
        if distance.is_nan() {
            return self.min_distance;
        }
        distance.clamp(self.min_distance, self.max_distance)
    }

    pub fn clamp_elevation(&self, elevation: f32) -> f32 {
        if elevation.is_nan() {
            return 0.0;
        }
        elevation.clamp(-self.max_elevation, self.max_elevation)
    }
}

impl Default for CameraLimits {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}

/// Orbit parameters. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub target: Point3<f32>,
}

impl CameraState {
    pub fn from_settings(settings: &CameraSettings, limits: &CameraLimits) -> Self {
        Self {
            azimuth: wrap_angle(settings.default_azimuth.to_radians()),
            elevation: limits.clamp_elevation(settings.default_elevation.to_radians()),
            distance: limits.clamp_distance(settings.default_distance),
            target: Point3::origin(),
        }
    }

    /// Unit vector from the target towards the eye.
    pub fn offset_direction(&self) -> Vector3<f32> {
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let (sin_el, cos_el) = self.elevation.sin_cos();
        Vector3::new(cos_el * sin_az, sin_el, cos_el * cos_az)
    }

    pub fn eye(&self) -> Point3<f32> {
        self.target + self.offset_direction() * self.distance
    }

    /// Camera right and up axes in world space.
    pub fn basis(&self) -> (Vector3<f32>, Vector3<f32>) {
        let forward = -self.offset_direction();
        let right = forward.cross(&Vector3::y()).normalize();
        let up = right.cross(&forward);
        (right, up)
    }

    /// Look-at view matrix. Well defined because elevation never reaches a pole.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.eye(), &self.target, &Vector3::y())
    }

    pub fn orbit(&mut self, delta_azimuth: f32, delta_elevation: f32, limits: &CameraLimits) {
        if delta_azimuth.is_finite() {
            self.azimuth = wrap_angle(self.azimuth + delta_azimuth);
        }
        if delta_elevation.is_finite() {
            self.elevation = limits.clamp_elevation(self.elevation + delta_elevation);
        }
    }

    /// Multiply the distance by `factor`, then clamp.
    pub fn zoom(&mut self, factor: f32, limits: &CameraLimits) {
        if factor.is_nan() {
            return;
        }
        self.distance = limits.clamp_distance(self.distance * factor.max(0.0));
    }

    /// Move the target in the camera plane.
    pub fn pan(&mut self, right: f32, up: f32) {
        if !(right.is_finite() && up.is_finite()) {
            return;
        }
        let (right_axis, up_axis) = self.basis();
        self.target += right_axis * right + up_axis * up;
    }
}

/// Camera state plus the projection it is viewed through.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub state: CameraState,
    pub limits: CameraLimits,
    pub projection: Projection,
    home: CameraState,
}

impl OrbitCamera {
    pub fn new(settings: &CameraSettings) -> Self {
        let limits = CameraLimits::from_settings(settings);
        let state = CameraState::from_settings(settings, &limits);
        Self {
            state,
            limits,
            projection: Projection::from_settings(settings),
            home: state,
        }
    }

    /// Return to the default angles, framing `center` at `distance`.
    pub fn reset(&mut self, center: Point3<f32>, distance: f32) {
        self.state = CameraState {
            target: center,
            distance: self.limits.clamp_distance(distance),
            ..self.home
        };
    }

    pub fn view_transform(&self, width: u32, height: u32) -> ViewTransform {
        ViewTransform {
            view: self.state.view_matrix(),
            projection: self.projection.matrix(),
            width,
            height,
        }
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(&CameraSettings::default())
    }
}

/// Wrap into `[-pi, pi)`.
fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn limits() -> CameraLimits {
        CameraLimits::new(1.0, 50.0, 89.0)
    }

    #[test]
    fn test_default_camera_is_inside_limits() {
        let camera = OrbitCamera::default();
        assert!((camera.state.distance - 5.0).abs() < 1e-6);
        assert!(camera.state.elevation.abs() < FRAC_PI_2);
        assert!(camera.limits.min_distance > 0.0);
    }

    #[test]
    fn test_limits_are_sanitized() {
        let limits = CameraLimits::new(-3.0, 0.0, 120.0);
        assert!(limits.min_distance > 0.0);
        assert!(limits.max_distance >= limits.min_distance);
        assert!(limits.max_elevation < FRAC_PI_2);
    }

    #[test]
    fn test_eye_distance_matches_state() {
        let state = CameraState {
            azimuth: 0.7,
            elevation: -0.3,
            distance: 4.0,
            target: Point3::new(1.0, 2.0, 3.0),
        };
        assert!(((state.eye() - state.target).norm() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_angles_look_down_negative_z() {
        let state = CameraState {
            azimuth: 0.0,
            elevation: 0.0,
            distance: 2.0,
            target: Point3::origin(),
        };
        assert!((state.eye() - Point3::new(0.0, 0.0, 2.0)).norm() < 1e-6);
        let (right, up) = state.basis();
        assert!((right - Vector3::x()).norm() < 1e-6);
        assert!((up - Vector3::y()).norm() < 1e-6);
    }

    #[test]
    fn test_view_matrix_is_pure() {
        let camera = OrbitCamera::default();
        assert_eq!(camera.state.view_matrix(), camera.state.view_matrix());
        assert_eq!(camera.view_transform(80, 24), camera.view_transform(80, 24));
    }

    #[test]
    fn test_zoom_clamps_exactly() {
        let limits = limits();
        let mut state = CameraState::from_settings(&CameraSettings::default(), &limits);
        state.zoom(1e-30, &limits);
        assert_eq!(state.distance, 1.0);
        state.zoom(f32::INFINITY, &limits);
        assert_eq!(state.distance, 50.0);
        state.zoom(f32::NAN, &limits);
        assert_eq!(state.distance, 50.0);
    }

    #[test]
    fn test_pan_moves_target_in_view_plane() {
        let mut state = CameraState {
            azimuth: 0.0,
            elevation: 0.0,
            distance: 2.0,
            target: Point3::origin(),
        };
        state.pan(1.0, 2.0);
        assert!((state.target - Point3::new(1.0, 2.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_reset_keeps_home_angles() {
        let mut camera = OrbitCamera::default();
        let home = camera.state;
        let limits = camera.limits;
        camera.state.orbit(1.0, 0.5, &limits);
        camera.reset(Point3::new(1.0, 1.0, 1.0), 12.0);
        assert_eq!(camera.state.azimuth, home.azimuth);
        assert_eq!(camera.state.elevation, home.elevation);
        assert_eq!(camera.state.distance, 12.0);
        assert_eq!(camera.state.target, Point3::new(1.0, 1.0, 1.0));
    }

    proptest! {
        #[test]
        fn prop_elevation_stays_off_the_poles(
            deltas in proptest::collection::vec((-1e6f32..1e6, -1e6f32..1e6), 0..32)
        ) {
            let limits = limits();
            let mut state = CameraState::from_settings(&CameraSettings::default(), &limits);
            for (da, de) in deltas {
                state.orbit(da, de, &limits);
                prop_assert!(state.elevation > -FRAC_PI_2 && state.elevation < FRAC_PI_2);
                prop_assert!(state.azimuth >= -PI && state.azimuth <= PI);
            }
        }

        #[test]
        fn prop_distance_stays_in_range(factors in proptest::collection::vec(0.0f32..1e6, 0..32)) {
            let limits = limits();
            let mut state = CameraState::from_settings(&CameraSettings::default(), &limits);
            for factor in factors {
                state.zoom(factor, &limits);
                prop_assert!(state.distance >= 1.0 && state.distance <= 50.0);
            }
        }
    }
}
