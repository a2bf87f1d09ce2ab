//! Ray casting against loaded meshes

use nalgebra::{Point3, Vector3};

use crate::config::PickMode;
use crate::geometry::{Aabb, Triangle};
use crate::scene::SceneMesh;
use crate::state::MeshId;

/// Hits closer together than this (relative to the distance) count as a tie.
const TIE_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    /// Unit length
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Option<Self> {
        let len = direction.norm();
        if !len.is_finite() || len <= f32::EPSILON {
            return None;
        }
        Some(Self {
            origin,
            direction: direction / len,
        })
    }

    pub fn between(from: Point3<f32>, to: Point3<f32>) -> Option<Self> {
        Self::new(from, to - from)
    }

    /// Slab test. Returns the entry distance, or 0 when the origin is inside.
    pub fn intersect_aabb(&self, aabb: &Aabb) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let origin = self.origin[axis];
            let dir = self.direction[axis];
            let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

            if dir.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let (t0, t1) = {
                let a = (lo - origin) * inv;
                let b = (hi - origin) * inv;
                if a <= b {
                    (a, b)
                } else {
                    (b, a)
                }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }

    /// Möller–Trumbore, double sided.
    pub fn intersect_triangle(&self, triangle: &Triangle) -> Option<f32> {
        let [v0, v1, v2] = triangle.positions();
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let p = self.direction.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() < 1e-8 {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.origin - v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = self.direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(&q) * inv_det;
        (t >= 0.0).then_some(t)
    }

    /// Nearest hit distance against one mesh.
    pub fn intersect_mesh(&self, mesh: &SceneMesh, mode: PickMode) -> Option<f32> {
        let bounds_hit = self.intersect_aabb(&mesh.bounds)?;
        match mode {
            PickMode::Bounds => Some(bounds_hit),
            PickMode::Triangles => mesh
                .mesh
                .triangles
                .iter()
                .filter_map(|t| self.intersect_triangle(t))
                .min_by(f32::total_cmp),
        }
    }
}

/// Mesh under the ray: nearest hit wins, near-equal hits go to the lowest id.
pub fn pick<'a, I>(ray: &Ray, candidates: I, mode: PickMode) -> Option<MeshId>
where
    I: IntoIterator<Item = (MeshId, &'a SceneMesh)>,
{
    let hits: Vec<(MeshId, f32)> = candidates
        .into_iter()
        .filter_map(|(id, mesh)| ray.intersect_mesh(mesh, mode).map(|t| (id, t)))
        .collect();

    let nearest = hits.iter().map(|&(_, t)| t).min_by(f32::total_cmp)?;
    let tolerance = TIE_EPSILON * nearest.max(1.0);
    hits.into_iter()
        .filter(|&(_, t)| t - nearest <= tolerance)
        .map(|(id, _)| id)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;
    use nalgebra::Translation3;

    fn cube_at(x: f32, y: f32, z: f32) -> SceneMesh {
        let mut mesh = Mesh::cube(1.0);
        let shift = Translation3::new(x, y, z);
        for triangle in &mut mesh.triangles {
            for vertex in &mut triangle.vertices {
                vertex.position = shift * vertex.position;
            }
        }
        SceneMesh::new(mesh, None).unwrap()
    }

    fn down_z() -> Ray {
        Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z()).unwrap()
    }

    #[test]
    fn test_ray_rejects_zero_direction() {
        assert!(Ray::new(Point3::origin(), Vector3::zeros()).is_none());
    }

    #[test]
    fn test_aabb_entry_distance() {
        let aabb = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(down_z().intersect_aabb(&aabb), Some(9.0));

        let inside = Ray::new(Point3::origin(), Vector3::x()).unwrap();
        assert_eq!(inside.intersect_aabb(&aabb), Some(0.0));

        let miss = Ray::new(Point3::new(3.0, 0.0, 10.0), -Vector3::z()).unwrap();
        assert_eq!(miss.intersect_aabb(&aabb), None);

        let behind = Ray::new(Point3::new(0.0, 0.0, 10.0), Vector3::z()).unwrap();
        assert_eq!(behind.intersect_aabb(&aabb), None);
    }

    #[test]
    fn test_nearest_hit_wins() {
        let near = cube_at(0.0, 0.0, 2.0);
        let far = cube_at(0.0, 0.0, -2.0);
        let picked = pick(
            &down_z(),
            [(MeshId::new(1), &far), (MeshId::new(2), &near)],
            PickMode::Bounds,
        );
        assert_eq!(picked, Some(MeshId::new(2)));
    }

    #[test]
    fn test_tie_goes_to_lowest_id() {
        let a = cube_at(0.0, 0.0, 0.0);
        let b = cube_at(0.0, 0.0, 0.0);
        for order in [[(7, &a), (3, &b)], [(3, &b), (7, &a)]] {
            let candidates = order.map(|(raw, mesh)| (MeshId::new(raw), mesh));
            assert_eq!(
                pick(&down_z(), candidates, PickMode::Bounds),
                Some(MeshId::new(3))
            );
        }
    }

    #[test]
    fn test_no_hit_is_none() {
        let side = cube_at(5.0, 0.0, 0.0);
        assert_eq!(pick(&down_z(), [(MeshId::new(1), &side)], PickMode::Bounds), None);
        assert_eq!(pick(&down_z(), std::iter::empty(), PickMode::Bounds), None);
    }

    #[test]
    fn test_triangle_mode_refines_bounds() {
        // A single slanted triangle: its bounds contain the ray, its surface does not.
        let mut mesh = Mesh::new();
        mesh.add_triangle(Triangle::new(
            crate::geometry::Vertex::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            crate::geometry::Vertex::new(2.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            crate::geometry::Vertex::new(0.0, 2.0, 1.0, 0.0, 0.0, 1.0),
        ));
        let slanted = SceneMesh::new(mesh, None).unwrap();
        let ray = Ray::new(Point3::new(1.8, 1.8, 10.0), -Vector3::z()).unwrap();

        assert!(ray.intersect_mesh(&slanted, PickMode::Bounds).is_some());
        assert!(ray.intersect_mesh(&slanted, PickMode::Triangles).is_none());

        let cube = cube_at(0.0, 0.0, 0.0);
        let t = down_z().intersect_mesh(&cube, PickMode::Triangles).unwrap();
        assert!((t - 9.5).abs() < 1e-5);
    }
}
