//! Triangle-soup geometry, bounds and per-mesh statistics
use nalgebra::{Point3, Vector3};

use crate::config::MeshSettings;
use crate::error::MeshError;

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }
}

/// A triangle face defined by three vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Face normal from the winding order. Degenerate faces yield a zero vector.
    pub fn calculate_normal(&self) -> Vector3<f32> {
        let cross = self.edge_cross();
        let len = cross.norm();
        if len <= f32::EPSILON {
            Vector3::zeros()
        } else {
            cross / len
        }
    }

    pub fn area(&self) -> f32 {
        self.edge_cross().norm() * 0.5
    }

    /// Signed volume of the tetrahedron spanned with the origin.
    fn signed_volume(&self) -> f32 {
        let [a, b, c] = self.positions();
        a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
    }

    pub fn positions(&self) -> [Point3<f32>; 3] {
        [
            self.vertices[0].position,
            self.vertices[1].position,
            self.vertices[2].position,
        ]
    }

    fn edge_cross(&self) -> Vector3<f32> {
        let [v0, v1, v2] = self.positions();
        (v1 - v0).cross(&(v2 - v0))
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f32>>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| acc.including(p)))
    }

    pub fn including(self, p: &Point3<f32>) -> Self {
        Self {
            min: self.min.inf(p),
            max: self.max.sup(p),
        }
    }

    pub fn union(self, other: &Aabb) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Largest edge length
    pub fn extent(&self) -> f32 {
        self.size().max()
    }
}

/// Summary numbers shown for a loaded mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshStats {
    pub triangles: usize,
    pub vertices: usize,
    pub bounds: Aabb,
    pub surface_area: f32,
    /// Enclosed volume; only meaningful for closed, consistently wound meshes.
    pub volume: f32,
}

/// A 3D mesh composed of triangles
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(
            self.triangles
                .iter()
                .flat_map(|t| t.vertices.iter().map(|v| &v.position)),
        )
    }

    pub fn stats(&self) -> Option<MeshStats> {
        let bounds = self.bounds()?;
        let (area, volume) = self
            .triangles
            .iter()
            .fold((0.0, 0.0), |(a, v), t| (a + t.area(), v + t.signed_volume()));
        Some(MeshStats {
            triangles: self.triangles.len(),
            vertices: self.triangles.len() * 3,
            bounds,
            surface_area: area,
            volume,
        })
    }

    /// Reject meshes the viewer cannot display safely.
    pub fn validate(&self, limits: &MeshSettings) -> Result<(), MeshError> {
        if self.triangles.is_empty() {
            return Err(MeshError::Empty);
        }
        if self.triangles.len() > limits.max_triangles {
            return Err(MeshError::TooManyTriangles {
                count: self.triangles.len(),
                limit: limits.max_triangles,
            });
        }

        let mut max_coord = 0.0f32;
        for vertex in self.triangles.iter().flat_map(|t| t.vertices.iter()) {
            let p = vertex.position;
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(MeshError::NonFinite);
            }
            max_coord = max_coord.max(p.coords.amax());
        }
        if max_coord > limits.max_coordinate {
            return Err(MeshError::CoordinateOutOfRange {
                value: max_coord,
                limit: limits.max_coordinate,
            });
        }
        Ok(())
    }

    /// Axis-aligned cube centered on the origin
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        // normal, then four corners counter-clockwise seen from outside
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
            ([0.0, 0.0, -1.0], [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]]),
            ([0.0, 1.0, 0.0], [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]]),
            ([0.0, -1.0, 0.0], [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]]),
            ([1.0, 0.0, 0.0], [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]]),
            ([-1.0, 0.0, 0.0], [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]]),
        ];

        let mut mesh = Self::with_capacity(12);
        for ([nx, ny, nz], corners) in faces {
            let v = |c: [f32; 3]| Vertex::new(c[0], c[1], c[2], nx, ny, nz);
            mesh.add_triangle(Triangle::new(v(corners[0]), v(corners[1]), v(corners[2])));
            mesh.add_triangle(Triangle::new(v(corners[0]), v(corners[2]), v(corners[3])));
        }
        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_stats() {
        let stats = Mesh::cube(2.0).stats().unwrap();
        assert_eq!(stats.triangles, 12);
        assert_eq!(stats.vertices, 36);
        assert!((stats.surface_area - 24.0).abs() < 1e-4);
        assert!((stats.volume - 8.0).abs() < 1e-4);
        assert_eq!(stats.bounds.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(stats.bounds.max, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_cube_normals_match_winding() {
        for triangle in &Mesh::cube(1.0).triangles {
            let stored = triangle.vertices[0].normal;
            assert!((triangle.calculate_normal() - stored).norm() < 1e-5);
        }
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(Mesh::new().bounds().is_none());
        assert!(matches!(
            Mesh::new().validate(&MeshSettings::default()),
            Err(MeshError::Empty)
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut mesh = Mesh::cube(1.0);
        mesh.triangles[3].vertices[1].position.y = f32::NAN;
        assert!(matches!(
            mesh.validate(&MeshSettings::default()),
            Err(MeshError::NonFinite)
        ));
    }

    #[test]
    fn test_validate_rejects_far_coordinates() {
        let limits = MeshSettings {
            max_coordinate: 10.0,
            ..MeshSettings::default()
        };
        assert!(Mesh::cube(4.0).validate(&limits).is_ok());
        assert!(matches!(
            Mesh::cube(40.0).validate(&limits),
            Err(MeshError::CoordinateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_degenerate_triangle_normal_is_zero() {
        let v = Vertex::new(1.0, 1.0, 1.0, 0.0, 0.0, 0.0);
        assert_eq!(Triangle::new(v, v, v).calculate_normal(), Vector3::zeros());
    }
}
