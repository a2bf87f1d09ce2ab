//! Decoded geometry of every loaded mesh, keyed by [`MeshId`]
//!
//! The scene only stores geometry. Which meshes are visible or selected is
//! owned by the UI state manager; callers pass the ids they care about.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nalgebra::Point3;

use crate::error::MeshError;
use crate::geometry::{Aabb, Mesh, MeshStats};
use crate::state::MeshId;

/// Smallest extent used when framing, so a single point still has a size.
const MIN_EXTENT: f32 = 1e-6;

#[derive(Debug, Clone)]
pub struct SceneMesh {
    pub mesh: Mesh,
    pub bounds: Aabb,
    pub stats: MeshStats,
    /// File the mesh was loaded from
    pub source: Option<PathBuf>,
}

impl SceneMesh {
    pub fn new(mesh: Mesh, source: Option<PathBuf>) -> Result<Self, MeshError> {
        let stats = mesh.stats().ok_or(MeshError::Empty)?;
        Ok(Self {
            bounds: stats.bounds,
            stats,
            mesh,
            source,
        })
    }
}

/// Center and size of a group of meshes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneFit {
    pub center: Point3<f32>,
    pub extent: f32,
}

impl Default for SceneFit {
    fn default() -> Self {
        Self {
            center: Point3::origin(),
            extent: 1.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    meshes: HashMap<MeshId, SceneMesh>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: MeshId, mesh: SceneMesh) {
        self.meshes.insert(id, mesh);
    }

    pub fn remove(&mut self, id: MeshId) -> Option<SceneMesh> {
        self.meshes.remove(&id)
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }

    pub fn get(&self, id: MeshId) -> Option<&SceneMesh> {
        self.meshes.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn contains_source(&self, path: &Path) -> bool {
        self.meshes
            .values()
            .any(|m| m.source.as_deref() == Some(path))
    }

    pub fn bounds<I>(&self, ids: I) -> Option<Aabb>
    where
        I: IntoIterator<Item = MeshId>,
    {
        ids.into_iter()
            .filter_map(|id| self.meshes.get(&id))
            .map(|m| m.bounds)
            .reduce(|acc, b| acc.union(&b))
    }

    /// Framing for `ids`; the unit box at the origin when nothing matches.
    pub fn fit<I>(&self, ids: I) -> SceneFit
    where
        I: IntoIterator<Item = MeshId>,
    {
        match self.bounds(ids) {
            Some(bounds) => SceneFit {
                center: bounds.center(),
                extent: bounds.extent().max(MIN_EXTENT),
            },
            None => SceneFit::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mesh_is_rejected() {
        assert!(matches!(
            SceneMesh::new(Mesh::new(), None),
            Err(MeshError::Empty)
        ));
    }

    #[test]
    fn test_fit_covers_requested_meshes_only() {
        let mut scene = Scene::new();
        scene.insert(MeshId::new(1), SceneMesh::new(Mesh::cube(2.0), None).unwrap());
        scene.insert(MeshId::new(2), SceneMesh::new(Mesh::cube(10.0), None).unwrap());

        let fit = scene.fit([MeshId::new(1)]);
        assert_eq!(fit.center, Point3::origin());
        assert_eq!(fit.extent, 2.0);

        assert_eq!(scene.fit([MeshId::new(1), MeshId::new(2)]).extent, 10.0);
        assert_eq!(scene.fit([MeshId::new(9)]), SceneFit::default());
        assert_eq!(scene.fit(std::iter::empty()), SceneFit::default());
    }

    #[test]
    fn test_source_lookup() {
        let mut scene = Scene::new();
        let path = PathBuf::from("/tmp/part.stl");
        scene.insert(
            MeshId::new(4),
            SceneMesh::new(Mesh::cube(1.0), Some(path.clone())).unwrap(),
        );
        assert!(scene.contains_source(&path));
        assert!(!scene.contains_source(Path::new("/tmp/other.stl")));
        scene.remove(MeshId::new(4));
        assert!(scene.is_empty());
    }
}
