//! MV3D Core Library - viewer state, camera and mesh handling
//!
//! This library holds everything the viewer needs that does not depend on a
//! particular front end: STL decoding, the orbit camera and projection,
//! picking, the UI state manager with its observer contract, and the
//! background mesh loader.

pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod pick;
pub mod projection;
pub mod scene;
pub mod state;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use camera::{CameraLimits, CameraState, OrbitCamera};
pub use config::{AppConfig, PickMode};
pub use error::{ConfigError, MeshError, StateError};
pub use geometry::{Aabb, Mesh, MeshStats, Triangle, Vertex};
pub use loader::{LoadEvent, LoadedMesh, MeshLoader, RequestId};
pub use pick::Ray;
pub use projection::{Projection, ViewTransform};
pub use scene::{Scene, SceneFit, SceneMesh};
pub use state::{
    MeshId, MeshRecord, Mutation, Notification, StateChange, StateObserver, StateSummary,
    SubscriptionHandle, UiState, UiStateManager, ViewOption, ViewOptions,
};
pub use transform::{Axis, Transform};
