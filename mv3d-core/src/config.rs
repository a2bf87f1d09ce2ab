//! Viewer configuration (TOML)
//!
//! Every field carries a serde default, so a config file only needs the
//! values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub rendering: RenderingSettings,
    #[serde(default)]
    pub mesh: MeshSettings,
    #[serde(default)]
    pub ui: UiSettings,
    #[serde(default)]
    pub files: FileSettings,
}

/// Orbit camera limits and projection. Angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub default_distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub default_azimuth: f32,
    pub default_elevation: f32,
    /// Must stay below 90
    pub max_elevation: f32,
    pub field_of_view: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Reset distance as a multiple of the scene extent
    pub reset_zoom_multiplier: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            default_distance: 5.0,
            min_distance: 0.1,
            max_distance: 10_000.0,
            default_azimuth: -45.0,
            default_elevation: 35.264,
            max_elevation: 89.0,
            field_of_view: 45.0,
            near_plane: 0.1,
            far_plane: 10_000.0,
            reset_zoom_multiplier: 2.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Radians of orbit per cell of drag
    pub rotation_sensitivity: f32,
    /// Pan distance per cell, as a fraction of the scene extent
    pub pan_sensitivity: f32,
    /// Exponent per scroll step
    pub zoom_sensitivity: f32,
    /// Pointer travel (cells) before a press becomes a drag
    pub drag_threshold: f32,
    /// Per-event drag deltas are clamped to this magnitude
    pub max_drag_delta: f32,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            rotation_sensitivity: 0.01,
            pan_sensitivity: 0.01,
            zoom_sensitivity: 0.1,
            drag_threshold: 0.0,
            max_drag_delta: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickMode {
    /// Ray against each mesh's bounding box
    #[default]
    Bounds,
    /// Bounding box first, then the mesh triangles
    Triangles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingSettings {
    pub pick_mode: PickMode,
    /// Axis arrow length relative to the scene extent
    pub axis_scale: f32,
    pub ambient: f32,
}

impl Default for RenderingSettings {
    fn default() -> Self {
        Self {
            pick_mode: PickMode::Bounds,
            axis_scale: 0.75,
            ambient: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub max_coordinate: f32,
    pub max_triangles: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            max_coordinate: 1e6,
            max_triangles: 2_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub controls_width: u16,
    pub info_width: u16,
    /// Width / height of one terminal cell
    pub cell_aspect: f32,
    pub target_fps: u32,
    /// How many frames a status message stays visible
    pub message_frames: u32,
    pub theme: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            controls_width: 28,
            info_width: 30,
            cell_aspect: 0.5,
            target_fps: 30,
            message_frames: 120,
            theme: "dark".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub extensions: Vec<String>,
    pub max_file_size: u64,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["stl".to_string()],
            max_file_size: 100 * 1024 * 1024,
        }
    }
}

impl FileSettings {
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("{e}; using default configuration");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
