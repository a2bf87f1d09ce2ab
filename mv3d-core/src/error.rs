//! Error types shared by the viewer core

use std::path::PathBuf;
use thiserror::Error;

use crate::state::MeshId;

/// Failures of a UI state mutation.
///
/// A failed mutation leaves the state untouched and emits no notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("mesh {0} is already registered")]
    DuplicateIdentifier(MeshId),

    #[error("mesh {0} is not loaded")]
    NotFound(MeshId),

    #[error("unknown view option '{0}'")]
    InvalidOption(String),
}

/// Failures while reading, decoding or validating a mesh file.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("file too small to be a valid STL")]
    TooSmall,

    #[error("unexpected end of file after {parsed} of {expected} triangles")]
    UnexpectedEof { parsed: usize, expected: usize },

    #[error("failed to parse ASCII STL: {0}")]
    Ascii(String),

    #[error("mesh has no triangles")]
    Empty,

    #[error("mesh contains NaN or infinite coordinates")]
    NonFinite,

    #[error("mesh coordinates too large: max={value:.2e}, limit={limit:.2e}")]
    CoordinateOutOfRange { value: f32, limit: f32 },

    #[error("mesh has {count} triangles, limit is {limit}")]
    TooManyTriangles { count: usize, limit: usize },

    #[error("file {path} is {size} bytes, limit is {limit}")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("unsupported file type: {path}")]
    UnsupportedExtension { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
