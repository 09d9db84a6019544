//! Error types for the grass renderer

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A required external asset (material, mesh, terrain, ...) was not assigned.
    #[error("Missing required asset: {0}")]
    MissingAsset(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Grass surface is not initialized")]
    NotInitialized,

    #[error("Grass surface was destroyed")]
    Destroyed,

    #[error("Map painting is not enabled or no live map exists")]
    PaintingDisabled,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Detail map has no backing file")]
    NoSourcePath,
}
