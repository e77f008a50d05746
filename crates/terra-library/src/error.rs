//! Material library error types.

use terra_voxel::MaterialId;
use thiserror::Error;

/// Errors returned while building or querying a [`MaterialLibrary`](crate::MaterialLibrary).
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The material id has not been registered.
    #[error("unknown material {0:?}")]
    UnknownMaterial(MaterialId),

    /// Surface lookups need a finalized library.
    #[error("material library has not been finalized")]
    NotFinalized,

    /// A material with the same id or name already exists.
    #[error("duplicate material: {0}")]
    DuplicateMaterial(String),

    /// `MaterialId(0)` is reserved for empty space.
    #[error("material id {0:?} is reserved")]
    InvalidMaterialId(MaterialId),

    /// The texture provider has no image for this name.
    #[error("texture not found: {0}")]
    MissingTexture(String),

    /// Texture array layers must all share one size.
    #[error("texture layer {name} is {actual:?}, expected {expected:?}")]
    LayerSizeMismatch {
        /// Texture name of the offending layer.
        name: String,
        /// Size of the first layer.
        expected: (u32, u32),
        /// Size of the offending layer.
        actual: (u32, u32),
    },

    /// The atlas has no free tile slots.
    #[error("atlas is full (max {max} tiles)")]
    AtlasFull {
        /// Maximum number of tiles the atlas can hold.
        max: u32,
    },

    /// Invalid atlas sizing.
    #[error("invalid atlas config: {0}")]
    InvalidConfig(String),

    /// I/O error reading a manifest.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// RON deserialization error.
    #[error("ron parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
