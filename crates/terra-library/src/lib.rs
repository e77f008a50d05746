//! Material library: material definitions, texture providers, atlas and
//! texture-array packing, and the [`MaterialLibrary`] meshers resolve
//! surfaces through.

mod atlas;
mod error;
mod library;
mod material;
mod surface;
mod texture;

pub use atlas::{AtlasBuilder, AtlasConfig, TextureArray, TextureArrayBuilder, TextureAtlas, UvRect};
pub use error::LibraryError;
pub use library::MaterialLibrary;
pub use material::{FaceTextures, MaterialDef, MaterialEntry, MaterialManifest};
pub use surface::{FaceMapping, LibraryKind, Surface, SurfaceRef, SurfaceTexture};
pub use texture::{DirectoryTextures, MemoryTextures, TextureProvider, checkerboard, placeholder_texture};
