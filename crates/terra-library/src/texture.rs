//! Texture providers feeding the library at finalize time.

use std::collections::HashMap;
use std::path::PathBuf;

use image::RgbaImage;

/// Supplies tile images by texture name.
pub trait TextureProvider: Send + Sync {
    /// Returns the image for `name`, or `None` if the provider has none.
    fn texture(&self, name: &str) -> Option<RgbaImage>;
}

// ---------------------------------------------------------------------------
// MemoryTextures
// ---------------------------------------------------------------------------

/// In-memory texture map.
#[derive(Clone, Debug, Default)]
pub struct MemoryTextures {
    images: HashMap<String, RgbaImage>,
}

impl MemoryTextures {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a texture.
    pub fn insert(&mut self, name: &str, image: RgbaImage) {
        self.images.insert(name.to_string(), image);
    }

    /// Builder-style [`Self::insert`].
    pub fn with(mut self, name: &str, image: RgbaImage) -> Self {
        self.insert(name, image);
        self
    }

    /// Number of textures held.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns `true` if no textures are held.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl TextureProvider for MemoryTextures {
    fn texture(&self, name: &str) -> Option<RgbaImage> {
        self.images.get(name).cloned()
    }
}

// ---------------------------------------------------------------------------
// DirectoryTextures
// ---------------------------------------------------------------------------

/// Loads `base_dir/name` from disk. Missing or unreadable files are
/// replaced by a solid placeholder derived from the name.
#[derive(Clone, Debug)]
pub struct DirectoryTextures {
    base_dir: PathBuf,
    placeholder_size: u32,
}

impl DirectoryTextures {
    /// Creates a provider rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, placeholder_size: u32) -> Self {
        Self {
            base_dir: base_dir.into(),
            placeholder_size: placeholder_size.max(1),
        }
    }
}

impl TextureProvider for DirectoryTextures {
    fn texture(&self, name: &str) -> Option<RgbaImage> {
        let path = self.base_dir.join(name);
        match image::open(&path) {
            Ok(img) => Some(img.to_rgba8()),
            Err(err) => {
                tracing::warn!(texture = name, path = %path.display(), "using placeholder: {err}");
                Some(placeholder_texture(name, self.placeholder_size))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Generated images
// ---------------------------------------------------------------------------

/// Solid tile whose colour is a stable hash of `name`.
pub fn placeholder_texture(name: &str, size: u32) -> RgbaImage {
    let hash = name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let r = ((hash >> 16) & 0xFF) as u8;
    let g = ((hash >> 8) & 0xFF) as u8;
    let b = (hash & 0xFF) as u8;
    RgbaImage::from_pixel(size, size, image::Rgba([r, g, b, 255]))
}

/// Checkerboard tile with 4×4 cells.
pub fn checkerboard(size: u32, color_a: [u8; 4], color_b: [u8; 4]) -> RgbaImage {
    let cell = (size / 4).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)).is_multiple_of(2) {
            image::Rgba(color_a)
        } else {
            image::Rgba(color_b)
        }
    })
}
