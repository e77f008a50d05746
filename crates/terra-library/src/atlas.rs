//! Texture packing: grid atlases for merged surfaces and texture arrays for
//! the PCM variant.
//!
//! The atlas arranges square tiles in a row-major grid and hands out UV
//! rectangles inset by half a texel so that bilinear sampling never reaches
//! a neighbouring tile.

use std::collections::HashMap;

use glam::Vec2;
use image::RgbaImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

// ---------------------------------------------------------------------------
// AtlasConfig
// ---------------------------------------------------------------------------

/// Atlas sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// Width and height of the atlas texture in pixels (power of two).
    pub atlas_size: u32,
    /// Width and height of each tile in pixels (power of two dividing
    /// `atlas_size`).
    pub tile_size: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            atlas_size: 256,
            tile_size: 16,
        }
    }
}

impl AtlasConfig {
    /// Number of tiles in one atlas row.
    pub fn tiles_per_row(&self) -> u32 {
        self.atlas_size / self.tile_size
    }

    /// Maximum number of tiles.
    pub fn max_tiles(&self) -> u32 {
        let per_row = self.tiles_per_row();
        per_row * per_row
    }

    /// Validates sizes: both powers of two, tile no larger than the atlas.
    pub fn validate(&self) -> Result<(), LibraryError> {
        if !self.atlas_size.is_power_of_two() {
            return Err(LibraryError::InvalidConfig(format!(
                "atlas_size {} is not a power of 2",
                self.atlas_size
            )));
        }
        if !self.tile_size.is_power_of_two() {
            return Err(LibraryError::InvalidConfig(format!(
                "tile_size {} is not a power of 2",
                self.tile_size
            )));
        }
        if self.tile_size > self.atlas_size {
            return Err(LibraryError::InvalidConfig(
                "tile_size must be <= atlas_size".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// UvRect
// ---------------------------------------------------------------------------

/// Normalized texture-space rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    /// Lower corner.
    pub min: Vec2,
    /// Upper corner.
    pub max: Vec2,
}

impl UvRect {
    /// The whole texture.
    pub const FULL: UvRect = UvRect {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    /// Maps a `[0, 1]` tile-local UV into this rectangle.
    pub fn transform_uv(&self, uv: [f32; 2]) -> [f32; 2] {
        let size = self.max - self.min;
        let out = self.min + Vec2::from(uv) * size;
        out.to_array()
    }

    /// Maps a UV in `[0, tile_w] × [0, tile_h]` (a quad spanning several
    /// tiles) into this rectangle, stretching it to fit.
    pub fn transform_uv_scaled(&self, uv: [f32; 2], tile_w: f32, tile_h: f32) -> [f32; 2] {
        let w = if tile_w > 0.0 { tile_w } else { 1.0 };
        let h = if tile_h > 0.0 { tile_h } else { 1.0 };
        self.transform_uv([uv[0] / w, uv[1] / h])
    }
}

// ---------------------------------------------------------------------------
// TextureAtlas
// ---------------------------------------------------------------------------

/// A completed grid atlas with its mip chain.
#[derive(Clone, Debug)]
pub struct TextureAtlas {
    /// Atlas sizing.
    pub config: AtlasConfig,
    /// Mip level 0 is the full-resolution atlas.
    pub mip_chain: Vec<RgbaImage>,
    /// Texture name → tile index.
    pub tile_map: HashMap<String, u32>,
}

impl TextureAtlas {
    /// Full-resolution atlas image.
    pub fn image(&self) -> &RgbaImage {
        &self.mip_chain[0]
    }

    /// Inset UV rectangle of a tile.
    pub fn tile_rect(&self, tile_index: u32) -> UvRect {
        tile_rect_inset(&self.config, tile_index)
    }

    /// Tile index of a texture name.
    pub fn tile_index(&self, name: &str) -> Option<u32> {
        self.tile_map.get(name).copied()
    }

    /// Number of tiles packed.
    pub fn tile_count(&self) -> u32 {
        self.tile_map.len() as u32
    }
}

fn tile_rect_inset(config: &AtlasConfig, tile_index: u32) -> UvRect {
    let tiles_per_row = config.tiles_per_row();
    let col = tile_index % tiles_per_row;
    let row = tile_index / tiles_per_row;
    let tile_uv = config.tile_size as f32 / config.atlas_size as f32;
    let half_pixel = 0.5 / config.atlas_size as f32;
    let min = Vec2::new(col as f32 * tile_uv, row as f32 * tile_uv);
    UvRect {
        min: min + Vec2::splat(half_pixel),
        max: min + Vec2::splat(tile_uv - half_pixel),
    }
}

fn fit_tile(img: &RgbaImage, size: u32) -> RgbaImage {
    if img.width() == size && img.height() == size {
        img.clone()
    } else {
        image::imageops::resize(img, size, size, FilterType::Nearest)
    }
}

// ---------------------------------------------------------------------------
// AtlasBuilder
// ---------------------------------------------------------------------------

/// Accumulates tile images into a [`TextureAtlas`].
pub struct AtlasBuilder {
    config: AtlasConfig,
    tile_map: HashMap<String, u32>,
    atlas_image: RgbaImage,
    next_slot: u32,
}

impl AtlasBuilder {
    /// Creates a builder with validated sizing.
    pub fn new(config: AtlasConfig) -> Result<Self, LibraryError> {
        config.validate()?;
        Ok(Self {
            tile_map: HashMap::new(),
            next_slot: 0,
            atlas_image: RgbaImage::new(config.atlas_size, config.atlas_size),
            config,
        })
    }

    /// Places `img` in the next free slot, resizing it to the tile size.
    /// A name already added returns its existing tile index.
    pub fn add(&mut self, name: &str, img: &RgbaImage) -> Result<u32, LibraryError> {
        if let Some(&idx) = self.tile_map.get(name) {
            return Ok(idx);
        }
        if self.next_slot >= self.config.max_tiles() {
            return Err(LibraryError::AtlasFull {
                max: self.config.max_tiles(),
            });
        }

        let tile = fit_tile(img, self.config.tile_size);
        let tiles_per_row = self.config.tiles_per_row();
        let px = (self.next_slot % tiles_per_row) * self.config.tile_size;
        let py = (self.next_slot / tiles_per_row) * self.config.tile_size;
        image::imageops::overlay(&mut self.atlas_image, &tile, px as i64, py as i64);

        let idx = self.next_slot;
        self.tile_map.insert(name.to_string(), idx);
        self.next_slot += 1;
        Ok(idx)
    }

    /// Inset UV rectangle of a tile placed so far.
    pub fn tile_rect(&self, tile_index: u32) -> UvRect {
        tile_rect_inset(&self.config, tile_index)
    }

    /// Slots used so far.
    pub fn used_slots(&self) -> u32 {
        self.next_slot
    }

    /// Generates the mip chain and returns the finished atlas.
    pub fn build(self) -> TextureAtlas {
        let mip_count = self.config.atlas_size.ilog2() as usize + 1;
        let mut mip_chain = Vec::with_capacity(mip_count);
        mip_chain.push(self.atlas_image);
        for level in 1..mip_count {
            let prev = &mip_chain[level - 1];
            let w = (prev.width() / 2).max(1);
            let h = (prev.height() / 2).max(1);
            let next = image::imageops::resize(prev, w, h, FilterType::Triangle);
            mip_chain.push(next);
        }
        TextureAtlas {
            config: self.config,
            mip_chain,
            tile_map: self.tile_map,
        }
    }
}

// ---------------------------------------------------------------------------
// Texture arrays
// ---------------------------------------------------------------------------

/// Equal-size texture layers addressed by a per-vertex layer index.
#[derive(Clone, Debug, Default)]
pub struct TextureArray {
    /// Layer images, all the same size.
    pub layers: Vec<RgbaImage>,
    /// Texture name → layer index.
    pub layer_map: HashMap<String, u32>,
}

impl TextureArray {
    /// Layer index of a texture name.
    pub fn layer_index(&self, name: &str) -> Option<u32> {
        self.layer_map.get(name).copied()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layers exist.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Accumulates layers into a [`TextureArray`].
#[derive(Default)]
pub struct TextureArrayBuilder {
    array: TextureArray,
}

impl TextureArrayBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer. Every layer must match the first layer's size.
    /// A name already added returns its existing layer index.
    pub fn add(&mut self, name: &str, img: RgbaImage) -> Result<u32, LibraryError> {
        if let Some(idx) = self.array.layer_index(name) {
            return Ok(idx);
        }
        if let Some(first) = self.array.layers.first()
            && first.dimensions() != img.dimensions()
        {
            return Err(LibraryError::LayerSizeMismatch {
                name: name.to_string(),
                expected: first.dimensions(),
                actual: img.dimensions(),
            });
        }
        let idx = self.array.layers.len() as u32;
        self.array.layers.push(img);
        self.array.layer_map.insert(name.to_string(), idx);
        Ok(idx)
    }

    /// Appends a layer resized to `size × size`.
    pub fn add_fitted(&mut self, name: &str, img: &RgbaImage, size: u32) -> Result<u32, LibraryError> {
        if let Some(idx) = self.array.layer_index(name) {
            return Ok(idx);
        }
        self.add(name, fit_tile(img, size))
    }

    /// Returns the finished array.
    pub fn build(self) -> TextureArray {
        self.array
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(color: [u8; 4], size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, image::Rgba(color))
    }

    #[test]
    fn test_config_validation() {
        assert!(AtlasConfig::default().validate().is_ok());
        let bad = AtlasConfig {
            atlas_size: 300,
            tile_size: 16,
        };
        assert!(matches!(bad.validate(), Err(LibraryError::InvalidConfig(_))));
        let too_big = AtlasConfig {
            atlas_size: 16,
            tile_size: 32,
        };
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn test_duplicate_texture_is_deduplicated() {
        let mut builder = AtlasBuilder::new(AtlasConfig::default()).unwrap();
        let a = builder.add("stone", &tile([1, 2, 3, 255], 16)).unwrap();
        let b = builder.add("stone", &tile([9, 9, 9, 255], 16)).unwrap();
        assert_eq!(a, b);
        assert_eq!(builder.used_slots(), 1);
    }

    #[test]
    fn test_atlas_full() {
        let config = AtlasConfig {
            atlas_size: 32,
            tile_size: 16,
        };
        let mut builder = AtlasBuilder::new(config).unwrap();
        for i in 0..4 {
            builder.add(&format!("t{i}"), &tile([0; 4], 16)).unwrap();
        }
        assert!(matches!(
            builder.add("t4", &tile([0; 4], 16)),
            Err(LibraryError::AtlasFull { max: 4 })
        ));
    }

    #[test]
    fn test_tiles_land_in_grid_and_resize() {
        let config = AtlasConfig {
            atlas_size: 32,
            tile_size: 16,
        };
        let mut builder = AtlasBuilder::new(config).unwrap();
        builder.add("a", &tile([255, 0, 0, 255], 16)).unwrap();
        builder.add("b", &tile([0, 255, 0, 255], 4)).unwrap();
        let atlas = builder.build();
        assert_eq!(atlas.image().get_pixel(8, 8).0, [255, 0, 0, 255]);
        assert_eq!(atlas.image().get_pixel(24, 8).0, [0, 255, 0, 255]);
        assert_eq!(atlas.mip_chain.len(), 6);
        assert_eq!(atlas.mip_chain.last().unwrap().dimensions(), (1, 1));
    }

    #[test]
    fn test_tile_rect_inset_and_disjoint() {
        let config = AtlasConfig {
            atlas_size: 32,
            tile_size: 16,
        };
        let mut builder = AtlasBuilder::new(config).unwrap();
        builder.add("a", &tile([0; 4], 16)).unwrap();
        builder.add("b", &tile([0; 4], 16)).unwrap();
        let a = builder.tile_rect(0);
        let b = builder.tile_rect(1);
        let half = 0.5 / 32.0;
        assert!((a.min.x - half).abs() < 1e-6);
        assert!((a.max.x - (0.5 - half)).abs() < 1e-6);
        assert!(a.max.x < b.min.x);
    }

    #[test]
    fn test_transform_uv_scaled_maps_corners() {
        let rect = UvRect {
            min: Vec2::new(0.25, 0.5),
            max: Vec2::new(0.5, 0.75),
        };
        assert_eq!(rect.transform_uv([0.0, 0.0]), [0.25, 0.5]);
        assert_eq!(rect.transform_uv_scaled([3.0, 2.0], 3.0, 2.0), [0.5, 0.75]);
    }

    #[test]
    fn test_texture_array_rejects_mismatched_layers() {
        let mut builder = TextureArrayBuilder::new();
        assert_eq!(builder.add("a", tile([0; 4], 16)).unwrap(), 0);
        assert_eq!(builder.add("a", tile([0; 4], 8)).unwrap(), 0);
        assert!(matches!(
            builder.add("b", tile([0; 4], 8)),
            Err(LibraryError::LayerSizeMismatch { .. })
        ));
        assert_eq!(builder.add_fitted("c", &tile([0; 4], 8), 16).unwrap(), 1);
        assert_eq!(builder.build().len(), 2);
    }
}
