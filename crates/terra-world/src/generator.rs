//! Level generators fill a chunk's voxel buffer on a worker thread.

use noise::{NoiseFn, Simplex};
use terra_voxel::{ChannelKind, ChunkCoord, ChunkDims, MaterialId, VoxelBuffer, chunk_origin};

use crate::error::JobError;

/// Produces terrain for one chunk. Implementations must be pure functions of
/// their configuration and the coordinate.
pub trait LevelGenerator: Send + Sync {
    fn generate(&self, coord: ChunkCoord, dims: ChunkDims, buffer: &mut VoxelBuffer) -> Result<(), JobError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

// ---------------------------------------------------------------------------
// Flat
// ---------------------------------------------------------------------------

/// A horizontal band of one material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatLayer {
    pub material: MaterialId,
    pub thickness: u32,
}

/// Flat ground: everything below `floor_height` is solid, banded by
/// `layers` from the surface downward. The last layer extends forever.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatLevelGenerator {
    pub floor_height: i64,
    pub layers: Vec<FlatLayer>,
}

impl FlatLevelGenerator {
    pub fn new(floor_height: i64, layers: Vec<FlatLayer>) -> Self {
        Self { floor_height, layers }
    }

    /// Single material below `floor_height`.
    pub fn uniform(floor_height: i64, material: MaterialId) -> Self {
        Self::new(floor_height, vec![FlatLayer { material, thickness: 1 }])
    }

    /// Material at world height `y`.
    pub fn material_at(&self, y: i64) -> MaterialId {
        if y >= self.floor_height {
            return MaterialId::EMPTY;
        }
        let depth = self.floor_height - 1 - y;
        let mut top = 0i64;
        for layer in &self.layers {
            top += layer.thickness as i64;
            if depth < top {
                return layer.material;
            }
        }
        self.layers.last().map_or(MaterialId::EMPTY, |l| l.material)
    }
}

impl LevelGenerator for FlatLevelGenerator {
    fn generate(&self, coord: ChunkCoord, dims: ChunkDims, buffer: &mut VoxelBuffer) -> Result<(), JobError> {
        let (_, oy, _) = chunk_origin(coord, dims);
        // Runs of equal material become one box fill; a fully buried or
        // fully open chunk stays a uniform channel.
        let mut y = 0;
        while y < dims.y {
            let material = self.material_at(oy + y as i64);
            let mut end = y + 1;
            while end < dims.y && self.material_at(oy + end as i64) == material {
                end += 1;
            }
            if !material.is_empty() {
                buffer.channel_fill((0, y, 0), (dims.x, end, dims.z), material);
            }
            y = end;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "flat"
    }
}

// ---------------------------------------------------------------------------
// Noise
// ---------------------------------------------------------------------------

/// Multi-octave fBm parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightmapParams {
    pub seed: u64,
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    pub base_frequency: f64,
    /// Amplitude of the first octave, in voxels.
    pub amplitude: f64,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 0.01,
            amplitude: 12.0,
        }
    }
}

/// Materials used by [`NoiseLevelGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoisePalette {
    pub surface: MaterialId,
    pub subsurface: MaterialId,
    pub deep: MaterialId,
    /// Fills empty space below the sea level.
    pub liquid: Option<MaterialId>,
}

impl Default for NoisePalette {
    fn default() -> Self {
        Self {
            surface: MaterialId(3),
            subsurface: MaterialId(2),
            deep: MaterialId(1),
            liquid: None,
        }
    }
}

/// Rolling terrain from a simplex fBm heightmap. Writes a density field
/// (positive inside) alongside materials so isosurface meshers get smooth
/// input.
#[derive(Clone)]
pub struct NoiseLevelGenerator {
    noise: Simplex,
    params: HeightmapParams,
    base_height: f64,
    sea_level: i64,
    palette: NoisePalette,
}

impl std::fmt::Debug for NoiseLevelGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseLevelGenerator")
            .field("params", &self.params)
            .field("base_height", &self.base_height)
            .field("sea_level", &self.sea_level)
            .finish_non_exhaustive()
    }
}

impl NoiseLevelGenerator {
    pub fn new(params: HeightmapParams, base_height: f64) -> Self {
        Self {
            noise: Simplex::new(params.seed as u32),
            params,
            base_height,
            sea_level: i64::MIN,
            palette: NoisePalette::default(),
        }
    }

    /// Default parameters with `seed`.
    pub fn with_seed(seed: u64, base_height: f64) -> Self {
        Self::new(
            HeightmapParams {
                seed,
                ..Default::default()
            },
            base_height,
        )
    }

    pub fn with_palette(mut self, palette: NoisePalette) -> Self {
        self.palette = palette;
        self
    }

    /// Fills empty voxels below `sea_level` with the palette's liquid.
    pub fn with_sea_level(mut self, sea_level: i64) -> Self {
        self.sea_level = sea_level;
        self
    }

    pub fn params(&self) -> &HeightmapParams {
        &self.params
    }

    /// Surface height at a world column.
    pub fn sample_height(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;
        for _ in 0..self.params.octaves {
            total += self.noise.get([x * frequency, z * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }
        self.base_height + total
    }

    fn material_for_depth(&self, depth: f64) -> MaterialId {
        match depth {
            d if d < 1.0 => self.palette.surface,
            d if d < 4.0 => self.palette.subsurface,
            _ => self.palette.deep,
        }
    }
}

impl LevelGenerator for NoiseLevelGenerator {
    fn generate(&self, coord: ChunkCoord, dims: ChunkDims, buffer: &mut VoxelBuffer) -> Result<(), JobError> {
        let (ox, oy, oz) = chunk_origin(coord, dims);
        buffer.allocate(ChannelKind::Density);

        for z in 0..dims.z {
            for x in 0..dims.x {
                let height = self.sample_height((ox + x as i64) as f64 + 0.5, (oz + z as i64) as f64 + 0.5);
                for y in 0..dims.y {
                    let wy = oy + y as i64;
                    let depth = height - (wy as f64 + 0.5);
                    let density = depth.clamp(-1.0, 1.0) as f32;
                    if depth > 0.0 {
                        buffer.set_material(x, y, z, self.material_for_depth(depth))?;
                    } else if wy < self.sea_level
                        && let Some(liquid) = self.palette.liquid
                    {
                        buffer.set_material(x, y, z, liquid)?;
                    }
                    buffer.set_density(x, y, z, density)?;
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "noise"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layered() -> FlatLevelGenerator {
        FlatLevelGenerator::new(
            8,
            vec![
                FlatLayer { material: MaterialId(3), thickness: 1 },
                FlatLayer { material: MaterialId(2), thickness: 2 },
                FlatLayer { material: MaterialId(1), thickness: 1 },
            ],
        )
    }

    #[test]
    fn test_flat_layers_from_the_surface_down() {
        let generator = layered();
        assert_eq!(generator.material_at(8), MaterialId::EMPTY);
        assert_eq!(generator.material_at(7), MaterialId(3));
        assert_eq!(generator.material_at(6), MaterialId(2));
        assert_eq!(generator.material_at(5), MaterialId(2));
        assert_eq!(generator.material_at(4), MaterialId(1));
        assert_eq!(generator.material_at(-100), MaterialId(1));
    }

    #[test]
    fn test_flat_generates_per_chunk() {
        let generator = layered();
        let dims = ChunkDims::cubic(16);

        let mut ground = VoxelBuffer::new(dims);
        generator.generate(ChunkCoord::new(0, 0, 0), dims, &mut ground).unwrap();
        assert_eq!(ground.count_non_empty(), 16 * 16 * 8);
        assert_eq!(ground.material(3, 7, 3), MaterialId(3));
        assert_eq!(ground.material(3, 8, 3), MaterialId::EMPTY);

        let mut buried = VoxelBuffer::new(dims);
        generator.generate(ChunkCoord::new(0, -1, 0), dims, &mut buried).unwrap();
        assert!(buried.is_uniform_material());
        assert_eq!(buried.material(0, 0, 0), MaterialId(1));

        let mut sky = VoxelBuffer::new(dims);
        generator.generate(ChunkCoord::new(0, 1, 0), dims, &mut sky).unwrap();
        assert!(sky.is_empty());
    }

    #[test]
    fn test_noise_is_deterministic_and_consistent() {
        let a = NoiseLevelGenerator::with_seed(7, 8.0);
        let b = NoiseLevelGenerator::with_seed(7, 8.0);
        let dims = ChunkDims::cubic(16);
        let coord = ChunkCoord::new(2, 0, -1);
        let mut ba = VoxelBuffer::new(dims);
        let mut bb = VoxelBuffer::new(dims);
        a.generate(coord, dims, &mut ba).unwrap();
        b.generate(coord, dims, &mut bb).unwrap();
        assert_eq!(ba, bb);
        assert!(ba.validate().is_ok());

        // Density sign matches occupancy everywhere.
        for i in 0..dims.volume() {
            let solid = !ba.material_at(i).is_empty();
            assert_eq!(ba.density_at(i) > 0.0, solid, "voxel {i}");
        }
    }

    #[test]
    fn test_noise_heights_stay_within_amplitude() {
        let generator = NoiseLevelGenerator::with_seed(1, 0.0);
        let params = generator.params().clone();
        let max: f64 = (0..params.octaves)
            .map(|i| params.amplitude * params.persistence.powi(i as i32))
            .sum();
        for i in 0..200 {
            let h = generator.sample_height(i as f64 * 3.7, i as f64 * -1.3);
            assert!(h.abs() <= max);
        }
    }

    #[test]
    fn test_noise_fills_sea() {
        let generator = NoiseLevelGenerator::with_seed(3, -40.0)
            .with_palette(NoisePalette {
                liquid: Some(MaterialId(9)),
                ..Default::default()
            })
            .with_sea_level(0);
        let dims = ChunkDims::cubic(8);
        let mut buffer = VoxelBuffer::new(dims);
        generator.generate(ChunkCoord::new(0, -1, 0), dims, &mut buffer).unwrap();
        assert_eq!(buffer.material(4, 7, 4), MaterialId(9));
        let mut above = VoxelBuffer::new(dims);
        generator.generate(ChunkCoord::new(0, 0, 0), dims, &mut above).unwrap();
        assert!(above.is_empty());
    }
}
