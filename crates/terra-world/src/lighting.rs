//! Per-chunk light and occlusion baking.
//!
//! Light levels run 0–15 and spread by flood fill with a decay of one level
//! per step, blocked by opaque voxels. Sunlight enters every column from
//! the chunk's top face and falls until it meets an opaque voxel; block
//! light starts at emissive materials. The brighter of the two is stored in
//! the buffer's light channel, scaled to 0–255, and baked point lights are
//! added on top.

use std::collections::VecDeque;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use terra_library::MaterialLibrary;
use terra_voxel::{ChannelKind, ChunkCoord, ChunkDims, LightColor, VoxelBuffer, chunk_origin};

use crate::seed::chunk_rng;

/// Highest light level.
pub const MAX_LIGHT_LEVEL: u8 = 15;

const RANDOM_AO_STREAM: u64 = 2;

/// The six axis-aligned neighbour offsets.
const NEIGHBORS_6: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Lighting switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub enabled: bool,
    pub ambient_occlusion: bool,
    pub random_ao: bool,
    pub bake_lights: bool,
    pub sunlight: bool,
    /// Occlusion darkening scale, 0–1.
    pub ao_strength: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ambient_occlusion: true,
            random_ao: true,
            bake_lights: true,
            sunlight: true,
            ao_strength: 0.25,
        }
    }
}

/// A point light baked into the light channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldLight {
    /// Centre in world voxel units.
    pub position: Vec3,
    pub color: LightColor,
    /// Radius of influence in voxels.
    pub size: f32,
}

/// Identifier returned by [`crate::World::add_light`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u64);

impl WorldLight {
    /// Returns `true` if the light reaches into the chunk.
    pub fn reaches(&self, coord: ChunkCoord, dims: ChunkDims) -> bool {
        let (ox, oy, oz) = chunk_origin(coord, dims);
        let min = Vec3::new(ox as f32, oy as f32, oz as f32);
        let max = min + Vec3::new(dims.x as f32, dims.y as f32, dims.z as f32);
        let closest = self.position.clamp(min, max);
        closest.distance_squared(self.position) < self.size * self.size
    }
}

/// Channel value for a light level.
pub fn level_to_channel(level: u8) -> u8 {
    level.min(MAX_LIGHT_LEVEL) * 17
}

/// Returns a copy of `buffer` with light, occlusion and random occlusion
/// channels recomputed. With lighting disabled those channels are removed.
pub fn light_chunk(
    buffer: &VoxelBuffer,
    library: &MaterialLibrary,
    coord: ChunkCoord,
    lights: &[WorldLight],
    config: &LightingConfig,
    world_seed: u64,
) -> VoxelBuffer {
    let mut out = buffer.clone();
    out.remove(ChannelKind::Light);
    out.remove(ChannelKind::Ao);
    out.remove(ChannelKind::RandomAo);
    if !config.enabled {
        return out;
    }

    let dims = buffer.dims();
    let opaque: Vec<bool> = (0..dims.volume())
        .map(|i| {
            let m = buffer.material_at(i);
            !m.is_empty() && !library.is_transparent(m)
        })
        .collect();

    let mut sun = vec![0u8; dims.volume()];
    if config.sunlight {
        propagate_sunlight(dims, &opaque, &mut sun);
    }
    let mut block = vec![0u8; dims.volume()];
    let mut seeds = VecDeque::new();
    for (i, level) in block.iter_mut().enumerate() {
        let emission = library.light_emission(buffer.material_at(i));
        if emission > 0 {
            *level = emission.min(MAX_LIGHT_LEVEL);
            seeds.push_back(i);
        }
    }
    flood_fill(dims, &opaque, &mut block, seeds);

    let mut colors: Vec<LightColor> = sun
        .iter()
        .zip(&block)
        .map(|(&s, &b)| LightColor([level_to_channel(s.max(b)); 3]))
        .collect();
    if config.bake_lights {
        bake_point_lights(coord, dims, &opaque, lights, &mut colors);
    }
    if colors.iter().any(|c| *c != LightColor::BLACK) {
        out.allocate(ChannelKind::Light);
        for (i, color) in colors.into_iter().enumerate() {
            if color != LightColor::BLACK {
                out.set_light_at(i, color);
            }
        }
    }

    if config.ambient_occlusion {
        out.allocate(ChannelKind::Ao);
        for (i, _) in opaque.iter().enumerate().filter(|(_, o)| **o) {
            let (x, y, z) = dims.delinearize(i);
            let ao = voxel_occlusion(dims, &opaque, (x, y, z), config.ao_strength);
            if ao > 0 {
                out.set_ao_at(i, ao);
            }
        }
    }

    if config.random_ao {
        out.allocate(ChannelKind::RandomAo);
        let max = (config.ao_strength.clamp(0.0, 1.0) * 64.0) as u8;
        let mut rng = chunk_rng(world_seed, coord, RANDOM_AO_STREAM);
        for (i, _) in opaque.iter().enumerate().filter(|(_, o)| **o) {
            out.set_random_ao_at(i, rng.random_range(0..=max));
        }
    }
    out.compress();
    out
}

/// Seeds every open column top-down with full sunlight, then spreads it
/// sideways and into overhangs.
fn propagate_sunlight(dims: ChunkDims, opaque: &[bool], sun: &mut [u8]) {
    let mut seeds = VecDeque::new();
    for z in 0..dims.z {
        for x in 0..dims.x {
            for y in (0..dims.y).rev() {
                let i = dims.index(x, y, z);
                if opaque[i] {
                    break;
                }
                sun[i] = MAX_LIGHT_LEVEL;
                seeds.push_back(i);
            }
        }
    }
    flood_fill(dims, opaque, sun, seeds);
}

/// Breadth-first spread with a decay of one level per step.
fn flood_fill(dims: ChunkDims, opaque: &[bool], levels: &mut [u8], mut queue: VecDeque<usize>) {
    while let Some(i) = queue.pop_front() {
        let level = levels[i];
        if level <= 1 {
            continue;
        }
        let (x, y, z) = dims.delinearize(i);
        for (dx, dy, dz) in NEIGHBORS_6 {
            let (nx, ny, nz) = (x as i32 + dx, y as i32 + dy, z as i32 + dz);
            if !dims.contains(nx, ny, nz) {
                continue;
            }
            let n = dims.index(nx as usize, ny as usize, nz as usize);
            if opaque[n] || levels[n] >= level - 1 {
                continue;
            }
            levels[n] = level - 1;
            queue.push_back(n);
        }
    }
}

/// Adds each light's colour with linear falloff to the open voxels it
/// reaches.
fn bake_point_lights(
    coord: ChunkCoord,
    dims: ChunkDims,
    opaque: &[bool],
    lights: &[WorldLight],
    colors: &mut [LightColor],
) {
    let (ox, oy, oz) = chunk_origin(coord, dims);
    let origin = Vec3::new(ox as f32, oy as f32, oz as f32);
    for light in lights.iter().filter(|l| l.size > 0.0 && l.reaches(coord, dims)) {
        let local = light.position - origin;
        let lo = (local - Vec3::splat(light.size)).floor().max(Vec3::ZERO);
        let hi = (local + Vec3::splat(light.size))
            .ceil()
            .min(Vec3::new(dims.x as f32, dims.y as f32, dims.z as f32));
        for z in lo.z as usize..hi.z as usize {
            for y in lo.y as usize..hi.y as usize {
                for x in lo.x as usize..hi.x as usize {
                    let i = dims.index(x, y, z);
                    if opaque[i] {
                        continue;
                    }
                    let center = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5);
                    let falloff = 1.0 - center.distance(local) / light.size;
                    if falloff <= 0.0 {
                        continue;
                    }
                    let add = LightColor(light.color.0.map(|c| (c as f32 * falloff) as u8));
                    colors[i] = colors[i].saturating_add(add);
                }
            }
        }
    }
}

/// Occlusion of an opaque voxel from its opaque neighbours inside the chunk.
fn voxel_occlusion(dims: ChunkDims, opaque: &[bool], (x, y, z): (usize, usize, usize), strength: f32) -> u8 {
    let mut count = 0u32;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy, dz) == (0, 0, 0) {
                    continue;
                }
                let (nx, ny, nz) = (x as i32 + dx, y as i32 + dy, z as i32 + dz);
                if dims.contains(nx, ny, nz) && opaque[dims.index(nx as usize, ny as usize, nz as usize)] {
                    count += 1;
                }
            }
        }
    }
    (count as f32 / 26.0 * strength.clamp(0.0, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use terra_library::{LibraryKind, MaterialDef, MemoryTextures};
    use terra_voxel::MaterialId;

    fn library() -> MaterialLibrary {
        let mut lib = MaterialLibrary::new(LibraryKind::Simple);
        lib.register(MaterialDef::solid(1, "stone", "stone")).unwrap();
        lib.register(MaterialDef::solid(2, "lamp", "stone").with_emission(15))
            .unwrap();
        let tile = image::RgbaImage::from_pixel(4, 4, image::Rgba([9, 9, 9, 255]));
        lib.finalize(Arc::new(MemoryTextures::new().with("stone", tile)))
            .unwrap();
        lib
    }

    fn dark() -> LightingConfig {
        LightingConfig {
            sunlight: false,
            ambient_occlusion: false,
            random_ao: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_sky_is_fully_lit() {
        let lib = library();
        let buffer = VoxelBuffer::new(ChunkDims::cubic(8));
        let lit = light_chunk(&buffer, &lib, ChunkCoord::default(), &[], &LightingConfig::default(), 0);
        assert_eq!(lit.light(3, 0, 3), LightColor::WHITE);
        assert_eq!(lit.light(7, 7, 7), LightColor::WHITE);
    }

    #[test]
    fn test_sunlight_stops_at_ground_and_leaks_under_overhangs() {
        let lib = library();
        let mut buffer = VoxelBuffer::new(ChunkDims::cubic(8));
        // Roof at y = 6 with a hole above (0, 0).
        buffer.channel_fill((0, 6, 0), (8, 7, 8), MaterialId(1));
        buffer.set_material(0, 6, 0, MaterialId::EMPTY).unwrap();
        let lit = light_chunk(&buffer, &lib, ChunkCoord::default(), &[], &LightingConfig::default(), 0);

        assert_eq!(lit.light(0, 0, 0), LightColor::WHITE);
        assert_eq!(lit.light(1, 5, 0), LightColor([level_to_channel(14); 3]));
        assert_eq!(lit.light(2, 5, 0), LightColor([level_to_channel(13); 3]));
        assert_eq!(lit.light(4, 6, 4), LightColor::BLACK);
        assert_eq!(lit.light(4, 7, 4), LightColor::WHITE);
    }

    #[test]
    fn test_emissive_block_light_decays() {
        let lib = library();
        let mut buffer = VoxelBuffer::new(ChunkDims::cubic(8));
        buffer.set_material(4, 4, 4, MaterialId(2)).unwrap();
        let lit = light_chunk(&buffer, &lib, ChunkCoord::default(), &[], &dark(), 0);
        assert_eq!(lit.light(5, 4, 4), LightColor([level_to_channel(14); 3]));
        assert_eq!(lit.light(6, 4, 4), LightColor([level_to_channel(13); 3]));
        assert_eq!(lit.light(5, 5, 4), LightColor([level_to_channel(13); 3]));
    }

    #[test]
    fn test_point_lights_are_baked_with_falloff() {
        let lib = library();
        let buffer = VoxelBuffer::new(ChunkDims::cubic(8));
        let light = WorldLight {
            position: Vec3::new(12.5, 4.5, 4.5),
            color: LightColor([200, 0, 0]),
            size: 4.0,
        };
        let coord = ChunkCoord::new(1, 0, 0);
        assert!(light.reaches(coord, ChunkDims::cubic(8)));
        assert!(!light.reaches(ChunkCoord::new(3, 0, 0), ChunkDims::cubic(8)));

        let lit = light_chunk(&buffer, &lib, coord, &[light], &dark(), 0);
        assert_eq!(lit.light(4, 4, 4), LightColor([200, 0, 0]));
        let [r, g, _] = lit.light(5, 4, 4).0;
        assert_eq!(r, 150);
        assert_eq!(g, 0);
        assert_eq!(lit.light(0, 0, 0), LightColor::BLACK);
    }

    #[test]
    fn test_occlusion_of_buried_voxel() {
        let lib = library();
        let buffer = VoxelBuffer::filled(ChunkDims::cubic(4), MaterialId(1));
        let config = LightingConfig {
            random_ao: false,
            ..Default::default()
        };
        let lit = light_chunk(&buffer, &lib, ChunkCoord::default(), &[], &config, 0);
        assert_eq!(lit.ao(1, 1, 1), 63);
        assert!(lit.ao(0, 0, 0) < 63);
        assert!(!lit.has(ChannelKind::Light));
    }

    #[test]
    fn test_random_ao_is_seeded() {
        let lib = library();
        let buffer = VoxelBuffer::filled(ChunkDims::cubic(4), MaterialId(1));
        let config = LightingConfig::default();
        let a = light_chunk(&buffer, &lib, ChunkCoord::default(), &[], &config, 5);
        let b = light_chunk(&buffer, &lib, ChunkCoord::default(), &[], &config, 5);
        assert_eq!(a, b);
        assert!((0..4).all(|x| a.random_ao(x, 1, 1) <= 16));
    }

    #[test]
    fn test_disabled_lighting_removes_channels() {
        let lib = library();
        let buffer = VoxelBuffer::new(ChunkDims::cubic(4));
        let lit = light_chunk(&buffer, &lib, ChunkCoord::default(), &[], &LightingConfig::default(), 0);
        assert!(lit.has(ChannelKind::Light));
        let config = LightingConfig {
            enabled: false,
            ..Default::default()
        };
        let unlit = light_chunk(&lit, &lib, ChunkCoord::default(), &[], &config, 0);
        assert!(!unlit.has(ChannelKind::Light));
        assert!(!unlit.has(ChannelKind::Ao));
    }
}
