//! Channelled voxel storage for a single chunk.
//!
//! A [`VoxelBuffer`] always carries a material channel. Density, liquid
//! level, light and ambient occlusion channels are optional and allocated on
//! demand by the jobs that produce them. Every channel starts out
//! [`Channel::Uniform`] and only expands to one value per voxel when a write
//! makes it non-uniform, so empty and solid chunks cost a handful of bytes.
//!
//! Out-of-range reads return the channel's neutral value with a warning log;
//! out-of-range writes fail with [`VoxelError::OutOfRange`].

use serde::{Deserialize, Serialize};

use crate::coords::ChunkDims;
use crate::error::VoxelError;
use crate::voxel::{LightColor, MaterialId};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Identifies one data channel of a [`VoxelBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Material id per voxel.
    Material,
    /// Signed density (positive inside) for isosurface meshers.
    Density,
    /// Liquid fill level, 255 = full block.
    LiquidLevel,
    /// Baked RGB light.
    Light,
    /// Ambient occlusion, 0 = unoccluded.
    Ao,
    /// Noise-driven random ambient occlusion.
    RandomAo,
}

impl ChannelKind {
    /// Every optional channel, in storage order.
    pub const OPTIONAL: [ChannelKind; 5] = [
        Self::Density,
        Self::LiquidLevel,
        Self::Light,
        Self::Ao,
        Self::RandomAo,
    ];
}

/// Storage for a single channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Channel<T> {
    /// Every voxel holds the same value.
    Uniform(T),
    /// One value per voxel, indexed by [`ChunkDims::index`].
    Dense(Vec<T>),
}

impl<T: Copy + PartialEq> Channel<T> {
    /// Reads the value at a linear index.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        match self {
            Self::Uniform(value) => *value,
            Self::Dense(values) => values[index],
        }
    }

    /// Writes the value at a linear index, expanding a uniform channel when
    /// the new value differs.
    pub fn set(&mut self, index: usize, value: T, volume: usize) {
        match self {
            Self::Uniform(current) => {
                if *current == value {
                    return;
                }
                let mut values = vec![*current; volume];
                values[index] = value;
                *self = Self::Dense(values);
            }
            Self::Dense(values) => values[index] = value,
        }
    }

    /// Resets the channel to a single value in O(1).
    pub fn fill(&mut self, value: T) {
        *self = Self::Uniform(value);
    }

    /// Collapses a dense channel whose values are all equal. Returns `true`
    /// if the channel was collapsed.
    pub fn compress(&mut self) -> bool {
        let collapsed = match self {
            Self::Dense(values) => match values.first() {
                Some(first) if values.iter().all(|v| v == first) => Some(*first),
                _ => None,
            },
            Self::Uniform(_) => None,
        };
        match collapsed {
            Some(value) => {
                *self = Self::Uniform(value);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if every voxel holds the same value.
    pub fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform(_))
    }

    fn stored_len(&self) -> Option<usize> {
        match self {
            Self::Uniform(_) => None,
            Self::Dense(values) => Some(values.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// VoxelBuffer
// ---------------------------------------------------------------------------

/// Dense voxel data for one chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoxelBuffer {
    dims: ChunkDims,
    material: Channel<MaterialId>,
    density: Option<Channel<f32>>,
    liquid_level: Option<Channel<u8>>,
    light: Option<Channel<LightColor>>,
    ao: Option<Channel<u8>>,
    random_ao: Option<Channel<u8>>,
}

impl VoxelBuffer {
    /// Creates an empty buffer with only the material channel allocated.
    pub fn new(dims: ChunkDims) -> Self {
        Self::filled(dims, MaterialId::EMPTY)
    }

    /// Creates a buffer where every voxel holds `material`.
    pub fn filled(dims: ChunkDims, material: MaterialId) -> Self {
        Self {
            dims,
            material: Channel::Uniform(material),
            density: None,
            liquid_level: None,
            light: None,
            ao: None,
            random_ao: None,
        }
    }

    /// Voxel dimensions of the buffer.
    pub fn dims(&self) -> ChunkDims {
        self.dims
    }

    fn checked_index(&self, x: usize, y: usize, z: usize) -> Result<usize, VoxelError> {
        if x < self.dims.x && y < self.dims.y && z < self.dims.z {
            Ok(self.dims.index(x, y, z))
        } else {
            Err(VoxelError::OutOfRange {
                x,
                y,
                z,
                dims_x: self.dims.x,
                dims_y: self.dims.y,
                dims_z: self.dims.z,
            })
        }
    }

    fn read_index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        match self.checked_index(x, y, z) {
            Ok(index) => Some(index),
            Err(err) => {
                tracing::warn!("VoxelBuffer read {err}");
                None
            }
        }
    }

    // -- channel management --

    /// Returns `true` if the channel is allocated.
    pub fn has(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Material => true,
            ChannelKind::Density => self.density.is_some(),
            ChannelKind::LiquidLevel => self.liquid_level.is_some(),
            ChannelKind::Light => self.light.is_some(),
            ChannelKind::Ao => self.ao.is_some(),
            ChannelKind::RandomAo => self.random_ao.is_some(),
        }
    }

    /// Allocates an optional channel with its neutral value. Density is
    /// seeded from the current occupancy so that allocating it never moves
    /// an isosurface. Allocating an existing channel is a no-op.
    pub fn allocate(&mut self, kind: ChannelKind) {
        match kind {
            ChannelKind::Material => {}
            ChannelKind::Density => {
                if self.density.is_none() {
                    let density = match &self.material {
                        Channel::Uniform(m) => Channel::Uniform(occupancy_density(*m)),
                        Channel::Dense(values) => {
                            Channel::Dense(values.iter().map(|m| occupancy_density(*m)).collect())
                        }
                    };
                    self.density = Some(density);
                }
            }
            ChannelKind::LiquidLevel => {
                self.liquid_level.get_or_insert(Channel::Uniform(u8::MAX));
            }
            ChannelKind::Light => {
                self.light.get_or_insert(Channel::Uniform(LightColor::BLACK));
            }
            ChannelKind::Ao => {
                self.ao.get_or_insert(Channel::Uniform(0));
            }
            ChannelKind::RandomAo => {
                self.random_ao.get_or_insert(Channel::Uniform(0));
            }
        }
    }

    /// Drops an optional channel. The material channel cannot be removed.
    pub fn remove(&mut self, kind: ChannelKind) {
        match kind {
            ChannelKind::Material => {}
            ChannelKind::Density => self.density = None,
            ChannelKind::LiquidLevel => self.liquid_level = None,
            ChannelKind::Light => self.light = None,
            ChannelKind::Ao => self.ao = None,
            ChannelKind::RandomAo => self.random_ao = None,
        }
    }

    /// Collapses every uniform dense channel. Returns how many collapsed.
    pub fn compress(&mut self) -> usize {
        let mut collapsed = self.material.compress() as usize;
        if let Some(c) = &mut self.density {
            collapsed += c.compress() as usize;
        }
        if let Some(c) = &mut self.liquid_level {
            collapsed += c.compress() as usize;
        }
        if let Some(c) = &mut self.light {
            collapsed += c.compress() as usize;
        }
        if let Some(c) = &mut self.ao {
            collapsed += c.compress() as usize;
        }
        if let Some(c) = &mut self.random_ao {
            collapsed += c.compress() as usize;
        }
        collapsed
    }

    // -- material --

    /// Material at a local coordinate. Out of range reads as empty.
    pub fn material(&self, x: usize, y: usize, z: usize) -> MaterialId {
        self.read_index(x, y, z)
            .map_or(MaterialId::EMPTY, |i| self.material.get(i))
    }

    /// Material at a linear index.
    #[inline]
    pub fn material_at(&self, index: usize) -> MaterialId {
        self.material.get(index)
    }

    /// Writes a material. Keeps an allocated density channel in step with
    /// the new occupancy.
    pub fn set_material(
        &mut self,
        x: usize,
        y: usize,
        z: usize,
        material: MaterialId,
    ) -> Result<(), VoxelError> {
        let index = self.checked_index(x, y, z)?;
        self.set_material_at(index, material);
        Ok(())
    }

    /// [`Self::set_material`] by linear index; `index` must be below the
    /// volume.
    pub fn set_material_at(&mut self, index: usize, material: MaterialId) {
        let volume = self.dims.volume();
        self.material.set(index, material, volume);
        if let Some(density) = &mut self.density {
            let current = density.get(index);
            if (current > 0.0) != !material.is_empty() {
                density.set(index, occupancy_density(material), volume);
            }
        }
    }

    /// Fills the whole material channel in O(1).
    pub fn fill_material(&mut self, material: MaterialId) {
        self.material.fill(material);
        if let Some(density) = &mut self.density {
            density.fill(occupancy_density(material));
        }
    }

    /// Writes `material` into the half-open box `min..max` (clamped to the
    /// buffer).
    pub fn channel_fill(
        &mut self,
        min: (usize, usize, usize),
        max: (usize, usize, usize),
        material: MaterialId,
    ) {
        let max = (
            max.0.min(self.dims.x),
            max.1.min(self.dims.y),
            max.2.min(self.dims.z),
        );
        if min.0 == 0
            && min.1 == 0
            && min.2 == 0
            && max == (self.dims.x, self.dims.y, self.dims.z)
        {
            self.fill_material(material);
            return;
        }
        for z in min.2..max.2 {
            for y in min.1..max.1 {
                for x in min.0..max.0 {
                    self.set_material_at(self.dims.index(x, y, z), material);
                }
            }
        }
    }

    /// Returns `true` if every voxel holds the same material.
    pub fn is_uniform_material(&self) -> bool {
        match &self.material {
            Channel::Uniform(_) => true,
            Channel::Dense(values) => values.windows(2).all(|w| w[0] == w[1]),
        }
    }

    /// Returns `true` if no voxel holds a material.
    pub fn is_empty(&self) -> bool {
        match &self.material {
            Channel::Uniform(m) => m.is_empty(),
            Channel::Dense(values) => values.iter().all(|m| m.is_empty()),
        }
    }

    /// Number of non-empty voxels.
    pub fn count_non_empty(&self) -> usize {
        match &self.material {
            Channel::Uniform(m) if m.is_empty() => 0,
            Channel::Uniform(_) => self.dims.volume(),
            Channel::Dense(values) => values.iter().filter(|m| !m.is_empty()).count(),
        }
    }

    /// Flat copy of the material channel (x fastest).
    pub fn materials_dump(&self) -> Vec<u16> {
        (0..self.dims.volume())
            .map(|i| self.material.get(i).0)
            .collect()
    }

    // -- density --

    /// Density at a local coordinate. Without a density channel the value is
    /// derived from occupancy: `+1.0` inside, `-1.0` outside.
    pub fn density(&self, x: usize, y: usize, z: usize) -> f32 {
        match self.read_index(x, y, z) {
            Some(index) => self.density_at(index),
            None => -1.0,
        }
    }

    /// Density at a linear index.
    #[inline]
    pub fn density_at(&self, index: usize) -> f32 {
        match &self.density {
            Some(channel) => channel.get(index),
            None => occupancy_density(self.material.get(index)),
        }
    }

    /// Writes a density sample, allocating the channel when needed.
    pub fn set_density(&mut self, x: usize, y: usize, z: usize, value: f32) -> Result<(), VoxelError> {
        let index = self.checked_index(x, y, z)?;
        self.set_density_at(index, value);
        Ok(())
    }

    /// [`Self::set_density`] by linear index.
    pub fn set_density_at(&mut self, index: usize, value: f32) {
        self.allocate(ChannelKind::Density);
        let volume = self.dims.volume();
        if let Some(density) = &mut self.density {
            density.set(index, value, volume);
        }
    }

    // -- liquid level --

    /// Liquid fill level, 255 when the channel is absent.
    pub fn liquid_level(&self, x: usize, y: usize, z: usize) -> u8 {
        match (&self.liquid_level, self.read_index(x, y, z)) {
            (Some(channel), Some(index)) => channel.get(index),
            _ => u8::MAX,
        }
    }

    /// Writes a liquid fill level, allocating the channel when needed.
    pub fn set_liquid_level(&mut self, x: usize, y: usize, z: usize, level: u8) -> Result<(), VoxelError> {
        let index = self.checked_index(x, y, z)?;
        self.allocate(ChannelKind::LiquidLevel);
        let volume = self.dims.volume();
        if let Some(channel) = &mut self.liquid_level {
            channel.set(index, level, volume);
        }
        Ok(())
    }

    // -- light --

    /// Baked light, white when no light channel exists (unlit chunks render
    /// at full brightness).
    pub fn light(&self, x: usize, y: usize, z: usize) -> LightColor {
        match (&self.light, self.read_index(x, y, z)) {
            (Some(channel), Some(index)) => channel.get(index),
            (None, _) => LightColor::WHITE,
            (Some(_), None) => LightColor::BLACK,
        }
    }

    /// Light at a linear index.
    #[inline]
    pub fn light_at(&self, index: usize) -> LightColor {
        match &self.light {
            Some(channel) => channel.get(index),
            None => LightColor::WHITE,
        }
    }

    /// Writes baked light. The light channel must be allocated.
    pub fn set_light(&mut self, x: usize, y: usize, z: usize, color: LightColor) -> Result<(), VoxelError> {
        let index = self.checked_index(x, y, z)?;
        let volume = self.dims.volume();
        let channel = self
            .light
            .as_mut()
            .ok_or(VoxelError::ChannelMissing(ChannelKind::Light))?;
        channel.set(index, color, volume);
        Ok(())
    }

    /// Writes baked light by linear index, allocating the channel when
    /// needed.
    pub fn set_light_at(&mut self, index: usize, color: LightColor) {
        self.allocate(ChannelKind::Light);
        let volume = self.dims.volume();
        if let Some(channel) = &mut self.light {
            channel.set(index, color, volume);
        }
    }

    /// Resets the light channel (allocating it) to `color`.
    pub fn fill_light(&mut self, color: LightColor) {
        self.light = Some(Channel::Uniform(color));
    }

    // -- ambient occlusion --

    /// Ambient occlusion, 0 when the channel is absent.
    pub fn ao(&self, x: usize, y: usize, z: usize) -> u8 {
        match (&self.ao, self.read_index(x, y, z)) {
            (Some(channel), Some(index)) => channel.get(index),
            _ => 0,
        }
    }

    /// Writes ambient occlusion, allocating the channel when needed.
    pub fn set_ao(&mut self, x: usize, y: usize, z: usize, value: u8) -> Result<(), VoxelError> {
        let index = self.checked_index(x, y, z)?;
        self.set_ao_at(index, value);
        Ok(())
    }

    /// [`Self::set_ao`] by linear index.
    pub fn set_ao_at(&mut self, index: usize, value: u8) {
        self.allocate(ChannelKind::Ao);
        let volume = self.dims.volume();
        if let Some(channel) = &mut self.ao {
            channel.set(index, value, volume);
        }
    }

    /// Random ambient occlusion, 0 when the channel is absent.
    pub fn random_ao(&self, x: usize, y: usize, z: usize) -> u8 {
        match (&self.random_ao, self.read_index(x, y, z)) {
            (Some(channel), Some(index)) => channel.get(index),
            _ => 0,
        }
    }

    /// Writes random ambient occlusion, allocating the channel when needed.
    pub fn set_random_ao(&mut self, x: usize, y: usize, z: usize, value: u8) -> Result<(), VoxelError> {
        let index = self.checked_index(x, y, z)?;
        self.set_random_ao_at(index, value);
        Ok(())
    }

    /// [`Self::set_random_ao`] by linear index.
    pub fn set_random_ao_at(&mut self, index: usize, value: u8) {
        self.allocate(ChannelKind::RandomAo);
        let volume = self.dims.volume();
        if let Some(channel) = &mut self.random_ao {
            channel.set(index, value, volume);
        }
    }

    /// Combined occlusion `ao + random_ao`, saturating.
    pub fn total_ao(&self, x: usize, y: usize, z: usize) -> u8 {
        self.ao(x, y, z).saturating_add(self.random_ao(x, y, z))
    }

    // -- validation --

    /// Checks that every dense channel holds one value per voxel and that
    /// density samples are finite.
    pub fn validate(&self) -> Result<(), VoxelError> {
        let expected = self.dims.volume();
        let check = |kind: ChannelKind, len: Option<usize>| match len {
            Some(actual) if actual != expected => Err(VoxelError::ChannelLength {
                kind,
                expected,
                actual,
            }),
            _ => Ok(()),
        };
        check(ChannelKind::Material, self.material.stored_len())?;
        check(
            ChannelKind::Density,
            self.density.as_ref().and_then(Channel::stored_len),
        )?;
        check(
            ChannelKind::LiquidLevel,
            self.liquid_level.as_ref().and_then(Channel::stored_len),
        )?;
        check(
            ChannelKind::Light,
            self.light.as_ref().and_then(Channel::stored_len),
        )?;
        check(ChannelKind::Ao, self.ao.as_ref().and_then(Channel::stored_len))?;
        check(
            ChannelKind::RandomAo,
            self.random_ao.as_ref().and_then(Channel::stored_len),
        )?;

        match &self.density {
            Some(Channel::Uniform(v)) if !v.is_finite() => Err(VoxelError::NonFiniteDensity(0)),
            Some(Channel::Dense(values)) => match values.iter().position(|v| !v.is_finite()) {
                Some(index) => Err(VoxelError::NonFiniteDensity(index)),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    pub(crate) fn material_channel(&self) -> &Channel<MaterialId> {
        &self.material
    }

    pub(crate) fn density_channel(&self) -> Option<&Channel<f32>> {
        self.density.as_ref()
    }

    pub(crate) fn replace_density(&mut self, density: Option<Channel<f32>>) {
        self.density = density;
    }

    pub(crate) fn replace_materials(&mut self, material: Channel<MaterialId>) {
        self.material = material;
    }
}

/// Density implied by occupancy alone.
#[inline]
pub fn occupancy_density(material: MaterialId) -> f32 {
    if material.is_empty() { -1.0 } else { 1.0 }
}
