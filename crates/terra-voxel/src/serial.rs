//! Flat binary encoding of a [`VoxelBuffer`]'s generated data.
//!
//! Only the channels a generator produces (material and density) are
//! stored; light and occlusion are rebuilt by the lighting job.
//!
//! ## Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `"TVXB"` |
//! | 4 | 1 | Format version (`u8`, currently 1) |
//! | 5 | 6 | Dimensions (3 × `u16`, little-endian) |
//! | 11 | 1 | Material tag (0 = uniform, 1 = dense) |
//! | 12 | 2 or V×2 | Material ids |
//! | .. | 1 | Density tag (0 = absent, 1 = uniform, 2 = dense) |
//! | .. | 0, 4 or V×4 | Density samples (`f32`, little-endian) |

use crate::buffer::{Channel, VoxelBuffer};
use crate::coords::ChunkDims;
use crate::error::VoxelError;
use crate::voxel::MaterialId;

/// Magic bytes identifying the format.
const MAGIC: [u8; 4] = *b"TVXB";

/// Current format version.
const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = 4 + 1 + 6;

impl VoxelBuffer {
    /// Encodes the material and density channels.
    pub fn encode(&self) -> Vec<u8> {
        let dims = self.dims();
        let mut buf = Vec::with_capacity(HEADER_LEN + 2 + dims.volume() * 2);

        buf.extend_from_slice(&MAGIC);
        buf.push(FORMAT_VERSION);
        for axis in dims.as_array() {
            buf.extend_from_slice(&(axis as u16).to_le_bytes());
        }

        match self.material_channel() {
            Channel::Uniform(m) => {
                buf.push(0);
                buf.extend_from_slice(&m.0.to_le_bytes());
            }
            Channel::Dense(values) => {
                buf.push(1);
                for m in values {
                    buf.extend_from_slice(&m.0.to_le_bytes());
                }
            }
        }

        match self.density_channel() {
            None => buf.push(0),
            Some(Channel::Uniform(d)) => {
                buf.push(1);
                buf.extend_from_slice(&d.to_le_bytes());
            }
            Some(Channel::Dense(values)) => {
                buf.push(2);
                for d in values {
                    buf.extend_from_slice(&d.to_le_bytes());
                }
            }
        }

        buf
    }

    /// Decodes a buffer produced by [`Self::encode`].
    pub fn decode(data: &[u8]) -> Result<Self, VoxelError> {
        if data.len() < 4 || data[0..4] != MAGIC {
            return Err(VoxelError::InvalidMagic);
        }
        let mut reader = Reader { data, pos: 4 };

        let version = reader.u8()?;
        if version != FORMAT_VERSION {
            return Err(VoxelError::UnsupportedVersion(version));
        }

        let dx = reader.u16()? as usize;
        let dy = reader.u16()? as usize;
        let dz = reader.u16()? as usize;
        let dims = ChunkDims::new(dx, dy, dz)?;
        let volume = dims.volume();

        let mut buffer = VoxelBuffer::new(dims);
        let material = match reader.u8()? {
            0 => Channel::Uniform(MaterialId(reader.u16()?)),
            _ => {
                reader.require(volume * 2)?;
                let mut values = Vec::with_capacity(volume);
                for _ in 0..volume {
                    values.push(MaterialId(reader.u16()?));
                }
                Channel::Dense(values)
            }
        };
        buffer.replace_materials(material);

        let density = match reader.u8()? {
            0 => None,
            1 => Some(Channel::Uniform(reader.f32()?)),
            _ => {
                reader.require(volume * 4)?;
                let mut values = Vec::with_capacity(volume);
                for _ in 0..volume {
                    values.push(reader.f32()?);
                }
                Some(Channel::Dense(values))
            }
        };
        buffer.replace_density(density);

        buffer.validate()?;
        Ok(buffer)
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn require(&self, len: usize) -> Result<(), VoxelError> {
        let expected = self.pos + len;
        if self.data.len() < expected {
            return Err(VoxelError::Truncated {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], VoxelError> {
        self.require(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, VoxelError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, VoxelError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn f32(&mut self) -> Result<f32, VoxelError> {
        Ok(f32::from_le_bytes(self.take()?))
    }
}
