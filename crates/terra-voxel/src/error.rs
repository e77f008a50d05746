//! Voxel storage error types.

use thiserror::Error;

use crate::buffer::ChannelKind;

/// Errors produced by voxel buffers, dimensions and the flat encoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VoxelError {
    /// A local coordinate fell outside the buffer dimensions.
    #[error("local coordinate ({x}, {y}, {z}) outside {dims_x}x{dims_y}x{dims_z}")]
    OutOfRange {
        /// Local X.
        x: usize,
        /// Local Y.
        y: usize,
        /// Local Z.
        z: usize,
        /// Buffer width.
        dims_x: usize,
        /// Buffer height.
        dims_y: usize,
        /// Buffer depth.
        dims_z: usize,
    },

    /// Chunk dimensions must be at least 2 voxels along every axis.
    #[error("invalid chunk dimensions {0}x{1}x{2}")]
    InvalidDimensions(usize, usize, usize),

    /// A write targeted a channel that has not been allocated.
    #[error("channel {0:?} is not allocated")]
    ChannelMissing(ChannelKind),

    /// A dense channel does not hold exactly one value per voxel.
    #[error("channel {kind:?} holds {actual} values, expected {expected}")]
    ChannelLength {
        /// Offending channel.
        kind: ChannelKind,
        /// Voxel count of the buffer.
        expected: usize,
        /// Values actually stored.
        actual: usize,
    },

    /// A density sample is NaN or infinite.
    #[error("non-finite density at index {0}")]
    NonFiniteDensity(usize),

    /// Encoded data does not start with the expected magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,

    /// Encoded data carries an unknown format version.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// Encoded data is shorter than its header announces.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
}
