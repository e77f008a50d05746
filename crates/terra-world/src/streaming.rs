//! View-distance-driven chunk streaming with hysteresis and per-tick
//! budgets.
//!
//! Chunks within `load_radius` of the viewer are queued nearest-first;
//! chunks beyond `unload_radius` are released. The band between the two
//! radii keeps chunks at the edge from thrashing as the viewer moves.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use terra_voxel::{ChunkCoord, WorldBounds};

/// Streaming radii and budgets, in chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub load_radius: u32,
    /// Must exceed `load_radius`.
    pub unload_radius: u32,
    pub loads_per_tick: u32,
    pub unloads_per_tick: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 6,
            unload_radius: 8,
            loads_per_tick: 16,
            unloads_per_tick: 16,
        }
    }
}

/// Chunks awaiting load, nearest first.
#[derive(Debug, Default)]
pub struct LoadQueue {
    queue: BinaryHeap<Reverse<(u64, ChunkCoord)>>,
    pending: FxHashSet<ChunkCoord>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `coord`. Coordinates already queued are ignored.
    pub fn enqueue(&mut self, coord: ChunkCoord, distance_sq: u64) {
        if self.pending.insert(coord) {
            self.queue.push(Reverse((distance_sq, coord)));
        }
    }

    /// Pops the nearest queued coordinate.
    pub fn dequeue(&mut self) -> Option<(u64, ChunkCoord)> {
        while let Some(Reverse((distance_sq, coord))) = self.queue.pop() {
            if self.pending.remove(&coord) {
                return Some((distance_sq, coord));
            }
        }
        None
    }

    /// Drops a queued coordinate; its heap entry is skipped lazily.
    pub fn remove(&mut self, coord: ChunkCoord) -> bool {
        self.pending.remove(&coord)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }
}

/// Work decided by one streaming tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamPlan {
    /// Nearest first.
    pub loads: Vec<ChunkCoord>,
    /// Farthest first.
    pub unloads: Vec<ChunkCoord>,
}

/// Decides which chunks to load and unload around a moving viewer.
#[derive(Debug)]
pub struct ChunkStreamer {
    config: StreamingConfig,
    queue: LoadQueue,
    last_viewer: Option<ChunkCoord>,
}

impl ChunkStreamer {
    pub fn new(mut config: StreamingConfig) -> Self {
        if config.unload_radius <= config.load_radius {
            tracing::warn!(
                load_radius = config.load_radius,
                unload_radius = config.unload_radius,
                "unload radius must exceed load radius; widening"
            );
            config.unload_radius = config.load_radius + 1;
        }
        Self {
            config,
            queue: LoadQueue::new(),
            last_viewer: None,
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Chunks queued for loading but not yet handed out.
    pub fn pending_loads(&self) -> usize {
        self.queue.len()
    }

    /// Runs one tick for a viewer in chunk `viewer`.
    ///
    /// `loaded` lists the chunks currently in the world. Coordinates outside
    /// `bounds` are never queued.
    pub fn tick(&mut self, viewer: ChunkCoord, loaded: &FxHashSet<ChunkCoord>, bounds: &WorldBounds) -> StreamPlan {
        let mut plan = StreamPlan::default();

        // Distances in the queue are relative to the old position.
        if self.last_viewer != Some(viewer) {
            self.queue.clear();
            self.last_viewer = Some(viewer);
        }

        let lr = self.config.load_radius as i32;
        let lr_sq = u64::from(self.config.load_radius).pow(2);
        for dz in -lr..=lr {
            for dy in -lr..=lr {
                for dx in -lr..=lr {
                    let coord = viewer.offset(dx, dy, dz);
                    let distance_sq = coord.distance_sq(viewer);
                    if distance_sq > lr_sq || !bounds.contains(coord) || loaded.contains(&coord) {
                        continue;
                    }
                    self.queue.enqueue(coord, distance_sq);
                }
            }
        }

        while plan.loads.len() < self.config.loads_per_tick as usize {
            let Some((_, coord)) = self.queue.dequeue() else {
                break;
            };
            if !loaded.contains(&coord) {
                plan.loads.push(coord);
            }
        }

        let ur_sq = u64::from(self.config.unload_radius).pow(2);
        let mut far: Vec<(u64, ChunkCoord)> = loaded
            .iter()
            .map(|&c| (c.distance_sq(viewer), c))
            .filter(|&(d, _)| d > ur_sq)
            .collect();
        far.sort_unstable_by(|a, b| b.cmp(a));
        plan.unloads = far
            .into_iter()
            .take(self.config.unloads_per_tick as usize)
            .map(|(_, c)| c)
            .collect();

        if !plan.loads.is_empty() || !plan.unloads.is_empty() {
            tracing::debug!(
                viewer = %viewer,
                loads = plan.loads.len(),
                unloads = plan.unloads.len(),
                pending = self.queue.len(),
                "streaming tick"
            );
        }
        plan
    }
}
