//! Greedy face merging: combines coplanar, adjacent unit faces with equal
//! keys into larger rectangles.
//!
//! Merging works on the set of unit cells the input quads cover, so the
//! output depends only on that coverage and merging twice yields the same
//! quads as merging once.

use std::collections::BTreeMap;

use terra_voxel::FaceDirection;

/// An axis-aligned face rectangle in a sweep plane.
///
/// `layer` is the voxel coordinate along the face axis; `u`, `v`, `w`, `h`
/// span the plane along [`FaceDirection::sweep_axes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceQuad {
    /// Face orientation.
    pub direction: FaceDirection,
    /// Voxel coordinate along the face axis.
    pub layer: usize,
    /// Start along the u axis.
    pub u: usize,
    /// Start along the v axis.
    pub v: usize,
    /// Extent along the u axis.
    pub w: usize,
    /// Extent along the v axis.
    pub h: usize,
    /// Faces merge only with equal keys.
    pub key: u64,
}

impl FaceQuad {
    /// A single voxel face.
    pub fn unit(direction: FaceDirection, layer: usize, u: usize, v: usize, key: u64) -> Self {
        Self {
            direction,
            layer,
            u,
            v,
            w: 1,
            h: 1,
            key,
        }
    }

    /// Covered area in unit faces.
    pub fn area(&self) -> usize {
        self.w * self.h
    }
}

/// Converts sweep coordinates back to `(x, y, z)`.
pub fn axes_to_xyz(
    layer_axis: usize,
    u_axis: usize,
    v_axis: usize,
    layer: usize,
    u: usize,
    v: usize,
) -> (usize, usize, usize) {
    let mut coords = [0usize; 3];
    coords[layer_axis] = layer;
    coords[u_axis] = u;
    coords[v_axis] = v;
    (coords[0], coords[1], coords[2])
}

struct Plane {
    u0: usize,
    v0: usize,
    width: usize,
    height: usize,
    cells: Vec<Option<u64>>,
}

impl Plane {
    fn at(&self, u: usize, v: usize) -> Option<u64> {
        self.cells[v * self.width + u]
    }
}

/// Merges quads into maximal rectangles per plane.
///
/// Seeds are visited row by row. For each seed a u-first rectangle (extend
/// along u, then grow whole rows along v) and a v-first rectangle are
/// grown; the larger one is taken, the u-first one on ties.
pub fn greedy_merge(quads: &[FaceQuad]) -> Vec<FaceQuad> {
    let mut planes: BTreeMap<(FaceDirection, usize), Vec<&FaceQuad>> = BTreeMap::new();
    for quad in quads {
        if quad.w == 0 || quad.h == 0 {
            continue;
        }
        planes
            .entry((quad.direction, quad.layer))
            .or_default()
            .push(quad);
    }

    let mut out = Vec::new();
    for ((direction, layer), members) in planes {
        let plane = rasterize(&members);
        merge_plane(&plane, direction, layer, &mut out);
    }
    out
}

fn rasterize(members: &[&FaceQuad]) -> Plane {
    let u0 = members.iter().map(|q| q.u).min().unwrap_or(0);
    let v0 = members.iter().map(|q| q.v).min().unwrap_or(0);
    let u1 = members.iter().map(|q| q.u + q.w).max().unwrap_or(0);
    let v1 = members.iter().map(|q| q.v + q.h).max().unwrap_or(0);
    let width = u1 - u0;
    let height = v1 - v0;
    let mut cells = vec![None; width * height];
    for q in members {
        for v in q.v..q.v + q.h {
            for u in q.u..q.u + q.w {
                cells[(v - v0) * width + (u - u0)] = Some(q.key);
            }
        }
    }
    Plane {
        u0,
        v0,
        width,
        height,
        cells,
    }
}

fn merge_plane(plane: &Plane, direction: FaceDirection, layer: usize, out: &mut Vec<FaceQuad>) {
    let mut visited = vec![false; plane.width * plane.height];
    let free = |visited: &[bool], u: usize, v: usize, key: u64| {
        !visited[v * plane.width + u] && plane.at(u, v) == Some(key)
    };

    for v in 0..plane.height {
        for u in 0..plane.width {
            if visited[v * plane.width + u] {
                continue;
            }
            let Some(key) = plane.at(u, v) else {
                continue;
            };

            // u-first: widest run, then whole rows.
            let mut w_a = 1;
            while u + w_a < plane.width && free(&visited, u + w_a, v, key) {
                w_a += 1;
            }
            let mut h_a = 1;
            while v + h_a < plane.height && (0..w_a).all(|du| free(&visited, u + du, v + h_a, key)) {
                h_a += 1;
            }

            // v-first: tallest run, then whole columns.
            let mut h_b = 1;
            while v + h_b < plane.height && free(&visited, u, v + h_b, key) {
                h_b += 1;
            }
            let mut w_b = 1;
            while u + w_b < plane.width && (0..h_b).all(|dv| free(&visited, u + w_b, v + dv, key)) {
                w_b += 1;
            }

            let (w, h) = if w_b * h_b > w_a * h_a {
                (w_b, h_b)
            } else {
                (w_a, h_a)
            };

            for dv in 0..h {
                for du in 0..w {
                    visited[(v + dv) * plane.width + u + du] = true;
                }
            }
            out.push(FaceQuad {
                direction,
                layer,
                u: plane.u0 + u,
                v: plane.v0 + v,
                w,
                h,
                key,
            });
        }
    }
}
