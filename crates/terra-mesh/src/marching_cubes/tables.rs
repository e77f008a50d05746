//! Marching cubes case table, generated once at first use.
//!
//! Corner `c` sits at `(c & 1, (c >> 1) & 1, (c >> 2) & 1)`; bit `c` of a
//! case index is set when that corner is solid. For every case the surface
//! is traced on the six cube faces: each face contributes one segment per
//! run of solid corners around its outline, from the crossing where the run
//! starts to the crossing where it ends. Diagonal-only faces therefore keep
//! their solid corners apart. The segments chain into closed loops, which
//! are fan-triangulated from their lowest edge. Triangles wind
//! counter-clockwise when seen from the empty side.

use std::sync::OnceLock;

/// Corner pairs of the twelve cube edges.
pub const EDGE_CORNERS: [(u8, u8); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Cube faces as corner loops, counter-clockwise seen from outside.
const FACE_LOOPS: [[u8; 4]; 6] = [
    [0, 2, 3, 1],
    [4, 5, 7, 6],
    [0, 4, 6, 2],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 6, 7, 3],
];

static TABLE: OnceLock<Vec<Vec<[u8; 3]>>> = OnceLock::new();

/// Triangles of a case as edge-index triples.
pub fn case_triangles(case: u8) -> &'static [[u8; 3]] {
    &TABLE.get_or_init(build_table)[case as usize]
}

/// Corners joined by `edge`.
pub fn edge_corners(edge: u8) -> (u8, u8) {
    EDGE_CORNERS[edge as usize % 12]
}

/// Bitmask of the edges a case's surface crosses.
pub fn edge_mask(case: u8) -> u16 {
    let solid = |c: u8| case >> c & 1 == 1;
    EDGE_CORNERS
        .iter()
        .enumerate()
        .filter(|&(_, &(a, b))| solid(a) != solid(b))
        .fold(0, |mask, (edge, _)| mask | 1 << edge)
}

fn edge_between(a: u8, b: u8) -> Option<u8> {
    let key = (a.min(b), a.max(b));
    EDGE_CORNERS
        .iter()
        .position(|&pair| pair == key)
        .map(|edge| edge as u8)
}

fn build_table() -> Vec<Vec<[u8; 3]>> {
    (0..=255u8).map(triangulate_case).collect()
}

fn triangulate_case(case: u8) -> Vec<[u8; 3]> {
    let solid = |c: u8| case >> c & 1 == 1;

    // next[start] = end for each surface segment on the cube faces.
    let mut next: [Option<u8>; 12] = [None; 12];
    for face in FACE_LOOPS {
        let mut events: Vec<(bool, u8)> = Vec::with_capacity(4);
        for i in 0..4 {
            let (a, b) = (face[i], face[(i + 1) % 4]);
            if solid(a) == solid(b) {
                continue;
            }
            if let Some(edge) = edge_between(a, b) {
                events.push((solid(b), edge));
            }
        }
        // Events alternate between entering and leaving solid runs.
        if let Some(first_enter) = events.iter().position(|&(enter, _)| enter) {
            events.rotate_left(first_enter);
            for pair in events.chunks_exact(2) {
                let (_, start) = pair[0];
                let (_, end) = pair[1];
                next[start as usize] = Some(end);
            }
        }
    }

    let mut triangles = Vec::new();
    let mut visited = [false; 12];
    for start in 0..12u8 {
        if visited[start as usize] || next[start as usize].is_none() {
            continue;
        }
        let mut cycle = Vec::with_capacity(12);
        let mut edge = start;
        while !visited[edge as usize] {
            visited[edge as usize] = true;
            cycle.push(edge);
            match next[edge as usize] {
                Some(following) => edge = following,
                None => break,
            }
        }
        for i in 1..cycle.len().saturating_sub(1) {
            triangles.push([cycle[0], cycle[i], cycle[i + 1]]);
        }
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(c: u8) -> [f32; 3] {
        [(c & 1) as f32, (c >> 1 & 1) as f32, (c >> 2 & 1) as f32]
    }

    fn midpoint(edge: u8) -> [f32; 3] {
        let (a, b) = edge_corners(edge);
        let (pa, pb) = (corner(a), corner(b));
        [0, 1, 2].map(|i| (pa[i] + pb[i]) * 0.5)
    }

    fn normal(tri: [u8; 3]) -> [f32; 3] {
        let [a, b, c] = tri.map(midpoint);
        let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ]
    }

    #[test]
    fn test_trivial_cases_are_empty() {
        assert!(case_triangles(0).is_empty());
        assert!(case_triangles(255).is_empty());
        assert_eq!(edge_mask(0), 0);
        assert_eq!(edge_mask(255), 0);
    }

    #[test]
    fn test_single_corner_case() {
        assert_eq!(case_triangles(1), &[[0, 4, 8]]);
        let n = normal([0, 4, 8]);
        assert!(n.iter().all(|&c| c > 0.0));
    }

    #[test]
    fn test_every_case_uses_exactly_its_crossed_edges() {
        for case in 0..=255u8 {
            let used = case_triangles(case)
                .iter()
                .flatten()
                .fold(0u16, |mask, &e| mask | 1 << e);
            assert_eq!(used, edge_mask(case), "case {case:#04x}");
        }
    }

    #[test]
    fn test_triangle_counts_follow_loop_sizes() {
        // A half-cube cut is one quad; a lone corner is one triangle.
        assert_eq!(case_triangles(0x33).len(), 2);
        assert_eq!(case_triangles(0x0F).len(), 2);
        for c in 0..8 {
            assert_eq!(case_triangles(1 << c).len(), 1);
            assert_eq!(case_triangles(!(1u8 << c)).len(), 1);
        }
    }

    #[test]
    fn test_lone_corners_face_away_from_solid() {
        for c in 0..8u8 {
            let solid = corner(c);
            let tri = case_triangles(1 << c)[0];
            let n = normal(tri);
            let center = {
                let pts = tri.map(midpoint);
                [0, 1, 2].map(|i| (pts[0][i] + pts[1][i] + pts[2][i]) / 3.0)
            };
            let away = [0, 1, 2].map(|i| center[i] - solid[i]);
            let dot: f32 = (0..3).map(|i| n[i] * away[i]).sum();
            assert!(dot > 0.0, "corner {c}");
        }
    }

    #[test]
    fn test_slab_cases_face_up_or_down() {
        // Bottom layer solid: surface faces +y.
        let n = case_triangles(0x33)
            .iter()
            .map(|&t| normal(t))
            .fold([0.0f32; 3], |acc, n| [acc[0] + n[0], acc[1] + n[1], acc[2] + n[2]]);
        assert!(n[1] > 0.0 && n[0].abs() < 1e-6 && n[2].abs() < 1e-6);

        // Top layer solid: surface faces -y.
        let n = case_triangles(0xCC)
            .iter()
            .map(|&t| normal(t))
            .fold([0.0f32; 3], |acc, n| [acc[0] + n[0], acc[1] + n[1], acc[2] + n[2]]);
        assert!(n[1] < 0.0);
    }

    #[test]
    fn test_every_crossing_edge_has_two_triangle_neighbors() {
        // Closed loops: each boundary segment of the cell belongs to exactly
        // one triangle, and every triangle side is either such a segment or
        // an interior diagonal shared in both directions.
        for case in 1..255u8 {
            let tris = case_triangles(case);
            let mut directed = Vec::new();
            for t in tris {
                directed.push((t[0], t[1]));
                directed.push((t[1], t[2]));
                directed.push((t[2], t[0]));
            }
            for &(a, b) in &directed {
                let reverse = directed.iter().filter(|&&(x, y)| x == b && y == a).count();
                let same = directed.iter().filter(|&&(x, y)| x == a && y == b).count();
                assert_eq!(same, 1, "case {case:#04x} side {a}-{b}");
                assert!(reverse <= 1, "case {case:#04x} side {a}-{b}");
            }
        }
    }
}
