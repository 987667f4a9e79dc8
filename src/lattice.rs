use serde::{Deserialize, Serialize};
use crate::Float;

/// Speed of sound squared in lattice units
pub const CS2: Float = 1.0 / 3.0;

/// Velocity sets supported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridKind {
    D2Q9,
    D3Q19,
    D3Q27,
}

impl GridKind {
    /// Default velocity set for a lattice dimension
    pub fn default_for(dimension: usize) -> Option<Self> {
        match dimension {
            2 => Some(GridKind::D2Q9),
            3 => Some(GridKind::D3Q19),
            _ => None,
        }
    }

    pub fn dimension(self) -> usize {
        match self {
            GridKind::D2Q9 => 2,
            GridKind::D3Q19 | GridKind::D3Q27 => 3,
        }
    }
}

/// D2Q9 model constants
pub struct D2Q9;

impl D2Q9 {
    pub const Q: usize = 9;

    pub const VELOCITIES: [[i32; 3]; 9] = [
        [0, 0, 0],
        [1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0],
        [1, 1, 0], [1, -1, 0], [-1, 1, 0], [-1, -1, 0],
    ];

    pub const WEIGHTS: [Float; 9] = [
        4.0 / 9.0,
        1.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0,
        1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0,
    ];

    pub const OPPOSITE: [usize; 9] = [0, 2, 1, 4, 3, 8, 7, 6, 5];
}

/// D3Q19 model constants
pub struct D3Q19;

impl D3Q19 {
    pub const Q: usize = 19;

    pub const VELOCITIES: [[i32; 3]; 19] = [
        // Center
        [0, 0, 0],
        // Face neighbors (6)
        [1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0], [0, 0, 1], [0, 0, -1],
        // Edge neighbors (12)
        [1, 1, 0], [1, -1, 0], [-1, 1, 0], [-1, -1, 0],
        [1, 0, 1], [1, 0, -1], [-1, 0, 1], [-1, 0, -1],
        [0, 1, 1], [0, 1, -1], [0, -1, 1], [0, -1, -1],
    ];

    pub const WEIGHTS: [Float; 19] = [
        1.0 / 3.0,
        1.0 / 18.0, 1.0 / 18.0, 1.0 / 18.0, 1.0 / 18.0, 1.0 / 18.0, 1.0 / 18.0,
        1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0,
        1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0,
        1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0,
    ];

    pub const OPPOSITE: [usize; 19] = [
        0,
        2, 1, 4, 3, 6, 5,
        10, 9, 8, 7, 14, 13, 12, 11, 18, 17, 16, 15,
    ];
}

/// D3Q27 model constants
pub struct D3Q27;

impl D3Q27 {
    pub const Q: usize = 27;

    pub const VELOCITIES: [[i32; 3]; 27] = [
        // Center
        [0, 0, 0],
        // Face neighbors (6)
        [1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0], [0, 0, 1], [0, 0, -1],
        // Edge neighbors (12)
        [1, 1, 0], [1, -1, 0], [-1, 1, 0], [-1, -1, 0],
        [1, 0, 1], [1, 0, -1], [-1, 0, 1], [-1, 0, -1],
        [0, 1, 1], [0, 1, -1], [0, -1, 1], [0, -1, -1],
        // Corner neighbors (8)
        [1, 1, 1], [1, 1, -1], [1, -1, 1], [1, -1, -1],
        [-1, 1, 1], [-1, 1, -1], [-1, -1, 1], [-1, -1, -1],
    ];

    pub const WEIGHTS: [Float; 27] = [
        // Center
        8.0 / 27.0,
        // Face neighbors (6)
        2.0 / 27.0, 2.0 / 27.0, 2.0 / 27.0, 2.0 / 27.0, 2.0 / 27.0, 2.0 / 27.0,
        // Edge neighbors (12)
        1.0 / 54.0, 1.0 / 54.0, 1.0 / 54.0, 1.0 / 54.0,
        1.0 / 54.0, 1.0 / 54.0, 1.0 / 54.0, 1.0 / 54.0,
        1.0 / 54.0, 1.0 / 54.0, 1.0 / 54.0, 1.0 / 54.0,
        // Corner neighbors (8)
        1.0 / 216.0, 1.0 / 216.0, 1.0 / 216.0, 1.0 / 216.0,
        1.0 / 216.0, 1.0 / 216.0, 1.0 / 216.0, 1.0 / 216.0,
    ];

    pub const OPPOSITE: [usize; 27] = [
        0,
        2, 1, 4, 3, 6, 5,
        10, 9, 8, 7, 14, 13, 12, 11, 18, 17, 16, 15,
        26, 25, 24, 23, 22, 21, 20, 19,
    ];
}

/// Direction table shared by every stage of the update. The ordering of
/// `basis`, `weights` and `opposite` is the single source of truth for
/// direction indices.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    pub kind: GridKind,
    pub dim: usize,
    pub basis: &'static [[i32; 3]],
    pub weights: &'static [Float],
    pub opposite: &'static [usize],
}

impl Grid {
    pub fn new(kind: GridKind) -> Self {
        match kind {
            GridKind::D2Q9 => Self {
                kind,
                dim: 2,
                basis: &D2Q9::VELOCITIES,
                weights: &D2Q9::WEIGHTS,
                opposite: &D2Q9::OPPOSITE,
            },
            GridKind::D3Q19 => Self {
                kind,
                dim: 3,
                basis: &D3Q19::VELOCITIES,
                weights: &D3Q19::WEIGHTS,
                opposite: &D3Q19::OPPOSITE,
            },
            GridKind::D3Q27 => Self {
                kind,
                dim: 3,
                basis: &D3Q27::VELOCITIES,
                weights: &D3Q27::WEIGHTS,
                opposite: &D3Q27::OPPOSITE,
            },
        }
    }

    /// Number of discrete directions
    #[inline]
    pub fn q(&self) -> usize {
        self.basis.len()
    }

    /// Index of the direction with lattice vector `e`
    pub fn direction(&self, e: [i32; 3]) -> Option<usize> {
        self.basis.iter().position(|&b| b == e)
    }
}

/// Dot product of a lattice vector with a real vector
#[inline]
pub fn project(e: [i32; 3], v: [Float; 3]) -> Float {
    e[0] as Float * v[0] + e[1] as Float * v[1] + e[2] as Float * v[2]
}

/// Run of consecutive x sites in one row, updated by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: usize,
    pub len: usize,
}

/// Shape of the (haloed) lattice and its periodicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lattice {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub periodic: [bool; 3],
}

impl Lattice {
    pub fn new(nx: usize, ny: usize, nz: usize, periodic: [bool; 3]) -> Self {
        Self { nx, ny, nz, periodic }
    }

    #[inline]
    pub fn num_sites(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.nx * (y + self.ny * z)
    }

    #[inline]
    pub fn coords(&self, site: usize) -> [usize; 3] {
        let x = site % self.nx;
        let rest = site / self.nx;
        [x, rest % self.ny, rest / self.ny]
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Site reached by moving `e` from `site`, wrapping periodic axes.
    /// `None` when the move leaves the domain along a non-periodic axis.
    #[inline]
    pub fn neighbor(&self, site: usize, e: [i32; 3]) -> Option<usize> {
        let c = self.coords(site);
        let dims = self.dims();
        let mut out = [0usize; 3];
        for axis in 0..3 {
            let n = dims[axis] as i64;
            let mut v = c[axis] as i64 + e[axis] as i64;
            if v < 0 || v >= n {
                if !self.periodic[axis] {
                    return None;
                }
                v = v.rem_euclid(n);
            }
            out[axis] = v as usize;
        }
        Some(self.index(out[0], out[1], out[2]))
    }

    /// Split every row into blocks of at most `block_size` sites.
    pub fn blocks(&self, block_size: usize) -> Vec<Block> {
        let per_row = self.nx.div_ceil(block_size);
        let mut blocks = Vec::with_capacity(per_row * self.ny * self.nz);
        for z in 0..self.nz {
            for y in 0..self.ny {
                for b in 0..per_row {
                    let x0 = b * block_size;
                    blocks.push(Block {
                        start: self.index(x0, y, z),
                        len: block_size.min(self.nx - x0),
                    });
                }
            }
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [GridKind; 3] = [GridKind::D2Q9, GridKind::D3Q19, GridKind::D3Q27];

    #[test]
    fn opposite_tables_reverse_the_lattice_vector() {
        for kind in KINDS {
            let grid = Grid::new(kind);
            assert_eq!(grid.weights.len(), grid.q());
            for d in 0..grid.q() {
                let o = grid.opposite[d];
                let (e, eo) = (grid.basis[d], grid.basis[o]);
                assert_eq!([e[0] + eo[0], e[1] + eo[1], e[2] + eo[2]], [0, 0, 0], "{kind:?} dir {d}");
                assert_eq!(grid.opposite[o], d);
                assert_eq!(grid.weights[d], grid.weights[o]);
            }
        }
    }

    #[test]
    fn weights_are_normalized_and_isotropic() {
        for kind in KINDS {
            let grid = Grid::new(kind);
            let total: Float = grid.weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-6);
            for a in 0..grid.dim {
                for b in 0..grid.dim {
                    let m: Float = (0..grid.q())
                        .map(|d| grid.weights[d] * (grid.basis[d][a] * grid.basis[d][b]) as Float)
                        .sum();
                    let expected = if a == b { CS2 } else { 0.0 };
                    assert!((m - expected).abs() < 1e-6, "{kind:?} ({a},{b}) = {m}");
                }
            }
        }
    }

    #[test]
    fn neighbor_wraps_only_periodic_axes() {
        let lattice = Lattice::new(4, 3, 1, [true, false, true]);
        let site = lattice.index(0, 0, 0);
        assert_eq!(lattice.neighbor(site, [-1, 0, 0]), Some(lattice.index(3, 0, 0)));
        assert_eq!(lattice.neighbor(site, [0, -1, 0]), None);
        assert_eq!(lattice.neighbor(site, [1, 1, 0]), Some(lattice.index(1, 1, 0)));
        assert_eq!(lattice.neighbor(site, [0, 0, 1]), Some(site));
    }

    #[test]
    fn blocks_cover_every_site_once() {
        let lattice = Lattice::new(10, 3, 2, [false; 3]);
        let blocks = lattice.blocks(4);
        assert_eq!(blocks.len(), 3 * 3 * 2);
        let mut seen = vec![0u8; lattice.num_sites()];
        for block in &blocks {
            let row = lattice.coords(block.start);
            for site in block.start..block.start + block.len {
                let c = lattice.coords(site);
                assert_eq!((c[1], c[2]), (row[1], row[2]));
                seen[site] += 1;
            }
        }
        assert!(seen.iter().all(|&s| s == 1));
    }
}
