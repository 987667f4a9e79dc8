use log::info;
use crate::{
    config::{FaceKind, KernelConfig, WallBc},
    lattice::{Grid, Lattice},
    node::{NodeCode, NodeType},
};

/// Lower or upper face of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounts {
    pub fluid: usize,
    pub wall: usize,
    pub velocity: usize,
    pub pressure: usize,
    pub unused: usize,
}

/// Node-code map of a box domain.
#[derive(Debug, Clone)]
pub struct Geometry {
    grid: Grid,
    lattice: Lattice,
    codes: Vec<NodeCode>,
}

impl Geometry {
    /// All-fluid domain
    pub fn new(grid: Grid, lattice: Lattice) -> Self {
        Self {
            grid,
            lattice,
            codes: vec![NodeCode::FLUID; lattice.num_sites()],
        }
    }

    /// Box domain with the given face kinds on every non-periodic axis.
    /// Velocity and pressure planes go on the outermost layer; walls follow
    /// the configured scheme (halfbb walls sit behind an Unused halo).
    pub fn box_domain(config: &KernelConfig, faces: [[FaceKind; 2]; 3]) -> Self {
        let mut geometry = Self::new(config.grid, config.lattice);
        let open_axes: Vec<usize> = (0..config.grid.dim).filter(|&a| !config.lattice.periodic[a]).collect();
        let sides = [Side::Lower, Side::Upper];

        for &axis in &open_axes {
            for (side, kind) in sides.into_iter().zip(faces[axis]) {
                match kind {
                    FaceKind::Velocity => geometry.add_plane(axis, side, NodeType::Velocity),
                    FaceKind::Pressure => geometry.add_plane(axis, side, NodeType::Pressure),
                    FaceKind::Wall => {}
                }
            }
        }
        if config.wall == WallBc::HalfBb {
            for &axis in &open_axes {
                for (side, kind) in sides.into_iter().zip(faces[axis]) {
                    if kind == FaceKind::Wall {
                        geometry.fill_layer(axis, side, 0, NodeCode::UNUSED, true);
                    }
                }
            }
        }
        for &axis in &open_axes {
            for (side, kind) in sides.into_iter().zip(faces[axis]) {
                if kind == FaceKind::Wall {
                    geometry.add_wall(axis, side, config.wall);
                }
            }
        }

        let counts = geometry.counts();
        info!(
            "Geometry: {} fluid, {} wall, {} velocity, {} pressure, {} unused nodes",
            counts.fluid, counts.wall, counts.velocity, counts.pressure, counts.unused
        );
        geometry
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> NodeCode {
        self.codes[self.lattice.index(x, y, z)]
    }

    /// Direction pointing from `side` of `axis` into the domain
    fn inward(&self, axis: usize, side: Side) -> usize {
        let mut e = [0; 3];
        e[axis] = match side {
            Side::Lower => 1,
            Side::Upper => -1,
        };
        self.grid.direction(e).unwrap_or(0)
    }

    /// Overwrite layer `depth` (counted from `side`) of `axis` with `code`.
    /// Unused sites are kept unless `overwrite_unused`.
    fn fill_layer(&mut self, axis: usize, side: Side, depth: usize, code: NodeCode, overwrite_unused: bool) {
        let n = self.lattice.dims()[axis];
        if depth >= n {
            return;
        }
        let layer = match side {
            Side::Lower => depth,
            Side::Upper => n - 1 - depth,
        };
        for site in 0..self.codes.len() {
            if self.lattice.coords(site)[axis] != layer {
                continue;
            }
            if overwrite_unused || !self.codes[site].is_unused() {
                self.codes[site] = code;
            }
        }
    }

    /// Boundary plane of `node_type` on the outermost layer
    pub fn add_plane(&mut self, axis: usize, side: Side, node_type: NodeType) {
        let code = NodeCode::new(node_type, self.inward(axis, side));
        self.fill_layer(axis, side, 0, code, false);
    }

    /// Wall layer for the given scheme: fullbb walls on the outermost layer,
    /// halfbb walls one layer in, leaving the outermost layer to the halo.
    pub fn add_wall(&mut self, axis: usize, side: Side, wall: WallBc) {
        let code = NodeCode::new(NodeType::Wall, self.inward(axis, side));
        let depth = match wall {
            WallBc::FullBb => 0,
            WallBc::HalfBb => 1,
        };
        self.fill_layer(axis, side, depth, code, false);
    }

    pub fn counts(&self) -> NodeCounts {
        let mut counts = NodeCounts::default();
        for code in &self.codes {
            match code.node_type() {
                NodeType::Fluid => counts.fluid += 1,
                NodeType::Wall => counts.wall += 1,
                NodeType::Velocity => counts.velocity += 1,
                NodeType::Pressure => counts.pressure += 1,
                NodeType::Unused => counts.unused += 1,
            }
        }
        counts
    }

    pub fn codes(&self) -> &[NodeCode] {
        &self.codes
    }

    pub fn into_codes(self) -> Vec<NodeCode> {
        self.codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::GridKind;

    fn kernel_config(wall: WallBc, periodic: [bool; 3]) -> KernelConfig {
        let json = r#"{
            "lattice": { "dimension": 2, "nx": 6, "ny": 6 },
            "model": { "simtype": "shan-chen" }
        }"#;
        let config: crate::Config = serde_json::from_str(json).unwrap();
        let mut kernel = KernelConfig::try_from(&config).unwrap();
        kernel.wall = wall;
        kernel.grad_order = if wall == WallBc::HalfBb { 1 } else { 2 };
        kernel.lattice = Lattice::new(6, 6, 1, periodic);
        kernel
    }

    #[test]
    fn full_way_walls_sit_on_the_boundary_and_point_inward() {
        let config = kernel_config(WallBc::FullBb, [true, false, true]);
        let geometry = Geometry::box_domain(&config, [[FaceKind::Wall; 2]; 3]);
        let grid = Grid::new(GridKind::D2Q9);
        let north = grid.direction([0, 1, 0]).unwrap();
        let south = grid.direction([0, -1, 0]).unwrap();
        assert_eq!(geometry.get(2, 0, 0).decode(), (NodeType::Wall, north));
        assert_eq!(geometry.get(2, 5, 0).decode(), (NodeType::Wall, south));
        assert_eq!(geometry.get(2, 1, 0), NodeCode::FLUID);
        let counts = geometry.counts();
        assert_eq!((counts.wall, counts.fluid, counts.unused), (12, 24, 0));
    }

    #[test]
    fn half_way_walls_keep_an_unused_halo() {
        let config = kernel_config(WallBc::HalfBb, [true, false, true]);
        let geometry = Geometry::box_domain(&config, [[FaceKind::Wall; 2]; 3]);
        assert!(geometry.get(3, 0, 0).is_unused());
        assert!(geometry.get(3, 5, 0).is_unused());
        assert_eq!(geometry.get(3, 1, 0).node_type(), NodeType::Wall);
        assert_eq!(geometry.get(3, 4, 0).node_type(), NodeType::Wall);
        assert_eq!(geometry.counts().fluid, 12);
        let codes = geometry.codes();
        assert_eq!(codes.len(), 36);
        assert_eq!(codes.iter().filter(|c| c.is_unused()).count(), 12);
    }

    #[test]
    fn planes_and_walls_share_corners_with_walls_winning() {
        let config = kernel_config(WallBc::FullBb, [false, false, true]);
        let faces = [
            [FaceKind::Velocity, FaceKind::Pressure],
            [FaceKind::Wall, FaceKind::Wall],
            [FaceKind::Wall, FaceKind::Wall],
        ];
        let geometry = Geometry::box_domain(&config, faces);
        assert_eq!(geometry.get(0, 3, 0).node_type(), NodeType::Velocity);
        assert_eq!(geometry.get(5, 3, 0).node_type(), NodeType::Pressure);
        assert_eq!(geometry.get(0, 0, 0).node_type(), NodeType::Wall);
        let east = Grid::new(GridKind::D2Q9).direction([1, 0, 0]).unwrap();
        assert_eq!(geometry.get(0, 2, 0).decode().1, east);
    }
}
