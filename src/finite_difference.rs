//! Isotropic finite-difference stencil for the order parameter.

use std::marker::PhantomData;
use crate::{
    boundary::{BoundarySettings, WallScheme},
    config::PressureBc,
    lattice::{Grid, Lattice, CS2},
    macroscopic::{Field, SiteReader},
    node::{NodeCode, NodeType},
    Float,
};

/// Source of the scalar field a stencil is evaluated over.
pub trait ScalarSampler {
    fn center(&self, site: usize) -> Float;
    /// Value seen from `site` along direction `d`, given the center value
    fn neighbor(&self, site: usize, center: Float, d: usize) -> Float;
}

/// Laplacian and gradient of the sampled field at `site`, using the grid
/// weights as stencil coefficients.
pub fn laplacian_and_gradient<S: ScalarSampler>(grid: &Grid, sampler: &S, site: usize) -> (Float, [Float; 3]) {
    let center = sampler.center(site);
    let mut lap = 0.0;
    let mut grad = [0.0; 3];
    for d in 1..grid.q() {
        let value = sampler.neighbor(site, center, d);
        let w = grid.weights[d];
        let e = grid.basis[d];
        lap += w * (value - center);
        grad[0] += w * e[0] as Float * value;
        grad[1] += w * e[1] as Float * value;
        grad[2] += w * e[2] as Float * value;
    }
    (2.0 * lap / CS2, grad.map(|g| g / CS2))
}

/// Zeroth moments of the live input populations.
pub(crate) struct PopulationSampler<'r, 'a, W> {
    reader: &'r SiteReader<'a, W>,
    field: Field,
}

impl<'r, 'a, W: WallScheme> PopulationSampler<'r, 'a, W> {
    pub fn new(reader: &'r SiteReader<'a, W>, field: Field) -> Self {
        Self { reader, field }
    }
}

impl<W: WallScheme> ScalarSampler for PopulationSampler<'_, '_, W> {
    #[inline]
    fn center(&self, site: usize) -> Float {
        self.reader.direction_sum(self.field, site)
    }

    #[inline]
    fn neighbor(&self, site: usize, center: Float, d: usize) -> Float {
        self.reader.neighbor_moment(self.field, site, center, d)
    }
}

/// A supplied scalar array, used while populations do not exist yet.
pub struct FieldSampler<'a, W> {
    grid: &'a Grid,
    lattice: &'a Lattice,
    nodes: &'a [NodeCode],
    values: &'a [Float],
    bc: &'a BoundarySettings,
    _wall: PhantomData<W>,
}

impl<'a, W: WallScheme> FieldSampler<'a, W> {
    pub fn new(
        grid: &'a Grid,
        lattice: &'a Lattice,
        nodes: &'a [NodeCode],
        values: &'a [Float],
        bc: &'a BoundarySettings,
    ) -> Self {
        Self { grid, lattice, nodes, values, bc, _wall: PhantomData }
    }

    #[inline]
    fn inward(&self, site: usize, orientation: usize) -> usize {
        self.lattice.neighbor(site, self.grid.basis[orientation]).unwrap_or(site)
    }
}

impl<W: WallScheme> ScalarSampler for FieldSampler<'_, W> {
    #[inline]
    fn center(&self, site: usize) -> Float {
        self.values[site]
    }

    fn neighbor(&self, site: usize, center: Float, d: usize) -> Float {
        let wetting = self.bc.wetting_offset;
        let Some(n) = self.lattice.neighbor(site, self.grid.basis[d]) else {
            return center - wetting;
        };
        // Same overrides as the population moments read during a step
        match self.nodes[n].decode() {
            (NodeType::Unused, _) => center - wetting,
            (NodeType::Wall, orientation) if !W::WET => self.values[self.inward(n, orientation)] - wetting,
            (NodeType::Pressure, orientation) if self.bc.pressure == PressureBc::Guo => {
                self.values[self.inward(n, orientation)]
            }
            _ => self.values[n],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{boundary::{FullBounceBack, HalfBounceBack}, lattice::GridKind};

    fn settings(pressure: PressureBc, wetting_offset: Float) -> BoundarySettings {
        BoundarySettings { pressure, pressure_density: 1.0, wall_velocity: [0.0; 3], wetting_offset }
    }

    fn field(lattice: &Lattice, f: impl Fn([Float; 3]) -> Float) -> Vec<Float> {
        (0..lattice.num_sites())
            .map(|s| f(lattice.coords(s).map(|c| c as Float)))
            .collect()
    }

    #[test]
    fn linear_field_has_exact_gradient_and_no_curvature() {
        for kind in [GridKind::D2Q9, GridKind::D3Q19] {
            let grid = Grid::new(kind);
            let lattice = Lattice::new(5, 5, if grid.dim == 3 { 5 } else { 1 }, [false, false, grid.dim == 2]);
            let nodes = vec![NodeCode::FLUID; lattice.num_sites()];
            let values = field(&lattice, |c| 0.5 * c[0] - 0.25 * c[1] + if grid.dim == 3 { 0.125 * c[2] } else { 0.0 });
            let bc = settings(PressureBc::None, 0.0);
            let sampler = FieldSampler::<FullBounceBack>::new(&grid, &lattice, &nodes, &values, &bc);
            let center = lattice.index(2, 2, if grid.dim == 3 { 2 } else { 0 });
            let (lap, grad) = laplacian_and_gradient(&grid, &sampler, center);
            assert!(lap.abs() < 1e-5, "{kind:?} lap {lap}");
            assert!((grad[0] - 0.5).abs() < 1e-5);
            assert!((grad[1] + 0.25).abs() < 1e-5);
            if grid.dim == 3 {
                assert!((grad[2] - 0.125).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn quadratic_field_has_constant_laplacian() {
        let grid = Grid::new(GridKind::D2Q9);
        let lattice = Lattice::new(5, 5, 1, [false, false, true]);
        let nodes = vec![NodeCode::FLUID; lattice.num_sites()];
        let values = field(&lattice, |c| c[0] * c[0] + 2.0 * c[1] * c[1]);
        let bc = settings(PressureBc::None, 0.0);
        let sampler = FieldSampler::<FullBounceBack>::new(&grid, &lattice, &nodes, &values, &bc);
        let (lap, _) = laplacian_and_gradient(&grid, &sampler, lattice.index(2, 2, 0));
        assert!((lap - 6.0).abs() < 1e-4);
    }

    #[test]
    fn dry_wall_neighbors_take_wetted_inner_value() {
        let grid = Grid::new(GridKind::D2Q9);
        let lattice = Lattice::new(3, 3, 1, [true, false, true]);
        let north = grid.direction([0, 1, 0]).unwrap();
        let mut nodes = vec![NodeCode::FLUID; lattice.num_sites()];
        for x in 0..3 {
            nodes[lattice.index(x, 0, 0)] = NodeCode::new(NodeType::Wall, north);
        }
        let values = vec![0.7; lattice.num_sites()];
        let bc = settings(PressureBc::None, 0.1);
        let sampler = FieldSampler::<FullBounceBack>::new(&grid, &lattice, &nodes, &values, &bc);
        let site = lattice.index(1, 1, 0);
        let south = grid.direction([0, -1, 0]).unwrap();
        assert!((sampler.neighbor(site, 0.7, south) - 0.6).abs() < 1e-6);
        assert_eq!(sampler.neighbor(site, 0.7, north), 0.7);
    }

    #[test]
    fn unused_halo_mirrors_the_center() {
        let grid = Grid::new(GridKind::D2Q9);
        let lattice = Lattice::new(3, 3, 1, [true, false, true]);
        let mut nodes = vec![NodeCode::FLUID; lattice.num_sites()];
        for x in 0..3 {
            nodes[lattice.index(x, 0, 0)] = NodeCode::UNUSED;
        }
        let values = vec![0.4; lattice.num_sites()];
        let bc = settings(PressureBc::None, 0.05);
        let sampler = FieldSampler::<HalfBounceBack>::new(&grid, &lattice, &nodes, &values, &bc);
        let site = lattice.index(1, 1, 0);
        let south = grid.direction([0, -1, 0]).unwrap();
        assert!((sampler.neighbor(site, 0.9, south) - 0.85).abs() < 1e-6);
        let north = grid.direction([0, 1, 0]).unwrap();
        assert!((sampler.neighbor(lattice.index(1, 2, 0), 0.9, north) - 0.85).abs() < 1e-6);
    }

    #[test]
    fn guo_pressure_neighbors_read_the_inward_site() {
        let grid = Grid::new(GridKind::D2Q9);
        let lattice = Lattice::new(4, 3, 1, [false, true, true]);
        let east = grid.direction([1, 0, 0]).unwrap();
        let west = grid.direction([-1, 0, 0]).unwrap();
        let mut nodes = vec![NodeCode::FLUID; lattice.num_sites()];
        for y in 0..3 {
            nodes[lattice.index(0, y, 0)] = NodeCode::new(NodeType::Pressure, east);
        }
        // phi = 0.1 * (x + 1); the inlet column sits at x = 0
        let values = field(&lattice, |c| 0.1 * (c[0] + 1.0));
        let site = lattice.index(1, 1, 0);

        let guo = settings(PressureBc::Guo, 0.0);
        let sampler = FieldSampler::<HalfBounceBack>::new(&grid, &lattice, &nodes, &values, &guo);
        assert!((sampler.neighbor(site, 0.2, west) - 0.2).abs() < 1e-6);

        let plain = settings(PressureBc::None, 0.0);
        let sampler = FieldSampler::<HalfBounceBack>::new(&grid, &lattice, &nodes, &values, &plain);
        assert!((sampler.neighbor(site, 0.2, west) - 0.1).abs() < 1e-6);
    }
}
