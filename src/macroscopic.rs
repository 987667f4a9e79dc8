//! Population views, moment extraction and macroscopic snapshots.

use std::marker::PhantomData;
use crate::{
    boundary::{BoundarySettings, WallScheme},
    config::PressureBc,
    lattice::{Grid, Lattice},
    node::{NodeCode, NodeType},
    propagation::SharedSlice,
    Float,
};

/// Selects one of the two coupled population fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Density carrier
    A,
    /// Order-parameter carrier
    B,
}

/// Read-only view of both population fields, laid out as
/// `dist[direction * num_sites + site]`.
#[derive(Debug, Clone, Copy)]
pub struct DistFields<'a> {
    pub a: &'a [Float],
    pub b: &'a [Float],
}

impl<'a> DistFields<'a> {
    #[inline]
    pub fn field(&self, field: Field) -> &'a [Float] {
        match field {
            Field::A => self.a,
            Field::B => self.b,
        }
    }
}

#[derive(Debug)]
pub struct DistFieldsMut<'a> {
    pub a: &'a mut [Float],
    pub b: &'a mut [Float],
}

/// Macroscopic snapshot arrays, one entry per site.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroFields {
    pub rho: Vec<Float>,
    pub phi: Vec<Float>,
    pub velocity: Vec<[Float; 3]>,
}

impl MacroFields {
    pub fn new(num_sites: usize) -> Self {
        Self::filled(num_sites, 0.0)
    }

    pub fn filled(num_sites: usize, value: Float) -> Self {
        Self {
            rho: vec![value; num_sites],
            phi: vec![value; num_sites],
            velocity: vec![[value; 3]; num_sites],
        }
    }

    pub fn len(&self) -> usize {
        self.rho.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rho.is_empty()
    }
}

/// Macroscopic fields populations are initialized from.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialFields {
    pub rho: Vec<Float>,
    pub phi: Vec<Float>,
    pub velocity: Vec<[Float; 3]>,
}

impl InitialFields {
    pub fn uniform(num_sites: usize, rho: Float, phi: Float) -> Self {
        Self {
            rho: vec![rho; num_sites],
            phi: vec![phi; num_sites],
            velocity: vec![[0.0; 3]; num_sites],
        }
    }

    pub fn len(&self) -> usize {
        self.rho.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rho.is_empty()
    }
}

/// Snapshot writer shared by all blocks of one step; every site writes only
/// its own entries.
pub(crate) struct MacroWriter<'a> {
    rho: SharedSlice<'a, Float>,
    phi: SharedSlice<'a, Float>,
    velocity: SharedSlice<'a, [Float; 3]>,
}

impl<'a> MacroWriter<'a> {
    pub fn new(fields: &'a mut MacroFields) -> Self {
        let MacroFields { rho, phi, velocity } = fields;
        Self {
            rho: SharedSlice::new(rho),
            phi: SharedSlice::new(phi),
            velocity: SharedSlice::new(velocity),
        }
    }

    pub fn write(&self, site: usize, rho: Float, phi: Float, velocity: [Float; 3]) {
        // SAFETY: blocks partition the sites, so `site` has a single writer.
        unsafe {
            self.rho.write(site, rho);
            self.phi.write(site, phi);
            self.velocity.write(site, velocity);
        }
    }

    pub fn write_phi(&self, site: usize, phi: Float) {
        // SAFETY: as in `write`.
        unsafe { self.phi.write(site, phi) }
    }
}

/// Boundary-aware moment extraction over the input populations of a step.
pub struct SiteReader<'a, W> {
    pub grid: &'a Grid,
    pub lattice: &'a Lattice,
    pub nodes: &'a [NodeCode],
    pub dist: DistFields<'a>,
    pub bc: &'a BoundarySettings,
    _wall: PhantomData<W>,
}

impl<'a, W: WallScheme> SiteReader<'a, W> {
    pub fn new(
        grid: &'a Grid,
        lattice: &'a Lattice,
        nodes: &'a [NodeCode],
        dist: DistFields<'a>,
        bc: &'a BoundarySettings,
    ) -> Self {
        Self { grid, lattice, nodes, dist, bc, _wall: PhantomData }
    }

    #[inline]
    pub fn dist(&self, field: Field, direction: usize, site: usize) -> Float {
        self.dist.field(field)[direction * self.nodes.len() + site]
    }

    /// Plain direction sum
    #[inline]
    pub fn direction_sum(&self, field: Field, site: usize) -> Float {
        (0..self.grid.q()).map(|d| self.dist(field, d, site)).sum()
    }

    /// First moment (unnormalized)
    #[inline]
    pub fn momentum(&self, field: Field, site: usize) -> [Float; 3] {
        let mut m = [0.0; 3];
        for d in 1..self.grid.q() {
            let f = self.dist(field, d, site);
            let e = self.grid.basis[d];
            m[0] += f * e[0] as Float;
            m[1] += f * e[1] as Float;
            m[2] += f * e[2] as Float;
        }
        m
    }

    /// Site one lattice vector inward along the boundary normal
    #[inline]
    pub fn inward(&self, site: usize, orientation: usize) -> Option<usize> {
        self.lattice.neighbor(site, self.grid.basis[orientation])
    }

    /// Wetting shift applied to field values extracted at or behind walls
    #[inline]
    pub fn wetting(&self, field: Field) -> Float {
        match field {
            Field::A => 0.0,
            Field::B => self.bc.wetting_offset,
        }
    }

    /// Zeroth moment with boundary overrides: Guo pressure sites hold the
    /// prescribed density and take phi from their inward neighbor, dry walls
    /// read the fluid site in front of them.
    pub fn moment0(&self, field: Field, site: usize, node_type: NodeType, orientation: usize) -> Float {
        match node_type {
            NodeType::Pressure if self.bc.pressure == PressureBc::Guo => match field {
                Field::A => self.bc.pressure_density,
                Field::B => self.direction_sum(field, self.inward(site, orientation).unwrap_or(site)),
            },
            NodeType::Wall if !W::WET => {
                let inner = self.inward(site, orientation).unwrap_or(site);
                self.direction_sum(field, inner) - self.wetting(field)
            }
            _ => self.direction_sum(field, site),
        }
    }

    /// Density and velocity of one field at `site`.
    pub fn get_macro(&self, field: Field, site: usize, node_type: NodeType, orientation: usize) -> (Float, [Float; 3]) {
        let n = self.moment0(field, site, node_type, orientation);
        let read = match node_type {
            NodeType::Pressure if self.bc.pressure == PressureBc::Guo => {
                self.inward(site, orientation).unwrap_or(site)
            }
            _ => site,
        };
        let m = self.momentum(field, read);
        let v = if n.abs() > DENSITY_FLOOR { m.map(|c| c / n) } else { [0.0; 3] };
        (n, v)
    }

    /// Value of `field` seen by a stencil centered on `origin` when it looks
    /// along direction `d`. Sites outside the fluid mirror the center value.
    pub fn neighbor_moment(&self, field: Field, origin: usize, origin_value: Float, d: usize) -> Float {
        match self.lattice.neighbor(origin, self.grid.basis[d]) {
            Some(n) => {
                let (node_type, orientation) = self.nodes[n].decode();
                if node_type == NodeType::Unused {
                    origin_value - self.wetting(field)
                } else {
                    self.moment0(field, n, node_type, orientation)
                }
            }
            None => origin_value - self.wetting(field),
        }
    }
}

/// Densities below this are treated as empty when normalizing momenta
pub const DENSITY_FLOOR: Float = 1e-10;
