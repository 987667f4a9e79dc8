//! Boundary treatment around collision: wall schemes, Guo pressure
//! extrapolation and velocity forcing.

use crate::{
    config::{PressureBc, WallBc},
    equilibrium::{EqInputs, EquilibriumSet},
    lattice::Grid,
    Float,
};

/// Boundary parameters fixed for the lifetime of a kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySettings {
    pub pressure: PressureBc,
    pub pressure_density: Float,
    pub wall_velocity: [Float; 3],
    /// gradient order x wetting constant under the free-energy model, else 0
    pub wetting_offset: Float,
}

/// Wall bounce-back variant, selected once per kernel.
pub trait WallScheme: Send + Sync + 'static {
    const KIND: WallBc;
    const GRAD_ORDER: u8;
    /// Wall sites relax like fluid sites
    const WET: bool;

    /// Directions a wall site may reflect back into its own opposite slot
    /// when the link has no destination.
    fn reflection_mask(grid: &Grid) -> u32;
}

/// Full-way bounce-back: the wall site is solid and returns every incoming
/// population along its reverse direction one step later.
pub struct FullBounceBack;

impl WallScheme for FullBounceBack {
    const KIND: WallBc = WallBc::FullBb;
    const GRAD_ORDER: u8 = 2;
    const WET: bool = false;

    fn reflection_mask(_grid: &Grid) -> u32 {
        0
    }
}

/// Half-way bounce-back: the wall site is the last fluid layer; populations
/// leaving toward the Unused halo or off the domain are reflected in place.
/// Corner and edge sites lose tangential and diagonal links too, so every
/// moving direction is a candidate.
pub struct HalfBounceBack;

impl WallScheme for HalfBounceBack {
    const KIND: WallBc = WallBc::HalfBb;
    const GRAD_ORDER: u8 = 1;
    const WET: bool = true;

    fn reflection_mask(grid: &Grid) -> u32 {
        (1..grid.q()).fold(0, |mask, d| mask | (1 << d))
    }
}

/// Replace every population by the pre-collision value of its opposite
/// direction.
#[inline]
pub fn full_bounce_back(grid: &Grid, input: impl Fn(usize) -> Float, out: &mut [Float]) {
    for (d, slot) in out.iter_mut().enumerate().take(grid.q()) {
        *slot = input(grid.opposite[d]);
    }
}

/// Guo extrapolation: equilibrium at the prescribed density plus the
/// non-equilibrium part of the inward fluid site, then BGK relaxation.
pub fn guo_pressure(
    eq: &EquilibriumSet,
    fluid: &EqInputs,
    density: Float,
    tau: Float,
    input: impl Fn(usize) -> Float,
    out: &mut [Float],
) {
    let target = EqInputs { rho: density, ..*fluid };
    for (i, slot) in out.iter_mut().enumerate().take(eq.len()) {
        let non_eq = input(i) - eq.eval(i, fluid);
        *slot = eq.eval(i, &target) + (1.0 - 1.0 / tau) * non_eq;
    }
}
