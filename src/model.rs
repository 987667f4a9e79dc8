//! Binary-fluid physics strategies.
//!
//! A [`Model`] turns the populations around a site into the inputs of the
//! two equilibrium expression lists. The Shan-Chen model couples the
//! components through a pseudopotential interaction force; the free-energy
//! model through the order-parameter Laplacian and gradient.

use serde::{Deserialize, Serialize};
use crate::{
    boundary::WallScheme,
    config::{KernelConfig, SimType},
    equilibrium::EqInputs,
    finite_difference::{laplacian_and_gradient, PopulationSampler, ScalarSampler},
    lattice::Grid,
    macroscopic::{Field, SiteReader, DENSITY_FLOOR},
    node::NodeType,
    Float,
};

/// Equilibrium inputs of both fields plus the velocity reported for the site.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelState {
    pub a: EqInputs,
    pub b: EqInputs,
    pub velocity: [Float; 3],
}

impl ModelState {
    #[inline]
    pub fn rho(&self) -> Float {
        self.a.rho
    }

    #[inline]
    pub fn phi(&self) -> Float {
        self.a.phi
    }

    /// Override the extracted velocity, as velocity boundaries do.
    pub fn impose_velocity(&mut self, velocity: [Float; 3]) {
        self.a.v = velocity;
        self.b.v = velocity;
        self.velocity = velocity;
    }
}

pub trait Model: Send + Sync + 'static {
    const KIND: SimType;

    /// Relaxation times of (field A, field B)
    fn relaxation_times(&self) -> (Float, Float);

    /// Macroscopic state at `read` from the live input populations.
    fn state<W: WallScheme>(&self, reader: &SiteReader<'_, W>, read: usize) -> ModelState;

    /// State built from supplied fields during initialization; `phi` samples
    /// the supplied order-parameter array.
    fn initial_state<S: ScalarSampler>(
        &self,
        phi: &S,
        site: usize,
        rho: Float,
        velocity: [Float; 3],
    ) -> ModelState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Potential {
    /// psi(n) = n
    Linear,
    /// psi(n) = 1 - exp(-n)
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShanChenParams {
    /// Inter-component coupling constant G
    pub coupling: Float,
    pub potential: Potential,
}

impl Default for ShanChenParams {
    fn default() -> Self {
        Self { coupling: 1.2, potential: Potential::Linear }
    }
}

pub struct ShanChen {
    grid: Grid,
    tau_a: Float,
    tau_b: Float,
    params: ShanChenParams,
}

impl ShanChen {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            grid: config.grid,
            tau_a: config.tau_a,
            tau_b: config.tau_b,
            params: config.shan_chen,
        }
    }

    #[inline]
    fn psi(&self, n: Float) -> Float {
        match self.params.potential {
            Potential::Linear => n,
            Potential::Exponential => 1.0 - (-n).exp(),
        }
    }
}

impl Model for ShanChen {
    const KIND: SimType = SimType::ShanChen;

    fn relaxation_times(&self) -> (Float, Float) {
        (self.tau_a, self.tau_b)
    }

    fn state<W: WallScheme>(&self, reader: &SiteReader<'_, W>, read: usize) -> ModelState {
        let rho = reader.direction_sum(Field::A, read);
        let phi = reader.direction_sum(Field::B, read);
        let ma = reader.momentum(Field::A, read);
        let mb = reader.momentum(Field::B, read);

        // Weighted neighbor pseudopotentials of the other component
        let mut sum_a = [0.0; 3];
        let mut sum_b = [0.0; 3];
        for d in 1..self.grid.q() {
            let w = self.grid.weights[d];
            let e = self.grid.basis[d];
            let psi_a = self.psi(reader.neighbor_moment(Field::A, read, rho, d));
            let psi_b = self.psi(reader.neighbor_moment(Field::B, read, phi, d));
            for c in 0..3 {
                sum_a[c] += w * psi_b * e[c] as Float;
                sum_b[c] += w * psi_a * e[c] as Float;
            }
        }
        let g = self.params.coupling;
        let (psi_a, psi_b) = (self.psi(rho), self.psi(phi));
        let force_a = sum_a.map(|s| -g * psi_a * s);
        let force_b = sum_b.map(|s| -g * psi_b * s);

        let weight = rho / self.tau_a + phi / self.tau_b;
        let mut common = [0.0; 3];
        let mut velocity = [0.0; 3];
        let total = rho + phi;
        for c in 0..3 {
            if weight.abs() > DENSITY_FLOOR {
                common[c] = (ma[c] / self.tau_a + mb[c] / self.tau_b) / weight;
            }
            if total.abs() > DENSITY_FLOOR {
                velocity[c] = (ma[c] + mb[c] + 0.5 * (force_a[c] + force_b[c])) / total;
            }
        }

        let shifted = |force: [Float; 3], tau: Float, n: Float| -> [Float; 3] {
            if n.abs() > DENSITY_FLOOR {
                [0, 1, 2].map(|c| common[c] + tau * force[c] / n)
            } else {
                common
            }
        };

        let base = EqInputs { rho, phi, ..Default::default() };
        ModelState {
            a: EqInputs { v: shifted(force_a, self.tau_a, rho), ..base },
            b: EqInputs { v: shifted(force_b, self.tau_b, phi), ..base },
            velocity,
        }
    }

    fn initial_state<S: ScalarSampler>(
        &self,
        phi: &S,
        site: usize,
        rho: Float,
        velocity: [Float; 3],
    ) -> ModelState {
        let inputs = EqInputs { rho, phi: phi.center(site), v: velocity, ..Default::default() };
        ModelState { a: inputs, b: inputs, velocity }
    }
}

pub struct FreeEnergy {
    grid: Grid,
    tau_a: Float,
    tau_b: Float,
}

impl FreeEnergy {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            grid: config.grid,
            tau_a: config.tau_a,
            tau_b: config.tau_b,
        }
    }
}

impl Model for FreeEnergy {
    const KIND: SimType = SimType::FreeEnergy;

    fn relaxation_times(&self) -> (Float, Float) {
        (self.tau_a, self.tau_b)
    }

    fn state<W: WallScheme>(&self, reader: &SiteReader<'_, W>, read: usize) -> ModelState {
        // `read` is always a site the populations can be taken at directly
        let (rho, v) = reader.get_macro(Field::A, read, NodeType::Fluid, 0);
        let phi = reader.moment0(Field::B, read, NodeType::Fluid, 0);
        let sampler = PopulationSampler::new(reader, Field::B);
        let (lap_phi, grad_phi) = laplacian_and_gradient(&self.grid, &sampler, read);
        let inputs = EqInputs { rho, phi, v, lap_phi, grad_phi };
        ModelState { a: inputs, b: inputs, velocity: v }
    }

    fn initial_state<S: ScalarSampler>(
        &self,
        phi: &S,
        site: usize,
        rho: Float,
        velocity: [Float; 3],
    ) -> ModelState {
        let (lap_phi, grad_phi) = laplacian_and_gradient(&self.grid, phi, site);
        let inputs = EqInputs { rho, phi: phi.center(site), v: velocity, lap_phi, grad_phi };
        ModelState { a: inputs, b: inputs, velocity }
    }
}
