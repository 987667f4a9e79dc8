//! Equilibrium distributions as ordered expression lists.
//!
//! The kernel never derives an equilibrium itself: it evaluates, in
//! direction order, the closed-form terms bound to it at construction.
//! [`builtin`] provides the lists used by the two supported models.

use serde::{Deserialize, Serialize};
use crate::{lattice::Grid, Float};

/// Macroscopic inputs of one equilibrium evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EqInputs {
    pub rho: Float,
    pub phi: Float,
    pub v: [Float; 3],
    pub lap_phi: Float,
    pub grad_phi: [Float; 3],
}

pub type EqTerm = Box<dyn Fn(&EqInputs) -> Float + Send + Sync>;

/// Per-direction equilibrium terms of one population field.
pub struct EquilibriumSet {
    terms: Vec<EqTerm>,
}

impl std::fmt::Debug for EquilibriumSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquilibriumSet").field("terms", &self.terms.len()).finish()
    }
}

impl EquilibriumSet {
    pub fn from_terms(terms: Vec<EqTerm>) -> Self {
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[inline]
    pub fn eval(&self, direction: usize, inputs: &EqInputs) -> Float {
        (self.terms[direction])(inputs)
    }

    pub fn eval_all(&self, inputs: &EqInputs, out: &mut [Float]) {
        for (slot, term) in out.iter_mut().zip(&self.terms) {
            *slot = term(inputs);
        }
    }

    /// BGK relaxation of the populations returned by `input` toward this
    /// equilibrium.
    #[inline]
    pub fn relax(&self, inputs: &EqInputs, tau: Float, input: impl Fn(usize) -> Float, out: &mut [Float]) {
        for (i, term) in self.terms.iter().enumerate() {
            let f = input(i);
            out[i] = f - (f - term(inputs)) / tau;
        }
    }
}

/// Equilibria of the two coupled population fields.
#[derive(Debug)]
pub struct EquilibriumPair {
    pub a: EquilibriumSet,
    pub b: EquilibriumSet,
}

/// Landau free-energy constants of the binary-liquid model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeEnergyParams {
    /// Bulk free-energy constant
    pub a: Float,
    /// Interface (gradient) constant
    pub kappa: Float,
    /// Order-parameter mobility
    pub gamma: Float,
}

impl Default for FreeEnergyParams {
    fn default() -> Self {
        Self { a: 0.04, kappa: 0.04, gamma: 1.0 }
    }
}

pub mod builtin {
    use super::*;
    use crate::lattice::{project, CS2};

    fn norm2(v: [Float; 3]) -> Float {
        v[0] * v[0] + v[1] * v[1] + v[2] * v[2]
    }

    fn bgk_term(weight: Float, e: [i32; 3], density: fn(&EqInputs) -> Float) -> EqTerm {
        Box::new(move |inp: &EqInputs| {
            let n = density(inp);
            let eu = project(e, inp.v);
            let u2 = norm2(inp.v);
            weight * n * (1.0 + eu / CS2 + eu * eu / (2.0 * CS2 * CS2) - u2 / (2.0 * CS2))
        })
    }

    /// Second-order BGK equilibria for both components, carried by rho
    /// (field A) and phi (field B).
    pub fn shan_chen(grid: &Grid) -> EquilibriumPair {
        let terms = |density: fn(&EqInputs) -> Float| -> Vec<EqTerm> {
            (0..grid.q())
                .map(|i| bgk_term(grid.weights[i], grid.basis[i], density))
                .collect()
        };
        EquilibriumPair {
            a: EquilibriumSet::from_terms(terms(|inp| inp.rho)),
            b: EquilibriumSet::from_terms(terms(|inp| inp.phi)),
        }
    }

    /// Binary-liquid equilibria: field A carries the pressure tensor, field B
    /// the chemical potential. Rest terms close the zeroth moments.
    pub fn free_energy(grid: &Grid, params: FreeEnergyParams) -> EquilibriumPair {
        let FreeEnergyParams { a, kappa, gamma } = params;
        let bulk_pressure = move |inp: &EqInputs| {
            let phi2 = inp.phi * inp.phi;
            CS2 * inp.rho + a * (-0.5 * phi2 + 0.75 * phi2 * phi2)
                - kappa * inp.phi * inp.lap_phi
                - 0.5 * kappa * norm2(inp.grad_phi)
        };
        let chemical_potential =
            move |inp: &EqInputs| a * (-inp.phi + inp.phi * inp.phi * inp.phi) - kappa * inp.lap_phi;

        let w0 = grid.weights[0];
        let mut terms_a: Vec<EqTerm> = Vec::with_capacity(grid.q());
        let mut terms_b: Vec<EqTerm> = Vec::with_capacity(grid.q());

        terms_a.push(Box::new(move |inp: &EqInputs| {
            let trace = inp.rho * norm2(inp.v) + kappa * norm2(inp.grad_phi);
            inp.rho - (1.0 - w0) * bulk_pressure(inp) / CS2 - w0 * trace / (2.0 * CS2)
        }));
        terms_b.push(Box::new(move |inp: &EqInputs| {
            inp.phi
                - (1.0 - w0) * gamma * chemical_potential(inp) / CS2
                - w0 * inp.phi * norm2(inp.v) / (2.0 * CS2)
        }));

        for i in 1..grid.q() {
            let (w, e) = (grid.weights[i], grid.basis[i]);
            terms_a.push(Box::new(move |inp: &EqInputs| {
                let eu = project(e, inp.v);
                let eg = project(e, inp.grad_phi);
                let shear = inp.rho * (eu * eu - CS2 * norm2(inp.v))
                    + kappa * (eg * eg - CS2 * norm2(inp.grad_phi));
                w * (bulk_pressure(inp) / CS2 + inp.rho * eu / CS2 + shear / (2.0 * CS2 * CS2))
            }));
            terms_b.push(Box::new(move |inp: &EqInputs| {
                let eu = project(e, inp.v);
                w * (gamma * chemical_potential(inp) / CS2
                    + inp.phi * eu / CS2
                    + inp.phi * (eu * eu - CS2 * norm2(inp.v)) / (2.0 * CS2 * CS2))
            }));
        }

        EquilibriumPair {
            a: EquilibriumSet::from_terms(terms_a),
            b: EquilibriumSet::from_terms(terms_b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::GridKind;

    fn moments(grid: &Grid, set: &EquilibriumSet, inputs: &EqInputs) -> (Float, [Float; 3]) {
        let mut f = vec![0.0; grid.q()];
        set.eval_all(inputs, &mut f);
        let mut m = [0.0; 3];
        for (i, fi) in f.iter().enumerate() {
            for a in 0..3 {
                m[a] += fi * grid.basis[i][a] as Float;
            }
        }
        (f.iter().sum(), m)
    }

    fn sample_inputs() -> EqInputs {
        EqInputs {
            rho: 1.1,
            phi: 0.3,
            v: [0.02, -0.01, 0.005],
            lap_phi: 0.01,
            grad_phi: [0.05, -0.02, 0.01],
        }
    }

    #[test]
    fn shan_chen_equilibrium_reproduces_mass_and_momentum() {
        for kind in [GridKind::D2Q9, GridKind::D3Q19, GridKind::D3Q27] {
            let grid = Grid::new(kind);
            let eq = builtin::shan_chen(&grid);
            let mut inputs = sample_inputs();
            if grid.dim == 2 {
                inputs.v[2] = 0.0;
            }
            let (rho, m) = moments(&grid, &eq.a, &inputs);
            assert!((rho - inputs.rho).abs() < 1e-5);
            for a in 0..3 {
                assert!((m[a] - inputs.rho * inputs.v[a]).abs() < 1e-5);
            }
            let (phi, _) = moments(&grid, &eq.b, &inputs);
            assert!((phi - inputs.phi).abs() < 1e-5);
        }
    }

    #[test]
    fn free_energy_equilibrium_conserves_density_and_order_parameter() {
        let grid = Grid::new(GridKind::D2Q9);
        let eq = builtin::free_energy(&grid, FreeEnergyParams::default());
        let mut inputs = sample_inputs();
        inputs.v[2] = 0.0;
        inputs.grad_phi[2] = 0.0;
        let (rho, m) = moments(&grid, &eq.a, &inputs);
        assert!((rho - inputs.rho).abs() < 1e-5);
        assert!((m[0] - inputs.rho * inputs.v[0]).abs() < 1e-5);
        assert!((m[1] - inputs.rho * inputs.v[1]).abs() < 1e-5);
        let (phi, flux) = moments(&grid, &eq.b, &inputs);
        assert!((phi - inputs.phi).abs() < 1e-5);
        assert!((flux[0] - inputs.phi * inputs.v[0]).abs() < 1e-5);
    }

    #[test]
    fn relaxation_with_unit_tau_lands_on_equilibrium() {
        let grid = Grid::new(GridKind::D2Q9);
        let eq = builtin::shan_chen(&grid);
        let inputs = EqInputs { rho: 1.0, phi: 0.5, ..Default::default() };
        let mut out = vec![0.0; grid.q()];
        eq.a.relax(&inputs, 1.0, |i| 0.1 * i as Float, &mut out);
        for (i, value) in out.iter().enumerate() {
            assert!((value - eq.a.eval(i, &inputs)).abs() < 1e-7);
        }
    }
}
