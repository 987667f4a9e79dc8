use std::time::{Duration, Instant};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use crate::{
    config::{ConfigError, KernelConfig, SimulationConfig},
    kernel::Kernel,
    macroscopic::{DistFields, DistFieldsMut, InitialFields, MacroFields},
    node::NodeCode,
};

/// Steps slower than this are reported at debug level
const SLOW_STEP: Duration = Duration::from_millis(250);

/// Double-buffered populations of both fields.
#[derive(Debug, Clone)]
pub struct Populations {
    a: [Vec<crate::Float>; 2],
    b: [Vec<crate::Float>; 2],
    current: usize,
}

impl Populations {
    pub fn new(q: usize, num_sites: usize) -> Self {
        let len = q * num_sites;
        Self {
            a: [vec![0.0; len], vec![0.0; len]],
            b: [vec![0.0; len], vec![0.0; len]],
            current: 0,
        }
    }

    /// Buffers read by the next step
    pub fn current(&self) -> DistFields<'_> {
        DistFields {
            a: &self.a[self.current],
            b: &self.b[self.current],
        }
    }

    pub fn current_mut(&mut self) -> DistFieldsMut<'_> {
        DistFieldsMut {
            a: &mut self.a[self.current],
            b: &mut self.b[self.current],
        }
    }

    /// (input, output) views for one step
    pub fn split(&mut self) -> (DistFields<'_>, DistFieldsMut<'_>) {
        let [a0, a1] = &mut self.a;
        let [b0, b1] = &mut self.b;
        if self.current == 0 {
            (DistFields { a: a0, b: b0 }, DistFieldsMut { a: a1, b: b1 })
        } else {
            (DistFields { a: a1, b: b1 }, DistFieldsMut { a: a0, b: b0 })
        }
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Copy the current buffers into the spare ones, so slots a step never
    /// writes hold the same values in both.
    pub fn sync_buffers(&mut self) {
        let (input, out) = self.split();
        out.a.copy_from_slice(input.a);
        out.b.copy_from_slice(input.b);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub iterations: usize,
    pub elapsed: Duration,
    /// Million lattice updates per second
    pub mlups: f64,
    /// Relative change of the (field A, field B) population sums
    pub mass_drift: (f64, f64),
}

pub struct LBMSolver {
    kernel: Kernel,
    simulation: SimulationConfig,
    nodes: Vec<NodeCode>,
    populations: Populations,
    iteration: usize,
}

impl LBMSolver {
    pub fn new(
        config: KernelConfig,
        simulation: SimulationConfig,
        nodes: Vec<NodeCode>,
        initial: &InitialFields,
    ) -> Result<Self> {
        let num_sites = config.lattice.num_sites();
        if nodes.len() != num_sites {
            return Err(ConfigError::SiteCount { what: "node map", expected: num_sites, found: nodes.len() }.into());
        }
        if initial.len() != num_sites {
            return Err(ConfigError::SiteCount { what: "initial fields", expected: num_sites, found: initial.len() }.into());
        }
        info!(
            "Initializing LBM solver with domain size: {}x{}x{}",
            config.lattice.nx, config.lattice.ny, config.lattice.nz
        );

        let kernel = Kernel::new(config)?;
        let mut populations = Populations::new(config.grid.q(), num_sites);
        kernel.init_from_equilibrium(&nodes, initial, populations.current_mut());
        populations.sync_buffers();

        Ok(Self {
            kernel,
            simulation,
            nodes,
            populations,
            iteration: 0,
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn nodes(&self) -> &[NodeCode] {
        &self.nodes
    }

    pub fn populations(&self) -> &Populations {
        &self.populations
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Advance one timestep, optionally writing the macroscopic snapshot of
    /// the state the step started from.
    pub fn step(&mut self, snapshot: Option<&mut MacroFields>) {
        let start = Instant::now();
        let (input, out) = self.populations.split();
        self.kernel.collide_and_propagate(&self.nodes, input, out, snapshot);
        self.populations.swap();
        self.iteration += 1;

        let elapsed = start.elapsed();
        if elapsed > SLOW_STEP {
            debug!("Step {} took {:.1} ms", self.iteration, elapsed.as_secs_f64() * 1e3);
        }
    }

    /// Macroscopic fields of the current populations
    pub fn macroscopic(&self) -> MacroFields {
        let mut fields = MacroFields::new(self.nodes.len());
        self.kernel.compute_macro(&self.nodes, self.populations.current(), &mut fields);
        fields
    }

    /// Population sums of (field A, field B) over all non-Unused sites
    pub fn total_mass(&self) -> (f64, f64) {
        let n = self.nodes.len();
        let q = self.kernel.config().grid.q();
        let dist = self.populations.current();
        let mut totals = (0.0, 0.0);
        for (site, code) in self.nodes.iter().enumerate() {
            if code.is_unused() {
                continue;
            }
            for d in 0..q {
                totals.0 += dist.a[d * n + site] as f64;
                totals.1 += dist.b[d * n + site] as f64;
            }
        }
        totals
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let max_iterations = self.simulation.max_iterations;
        let every = self.simulation.every.max(1);
        info!("Starting LBM simulation for {} iterations", max_iterations);

        let initial_mass = self.total_mass();
        let drift = |mass: (f64, f64)| {
            let rel = |now: f64, then: f64| if then.abs() > 0.0 { (now - then) / then.abs() } else { now - then };
            (rel(mass.0, initial_mass.0), rel(mass.1, initial_mass.1))
        };

        let progress = ProgressBar::new(max_iterations as u64);
        progress.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );

        let start = Instant::now();
        let first = self.iteration;
        while self.iteration - first < max_iterations {
            self.step(None);
            progress.inc(1);

            if self.iteration % every == 0 {
                let mass = self.total_mass();
                let (da, db) = drift(mass);
                progress.set_message(format!("mass drift {da:.2e}"));
                info!(
                    "Iteration {}: mass A {:.6} (drift {:.3e}), mass B {:.6} (drift {:.3e})",
                    self.iteration, mass.0, da, mass.1, db
                );
            }
        }
        let elapsed = start.elapsed();
        progress.finish_and_clear();

        let iterations = self.iteration - first;
        let updates = (iterations * self.nodes.len()) as f64;
        let mlups = if elapsed.as_secs_f64() > 0.0 { updates / elapsed.as_secs_f64() / 1e6 } else { 0.0 };
        let summary = RunSummary {
            iterations,
            elapsed,
            mlups,
            mass_drift: drift(self.total_mass()),
        };
        info!(
            "Simulation completed {} iterations in {:.2} s ({:.2} MLUPS)",
            summary.iterations,
            summary.elapsed.as_secs_f64(),
            summary.mlups
        );
        Ok(summary)
    }
}
