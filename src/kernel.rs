//! Per-step update routines and variant selection.
//!
//! The five configuration axes are collapsed once, when a [`Kernel`] is
//! built: the physics model and wall scheme become type parameters of an
//! [`Engine`], and the remaining axes are fixed fields of it. The per-site
//! path never re-reads the configuration.

use std::fmt;
use std::marker::PhantomData;
use log::{debug, info};
use rayon::prelude::*;
use crate::{
    boundary::{full_bounce_back, guo_pressure, BoundarySettings, FullBounceBack, HalfBounceBack, WallScheme},
    config::{ConfigError, KernelConfig, PressureBc, SimType, WallBc},
    equilibrium::{builtin, EquilibriumPair},
    finite_difference::FieldSampler,
    lattice::{Grid, GridKind, Lattice},
    macroscopic::{DistFields, DistFieldsMut, Field, InitialFields, MacroFields, MacroWriter, SiteReader},
    model::{FreeEnergy, Model, ModelState, ShanChen},
    node::{NodeCode, NodeType},
    propagation::{BlockScratch, Lane, Propagator, SharedDist},
    Float,
};

/// The specialization a kernel was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub grid: GridKind,
    pub simtype: SimType,
    pub wall: WallBc,
    pub grad_order: u8,
    pub pressure: PressureBc,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}(order {})/pressure {:?}",
            self.grid, self.simtype, self.wall, self.grad_order, self.pressure
        )
    }
}

/// The three routines every specialized engine provides.
pub trait Stepper: Send + Sync {
    fn variant(&self) -> Variant;

    fn collide_and_propagate(
        &self,
        nodes: &[NodeCode],
        input: DistFields<'_>,
        out: DistFieldsMut<'_>,
        snapshot: Option<&mut MacroFields>,
    );

    fn init_from_equilibrium(&self, nodes: &[NodeCode], fields: &InitialFields, out: DistFieldsMut<'_>);

    fn compute_macro(&self, nodes: &[NodeCode], input: DistFields<'_>, snapshot: &mut MacroFields);
}

/// How a site takes part in the current step.
enum Resolved {
    Unused,
    DryWall { orientation: usize },
    Wet { node_type: NodeType, read: usize, state: ModelState },
}

pub struct Engine<M, W> {
    grid: Grid,
    lattice: Lattice,
    propagator: Propagator,
    model: M,
    eq: EquilibriumPair,
    bc: BoundarySettings,
    _wall: PhantomData<W>,
}

impl<M: Model, W: WallScheme> Engine<M, W> {
    pub fn new(config: &KernelConfig, model: M, eq: EquilibriumPair) -> Self {
        let wetting_offset = match M::KIND {
            SimType::FreeEnergy => W::GRAD_ORDER as Float * config.wetting,
            SimType::ShanChen => 0.0,
        };
        Self {
            grid: config.grid,
            lattice: config.lattice,
            propagator: Propagator::new(config.grid, config.lattice, config.block_size),
            model,
            eq,
            bc: BoundarySettings {
                pressure: config.pressure,
                pressure_density: config.pressure_density,
                wall_velocity: config.wall_velocity,
                wetting_offset,
            },
            _wall: PhantomData,
        }
    }

    fn reader<'a>(&'a self, nodes: &'a [NodeCode], input: DistFields<'a>) -> SiteReader<'a, W> {
        SiteReader::new(&self.grid, &self.lattice, nodes, input, &self.bc)
    }

    fn resolve(&self, reader: &SiteReader<'_, W>, site: usize) -> Resolved {
        let (mut node_type, orientation) = reader.nodes[site].decode();
        if node_type == NodeType::Pressure && self.bc.pressure == PressureBc::None {
            node_type = NodeType::Fluid;
        }
        match node_type {
            NodeType::Unused => Resolved::Unused,
            NodeType::Wall if !W::WET => Resolved::DryWall { orientation },
            _ => {
                let read = match node_type {
                    NodeType::Pressure => reader.inward(site, orientation).unwrap_or(site),
                    _ => site,
                };
                let mut state = self.model.state(reader, read);
                if node_type == NodeType::Velocity {
                    state.impose_velocity(self.bc.wall_velocity);
                }
                Resolved::Wet { node_type, read, state }
            }
        }
    }

    fn write_snapshot(&self, reader: &SiteReader<'_, W>, site: usize, resolved: &Resolved, writer: &MacroWriter<'_>) {
        match resolved {
            Resolved::Unused => {}
            Resolved::DryWall { orientation } => {
                if M::KIND == SimType::FreeEnergy {
                    writer.write_phi(site, reader.moment0(Field::B, site, NodeType::Wall, *orientation));
                }
            }
            Resolved::Wet { node_type, state, .. } => {
                let rho = match node_type {
                    NodeType::Pressure => self.bc.pressure_density,
                    _ => state.rho(),
                };
                writer.write(site, rho, state.phi(), state.velocity);
            }
        }
    }

    /// Directions of a wet wall whose link leads off the domain or into the
    /// Unused halo. Nothing else ever streams into the opposite slots.
    fn reflected(&self, nodes: &[NodeCode], site: usize) -> u32 {
        let mask = W::reflection_mask(&self.grid);
        (1..self.grid.q())
            .filter(|&d| mask & (1 << d) != 0 && self.propagator.destination(nodes, site, d).is_none())
            .fold(0, |acc, d| acc | (1 << d))
    }

    fn collide_site(
        &self,
        reader: &SiteReader<'_, W>,
        site: usize,
        lane: usize,
        scratch: &mut BlockScratch,
        writer: Option<&MacroWriter<'_>>,
    ) -> Lane {
        let resolved = self.resolve(reader, site);
        if let Some(writer) = writer {
            self.write_snapshot(reader, site, &resolved, writer);
        }
        let (post_a, post_b) = scratch.post_mut(lane);
        match resolved {
            Resolved::Unused => Lane { site, active: false, reflect: 0 },
            Resolved::DryWall { .. } => {
                full_bounce_back(&self.grid, |d| reader.dist(Field::A, d, site), post_a);
                full_bounce_back(&self.grid, |d| reader.dist(Field::B, d, site), post_b);
                Lane { site, active: true, reflect: 0 }
            }
            Resolved::Wet { node_type, read, state } => {
                let (tau_a, tau_b) = self.model.relaxation_times();
                let input_a = |d| reader.dist(Field::A, d, read);
                if node_type == NodeType::Pressure {
                    guo_pressure(&self.eq.a, &state.a, self.bc.pressure_density, tau_a, input_a, post_a);
                } else {
                    self.eq.a.relax(&state.a, tau_a, input_a, post_a);
                }
                self.eq.b.relax(&state.b, tau_b, |d| reader.dist(Field::B, d, read), post_b);
                let reflect = match node_type {
                    NodeType::Wall => self.reflected(reader.nodes, site),
                    _ => 0,
                };
                Lane { site, active: true, reflect }
            }
        }
    }
}

impl<M: Model, W: WallScheme> Stepper for Engine<M, W> {
    fn variant(&self) -> Variant {
        Variant {
            grid: self.grid.kind,
            simtype: M::KIND,
            wall: W::KIND,
            grad_order: W::GRAD_ORDER,
            pressure: self.bc.pressure,
        }
    }

    fn collide_and_propagate(
        &self,
        nodes: &[NodeCode],
        input: DistFields<'_>,
        out: DistFieldsMut<'_>,
        snapshot: Option<&mut MacroFields>,
    ) {
        let reader = self.reader(nodes, input);
        let shared = SharedDist::new(out);
        let writer = snapshot.map(MacroWriter::new);
        self.propagator.blocks().par_iter().for_each_init(
            || self.propagator.scratch(),
            |scratch, block| {
                for l in 0..block.len {
                    let lane = self.collide_site(&reader, block.start + l, l, scratch, writer.as_ref());
                    scratch.lanes[l] = lane;
                }
                self.propagator.propagate_block(nodes, block, scratch, &shared);
            },
        );
    }

    fn init_from_equilibrium(&self, nodes: &[NodeCode], fields: &InitialFields, out: DistFieldsMut<'_>) {
        let n = nodes.len();
        let q = self.grid.q();
        let shared = SharedDist::new(out);
        let sampler = FieldSampler::<W>::new(&self.grid, &self.lattice, nodes, &fields.phi, &self.bc);
        (0..n).into_par_iter().for_each_init(
            || (vec![0.0; q], vec![0.0; q]),
            |(feq_a, feq_b), site| {
                let node_type = nodes[site].node_type();
                if node_type == NodeType::Unused {
                    return;
                }
                let mut state = self.model.initial_state(&sampler, site, fields.rho[site], fields.velocity[site]);
                match node_type {
                    NodeType::Velocity => state.impose_velocity(self.bc.wall_velocity),
                    NodeType::Pressure if self.bc.pressure == PressureBc::Guo => {
                        state.a.rho = self.bc.pressure_density;
                        state.b.rho = self.bc.pressure_density;
                    }
                    _ => {}
                }
                self.eq.a.eval_all(&state.a, feq_a);
                self.eq.b.eval_all(&state.b, feq_b);
                for d in 0..q {
                    // SAFETY: each site owns its own column of both fields.
                    unsafe {
                        shared.a.write(d * n + site, feq_a[d]);
                        shared.b.write(d * n + site, feq_b[d]);
                    }
                }
            },
        );
    }

    fn compute_macro(&self, nodes: &[NodeCode], input: DistFields<'_>, snapshot: &mut MacroFields) {
        let reader = self.reader(nodes, input);
        let writer = MacroWriter::new(snapshot);
        (0..nodes.len()).into_par_iter().for_each(|site| {
            let resolved = self.resolve(&reader, site);
            self.write_snapshot(&reader, site, &resolved, &writer);
        });
    }
}

/// A configured update engine over one lattice.
pub struct Kernel {
    config: KernelConfig,
    stepper: Box<dyn Stepper>,
}

impl Kernel {
    /// Kernel using the built-in equilibria of the configured model.
    pub fn new(config: KernelConfig) -> Result<Self, ConfigError> {
        let eq = match config.simtype {
            SimType::ShanChen => builtin::shan_chen(&config.grid),
            SimType::FreeEnergy => builtin::free_energy(&config.grid, config.free_energy),
        };
        Self::with_equilibria(config, eq)
    }

    /// Kernel bound to externally supplied equilibrium expression lists.
    pub fn with_equilibria(config: KernelConfig, eq: EquilibriumPair) -> Result<Self, ConfigError> {
        match (config.wall, config.grad_order) {
            (WallBc::FullBb, 2) | (WallBc::HalfBb, 1) => {}
            (wall, order) => return Err(ConfigError::UnsupportedWallScheme { wall, order }),
        }
        let q = config.grid.q();
        for (field, set) in [("A", &eq.a), ("B", &eq.b)] {
            if set.len() != q {
                return Err(ConfigError::EquilibriumArity { field, expected: q, found: set.len() });
            }
        }

        let stepper: Box<dyn Stepper> = match (config.simtype, config.wall) {
            (SimType::ShanChen, WallBc::FullBb) => {
                Box::new(Engine::<_, FullBounceBack>::new(&config, ShanChen::new(&config), eq))
            }
            (SimType::ShanChen, WallBc::HalfBb) => {
                Box::new(Engine::<_, HalfBounceBack>::new(&config, ShanChen::new(&config), eq))
            }
            (SimType::FreeEnergy, WallBc::FullBb) => {
                Box::new(Engine::<_, FullBounceBack>::new(&config, FreeEnergy::new(&config), eq))
            }
            (SimType::FreeEnergy, WallBc::HalfBb) => {
                Box::new(Engine::<_, HalfBounceBack>::new(&config, FreeEnergy::new(&config), eq))
            }
        };
        info!("Selected kernel variant: {}", stepper.variant());
        debug!(
            "Lattice {}x{}x{}, block size {}, tau_a {}, tau_b {}",
            config.lattice.nx, config.lattice.ny, config.lattice.nz, config.block_size, config.tau_a, config.tau_b
        );
        Ok(Self { config, stepper })
    }

    pub fn variant(&self) -> Variant {
        self.stepper.variant()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    fn check_nodes(&self, nodes: &[NodeCode]) -> usize {
        let n = self.config.lattice.num_sites();
        assert_eq!(nodes.len(), n, "node map does not match the lattice");
        n
    }

    fn check_dist(&self, n: usize, a: usize, b: usize) {
        let expected = self.config.grid.q() * n;
        assert!(a == expected && b == expected, "population buffers must hold {expected} values");
    }

    /// One full update: macroscopic extraction, boundary treatment,
    /// relaxation and streaming from `input` into `out`. Writes the
    /// macroscopic snapshot when one is supplied.
    pub fn collide_and_propagate(
        &self,
        nodes: &[NodeCode],
        input: DistFields<'_>,
        out: DistFieldsMut<'_>,
        snapshot: Option<&mut MacroFields>,
    ) {
        let n = self.check_nodes(nodes);
        self.check_dist(n, input.a.len(), input.b.len());
        self.check_dist(n, out.a.len(), out.b.len());
        if let Some(s) = snapshot.as_deref() {
            assert_eq!(s.len(), n, "snapshot does not match the lattice");
        }
        self.stepper.collide_and_propagate(nodes, input, out, snapshot);
    }

    /// Fill `out` with the equilibria of the supplied macroscopic fields.
    /// Unused sites are left untouched.
    pub fn init_from_equilibrium(&self, nodes: &[NodeCode], fields: &InitialFields, out: DistFieldsMut<'_>) {
        let n = self.check_nodes(nodes);
        assert_eq!(fields.len(), n, "initial fields do not match the lattice");
        assert!(fields.phi.len() == n && fields.velocity.len() == n);
        self.check_dist(n, out.a.len(), out.b.len());
        self.stepper.init_from_equilibrium(nodes, fields, out);
    }

    /// Macroscopic snapshot of `input` without advancing it.
    pub fn compute_macro(&self, nodes: &[NodeCode], input: DistFields<'_>, snapshot: &mut MacroFields) {
        let n = self.check_nodes(nodes);
        self.check_dist(n, input.a.len(), input.b.len());
        assert_eq!(snapshot.len(), n, "snapshot does not match the lattice");
        self.stepper.compute_macro(nodes, input, snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, equilibrium::EquilibriumSet};

    fn config(simtype: &str, wall: &str, order: u8) -> KernelConfig {
        let json = format!(
            r#"{{
                "lattice": {{ "dimension": 2, "nx": 6, "ny": 5, "periodic": [true, true, true], "block_size": 4 }},
                "model": {{ "simtype": "{simtype}", "tau_a": 1.0, "tau_b": 1.0 }},
                "boundary": {{ "wall": "{wall}", "grad_order": {order} }}
            }}"#
        );
        let config: Config = serde_json::from_str(&json).unwrap();
        KernelConfig::try_from(&config).unwrap()
    }

    #[test]
    fn selects_variant_from_configuration() {
        let kernel = Kernel::new(config("free-energy", "halfbb", 1)).unwrap();
        let variant = kernel.variant();
        assert_eq!(variant.simtype, SimType::FreeEnergy);
        assert_eq!(variant.wall, WallBc::HalfBb);
        assert_eq!(variant.grad_order, 1);
        assert_eq!(variant.grid, GridKind::D2Q9);
    }

    #[test]
    fn rejects_mismatched_wall_order_built_by_hand() {
        let mut cfg = config("shan-chen", "fullbb", 2);
        cfg.grad_order = 1;
        assert!(matches!(
            Kernel::new(cfg),
            Err(ConfigError::UnsupportedWallScheme { wall: WallBc::FullBb, order: 1 })
        ));
    }

    #[test]
    fn rejects_equilibrium_lists_of_the_wrong_length() {
        let cfg = config("shan-chen", "fullbb", 2);
        let mut eq = builtin::shan_chen(&cfg.grid);
        eq.b = EquilibriumSet::from_terms(Vec::new());
        assert_eq!(
            Kernel::with_equilibria(cfg, eq).err(),
            Some(ConfigError::EquilibriumArity { field: "B", expected: 9, found: 0 })
        );
    }

    #[test]
    fn compute_macro_reads_back_initial_fields() {
        let cfg = config("shan-chen", "fullbb", 2);
        let kernel = Kernel::new(cfg).unwrap();
        let n = cfg.lattice.num_sites();
        let nodes = vec![NodeCode::FLUID; n];
        let fields = InitialFields::uniform(n, 0.9, 0.25);
        let (mut a, mut b) = (vec![0.0; 9 * n], vec![0.0; 9 * n]);
        kernel.init_from_equilibrium(&nodes, &fields, DistFieldsMut { a: &mut a, b: &mut b });
        let mut snapshot = MacroFields::new(n);
        kernel.compute_macro(&nodes, DistFields { a: &a, b: &b }, &mut snapshot);
        for site in 0..n {
            assert!((snapshot.rho[site] - 0.9).abs() < 1e-5);
            assert!((snapshot.phi[site] - 0.25).abs() < 1e-5);
            assert!(snapshot.velocity[site].iter().all(|v| v.abs() < 1e-6));
        }
    }
}
