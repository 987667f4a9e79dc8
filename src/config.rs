use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::{
    equilibrium::FreeEnergyParams,
    lattice::{Grid, GridKind, Lattice, CS2},
    macroscopic::InitialFields,
    model::ShanChenParams,
    Float,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub lattice: LatticeConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub initial: InitialConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeConfig {
    pub dimension: usize,
    #[serde(default)]
    pub grid: Option<GridKind>,
    pub nx: usize,
    pub ny: usize,
    #[serde(default = "default_nz")]
    pub nz: usize,
    #[serde(default)]
    pub periodic: [bool; 3],
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimType {
    ShanChen,
    FreeEnergy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub simtype: SimType,
    /// Relaxation time of field A (Shan-Chen only)
    #[serde(default = "default_tau")]
    pub tau_a: Float,
    /// Relaxation time of field B
    #[serde(default = "default_tau")]
    pub tau_b: Float,
    /// Kinematic viscosity (sets field A relaxation under free-energy)
    #[serde(default = "default_visc")]
    pub visc: Float,
    #[serde(default)]
    pub shan_chen: ShanChenParams,
    #[serde(default)]
    pub free_energy: FreeEnergyParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallBc {
    FullBb,
    HalfBb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureBc {
    None,
    Guo,
}

/// Boundary role given to a domain face by the geometry helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceKind {
    Wall,
    Velocity,
    Pressure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub wall: WallBc,
    pub grad_order: u8,
    /// Wetting phase-gradient constant (free-energy walls)
    pub wetting: Float,
    pub pressure: PressureBc,
    /// Density held at pressure boundary sites
    pub pressure_density: Float,
    /// Velocity imposed at velocity boundary sites
    pub velocity: [Float; 3],
    /// [lower, upper] face kind per axis; only used on non-periodic axes
    pub faces: [[FaceKind; 2]; 3],
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            wall: WallBc::FullBb,
            grad_order: 2,
            wetting: 0.0,
            pressure: PressureBc::None,
            pressure_density: 1.0,
            velocity: [0.0; 3],
            faces: [[FaceKind::Wall; 2]; 3],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropletConfig {
    pub center: [Float; 3],
    pub radius: Float,
    pub phi: Float,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConfig {
    pub rho: Float,
    pub phi: Float,
    pub droplet: Option<DropletConfig>,
    /// Amplitude of a sinusoidal phi perturbation
    pub perturbation: Float,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            rho: 1.0,
            phi: 0.0,
            droplet: None,
            perturbation: 0.0,
        }
    }
}

impl InitialConfig {
    /// Macroscopic fields to initialize populations from
    pub fn fields(&self, lattice: &Lattice) -> InitialFields {
        let mut fields = InitialFields::uniform(lattice.num_sites(), self.rho, self.phi);
        for site in 0..lattice.num_sites() {
            let c = lattice.coords(site).map(|v| v as Float);
            if let Some(droplet) = &self.droplet {
                let r2: Float = (0..3).map(|a| (c[a] - droplet.center[a]).powi(2)).sum();
                if r2 <= droplet.radius * droplet.radius {
                    fields.phi[site] = droplet.phi;
                }
            }
            if self.perturbation != 0.0 {
                fields.phi[site] += self.perturbation * (0.7 * c[0] + 0.3).sin() * (1.3 * c[1] + 0.1 * c[2]).cos();
            }
        }
        fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub max_iterations: usize,
    /// Diagnostics period in iterations
    pub every: usize,
    pub log_level: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            every: 100,
            log_level: "info".to_string(),
        }
    }
}

fn default_nz() -> usize {
    1
}

fn default_block_size() -> usize {
    64
}

fn default_tau() -> Float {
    1.0
}

fn default_visc() -> Float {
    1.0 / 6.0
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unsupported dimension {0} (expected 2 or 3)")]
    UnsupportedDimension(usize),

    #[error("grid {grid:?} cannot be used for a {dimension}D lattice")]
    GridMismatch { grid: GridKind, dimension: usize },

    #[error("2D lattice must have nz = 1, got {0}")]
    FlatLatticeDepth(usize),

    #[error("lattice {nx}x{ny}x{nz} with block size {block_size} is empty")]
    EmptyLattice { nx: usize, ny: usize, nz: usize, block_size: usize },

    #[error("wall scheme {wall:?} does not support gradient order {order}")]
    UnsupportedWallScheme { wall: WallBc, order: u8 },

    #[error("relaxation time of field {field} must exceed 1/2, got {tau}")]
    RelaxationTime { field: &'static str, tau: Float },

    #[error("viscosity must be positive, got {0}")]
    Viscosity(Float),

    #[error("equilibrium for field {field} has {found} terms, grid has {expected} directions")]
    EquilibriumArity { field: &'static str, expected: usize, found: usize },

    #[error("{what} has {found} entries, lattice has {expected} sites")]
    SiteCount { what: &'static str, expected: usize, found: usize },
}

/// Immutable, validated configuration of one kernel variant.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    pub grid: Grid,
    pub lattice: Lattice,
    pub block_size: usize,
    pub simtype: SimType,
    pub wall: WallBc,
    pub grad_order: u8,
    pub wetting: Float,
    pub pressure: PressureBc,
    pub pressure_density: Float,
    pub wall_velocity: [Float; 3],
    pub tau_a: Float,
    pub tau_b: Float,
    pub visc: Float,
    pub shan_chen: ShanChenParams,
    pub free_energy: FreeEnergyParams,
}

impl TryFrom<&Config> for KernelConfig {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, ConfigError> {
        let lat = &config.lattice;
        let kind = match lat.grid {
            Some(kind) => kind,
            None => GridKind::default_for(lat.dimension)
                .ok_or(ConfigError::UnsupportedDimension(lat.dimension))?,
        };
        if !(2..=3).contains(&lat.dimension) {
            return Err(ConfigError::UnsupportedDimension(lat.dimension));
        }
        if kind.dimension() != lat.dimension {
            return Err(ConfigError::GridMismatch { grid: kind, dimension: lat.dimension });
        }
        if lat.dimension == 2 && lat.nz != 1 {
            return Err(ConfigError::FlatLatticeDepth(lat.nz));
        }
        if lat.nx == 0 || lat.ny == 0 || lat.nz == 0 || lat.block_size == 0 {
            return Err(ConfigError::EmptyLattice {
                nx: lat.nx,
                ny: lat.ny,
                nz: lat.nz,
                block_size: lat.block_size,
            });
        }

        let bc = &config.boundary;
        match (bc.wall, bc.grad_order) {
            (WallBc::FullBb, 2) | (WallBc::HalfBb, 1) => {}
            (wall, order) => return Err(ConfigError::UnsupportedWallScheme { wall, order }),
        }

        let model = &config.model;
        if model.visc <= 0.0 {
            return Err(ConfigError::Viscosity(model.visc));
        }
        let (tau_a, visc) = match model.simtype {
            SimType::ShanChen => (model.tau_a, CS2 * (model.tau_a - 0.5)),
            SimType::FreeEnergy => (model.visc / CS2 + 0.5, model.visc),
        };
        if tau_a <= 0.5 {
            return Err(ConfigError::RelaxationTime { field: "A", tau: tau_a });
        }
        if model.tau_b <= 0.5 {
            return Err(ConfigError::RelaxationTime { field: "B", tau: model.tau_b });
        }

        let mut periodic = lat.periodic;
        if lat.dimension == 2 {
            periodic[2] = true;
        }

        Ok(Self {
            grid: Grid::new(kind),
            lattice: Lattice::new(lat.nx, lat.ny, lat.nz, periodic),
            block_size: lat.block_size,
            simtype: model.simtype,
            wall: bc.wall,
            grad_order: bc.grad_order,
            wetting: bc.wetting,
            pressure: bc.pressure,
            pressure_density: bc.pressure_density,
            wall_velocity: bc.velocity,
            tau_a,
            tau_b: model.tau_b,
            visc,
            shan_chen: model.shan_chen,
            free_energy: model.free_energy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_json(extra_boundary: &str) -> String {
        format!(
            r#"{{
                "lattice": {{ "dimension": 2, "nx": 8, "ny": 6, "periodic": [true, false, false] }},
                "model": {{ "simtype": "free-energy", "tau_b": 1.0, "visc": 0.1 }},
                "boundary": {{ {extra_boundary} }}
            }}"#
        )
    }

    #[test]
    fn parses_defaults_and_derives_relaxation() {
        let config: Config = serde_json::from_str(&config_json(r#""wall": "fullbb""#)).unwrap();
        let kernel = KernelConfig::try_from(&config).unwrap();
        assert_eq!(kernel.grid.kind, GridKind::D2Q9);
        assert_eq!(kernel.block_size, 64);
        assert_eq!(kernel.grad_order, 2);
        assert!((kernel.tau_a - 0.8).abs() < 1e-6);
        assert!(kernel.lattice.periodic[2]);
        assert_eq!(config.simulation.every, 100);
    }

    #[test]
    fn rejects_half_way_bounce_back_with_second_order_gradient() {
        let config: Config =
            serde_json::from_str(&config_json(r#""wall": "halfbb", "grad_order": 2"#)).unwrap();
        assert_eq!(
            KernelConfig::try_from(&config).unwrap_err(),
            ConfigError::UnsupportedWallScheme { wall: WallBc::HalfBb, order: 2 }
        );
    }

    #[test]
    fn rejects_full_way_bounce_back_with_first_order_gradient() {
        let config: Config =
            serde_json::from_str(&config_json(r#""wall": "fullbb", "grad_order": 1"#)).unwrap();
        assert!(matches!(
            KernelConfig::try_from(&config),
            Err(ConfigError::UnsupportedWallScheme { wall: WallBc::FullBb, order: 1 })
        ));
    }

    #[test]
    fn rejects_bad_dimensions_and_grids() {
        let mut config: Config = serde_json::from_str(&config_json("")).unwrap();
        config.lattice.dimension = 4;
        assert_eq!(KernelConfig::try_from(&config).unwrap_err(), ConfigError::UnsupportedDimension(4));

        config.lattice.dimension = 2;
        config.lattice.grid = Some(GridKind::D3Q19);
        assert!(matches!(KernelConfig::try_from(&config), Err(ConfigError::GridMismatch { .. })));

        config.lattice.grid = None;
        config.lattice.nz = 3;
        assert_eq!(KernelConfig::try_from(&config).unwrap_err(), ConfigError::FlatLatticeDepth(3));
    }

    #[test]
    fn rejects_unstable_relaxation_times() {
        let mut config: Config = serde_json::from_str(&config_json("")).unwrap();
        config.model.simtype = SimType::ShanChen;
        config.model.tau_a = 0.5;
        assert!(matches!(
            KernelConfig::try_from(&config),
            Err(ConfigError::RelaxationTime { field: "A", .. })
        ));
    }

    #[test]
    fn droplet_sets_phi_inside_radius() {
        let initial = InitialConfig {
            rho: 1.0,
            phi: -1.0,
            droplet: Some(DropletConfig { center: [4.0, 4.0, 0.0], radius: 2.0, phi: 1.0 }),
            perturbation: 0.0,
        };
        let lattice = Lattice::new(9, 9, 1, [true; 3]);
        let fields = initial.fields(&lattice);
        assert_eq!(fields.phi[lattice.index(4, 4, 0)], 1.0);
        assert_eq!(fields.phi[lattice.index(0, 0, 0)], -1.0);
        assert!(fields.rho.iter().all(|&r| r == 1.0));
    }
}
