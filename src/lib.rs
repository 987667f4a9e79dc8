pub mod boundary;
pub mod config;
pub mod equilibrium;
pub mod finite_difference;
pub mod geometry;
pub mod kernel;
pub mod lattice;
pub mod macroscopic;
pub mod model;
pub mod node;
pub mod propagation;
pub mod solver;

pub use config::{Config, ConfigError, KernelConfig};
pub use geometry::{Geometry, NodeCounts, Side};
pub use kernel::{Kernel, Variant};
pub use lattice::{Grid, GridKind, Lattice};
pub use macroscopic::{DistFields, DistFieldsMut, InitialFields, MacroFields};
pub use node::{NodeCode, NodeType};
pub use solver::{LBMSolver, Populations, RunSummary};

#[cfg(not(feature = "double"))]
pub type Float = f32;
#[cfg(feature = "double")]
pub type Float = f64;

#[cfg(test)]
mod tests {
    use super::Float;

    #[test]
    fn float_width_follows_the_precision_feature() {
        let expected = if cfg!(feature = "double") { 8 } else { 4 };
        assert_eq!(std::mem::size_of::<Float>(), expected);
    }
}
