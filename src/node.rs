//! Per-site classification codes.
//!
//! A node code packs the boundary role of a site in its low bits and the
//! orientation (index of the lattice direction pointing from the site into
//! the fluid, `0` for interior sites) in the remaining bits.

use bytemuck::{Pod, Zeroable};

const TYPE_BITS: u32 = 3;
const TYPE_MASK: u32 = (1 << TYPE_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Fluid,
    Wall,
    Velocity,
    Pressure,
    Unused,
}

impl NodeType {
    const fn bits(self) -> u32 {
        match self {
            NodeType::Fluid => 0,
            NodeType::Wall => 1,
            NodeType::Velocity => 2,
            NodeType::Pressure => 3,
            NodeType::Unused => 4,
        }
    }
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct NodeCode(pub u32);

impl NodeCode {
    pub const FLUID: NodeCode = NodeCode::new(NodeType::Fluid, 0);
    pub const UNUSED: NodeCode = NodeCode::new(NodeType::Unused, 0);

    pub const fn new(node_type: NodeType, orientation: usize) -> Self {
        NodeCode(node_type.bits() | ((orientation as u32) << TYPE_BITS))
    }

    /// Split the code into (type, orientation). Type bits outside the known
    /// range decode as `Unused`.
    #[inline]
    pub fn decode(self) -> (NodeType, usize) {
        let node_type = match self.0 & TYPE_MASK {
            0 => NodeType::Fluid,
            1 => NodeType::Wall,
            2 => NodeType::Velocity,
            3 => NodeType::Pressure,
            _ => NodeType::Unused,
        };
        (node_type, (self.0 >> TYPE_BITS) as usize)
    }

    #[inline]
    pub fn node_type(self) -> NodeType {
        self.decode().0
    }

    #[inline]
    pub fn is_unused(self) -> bool {
        self.node_type() == NodeType::Unused
    }
}

/// Reinterpret a raw integer map produced by an external setup step.
pub fn cast_codes(raw: &[u32]) -> &[NodeCode] {
    bytemuck::cast_slice(raw)
}
