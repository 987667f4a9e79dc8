//! Streaming of post-collision populations to neighbor sites.
//!
//! Sites are processed in blocks of consecutive x positions within one row.
//! A block first stages the values whose destination lies inside the block
//! in a per-worker transpose buffer, then drains that buffer so each lane
//! writes the values that arrive from its upstream lane. Values leaving the
//! block are written directly. Every output slot has at most one writer per
//! step, which is what lets blocks run concurrently over one shared buffer.

use std::marker::PhantomData;
use rayon::prelude::*;
use crate::{
    lattice::{Block, Grid, Lattice},
    macroscopic::{DistFields, DistFieldsMut},
    node::NodeCode,
    Float,
};

/// Write-only view of a slice shared between workers that write disjoint
/// indices.
pub struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: SharedSlice is created from a unique borrow, so no other view of
// the memory exists for 'a. Moving it between threads moves only the pointer.
unsafe impl<T: Send> Send for SharedSlice<'_, T> {}

// SAFETY: the only access is `write`, whose contract requires that no two
// threads touch the same index.
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}

impl<'a, T> SharedSlice<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// No other thread may read or write `index` while this view is alive.
    #[inline]
    pub unsafe fn write(&self, index: usize, value: T) {
        assert!(index < self.len, "shared write {index} out of bounds {}", self.len);
        // SAFETY: in bounds, and exclusive per the caller's contract.
        unsafe { self.ptr.add(index).write(value) }
    }
}

/// Output population buffers of one step.
pub(crate) struct SharedDist<'a> {
    pub a: SharedSlice<'a, Float>,
    pub b: SharedSlice<'a, Float>,
}

impl<'a> SharedDist<'a> {
    pub fn new(out: DistFieldsMut<'a>) -> Self {
        Self {
            a: SharedSlice::new(out.a),
            b: SharedSlice::new(out.b),
        }
    }
}

/// One site of a block.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lane {
    pub site: usize,
    /// Lane takes part in propagation
    pub active: bool,
    /// Directions reflected back into the site's own opposite slot
    pub reflect: u32,
}

/// Per-worker scratch space, reused across blocks.
#[derive(Debug, Clone)]
pub struct BlockScratch {
    q: usize,
    pub lanes: Vec<Lane>,
    post_a: Vec<Float>,
    post_b: Vec<Float>,
    staging: Vec<Float>,
}

impl BlockScratch {
    fn new(q: usize, block_size: usize) -> Self {
        Self {
            q,
            lanes: vec![Lane::default(); block_size],
            post_a: vec![0.0; q * block_size],
            post_b: vec![0.0; q * block_size],
            staging: vec![0.0; q * block_size],
        }
    }

    /// Post-collision populations of both fields at `lane`
    #[inline]
    pub fn post_mut(&mut self, lane: usize) -> (&mut [Float], &mut [Float]) {
        let range = lane * self.q..(lane + 1) * self.q;
        (&mut self.post_a[range.clone()], &mut self.post_b[range])
    }
}

#[derive(Debug, Clone)]
pub struct Propagator {
    grid: Grid,
    lattice: Lattice,
    block_size: usize,
    blocks: Vec<Block>,
}

impl Propagator {
    pub fn new(grid: Grid, lattice: Lattice, block_size: usize) -> Self {
        let blocks = lattice.blocks(block_size);
        Self { grid, lattice, block_size, blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn scratch(&self) -> BlockScratch {
        BlockScratch::new(self.grid.q(), self.block_size)
    }

    /// Site that receives direction `d` from `site`; `None` off the domain
    /// or into an Unused site.
    #[inline]
    pub fn destination(&self, nodes: &[NodeCode], site: usize, d: usize) -> Option<usize> {
        self.lattice
            .neighbor(site, self.grid.basis[d])
            .filter(|&n| !nodes[n].is_unused())
    }

    /// Stream the post-collision values held in `scratch` for `block`.
    pub(crate) fn propagate_block(
        &self,
        nodes: &[NodeCode],
        block: &Block,
        scratch: &mut BlockScratch,
        out: &SharedDist<'_>,
    ) {
        let BlockScratch { lanes, post_a, post_b, staging, .. } = scratch;
        let lanes = &lanes[..block.len];
        self.propagate_field(nodes, lanes, post_a, staging, &out.a);
        self.propagate_field(nodes, lanes, post_b, staging, &out.b);
    }

    fn propagate_field(
        &self,
        nodes: &[NodeCode],
        lanes: &[Lane],
        post: &[Float],
        staging: &mut [Float],
        out: &SharedSlice<'_, Float>,
    ) {
        let q = self.grid.q();
        let n = nodes.len();
        let len = lanes.len() as isize;
        let bs = self.block_size;

        // Stage
        for (l, lane) in lanes.iter().enumerate() {
            if !lane.active {
                continue;
            }
            let values = &post[l * q..(l + 1) * q];
            // SAFETY (all writes below): slot (d, dst) is only fed by the
            // single site dst - e_d, and reflected slots (opp(d), site) are
            // only fed from site + e_d, which never propagates.
            unsafe { out.write(lane.site, values[0]) };
            for d in 1..q {
                if lane.reflect & (1 << d) != 0 {
                    unsafe { out.write(self.grid.opposite[d] * n + lane.site, values[d]) };
                    continue;
                }
                let target = l as isize + self.grid.basis[d][0] as isize;
                if (0..len).contains(&target) {
                    staging[d * bs + target as usize] = values[d];
                } else if let Some(dst) = self.destination(nodes, lane.site, d) {
                    unsafe { out.write(d * n + dst, values[d]) };
                }
            }
        }

        // Drain
        for t in 0..lanes.len() {
            for d in 1..q {
                let source = t as isize - self.grid.basis[d][0] as isize;
                if !(0..len).contains(&source) {
                    continue;
                }
                let src = &lanes[source as usize];
                if !src.active || src.reflect & (1 << d) != 0 {
                    continue;
                }
                if let Some(dst) = self.destination(nodes, src.site, d) {
                    unsafe { out.write(d * n + dst, staging[d * bs + t]) };
                }
            }
        }
    }

    /// Pure streaming of `input` into `out`, without collision.
    pub fn stream(&self, nodes: &[NodeCode], input: DistFields<'_>, out: DistFieldsMut<'_>) {
        let n = nodes.len();
        let q = self.grid.q();
        let shared = SharedDist::new(out);
        self.blocks.par_iter().for_each_init(
            || self.scratch(),
            |scratch, block| {
                for l in 0..block.len {
                    let site = block.start + l;
                    scratch.lanes[l] = Lane { site, active: !nodes[site].is_unused(), reflect: 0 };
                    let (pa, pb) = scratch.post_mut(l);
                    for d in 0..q {
                        pa[d] = input.a[d * n + site];
                        pb[d] = input.b[d * n + site];
                    }
                }
                self.propagate_block(nodes, block, scratch, &shared);
            },
        );
    }
}
