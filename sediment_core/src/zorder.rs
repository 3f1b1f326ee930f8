// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint-order resolution.
//!
//! Every layer owns a *stacking list*: its structural children stacked
//! absolutely, plus every layer stacked relative to it, wherever that layer
//! sits in the tree. Lists are sorted by z, ties broken by creation order.
//! Entries with negative z paint before their owner; the rest paint after.
//!
//! ```text
//!   root (z 1)                  paint order
//!   ├── a (z -1)                  a
//!   ├── b (z 2)                   root
//!   └── c (z 0)                   c
//!                                 r      (relative to c, z 1)
//!   r relative to c, z 1          b
//! ```
//!
//! Roots (parentless, absolutely stacked layers) form the top-level list.
//! Orphaned layers, whose relative target was destroyed, appear in no list.
//! The resolver never fails: cycles are refused when relative edges or
//! parents are set, and a visited set guards traversal regardless.

use alloc::vec;
use alloc::vec::Vec;

use crate::layer::{INVALID, LayerStore, StackSlot};

/// One layer in the resolved paint order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaintEntry {
    /// Raw slot index of the layer.
    pub index: u32,
    /// Absolute z of the root whose traversal emitted the layer. A z-range
    /// filter compares against this value.
    pub root_z: i32,
}

impl LayerStore {
    /// Returns the full paint order, back to front.
    ///
    /// Only valid after [`evaluate`](Self::evaluate). Hidden layers are
    /// included; consumers skip them.
    #[must_use]
    pub fn paint_order(&self) -> &[PaintEntry] {
        &self.order
    }

    /// Resolves the paint order of every live, non-orphaned layer.
    pub(crate) fn resolve_paint_order(&self) -> Vec<PaintEntry> {
        let len = self.len as usize;
        let mut roots: Vec<u32> = (0..self.len)
            .filter(|&idx| {
                self.alive[idx as usize]
                    && self.parent[idx as usize] == INVALID
                    && self.stacking[idx as usize] == StackSlot::Absolute
            })
            .collect();
        self.sort_stacking_list(&mut roots);

        let mut out = Vec::with_capacity(len);
        let mut visited = vec![false; len];
        for root in roots {
            let root_z = self.z[root as usize];
            self.emit(root, root_z, &mut visited, &mut out);
        }
        out
    }

    /// Paint order of a structural subtree, ignoring relative edges.
    ///
    /// Children are ordered by their z values among their siblings,
    /// regardless of whether those values are absolute or relative offsets.
    pub(crate) fn structural_order(&self, root: u32) -> Vec<u32> {
        let mut out = Vec::new();
        self.emit_structural(root, &mut out);
        out
    }

    fn emit(
        &self,
        idx: u32,
        root_z: i32,
        visited: &mut [bool],
        out: &mut Vec<PaintEntry>,
    ) {
        if visited[idx as usize] {
            return;
        }
        visited[idx as usize] = true;

        let mut list: Vec<u32> = self
            .child_indices(idx)
            .filter(|&c| self.stacking[c as usize] == StackSlot::Absolute)
            .chain(self.relatives[idx as usize].iter().copied())
            .collect();
        self.sort_stacking_list(&mut list);
        let split = list.partition_point(|&c| self.z[c as usize] < 0);

        for &c in &list[..split] {
            self.emit(c, root_z, visited, out);
        }
        out.push(PaintEntry { index: idx, root_z });
        for &c in &list[split..] {
            self.emit(c, root_z, visited, out);
        }
    }

    fn emit_structural(&self, idx: u32, out: &mut Vec<u32>) {
        let mut list: Vec<u32> = self.child_indices(idx).collect();
        self.sort_stacking_list(&mut list);
        let split = list.partition_point(|&c| self.z[c as usize] < 0);

        for &c in &list[..split] {
            self.emit_structural(c, out);
        }
        out.push(idx);
        for &c in &list[split..] {
            self.emit_structural(c, out);
        }
    }

    fn sort_stacking_list(&self, list: &mut [u32]) {
        list.sort_by_key(|&i| (self.z[i as usize], self.sequence[i as usize]));
    }
}
