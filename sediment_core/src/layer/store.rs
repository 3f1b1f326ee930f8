// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays layer storage with allocation, topology, stacking and
//! geometry management.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use kurbo::{Affine, Point};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::desc::{LayerDesc, LayerKind};
use super::evaluate::{Anchor, WorldGeometry, derive};
use super::id::{ClientId, INVALID, LayerId};
use super::state::{GeometryState, LatchOutcome};
use super::traverse::Children;
use crate::buffer::{BufferDesc, FrameNumber, ScalingMode};
use crate::dirty;
use crate::error::{SceneError, SceneResult};
use crate::geometry::{Color, Geometry, IntRect, IntSize, LayerFlags};
use crate::output::LayerStackId;
use crate::transform::Matrix22;
use crate::zorder::PaintEntry;

/// How a layer takes part in the paint order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stacking {
    /// Ordered among its siblings (or among roots) by absolute z.
    Absolute,
    /// Ordered among the layers stacked onto `target`, by relative z.
    Relative(LayerId),
    /// Its relative target was destroyed. The layer and its subtree are left
    /// out of the paint order until an absolute or relative z is set again.
    Orphaned,
}

/// Internal form of [`Stacking`], holding a raw slot index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StackSlot {
    Absolute,
    Relative(u32),
    Orphaned,
}

/// Struct-of-arrays storage for all layers.
///
/// Layers are addressed by [`LayerId`] handles. Internally, each layer occupies
/// a slot in parallel arrays. Destroyed layers are recycled via a free list,
/// and generation counters prevent stale handle access.
///
/// Reads are public. Writes are crate-private: every mutation enters through
/// [`Scene`](crate::scene::Scene), which owns the store.
#[derive(Debug)]
pub struct LayerStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Identity --
    pub(crate) name: Vec<String>,
    pub(crate) client: Vec<ClientId>,
    pub(crate) kind: Vec<LayerKind>,
    pub(crate) sequence: Vec<u64>,
    next_sequence: u64,

    // -- Stacking --
    pub(crate) z: Vec<i32>,
    pub(crate) stacking: Vec<StackSlot>,
    /// Layers stacked relative to each slot.
    pub(crate) relatives: Vec<Vec<u32>>,

    // -- Client control --
    /// Set once `detach_children` cut a layer loose from its parent.
    pub(crate) detached: Vec<bool>,

    // -- Geometry (committed + requested) --
    pub(crate) state: Vec<GeometryState>,

    // -- Derived (written by evaluate) --
    pub(crate) world: Vec<WorldGeometry>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
    pub(crate) stale: bool,

    // -- Paint order cache --
    pub(crate) order: Vec<PaintEntry>,
    pub(crate) order_dirty: bool,

    // -- Lifecycle tracking --
    pub(crate) pending_added: Vec<u32>,
    pub(crate) pending_removed: Vec<u32>,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Creates an empty layer store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            name: Vec::new(),
            client: Vec::new(),
            kind: Vec::new(),
            sequence: Vec::new(),
            next_sequence: 0,
            z: Vec::new(),
            stacking: Vec::new(),
            relatives: Vec::new(),
            detached: Vec::new(),
            state: Vec::new(),
            world: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            stale: false,
            order: Vec::new(),
            order_dirty: true,
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
        }
    }

    // -- Allocation API --

    /// Creates a layer owned by `client`.
    ///
    /// The layer starts at the origin with identity matrix, full alpha,
    /// absolute z 0, layer stack 0, no crops and no content.
    pub(crate) fn create_layer(&mut self, client: ClientId, desc: LayerDesc) -> SceneResult<LayerId> {
        let parent = match desc.parent {
            Some(p) if !self.is_alive(p) => return Err(SceneError::InvalidParent(p)),
            Some(p) => Some(p.idx),
            None => None,
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let state = GeometryState::new(desc.size, desc.flags);

        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.name[i] = desc.name;
            self.client[i] = client;
            self.kind[i] = desc.kind;
            self.sequence[i] = sequence;
            self.z[i] = 0;
            self.stacking[i] = StackSlot::Absolute;
            self.detached[i] = false;
            self.state[i] = state;
            self.world[i] = WorldGeometry::default();
            self.alive[i] = true;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.name.push(desc.name);
            self.client.push(client);
            self.kind.push(desc.kind);
            self.sequence.push(sequence);
            self.z.push(0);
            self.stacking.push(StackSlot::Absolute);
            self.relatives.push(Vec::new());
            self.detached.push(false);
            self.state.push(state);
            self.world.push(WorldGeometry::default());
            self.generation.push(0);
            self.alive.push(true);
            idx
        };

        if let Some(p) = parent {
            self.link_child(p, idx);
        }

        self.pending_added.push(idx);
        self.mark_topology(idx);
        self.mark_inherited(idx);
        self.mark_content(idx);

        Ok(self.id_at(idx))
    }

    /// Destroys a layer together with every descendant owned by the same
    /// client.
    ///
    /// Children owned by other clients become roots and keep their local
    /// geometry, taking the z of the root they were painted under so they
    /// stay in place in the paint order. Layers stacked relative to any
    /// destroyed layer become [`Stacking::Orphaned`]. Returns the handles
    /// that were destroyed, `id` first.
    pub(crate) fn destroy_layer(&mut self, id: LayerId) -> SceneResult<Vec<LayerId>> {
        let root = self.slot(id)?;
        let owner = self.client[root as usize];

        let mut doomed = Vec::new();
        let mut released = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            doomed.push(idx);
            let mut child = self.first_child[idx as usize];
            while child != INVALID {
                if self.client[child as usize] == owner {
                    stack.push(child);
                } else {
                    released.push(child);
                }
                child = self.next_sibling[child as usize];
            }
        }

        for child in released {
            self.release_to_root(child);
        }

        let ids: Vec<LayerId> = doomed.iter().map(|&idx| self.id_at(idx)).collect();
        // Children before parents so every unlink sees a consistent list.
        for &idx in doomed.iter().rev() {
            self.free_slot(idx);
        }
        Ok(ids)
    }

    /// Returns whether the given handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        id.idx < self.len
            && self.alive[id.idx as usize]
            && self.generation[id.idx as usize] == id.generation
    }

    /// Returns the number of live layers.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    // -- Topology API --

    /// Moves `id` under `new_parent`, or makes it a root for `None`.
    ///
    /// The layer's local geometry is untouched; only its inherited frame
    /// changes.
    pub(crate) fn reparent(&mut self, id: LayerId, new_parent: Option<LayerId>) -> SceneResult<()> {
        let c = self.slot(id)?;
        let p = match new_parent {
            Some(p) => Some(self.slot(p)?),
            None => None,
        };
        if let Some(p) = p {
            self.check_reparent(c, p)?;
        }
        self.move_under(c, p);
        Ok(())
    }

    /// Moves every current child of `id` under `new_parent`.
    ///
    /// All moves are validated before any is made.
    pub(crate) fn reparent_children(
        &mut self,
        id: LayerId,
        new_parent: Option<LayerId>,
    ) -> SceneResult<()> {
        let p = self.slot(id)?;
        let target = match new_parent {
            Some(t) => Some(self.slot(t)?),
            None => None,
        };
        let children: Vec<u32> = self.child_indices(p).collect();
        if let Some(t) = target {
            if t == p {
                return Ok(());
            }
            for &c in &children {
                self.check_reparent(c, t)?;
            }
        }
        for c in children {
            self.move_under(c, target);
        }
        Ok(())
    }

    /// Severs the parent binding of every child owned by a different client.
    ///
    /// The parent's derived state is folded into each detached child (see
    /// [`GeometryState::rebase`]), and the child takes the z of the root it
    /// was painted under, so nothing changes on screen. From then on the
    /// child no longer follows the parent and refuses further mutations (see
    /// [`is_detached`](Self::is_detached)). Same-client children and layers
    /// stacked relative to `id` are untouched. Returns how many children
    /// were detached.
    pub(crate) fn detach_children(&mut self, id: LayerId) -> SceneResult<usize> {
        let p = self.slot(id)?;
        let owner = self.client[p as usize];
        let foreign: Vec<u32> = self
            .child_indices(p)
            .filter(|&c| self.client[c as usize] != owner)
            .collect();
        if foreign.is_empty() {
            return Ok(0);
        }

        let parent = self.fresh_world(p);
        for &c in &foreign {
            self.state[c as usize].rebase(&parent);
            self.detached[c as usize] = true;
            self.release_to_root(c);
        }
        Ok(foreign.len())
    }

    /// Returns the parent of a layer, if any.
    pub fn parent(&self, id: LayerId) -> SceneResult<Option<LayerId>> {
        let idx = self.slot(id)?;
        let p = self.parent[idx as usize];
        Ok((p != INVALID).then(|| self.id_at(p)))
    }

    /// Returns an iterator over the direct children of a layer, in insertion
    /// order.
    pub fn children(&self, id: LayerId) -> SceneResult<Children<'_>> {
        let idx = self.slot(id)?;
        Ok(Children::new(self, self.first_child[idx as usize]))
    }

    /// Returns the handles of all root layers (those with no parent).
    #[must_use]
    pub fn roots(&self) -> Vec<LayerId> {
        (0..self.len)
            .filter(|&idx| self.alive[idx as usize] && self.parent[idx as usize] == INVALID)
            .map(|idx| self.id_at(idx))
            .collect()
    }

    // -- Stacking API --

    /// Sets an absolute z, clearing any relative-z edge.
    pub(crate) fn set_layer(&mut self, id: LayerId, z: i32) -> SceneResult<()> {
        let idx = self.slot(id)?;
        if self.stacking[idx as usize] != StackSlot::Absolute {
            if let Some(p) = self.parent_slot(idx) {
                // Rejoining the parent's stacking list must not loop back.
                if self.creates_stacking_cycle(idx, p) {
                    return Err(SceneError::StackingCycle {
                        layer: id,
                        target: self.id_at(p),
                    });
                }
            }
        }
        self.z[idx as usize] = z;
        self.restack(idx, StackSlot::Absolute);
        self.mark_stacking(idx);
        Ok(())
    }

    /// Stacks `id` relative to `target` with offset `z`.
    pub(crate) fn set_relative_layer(&mut self, id: LayerId, target: LayerId, z: i32) -> SceneResult<()> {
        let idx = self.slot(id)?;
        let t = self.slot(target)?;
        if t == idx || self.creates_stacking_cycle(idx, t) {
            return Err(SceneError::StackingCycle { layer: id, target });
        }
        self.z[idx as usize] = z;
        self.restack(idx, StackSlot::Relative(t));
        self.mark_stacking(idx);
        Ok(())
    }

    /// Returns the z value of a layer (its relative offset when relatively
    /// stacked).
    pub fn z(&self, id: LayerId) -> SceneResult<i32> {
        Ok(self.z[self.slot(id)? as usize])
    }

    /// Returns how a layer is stacked.
    pub fn stacking(&self, id: LayerId) -> SceneResult<Stacking> {
        let idx = self.slot(id)?;
        Ok(match self.stacking[idx as usize] {
            StackSlot::Absolute => Stacking::Absolute,
            StackSlot::Relative(t) => Stacking::Relative(self.id_at(t)),
            StackSlot::Orphaned => Stacking::Orphaned,
        })
    }

    // -- Geometry mutation API (auto-marks dirty) --

    /// Requests a position; commits unless held by frozen geometry.
    pub(crate) fn set_position(&mut self, id: LayerId, position: Point, immediate: bool) -> SceneResult<()> {
        let idx = self.slot(id)?;
        if self.state[idx as usize].set_position(position, immediate) {
            self.mark_geometry(idx);
        }
        Ok(())
    }

    /// Requests a local crop. `None` clears it.
    pub(crate) fn set_crop(&mut self, id: LayerId, crop: Option<IntRect>, immediate: bool) -> SceneResult<()> {
        let idx = self.slot(id)?;
        if self.state[idx as usize].set_crop(crop, immediate) {
            self.mark_geometry(idx);
        }
        Ok(())
    }

    /// Requests a final crop. `None` clears it.
    pub(crate) fn set_final_crop(
        &mut self,
        id: LayerId,
        crop: Option<IntRect>,
        immediate: bool,
    ) -> SceneResult<()> {
        let idx = self.slot(id)?;
        if self.state[idx as usize].set_final_crop(crop, immediate) {
            self.mark_geometry(idx);
        }
        Ok(())
    }

    /// Records a requested size. Call [`settle_size`](Self::settle_size)
    /// once the layer's mutations for this commit are applied.
    pub(crate) fn request_size(&mut self, id: LayerId, size: IntSize) -> SceneResult<()> {
        let idx = self.slot(id)?;
        self.state[idx as usize].request_size(size);
        Ok(())
    }

    /// Commits the requested size when nothing has to wait for a buffer.
    pub(crate) fn settle_size(&mut self, id: LayerId) -> SceneResult<()> {
        let idx = self.slot(id)?;
        let scaling = self.effective_scaling_at(idx);
        if self.state[idx as usize].settle_size(scaling) {
            self.mark_geometry(idx);
        }
        Ok(())
    }

    /// Sets the 2×2 matrix.
    pub(crate) fn set_matrix(&mut self, id: LayerId, matrix: Matrix22) -> SceneResult<()> {
        let idx = self.slot(id)?;
        self.state[idx as usize].committed.matrix = matrix;
        self.mark_geometry(idx);
        Ok(())
    }

    /// Sets alpha, clamped to `0.0..=1.0`.
    pub(crate) fn set_alpha(&mut self, id: LayerId, alpha: f32) -> SceneResult<()> {
        let idx = self.slot(id)?;
        let alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
        self.state[idx as usize].committed.alpha = alpha;
        self.mark_opacity(idx);
        Ok(())
    }

    /// Sets the layer stack.
    pub(crate) fn set_layer_stack(&mut self, id: LayerId, stack: LayerStackId) -> SceneResult<()> {
        let idx = self.slot(id)?;
        self.state[idx as usize].committed.layer_stack = stack;
        self.mark_geometry(idx);
        Ok(())
    }

    /// Sets the flags.
    pub(crate) fn set_flags(&mut self, id: LayerId, flags: LayerFlags) -> SceneResult<()> {
        let idx = self.slot(id)?;
        self.state[idx as usize].committed.flags = flags;
        // Hidden is inherited, so it rides the geometry channel.
        self.mark_geometry(idx);
        Ok(())
    }

    /// Sets the fill color of a color layer. Buffer layers keep the value but
    /// do not draw it.
    pub(crate) fn set_color(&mut self, id: LayerId, color: Color) -> SceneResult<()> {
        let idx = self.slot(id)?;
        self.state[idx as usize].committed.color = color;
        self.mark_content(idx);
        Ok(())
    }

    /// Overrides (or, for `None`, inherits) the scaling mode.
    pub(crate) fn set_scaling_mode(&mut self, id: LayerId, mode: Option<ScalingMode>) -> SceneResult<()> {
        let idx = self.slot(id)?;
        self.state[idx as usize].committed.scaling = mode;
        self.mark_geometry(idx);
        Ok(())
    }

    /// Offers a buffer with the given frame number to a buffer layer.
    pub(crate) fn latch_buffer(
        &mut self,
        id: LayerId,
        frame: FrameNumber,
        buffer: BufferDesc,
    ) -> SceneResult<LatchOutcome> {
        let idx = self.slot(id)?;
        if self.kind[idx as usize] != LayerKind::Buffer {
            return Err(SceneError::NotBufferLayer(id));
        }
        let scaling = self.effective_scaling_at(idx);
        let previous = self.state[idx as usize].buffer.map(|b| b.size);
        let outcome = self.state[idx as usize].latch(frame, buffer, scaling);
        if let LatchOutcome::Accepted { resize_completed } = outcome {
            self.mark_content(idx);
            if resize_completed || previous != Some(buffer.size) {
                self.mark_geometry(idx);
            }
        }
        Ok(outcome)
    }

    // -- Property getters (read-only, no dirty marking) --

    /// Returns the debug name of a layer.
    pub fn name(&self, id: LayerId) -> SceneResult<&str> {
        Ok(&self.name[self.slot(id)? as usize])
    }

    /// Returns the owning client of a layer.
    pub fn client(&self, id: LayerId) -> SceneResult<ClientId> {
        Ok(self.client[self.slot(id)? as usize])
    }

    /// Returns whether a layer draws buffers or a color.
    pub fn kind(&self, id: LayerId) -> SceneResult<LayerKind> {
        Ok(self.kind[self.slot(id)? as usize])
    }

    /// Returns the committed geometry of a layer.
    pub fn geometry(&self, id: LayerId) -> SceneResult<&Geometry> {
        Ok(&self.state[self.slot(id)? as usize].committed)
    }

    /// Returns the most recently requested size, which may not be committed
    /// yet.
    pub fn requested_size(&self, id: LayerId) -> SceneResult<IntSize> {
        Ok(self.state[self.slot(id)? as usize].requested_size())
    }

    /// Returns the highest frame number latched on this layer's stream.
    pub fn latched_frame(&self, id: LayerId) -> SceneResult<FrameNumber> {
        Ok(self.state[self.slot(id)? as usize].latched_frame)
    }

    /// Returns the displayed buffer, if any.
    pub fn buffer(&self, id: LayerId) -> SceneResult<Option<BufferDesc>> {
        Ok(self.state[self.slot(id)? as usize].buffer)
    }

    /// Returns `true` once `detach_children` cut the layer loose from its
    /// parent. Detached layers refuse mutations but still latch buffers and
    /// can be destroyed.
    pub fn is_detached(&self, id: LayerId) -> SceneResult<bool> {
        Ok(self.detached[self.slot(id)? as usize])
    }

    /// Returns `true` while a resize or frozen geometry waits for a buffer.
    pub fn is_latch_pending(&self, id: LayerId) -> SceneResult<bool> {
        Ok(self.state[self.slot(id)? as usize].is_latch_pending())
    }

    /// Returns the derived screen-space state of a layer.
    ///
    /// Only valid after evaluation.
    pub fn world(&self, id: LayerId) -> SceneResult<&WorldGeometry> {
        Ok(&self.world[self.slot(id)? as usize])
    }

    // -- Raw-index accessors --
    //
    // These accept raw slot indices (as found in `FrameChanges` or the paint
    // order) rather than `LayerId` handles, skipping generation validation.

    /// Returns the handle for raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn id_at(&self, idx: u32) -> LayerId {
        assert!(
            idx < self.len,
            "slot index {idx} out of range (len {})",
            self.len
        );
        LayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Returns the derived state at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn world_at(&self, idx: u32) -> &WorldGeometry {
        assert!(
            idx < self.len,
            "slot index {idx} out of range (len {})",
            self.len
        );
        &self.world[idx as usize]
    }

    /// Returns the committed geometry at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn geometry_at(&self, idx: u32) -> &Geometry {
        assert!(
            idx < self.len,
            "slot index {idx} out of range (len {})",
            self.len
        );
        &self.state[idx as usize].committed
    }

    // -- Internal helpers --

    /// Resolves a handle to its slot, failing for stale handles.
    pub(crate) fn slot(&self, id: LayerId) -> SceneResult<u32> {
        if self.is_alive(id) {
            Ok(id.idx)
        } else {
            Err(SceneError::UnknownLayer(id))
        }
    }

    pub(crate) fn parent_slot(&self, idx: u32) -> Option<u32> {
        let p = self.parent[idx as usize];
        (p != INVALID).then_some(p)
    }

    /// Iterates raw child indices of `idx`.
    pub(crate) fn child_indices(&self, idx: u32) -> impl Iterator<Item = u32> + '_ {
        let mut current = self.first_child[idx as usize];
        core::iter::from_fn(move || {
            if current == INVALID {
                return None;
            }
            let c = current;
            current = self.next_sibling[c as usize];
            Some(c)
        })
    }

    /// The node whose stacking list `idx` appears in, if any.
    pub(crate) fn stacking_parent(&self, idx: u32) -> u32 {
        match self.stacking[idx as usize] {
            StackSlot::Absolute => self.parent[idx as usize],
            StackSlot::Relative(t) => t,
            StackSlot::Orphaned => INVALID,
        }
    }

    /// Returns `true` if placing `idx` in `start`'s stacking list would make
    /// `idx` its own stacking ancestor.
    fn creates_stacking_cycle(&self, idx: u32, start: u32) -> bool {
        let mut cur = start;
        let mut steps = 0;
        while cur != INVALID && steps <= self.len {
            if cur == idx {
                return true;
            }
            cur = self.stacking_parent(cur);
            steps += 1;
        }
        false
    }

    /// Returns `true` if `ancestor` is `idx` or one of its structural
    /// ancestors.
    fn is_ancestor_or_self(&self, ancestor: u32, idx: u32) -> bool {
        let mut cur = idx;
        while cur != INVALID {
            if cur == ancestor {
                return true;
            }
            cur = self.parent[cur as usize];
        }
        false
    }

    /// Rejects moves that would create a structural or stacking cycle.
    fn check_reparent(&self, c: u32, p: u32) -> SceneResult<()> {
        if self.is_ancestor_or_self(c, p) {
            return Err(SceneError::HierarchyCycle {
                layer: self.id_at(c),
                parent: self.id_at(p),
            });
        }
        if self.stacking[c as usize] == StackSlot::Absolute && self.creates_stacking_cycle(c, p) {
            return Err(SceneError::StackingCycle {
                layer: self.id_at(c),
                target: self.id_at(p),
            });
        }
        Ok(())
    }

    /// Effective scaling mode: the nearest override up the parent chain.
    pub(crate) fn effective_scaling_at(&self, idx: u32) -> ScalingMode {
        let mut cur = idx;
        while cur != INVALID {
            if let Some(mode) = self.state[cur as usize].committed.scaling {
                return mode;
            }
            cur = self.parent[cur as usize];
        }
        ScalingMode::default()
    }

    /// Derives the world state of `idx` from committed geometry alone,
    /// without relying on a previous evaluation.
    pub(crate) fn fresh_world(&self, idx: u32) -> WorldGeometry {
        let mut chain = Vec::new();
        let mut cur = idx;
        while cur != INVALID {
            chain.push(cur);
            cur = self.parent[cur as usize];
        }
        let mut world: Option<WorldGeometry> = None;
        for &i in chain.iter().rev() {
            world = Some(derive(world.as_ref(), &self.state[i as usize], Anchor::Parent));
        }
        world.unwrap_or_default()
    }

    /// Absolute z of the root whose paint-order traversal reaches `idx`, or
    /// of the topmost orphaned layer above it.
    pub(crate) fn stacking_root_z(&self, idx: u32) -> i32 {
        let mut cur = idx;
        for _ in 0..=self.len {
            let next = self.stacking_parent(cur);
            if next == INVALID {
                break;
            }
            cur = next;
        }
        self.z[cur as usize]
    }

    /// Makes `c` a root that paints right after the stacking root it hung
    /// under. Relatively stacked layers keep their target.
    fn release_to_root(&mut self, c: u32) {
        if self.stacking[c as usize] == StackSlot::Absolute {
            self.z[c as usize] = self.stacking_root_z(c);
            self.mark_stacking(c);
        }
        self.move_under(c, None);
    }

    /// Changes how `idx` is stacked, keeping the reverse index in step.
    fn restack(&mut self, idx: u32, slot: StackSlot) {
        if let StackSlot::Relative(old) = self.stacking[idx as usize] {
            self.relatives[old as usize].retain(|&r| r != idx);
        }
        if let StackSlot::Relative(t) = slot {
            self.relatives[t as usize].push(idx);
        }
        self.stacking[idx as usize] = slot;
    }

    /// Unlinks `c` from its parent (if any) and links it under `p` (if any),
    /// updating dependency edges and dirty state.
    fn move_under(&mut self, c: u32, p: Option<u32>) {
        let old = self.parent[c as usize];
        if p == (old != INVALID).then_some(old) {
            return;
        }
        if old != INVALID {
            self.unlink_from_parent(c);
            self.dirty.remove_dependency(c, old, dirty::GEOMETRY);
            self.dirty.remove_dependency(c, old, dirty::OPACITY);
            self.mark_topology(old);
        }
        if let Some(p) = p {
            self.link_child(p, c);
        }
        self.mark_inherited(c);
        self.mark_topology(c);
    }

    /// Appends `c` as the last child of `p` and adds dependency edges.
    fn link_child(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            // Walk to last child.
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        let _ = self.dirty.add_dependency(c, p, dirty::GEOMETRY);
        let _ = self.dirty.add_dependency(c, p, dirty::OPACITY);
        self.mark_topology(p);
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }

    /// Releases a slot whose children were already released or freed.
    fn free_slot(&mut self, idx: u32) {
        if self.parent[idx as usize] != INVALID {
            let p = self.parent[idx as usize];
            self.unlink_from_parent(idx);
            self.mark_topology(p);
        }

        self.restack(idx, StackSlot::Absolute);
        for j in core::mem::take(&mut self.relatives[idx as usize]) {
            self.stacking[j as usize] = StackSlot::Orphaned;
            self.mark_stacking(j);
        }

        self.dirty.remove_key(idx);

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.alive[idx as usize] = false;
        self.first_child[idx as usize] = INVALID;
        self.free_list.push(idx);
        self.pending_removed.push(idx);
        self.order_dirty = true;
        self.stale = true;
    }

    fn mark_geometry(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::GEOMETRY, &EagerPolicy);
        self.stale = true;
    }

    fn mark_opacity(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::OPACITY, &EagerPolicy);
        self.stale = true;
    }

    fn mark_content(&mut self, idx: u32) {
        self.dirty.mark(idx, dirty::CONTENT);
        self.stale = true;
    }

    fn mark_stacking(&mut self, idx: u32) {
        self.dirty.mark(idx, dirty::STACKING);
        self.order_dirty = true;
        self.stale = true;
    }

    fn mark_topology(&mut self, idx: u32) {
        self.dirty.mark(idx, dirty::TOPOLOGY);
        self.order_dirty = true;
        self.stale = true;
    }

    /// Marks the subtree rooted at `idx` dirty for inherited channels.
    fn mark_inherited(&mut self, idx: u32) {
        self.mark_geometry(idx);
        self.mark_opacity(idx);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    const APP: ClientId = ClientId(1);
    const OTHER: ClientId = ClientId(2);

    fn layer(store: &mut LayerStore, name: &str) -> LayerId {
        store
            .create_layer(APP, LayerDesc::buffer(name, 32, 32))
            .unwrap()
    }

    fn child(store: &mut LayerStore, client: ClientId, parent: LayerId) -> LayerId {
        store
            .create_layer(client, LayerDesc::buffer("child", 10, 10).with_parent(parent))
            .unwrap()
    }

    #[test]
    fn create_and_destroy() {
        let mut store = LayerStore::new();
        let id = layer(&mut store, "a");
        assert!(store.is_alive(id));
        assert_eq!(store.name(id).unwrap(), "a");
        assert_eq!(store.client(id).unwrap(), APP);
        store.destroy_layer(id).unwrap();
        assert!(!store.is_alive(id));
        assert_eq!(store.geometry(id), Err(SceneError::UnknownLayer(id)));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = LayerStore::new();
        let id1 = layer(&mut store, "a");
        store.destroy_layer(id1).unwrap();
        let id2 = layer(&mut store, "b");
        // id2 reuses the same slot but has a different generation.
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
        assert!(
            store.sequence[id2.idx as usize] > 0,
            "creation sequence is never reused"
        );
    }

    #[test]
    fn create_with_stale_parent_fails() {
        let mut store = LayerStore::new();
        let p = layer(&mut store, "p");
        store.destroy_layer(p).unwrap();
        let err = store
            .create_layer(APP, LayerDesc::buffer("c", 1, 1).with_parent(p))
            .unwrap_err();
        assert_eq!(err, SceneError::InvalidParent(p));
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn children_and_parent_queries() {
        let mut store = LayerStore::new();
        let parent = layer(&mut store, "p");
        let c1 = child(&mut store, APP, parent);
        let c2 = child(&mut store, APP, parent);

        assert_eq!(store.parent(c1).unwrap(), Some(parent));
        let kids: Vec<_> = store.children(parent).unwrap().collect();
        assert_eq!(kids, vec![c1, c2]);
        assert_eq!(store.roots(), vec![parent]);
    }

    #[test]
    fn destroy_cascades_to_same_client_children_only() {
        let mut store = LayerStore::new();
        let parent = layer(&mut store, "p");
        let mine = child(&mut store, APP, parent);
        let grandchild = child(&mut store, APP, mine);
        let theirs = child(&mut store, OTHER, parent);
        store
            .set_position(theirs, Point::new(10.0, 10.0), true)
            .unwrap();

        let destroyed = store.destroy_layer(parent).unwrap();
        assert_eq!(destroyed.len(), 3);
        assert_eq!(destroyed[0], parent);
        assert!(!store.is_alive(mine));
        assert!(!store.is_alive(grandchild));
        assert!(store.is_alive(theirs));
        assert_eq!(store.parent(theirs).unwrap(), None);
        assert_eq!(
            store.geometry(theirs).unwrap().position,
            Point::new(10.0, 10.0),
            "released child keeps its local geometry"
        );
    }

    #[test]
    fn destroying_target_orphans_relative_layers() {
        let mut store = LayerStore::new();
        let target = layer(&mut store, "t");
        let rel = layer(&mut store, "r");
        store.set_relative_layer(rel, target, 1).unwrap();
        store.destroy_layer(target).unwrap();
        assert_eq!(store.stacking(rel).unwrap(), Stacking::Orphaned);

        store.set_layer(rel, 5).unwrap();
        assert_eq!(store.stacking(rel).unwrap(), Stacking::Absolute);
        assert_eq!(store.z(rel).unwrap(), 5);
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut store = LayerStore::new();
        let a = layer(&mut store, "a");
        let b = child(&mut store, APP, a);
        let c = child(&mut store, APP, b);

        assert_eq!(
            store.reparent(a, Some(c)),
            Err(SceneError::HierarchyCycle { layer: a, parent: c })
        );
        assert_eq!(
            store.reparent(a, Some(a)),
            Err(SceneError::HierarchyCycle { layer: a, parent: a })
        );
        assert_eq!(store.parent(a).unwrap(), None, "prior state untouched");

        store.reparent(c, None).unwrap();
        assert_eq!(store.parent(c).unwrap(), None);
        store.reparent(c, Some(a)).unwrap();
        assert_eq!(store.parent(c).unwrap(), Some(a));
    }

    #[test]
    fn reparent_children_moves_all() {
        let mut store = LayerStore::new();
        let a = layer(&mut store, "a");
        let b = layer(&mut store, "b");
        let c1 = child(&mut store, APP, a);
        let c2 = child(&mut store, OTHER, a);

        store.reparent_children(a, Some(b)).unwrap();
        let kids: Vec<_> = store.children(b).unwrap().collect();
        assert_eq!(kids, vec![c1, c2]);
        assert!(store.children(a).unwrap().next().is_none());

        assert_eq!(
            store.reparent_children(b, Some(c1)),
            Err(SceneError::HierarchyCycle { layer: c1, parent: c1 })
        );
        assert_eq!(store.parent(c2).unwrap(), Some(b), "no partial moves");
    }

    #[test]
    fn detach_children_bakes_parent_frame() {
        let mut store = LayerStore::new();
        let parent = layer(&mut store, "p");
        store
            .set_position(parent, Point::new(64.0, 64.0), true)
            .unwrap();
        let mine = child(&mut store, APP, parent);
        let theirs = child(&mut store, OTHER, parent);
        store
            .set_position(theirs, Point::new(10.0, 10.0), true)
            .unwrap();

        assert_eq!(store.detach_children(parent).unwrap(), 1);
        assert_eq!(store.parent(mine).unwrap(), Some(parent));
        assert_eq!(store.parent(theirs).unwrap(), None);
        assert_eq!(
            store.geometry(theirs).unwrap().position,
            Point::new(74.0, 74.0)
        );
        assert!(store.is_detached(theirs).unwrap());
        assert!(!store.is_detached(mine).unwrap());
    }

    #[test]
    fn released_children_keep_their_paint_position() {
        let mut store = LayerStore::new();
        let below = layer(&mut store, "below");
        let parent = layer(&mut store, "parent");
        let above = layer(&mut store, "above");
        store.set_layer(below, 5).unwrap();
        store.set_layer(parent, 10).unwrap();
        store.set_layer(above, 20).unwrap();
        let detached = child(&mut store, OTHER, parent);
        let sibling = child(&mut store, OTHER, parent);
        let _ = store.evaluate();

        store.detach_children(parent).unwrap();
        assert_eq!(store.z(detached).unwrap(), 10);
        let _ = store.evaluate();
        let order: Vec<LayerId> = store
            .paint_order()
            .iter()
            .map(|e| store.id_at(e.index))
            .collect();
        assert_eq!(order, [below, parent, detached, sibling, above]);

        let moved = child(&mut store, OTHER, parent);
        store.destroy_layer(parent).unwrap();
        assert_eq!(store.parent(moved).unwrap(), None);
        assert_eq!(store.z(moved).unwrap(), 10);
        assert!(!store.is_detached(moved).unwrap());
        let _ = store.evaluate();
        let order: Vec<LayerId> = store
            .paint_order()
            .iter()
            .map(|e| store.id_at(e.index))
            .collect();
        assert_eq!(order, [below, detached, sibling, moved, above]);
    }

    #[test]
    fn retargeted_relatives_survive_their_old_target() {
        let mut store = LayerStore::new();
        let first = layer(&mut store, "first");
        let second = layer(&mut store, "second");
        let rel = layer(&mut store, "rel");
        store.set_relative_layer(rel, first, 1).unwrap();
        store.set_relative_layer(rel, second, 1).unwrap();
        assert!(store.relatives[first.idx as usize].is_empty());

        store.destroy_layer(first).unwrap();
        assert_eq!(store.stacking(rel).unwrap(), Stacking::Relative(second));

        store.destroy_layer(second).unwrap();
        assert_eq!(store.stacking(rel).unwrap(), Stacking::Orphaned);
        assert!(store.relatives.iter().all(Vec::is_empty));
    }

    #[test]
    fn relative_cycles_are_rejected() {
        let mut store = LayerStore::new();
        let a = layer(&mut store, "a");
        let b = layer(&mut store, "b");
        let c = child(&mut store, APP, a);

        store.set_relative_layer(b, a, 1).unwrap();
        assert_eq!(
            store.set_relative_layer(a, b, 1),
            Err(SceneError::StackingCycle { layer: a, target: b })
        );
        assert_eq!(
            store.set_relative_layer(a, c, 1),
            Err(SceneError::StackingCycle { layer: a, target: c })
        );
        assert_eq!(
            store.set_relative_layer(a, a, 1),
            Err(SceneError::StackingCycle { layer: a, target: a })
        );
    }

    #[test]
    fn relative_edge_is_independent_of_parent() {
        let mut store = LayerStore::new();
        let p = layer(&mut store, "p");
        let t = layer(&mut store, "t");
        let c = child(&mut store, APP, p);
        store.set_relative_layer(c, t, 2).unwrap();
        assert_eq!(store.parent(c).unwrap(), Some(p));
        assert_eq!(store.stacking(c).unwrap(), Stacking::Relative(t));

        store.set_layer(c, -1).unwrap();
        assert_eq!(store.stacking(c).unwrap(), Stacking::Absolute);
        assert_eq!(store.z(c).unwrap(), -1);
    }

    #[test]
    fn color_layers_refuse_buffers() {
        let mut store = LayerStore::new();
        let color = store
            .create_layer(APP, LayerDesc::color("c", 8, 8))
            .unwrap();
        let buffer = BufferDesc::new(crate::buffer::BufferId(1), 8, 8);
        assert_eq!(
            store.latch_buffer(color, 1, buffer),
            Err(SceneError::NotBufferLayer(color))
        );
    }

    #[test]
    fn scaling_mode_is_inherited() {
        let mut store = LayerStore::new();
        let p = layer(&mut store, "p");
        let c = child(&mut store, APP, p);
        assert_eq!(store.effective_scaling_at(c.idx), ScalingMode::Freeze);
        store
            .set_scaling_mode(p, Some(ScalingMode::ScaleToWindow))
            .unwrap();
        assert_eq!(store.effective_scaling_at(c.idx), ScalingMode::ScaleToWindow);
        store.set_scaling_mode(c, Some(ScalingMode::Freeze)).unwrap();
        assert_eq!(store.effective_scaling_at(c.idx), ScalingMode::Freeze);
    }

    #[test]
    fn alpha_is_clamped() {
        let mut store = LayerStore::new();
        let a = layer(&mut store, "a");
        store.set_alpha(a, 1.5).unwrap();
        assert_eq!(store.geometry(a).unwrap().alpha, 1.0);
        store.set_alpha(a, -0.5).unwrap();
        assert_eq!(store.geometry(a).unwrap().alpha, 0.0);
    }
}
