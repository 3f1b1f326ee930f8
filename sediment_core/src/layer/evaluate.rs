// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame evaluation and change tracking.
//!
//! Evaluation follows a drain-recompute pattern for each dirty channel:
//!
//! 1. **STACKING** / **TOPOLOGY**: if either was touched since the last
//!    evaluation, the paint order is rebuilt up front.
//! 2. **GEOMETRY**: Drain dirty indices in parent-before-child order and
//!    re-derive each layer's [`WorldGeometry`] from its parent's.
//! 3. **OPACITY**: Drain dirty indices, recompute the alpha product.
//! 4. **CONTENT**: Drain dirty indices (no recomputation; capture reads the
//!    committed buffer or color directly).
//! 5. **TOPOLOGY** / **STACKING**: Drain and discard.
//!
//! [`FrameChanges`] uses raw slot indices (`u32`) rather than
//! [`LayerId`](super::LayerId) handles so that consumers can index directly
//! via the `*_at()` accessors.

use alloc::vec::Vec;

use kurbo::{Affine, Rect, Vec2};

use super::id::INVALID;
use super::state::GeometryState;
use super::store::LayerStore;
use crate::buffer::{BufferDesc, ScalingMode};
use crate::dirty;
use crate::geometry::IntSize;
use crate::output::LayerStackId;

/// Screen-space state derived from a layer's committed geometry and its
/// ancestors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldGeometry {
    /// Local layer space to screen.
    pub transform: Affine,
    /// The frame children are placed in: `transform` followed by the
    /// buffer stretch when the layer scales its buffer to its bounds.
    pub child_frame: Affine,
    /// Local layer space to buffer pixels.
    pub content_scale: Vec2,
    /// Bounds intersected with the local crop, in local space. Never has a
    /// negative extent.
    pub local_clip: Rect,
    /// Screen-space clip inherited from ancestors and the final crop. `None`
    /// means unclipped.
    pub clip: Option<Rect>,
    /// Screen-space clip handed down to children.
    pub child_clip: Option<Rect>,
    /// Product of alphas down the parent chain.
    pub alpha: f32,
    /// Whether this layer or any ancestor is hidden.
    pub hidden: bool,
    /// Layer stack inherited from the root ancestor.
    pub layer_stack: LayerStackId,
    /// Effective scaling mode.
    pub scaling: ScalingMode,
}

impl Default for WorldGeometry {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            child_frame: Affine::IDENTITY,
            content_scale: Vec2::new(1.0, 1.0),
            local_clip: Rect::ZERO,
            clip: None,
            child_clip: None,
            alpha: 1.0,
            hidden: false,
            layer_stack: LayerStackId::default(),
            scaling: ScalingMode::default(),
        }
    }
}

/// Where a derived layer hangs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Anchor {
    /// Placed by its own position and matrix within the parent's frame.
    Parent,
    /// The origin of a subtree capture: identity placement, no final crop,
    /// own layer stack.
    Origin,
}

/// Derives one layer's world state from its parent's.
pub(crate) fn derive(
    parent: Option<&WorldGeometry>,
    state: &GeometryState,
    anchor: Anchor,
) -> WorldGeometry {
    let g = &state.committed;
    let parent_frame = parent.map_or(Affine::IDENTITY, |p| p.child_frame);
    let (placement, final_crop) = match anchor {
        Anchor::Parent => (g.matrix.placement(g.position), g.final_crop),
        Anchor::Origin => (Affine::IDENTITY, None),
    };
    let transform = parent_frame * placement;

    let scaling = g
        .scaling
        .or(parent.map(|p| p.scaling))
        .unwrap_or_default();
    let stretch = stretch(g.size, state.buffer, scaling);
    let child_frame = transform * Affine::scale_non_uniform(stretch.x, stretch.y);

    let local_clip = match g.crop {
        Some(crop) => g.size.to_rect().intersect(crop.to_rect()),
        None => g.size.to_rect(),
    };

    let inherited = parent.and_then(|p| p.child_clip);
    let final_clip = final_crop.map(|r| parent_frame.transform_rect_bbox(r.to_rect()));
    let clip = match (inherited, final_clip) {
        (Some(a), Some(b)) => Some(a.intersect(b)),
        (a, b) => a.or(b),
    };
    let own = transform.transform_rect_bbox(local_clip);
    let child_clip = Some(clip.map_or(own, |c| c.intersect(own)));

    let layer_stack = match (anchor, parent) {
        (Anchor::Parent, Some(p)) => p.layer_stack,
        _ => g.layer_stack,
    };

    WorldGeometry {
        transform,
        child_frame,
        content_scale: Vec2::new(1.0 / stretch.x, 1.0 / stretch.y),
        local_clip,
        clip,
        child_clip,
        alpha: parent.map_or(1.0, |p| p.alpha) * g.alpha,
        hidden: parent.is_some_and(|p| p.hidden) || g.flags.hidden,
        layer_stack,
        scaling,
    }
}

/// Buffer-to-local scale factor.
fn stretch(size: IntSize, buffer: Option<BufferDesc>, scaling: ScalingMode) -> Vec2 {
    match buffer {
        Some(b) if scaling == ScalingMode::ScaleToWindow && !b.size.is_empty() && !size.is_empty() => {
            Vec2::new(
                f64::from(size.width) / f64::from(b.size.width),
                f64::from(size.height) / f64::from(b.size.height),
            )
        }
        _ => Vec2::new(1.0, 1.0),
    }
}

/// The set of changes produced by one or more evaluations.
///
/// Each field contains the raw slot indices of layers that changed in the
/// corresponding category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameChanges {
    /// Layers whose world geometry was re-derived.
    pub geometry: Vec<u32>,
    /// Layers whose effective alpha was recomputed.
    pub opacities: Vec<u32>,
    /// Layers whose displayed buffer or color changed.
    pub content: Vec<u32>,
    /// Layers that transitioned from visible to effectively hidden.
    pub hidden: Vec<u32>,
    /// Layers that transitioned from effectively hidden to visible.
    pub unhidden: Vec<u32>,
    /// Layers added since the last evaluate.
    pub added: Vec<u32>,
    /// Layers removed since the last evaluate.
    pub removed: Vec<u32>,
    /// Whether the paint order was rebuilt.
    pub order_changed: bool,
}

impl FrameChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.geometry.clear();
        self.opacities.clear();
        self.content.clear();
        self.hidden.clear();
        self.unhidden.clear();
        self.added.clear();
        self.removed.clear();
        self.order_changed = false;
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.order_changed
            && self.geometry.is_empty()
            && self.opacities.is_empty()
            && self.content.is_empty()
            && self.hidden.is_empty()
            && self.unhidden.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
    }

    /// Appends another batch of changes.
    pub fn extend(&mut self, other: Self) {
        self.geometry.extend(other.geometry);
        self.opacities.extend(other.opacities);
        self.content.extend(other.content);
        self.hidden.extend(other.hidden);
        self.unhidden.extend(other.unhidden);
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.order_changed |= other.order_changed;
    }

    /// Sorts and deduplicates every list. A layer that was both hidden and
    /// unhidden over the accumulated batches is dropped from both.
    pub fn normalize(&mut self) {
        for list in [
            &mut self.geometry,
            &mut self.opacities,
            &mut self.content,
            &mut self.hidden,
            &mut self.unhidden,
            &mut self.added,
            &mut self.removed,
        ] {
            list.sort_unstable();
            list.dedup();
        }
        let flipped: Vec<u32> = self
            .hidden
            .iter()
            .copied()
            .filter(|idx| self.unhidden.binary_search(idx).is_ok())
            .collect();
        self.hidden.retain(|idx| flipped.binary_search(idx).is_err());
        self.unhidden.retain(|idx| flipped.binary_search(idx).is_err());
    }
}

impl LayerStore {
    /// Evaluates the layer tree, recomputing dirty state and returning the
    /// set of changes.
    pub fn evaluate(&mut self) -> FrameChanges {
        let mut changes = FrameChanges::default();
        self.evaluate_into(&mut changes);
        changes
    }

    /// Like [`evaluate`](Self::evaluate), but reuses a caller-provided buffer
    /// to avoid allocation.
    pub fn evaluate_into(&mut self, changes: &mut FrameChanges) {
        changes.clear();

        if self.order_dirty {
            self.order = self.resolve_paint_order();
            changes.order_changed = true;
            self.order_dirty = false;
        }

        // Drain GEOMETRY channel: parents come out before their children.
        let dirty_geometry: Vec<u32> = self
            .dirty
            .drain(dirty::GEOMETRY)
            .affected()
            .deterministic()
            .run()
            .filter(|&idx| self.alive[idx as usize])
            .collect();
        for &idx in &dirty_geometry {
            let parent_idx = self.parent[idx as usize];
            let parent = (parent_idx != INVALID).then(|| self.world[parent_idx as usize]);
            let new = derive(parent.as_ref(), &self.state[idx as usize], Anchor::Parent);
            let old_hidden = self.world[idx as usize].hidden;
            if new.hidden != old_hidden {
                if new.hidden {
                    changes.hidden.push(idx);
                } else {
                    changes.unhidden.push(idx);
                }
            }
            self.world[idx as usize] = new;
        }
        changes.geometry = dirty_geometry;

        // Drain OPACITY channel.
        let dirty_opacities: Vec<u32> = self
            .dirty
            .drain(dirty::OPACITY)
            .affected()
            .deterministic()
            .run()
            .filter(|&idx| self.alive[idx as usize])
            .collect();
        for &idx in &dirty_opacities {
            let parent_idx = self.parent[idx as usize];
            let parent_alpha = if parent_idx != INVALID {
                self.world[parent_idx as usize].alpha
            } else {
                1.0
            };
            self.world[idx as usize].alpha =
                parent_alpha * self.state[idx as usize].committed.alpha;
        }
        changes.opacities = dirty_opacities;

        // Drain CONTENT channel.
        changes.content = self
            .dirty
            .drain(dirty::CONTENT)
            .deterministic()
            .run()
            .filter(|&idx| self.alive[idx as usize])
            .collect();

        // Structural channels were folded into the paint order above.
        let _: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();
        let _: Vec<u32> = self
            .dirty
            .drain(dirty::STACKING)
            .deterministic()
            .run()
            .collect();

        // Move lifecycle lists.
        core::mem::swap(&mut self.pending_added, &mut changes.added);
        core::mem::swap(&mut self.pending_removed, &mut changes.removed);

        self.stale = false;
    }

    /// Returns `true` if committed state changed since the last evaluation.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}
