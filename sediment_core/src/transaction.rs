// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atomic batches of layer mutations.
//!
//! A [`Transaction`] records `(layer, mutation)` pairs in call order, plus
//! per-layer conditions: a [`DeferUntil`] barrier and the
//! *geometry applies with resize* flag. Nothing touches the scene until the
//! transaction is handed to [`Scene::apply`](crate::scene::Scene::apply).
//!
//! ```rust,ignore
//! let txn = Transaction::new()
//!     .set_position(fg, 64.0, 64.0)
//!     .set_size(fg, 128, 128)
//!     .set_geometry_applies_with_resize(fg);
//! scene.apply(txn);
//! ```

use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::Point;

use crate::buffer::{FrameNumber, ScalingMode};
use crate::geometry::{Color, IntRect, IntSize, LayerFlags};
use crate::layer::LayerId;
use crate::output::LayerStackId;
use crate::transform::Matrix22;

/// Holds a layer's mutations until `barrier` has latched `frame`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeferUntil {
    /// Layer whose buffer stream gates the release.
    pub barrier: LayerId,
    /// Frame number the barrier must have latched.
    pub frame: FrameNumber,
}

/// A single recorded change to one layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mutation {
    /// Offset in the parent's frame.
    Position(Point),
    /// Requested layer size.
    Size(IntSize),
    /// Local crop; `None` clears it.
    Crop(Option<IntRect>),
    /// Crop in the parent's frame; `None` clears it.
    FinalCrop(Option<IntRect>),
    /// Linear part of the placement.
    Matrix(Matrix22),
    /// Layer alpha.
    Alpha(f32),
    /// Absolute z among siblings.
    Layer(i32),
    /// z relative to another layer.
    RelativeLayer {
        /// The layer to stack against.
        target: LayerId,
        /// Offset within the target's stacking list.
        z: i32,
    },
    /// Display selector.
    LayerStack(LayerStackId),
    /// Visibility flags.
    Flags(LayerFlags),
    /// Fill color of a color layer.
    Color(Color),
    /// Scaling-mode override.
    OverrideScalingMode(Option<ScalingMode>),
    /// New parent, or root for `None`.
    Reparent(Option<LayerId>),
    /// New parent for every current child.
    ReparentChildren(Option<LayerId>),
    /// Sever children owned by other clients.
    DetachChildren,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Conditions {
    defer: Option<DeferUntil>,
    applies_with_resize: bool,
}

/// A batch of mutations applied atomically by the scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transaction {
    records: Vec<(LayerId, Mutation)>,
    conditions: Vec<(LayerId, Conditions)>,
}

/// All of one layer's records from a transaction, in call order.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LayerGroup {
    pub(crate) layer: LayerId,
    pub(crate) mutations: Vec<Mutation>,
    pub(crate) defer: Option<DeferUntil>,
    pub(crate) applies_with_resize: bool,
}

impl Transaction {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no mutation was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of recorded mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns the layers touched, in first-appearance order.
    #[must_use]
    pub fn layers(&self) -> Vec<LayerId> {
        let mut seen = Vec::new();
        for (layer, _) in &self.records {
            if !seen.contains(layer) {
                seen.push(*layer);
            }
        }
        seen
    }

    /// Returns every recorded mutation in call order.
    #[must_use]
    pub fn records(&self) -> &[(LayerId, Mutation)] {
        &self.records
    }

    /// Returns the barrier set for `layer`, if any.
    #[must_use]
    pub fn deferral(&self, layer: LayerId) -> Option<DeferUntil> {
        self.conditions_of(layer).and_then(|c| c.defer)
    }

    /// Records an arbitrary mutation.
    #[must_use]
    pub fn push(mut self, layer: LayerId, mutation: Mutation) -> Self {
        self.records.push((layer, mutation));
        self
    }

    /// Moves the layer origin to `(x, y)` in its parent's frame.
    #[must_use]
    pub fn set_position(self, layer: LayerId, x: f64, y: f64) -> Self {
        self.push(layer, Mutation::Position(Point::new(x, y)))
    }

    /// Requests a new layer size.
    #[must_use]
    pub fn set_size(self, layer: LayerId, width: u32, height: u32) -> Self {
        self.push(layer, Mutation::Size(IntSize::new(width, height)))
    }

    /// Sets the local crop. An invalid rectangle clears it.
    #[must_use]
    pub fn set_crop(self, layer: LayerId, crop: IntRect) -> Self {
        self.push(layer, Mutation::Crop(crop.valid()))
    }

    /// Sets the final crop. An invalid rectangle clears it.
    #[must_use]
    pub fn set_final_crop(self, layer: LayerId, crop: IntRect) -> Self {
        self.push(layer, Mutation::FinalCrop(crop.valid()))
    }

    /// Sets the 2×2 matrix, coefficients in sampling order.
    #[must_use]
    pub fn set_matrix(self, layer: LayerId, dsdx: f64, dtdx: f64, dtdy: f64, dsdy: f64) -> Self {
        self.push(layer, Mutation::Matrix(Matrix22::new(dsdx, dtdx, dtdy, dsdy)))
    }

    /// Sets the layer alpha.
    #[must_use]
    pub fn set_alpha(self, layer: LayerId, alpha: f32) -> Self {
        self.push(layer, Mutation::Alpha(alpha))
    }

    /// Stacks the layer absolutely among its siblings at `z`, dropping any
    /// relative stacking.
    #[must_use]
    pub fn set_layer(self, layer: LayerId, z: i32) -> Self {
        self.push(layer, Mutation::Layer(z))
    }

    /// Stacks the layer at offset `z` within `target`'s stacking list.
    #[must_use]
    pub fn set_relative_layer(self, layer: LayerId, target: LayerId, z: i32) -> Self {
        self.push(layer, Mutation::RelativeLayer { target, z })
    }

    /// Assigns the layer stack.
    #[must_use]
    pub fn set_layer_stack(self, layer: LayerId, stack: LayerStackId) -> Self {
        self.push(layer, Mutation::LayerStack(stack))
    }

    /// Replaces the layer flags.
    #[must_use]
    pub fn set_flags(self, layer: LayerId, flags: LayerFlags) -> Self {
        self.push(layer, Mutation::Flags(flags))
    }

    /// Clears the hidden flag.
    #[must_use]
    pub fn show(self, layer: LayerId) -> Self {
        self.set_flags(layer, LayerFlags { hidden: false })
    }

    /// Sets the hidden flag.
    #[must_use]
    pub fn hide(self, layer: LayerId) -> Self {
        self.set_flags(layer, LayerFlags::HIDDEN)
    }

    /// Sets the fill color.
    #[must_use]
    pub fn set_color(self, layer: LayerId, color: Color) -> Self {
        self.push(layer, Mutation::Color(color))
    }

    /// Overrides the scaling mode; `None` inherits from the parent.
    #[must_use]
    pub fn set_override_scaling_mode(self, layer: LayerId, mode: Option<ScalingMode>) -> Self {
        self.push(layer, Mutation::OverrideScalingMode(mode))
    }

    /// Moves the layer under `parent`, or makes it a root.
    #[must_use]
    pub fn reparent(self, layer: LayerId, parent: Option<LayerId>) -> Self {
        self.push(layer, Mutation::Reparent(parent))
    }

    /// Moves every current child of the layer under `parent`.
    #[must_use]
    pub fn reparent_children(self, layer: LayerId, parent: Option<LayerId>) -> Self {
        self.push(layer, Mutation::ReparentChildren(parent))
    }

    /// Severs children owned by other clients from this layer.
    #[must_use]
    pub fn detach_children(self, layer: LayerId) -> Self {
        self.push(layer, Mutation::DetachChildren)
    }

    /// Holds this transaction's mutations for `layer` until `barrier` has
    /// latched `frame`.
    #[must_use]
    pub fn defer_until(mut self, layer: LayerId, barrier: LayerId, frame: FrameNumber) -> Self {
        self.conditions_mut(layer).defer = Some(DeferUntil { barrier, frame });
        self
    }

    /// Holds position and crop changes for `layer` until the buffer that
    /// completes its pending resize is latched.
    #[must_use]
    pub fn set_geometry_applies_with_resize(mut self, layer: LayerId) -> Self {
        self.conditions_mut(layer).applies_with_resize = true;
        self
    }

    /// Appends `other` after `self`. Where both set a field, `other` wins.
    /// `other`'s barrier replaces this one; resize flags are combined.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.records.extend(other.records);
        for (layer, cond) in other.conditions {
            let mine = self.conditions_mut(layer);
            if cond.defer.is_some() {
                mine.defer = cond.defer;
            }
            mine.applies_with_resize |= cond.applies_with_resize;
        }
        self
    }

    /// Splits the transaction into per-layer groups in first-appearance
    /// order. Layers that only carry conditions form empty groups.
    pub(crate) fn into_groups(self) -> Vec<LayerGroup> {
        let mut index: HashMap<LayerId, usize> = HashMap::new();
        let mut groups: Vec<LayerGroup> = Vec::new();
        let mut slot = |layer: LayerId, groups: &mut Vec<LayerGroup>| -> usize {
            *index.entry(layer).or_insert_with(|| {
                groups.push(LayerGroup {
                    layer,
                    mutations: Vec::new(),
                    defer: None,
                    applies_with_resize: false,
                });
                groups.len() - 1
            })
        };
        for (layer, mutation) in self.records {
            let i = slot(layer, &mut groups);
            groups[i].mutations.push(mutation);
        }
        for (layer, cond) in self.conditions {
            let i = slot(layer, &mut groups);
            groups[i].defer = cond.defer;
            groups[i].applies_with_resize = cond.applies_with_resize;
        }
        groups
    }

    fn conditions_of(&self, layer: LayerId) -> Option<&Conditions> {
        self.conditions
            .iter()
            .find(|(l, _)| *l == layer)
            .map(|(_, c)| c)
    }

    fn conditions_mut(&mut self, layer: LayerId) -> &mut Conditions {
        let pos = match self.conditions.iter().position(|(l, _)| *l == layer) {
            Some(pos) => pos,
            None => {
                self.conditions.push((layer, Conditions::default()));
                self.conditions.len() - 1
            }
        };
        &mut self.conditions[pos].1
    }
}
