// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capture planning.
//!
//! A capture never touches pixels. It flattens the committed scene into a
//! back-to-front [`CapturePlan`]: for each visible layer, what it draws and
//! where. A [`Renderer`](crate::backend::Renderer) turns the plan into pixels.
//!
//! Two kinds of capture exist:
//!
//! - **Full screen**: every layer on one layer stack, in resolved paint order,
//!   optionally restricted to an inclusive range of root z values.
//! - **Subtree**: one layer and its structural descendants, placed at the
//!   origin of a capture sized to that layer. Ancestors, layer-stack
//!   membership, relative stacking and the root's own final crop are ignored.

use alloc::vec::Vec;

use kurbo::{Affine, Rect, Vec2};

use crate::buffer::BufferDesc;
use crate::geometry::Color;
use crate::layer::{Anchor, LayerId, LayerKind, LayerStore, WorldGeometry, derive};
use crate::output::LayerStackId;

/// Target of a full-screen capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompositionContext {
    /// Only layers on this stack are captured.
    pub layer_stack: LayerStackId,
    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    /// Lowest admitted root z (inclusive).
    pub min_z: i32,
    /// Highest admitted root z (inclusive).
    pub max_z: i32,
}

impl CompositionContext {
    /// Captures everything on `layer_stack`.
    #[must_use]
    pub const fn new(layer_stack: LayerStackId, width: u32, height: u32) -> Self {
        Self {
            layer_stack,
            width,
            height,
            min_z: i32::MIN,
            max_z: i32::MAX,
        }
    }

    /// Restricts the capture to roots with `min_z <= z <= max_z`.
    #[must_use]
    pub const fn with_z_range(mut self, min_z: i32, max_z: i32) -> Self {
        self.min_z = min_z;
        self.max_z = max_z;
        self
    }

    /// Returns `true` if a root with this z is captured.
    #[inline]
    #[must_use]
    pub const fn admits_z(&self, z: i32) -> bool {
        self.min_z <= z && z <= self.max_z
    }
}

/// What a captured layer draws.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CaptureContent {
    /// The layer's displayed buffer.
    Buffer(BufferDesc),
    /// A solid fill.
    Color(Color),
}

/// One layer in a capture plan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureItem {
    /// The captured layer.
    pub layer: LayerId,
    /// What to draw.
    pub content: CaptureContent,
    /// Layer space to capture space.
    pub transform: Affine,
    /// Layer space to buffer pixels.
    pub content_scale: Vec2,
    /// Region of layer space that draws, already limited to the buffer.
    pub local_clip: Rect,
    /// Capture-space clip; `None` means unclipped.
    pub clip: Option<Rect>,
    /// Effective alpha.
    pub alpha: f32,
}

/// Back-to-front list of what to draw.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CapturePlan {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Items, bottom first.
    pub items: Vec<CaptureItem>,
}

impl CapturePlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            items: Vec::new(),
        }
    }

    /// Returns `true` if nothing draws.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the captured layers, bottom first.
    pub fn layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.items.iter().map(|item| item.layer)
    }
}

impl LayerStore {
    /// Plans a full-screen capture from the last evaluation.
    pub(crate) fn plan_full_screen(&self, ctx: &CompositionContext) -> CapturePlan {
        let mut plan = CapturePlan::new(ctx.width, ctx.height);
        for entry in &self.order {
            if !ctx.admits_z(entry.root_z) {
                continue;
            }
            let world = &self.world[entry.index as usize];
            if world.hidden || world.layer_stack != ctx.layer_stack {
                continue;
            }
            if let Some(item) = self.capture_item(entry.index, world) {
                plan.items.push(item);
            }
        }
        plan
    }

    /// Plans a capture of `root` and its structural descendants.
    pub(crate) fn plan_subtree(&self, root: u32) -> CapturePlan {
        let size = self.state[root as usize].committed.size;
        let mut plan = CapturePlan::new(size.width, size.height);
        self.visit_subtree(root, None, Anchor::Origin, &mut plan);
        plan
    }

    fn visit_subtree(
        &self,
        idx: u32,
        parent: Option<&WorldGeometry>,
        anchor: Anchor,
        plan: &mut CapturePlan,
    ) {
        let world = derive(parent, &self.state[idx as usize], anchor);
        if world.hidden {
            return;
        }
        let mut list: Vec<u32> = self.child_indices(idx).collect();
        list.sort_by_key(|&c| (self.z[c as usize], self.sequence[c as usize]));
        let split = list.partition_point(|&c| self.z[c as usize] < 0);

        for &c in &list[..split] {
            self.visit_subtree(c, Some(&world), Anchor::Parent, plan);
        }
        if let Some(item) = self.capture_item(idx, &world) {
            plan.items.push(item);
        }
        for &c in &list[split..] {
            self.visit_subtree(c, Some(&world), Anchor::Parent, plan);
        }
    }

    /// Builds the item for one layer, or `None` if it draws nothing.
    fn capture_item(&self, idx: u32, world: &WorldGeometry) -> Option<CaptureItem> {
        if world.alpha <= 0.0 {
            return None;
        }
        let state = &self.state[idx as usize];
        let (content, local_clip) = match self.kind[idx as usize] {
            LayerKind::Color => (CaptureContent::Color(state.committed.color), world.local_clip),
            LayerKind::Buffer => {
                let buffer = state.buffer?;
                let extent = Rect::new(
                    0.0,
                    0.0,
                    f64::from(buffer.size.width) / world.content_scale.x,
                    f64::from(buffer.size.height) / world.content_scale.y,
                );
                (CaptureContent::Buffer(buffer), world.local_clip.intersect(extent))
            }
        };
        if local_clip.area() <= 0.0 {
            return None;
        }
        if world.clip.is_some_and(|c| c.area() <= 0.0) {
            return None;
        }
        Some(CaptureItem {
            layer: self.id_at(idx),
            content,
            transform: world.transform,
            content_scale: world.content_scale,
            local_clip,
            clip: world.clip,
            alpha: world.alpha,
        })
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;

    use super::*;
    use crate::buffer::BufferId;
    use crate::geometry::{IntRect, LayerFlags};
    use crate::layer::{ClientId, LayerDesc};

    const APP: ClientId = ClientId(1);

    fn color(store: &mut LayerStore, w: u32, h: u32, parent: Option<LayerId>) -> LayerId {
        let mut desc = LayerDesc::color("c", w, h);
        if let Some(p) = parent {
            desc = desc.with_parent(p);
        }
        store.create_layer(APP, desc).unwrap()
    }

    #[test]
    fn z_range_is_inclusive() {
        let mut store = LayerStore::new();
        let a = color(&mut store, 8, 8, None);
        let b = color(&mut store, 8, 8, None);
        let c = color(&mut store, 8, 8, None);
        store.set_layer(a, 1).unwrap();
        store.set_layer(b, 2).unwrap();
        store.set_layer(c, 3).unwrap();
        let _ = store.evaluate();

        let ctx = CompositionContext::new(LayerStackId(0), 8, 8).with_z_range(1, 2);
        let plan = store.plan_full_screen(&ctx);
        assert_eq!(plan.layers().collect::<Vec<_>>(), [a, b]);
    }

    #[test]
    fn other_stacks_and_hidden_layers_are_skipped() {
        let mut store = LayerStore::new();
        let shown = color(&mut store, 8, 8, None);
        let hidden = color(&mut store, 8, 8, None);
        let elsewhere = color(&mut store, 8, 8, None);
        store.set_flags(hidden, LayerFlags::HIDDEN).unwrap();
        store.set_layer_stack(elsewhere, LayerStackId(1)).unwrap();
        let _ = store.evaluate();

        let plan = store.plan_full_screen(&CompositionContext::new(LayerStackId(0), 8, 8));
        assert_eq!(plan.layers().collect::<Vec<_>>(), [shown]);
    }

    #[test]
    fn buffer_layer_without_buffer_draws_nothing() {
        let mut store = LayerStore::new();
        let layer = store
            .create_layer(APP, LayerDesc::buffer("b", 8, 8))
            .unwrap();
        let _ = store.evaluate();
        let plan = store.plan_full_screen(&CompositionContext::new(LayerStackId(0), 8, 8));
        assert!(plan.is_empty());

        store
            .latch_buffer(layer, 1, BufferDesc::new(BufferId(7), 8, 8))
            .unwrap();
        let _ = store.evaluate();
        let plan = store.plan_full_screen(&CompositionContext::new(LayerStackId(0), 8, 8));
        assert_eq!(
            plan.items[0].content,
            CaptureContent::Buffer(BufferDesc::new(BufferId(7), 8, 8))
        );
    }

    #[test]
    fn subtree_is_placed_at_origin() {
        let mut store = LayerStore::new();
        let parent = color(&mut store, 64, 64, None);
        let root = color(&mut store, 32, 32, Some(parent));
        let child = color(&mut store, 8, 8, Some(root));
        store
            .set_position(parent, Point::new(100.0, 100.0), true)
            .unwrap();
        store
            .set_position(root, Point::new(10.0, 10.0), true)
            .unwrap();
        store
            .set_position(child, Point::new(4.0, 4.0), true)
            .unwrap();
        store
            .set_final_crop(root, Some(IntRect::new(0, 0, 1, 1)), true)
            .unwrap();
        store.set_flags(parent, LayerFlags::HIDDEN).unwrap();
        let _ = store.evaluate();

        let plan = store.plan_subtree(root.index());
        assert_eq!((plan.width, plan.height), (32, 32));
        assert_eq!(plan.layers().collect::<Vec<_>>(), [root, child]);
        assert_eq!(plan.items[0].transform, Affine::IDENTITY);
        assert_eq!(plan.items[1].transform * Point::ORIGIN, Point::new(4.0, 4.0));
        assert_eq!(plan.items[1].clip, Some(Rect::new(0.0, 0.0, 32.0, 32.0)));
    }

    #[test]
    fn hidden_subtree_root_yields_empty_plan() {
        let mut store = LayerStore::new();
        let root = color(&mut store, 8, 8, None);
        let _child = color(&mut store, 8, 8, Some(root));
        store.set_flags(root, LayerFlags::HIDDEN).unwrap();
        let plan = store.plan_subtree(root.index());
        assert!(plan.is_empty());
    }

    #[test]
    fn transparent_layers_are_dropped() {
        let mut store = LayerStore::new();
        let layer = color(&mut store, 8, 8, None);
        store.set_alpha(layer, 0.0).unwrap();
        let _ = store.evaluate();
        let plan = store.plan_full_screen(&CompositionContext::new(LayerStackId(0), 8, 8));
        assert!(plan.is_empty());
    }
}
