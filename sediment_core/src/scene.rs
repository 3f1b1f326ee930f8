// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The transaction committer.
//!
//! [`Scene`] owns the [`LayerStore`] and the [`DeferredQueue`] and is the only
//! writer of either. Every mutating entry point leaves derived state
//! evaluated, so captures taken between calls always observe a whole number
//! of transactions.
//!
//! ```text
//!   Transaction ──► Scene::apply ──┬─► commit group ──► LayerStore
//!                                  └─► park group ──► DeferredQueue
//!                                                          │
//!   buffer ──► Scene::latch_buffer ──► latch rules ──► release ready groups
//! ```

use alloc::vec::Vec;

use crate::buffer::{BufferDesc, FrameNumber};
use crate::capture::{CompositionContext, CapturePlan};
use crate::deferred::{DeferredInfo, DeferredQueue, DeferredStatus};
use crate::error::{SceneError, SceneResult};
use crate::layer::{ClientId, FrameChanges, LatchOutcome, LayerDesc, LayerId, LayerKind, LayerStore};
use crate::transaction::{DeferUntil, LayerGroup, Mutation, Transaction};

/// Outcome of [`Scene::apply`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Per-layer groups in the transaction.
    pub layers: usize,
    /// Groups committed now.
    pub committed: usize,
    /// Groups parked behind a barrier.
    pub deferred: usize,
    /// Non-fatal errors; the rest of the transaction still applied.
    pub errors: Vec<SceneError>,
}

impl ApplyReport {
    /// Returns `true` if nothing went wrong.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A parked group that was committed by a latch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Released {
    /// Submission serial of the parked entry.
    pub serial: u64,
    /// Layer whose mutations committed.
    pub layer: LayerId,
    /// The condition that was met.
    pub until: DeferUntil,
}

/// Outcome of [`Scene::latch_buffer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatchReport {
    /// What happened to the buffer.
    pub outcome: LatchOutcome,
    /// Deferred groups released by this latch, in submission order.
    pub released: Vec<Released>,
    /// Errors raised while committing released groups.
    pub errors: Vec<SceneError>,
}

/// Where a layer's geometry stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryPhase {
    /// Everything requested is committed.
    Committed,
    /// A resize or frozen geometry waits for a matching buffer.
    PendingBufferLatched,
    /// Mutations are parked behind a barrier.
    PendingDeferredUntil(DeferUntil),
}

/// The layer scene and its single writer.
#[derive(Debug, Default)]
pub struct Scene {
    store: LayerStore,
    deferred: DeferredQueue,
    changes: FrameChanges,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the layer store.
    #[must_use]
    pub fn layers(&self) -> &LayerStore {
        &self.store
    }

    /// Creates a layer.
    pub fn create_layer(&mut self, client: ClientId, desc: LayerDesc) -> SceneResult<LayerId> {
        let id = self.store.create_layer(client, desc)?;
        self.refresh();
        Ok(id)
    }

    /// Destroys a layer and its same-client descendants, dropping their
    /// parked mutations. Returns the destroyed handles.
    pub fn destroy_layer(&mut self, id: LayerId) -> SceneResult<Vec<LayerId>> {
        let destroyed = self.store.destroy_layer(id)?;
        self.deferred.drop_layers(&destroyed);
        self.refresh();
        Ok(destroyed)
    }

    /// Applies a transaction atomically.
    ///
    /// Records are grouped per layer. Groups for unknown or detached layers
    /// are skipped and reported; groups behind an unreached barrier are parked; all
    /// others commit in first-appearance order.
    pub fn apply(&mut self, txn: Transaction) -> ApplyReport {
        let groups = txn.into_groups();
        let mut report = ApplyReport {
            layers: groups.len(),
            ..ApplyReport::default()
        };

        for group in groups {
            if !self.store.is_alive(group.layer) {
                report.errors.push(SceneError::UnknownLayer(group.layer));
                continue;
            }
            if self.store.is_detached(group.layer).unwrap_or(false) {
                report.errors.push(SceneError::DetachedLayer(group.layer));
                continue;
            }
            if let Some(until) = group.defer {
                if !self.barrier_reached(until) {
                    if !self.store.is_alive(until.barrier) {
                        report.errors.push(SceneError::UnresolvableDeferred {
                            layer: group.layer,
                            barrier: until.barrier,
                        });
                    }
                    self.deferred.park(until, group);
                    report.deferred += 1;
                    continue;
                }
            }
            self.commit_group(group, &mut report.errors);
            report.committed += 1;
        }

        self.refresh();
        report
    }

    /// Offers a buffer with frame number `frame` to a buffer layer, then
    /// releases every parked group whose barrier is now satisfied.
    pub fn latch_buffer(
        &mut self,
        layer: LayerId,
        frame: FrameNumber,
        buffer: BufferDesc,
    ) -> SceneResult<LatchReport> {
        let outcome = self.store.latch_buffer(layer, frame, buffer)?;
        let mut report = LatchReport {
            outcome,
            released: Vec::new(),
            errors: Vec::new(),
        };

        let store = &self.store;
        let ready = self.deferred.take_ready(|until| {
            store
                .latched_frame(until.barrier)
                .is_ok_and(|latched| latched >= until.frame)
        });
        for entry in ready {
            report.released.push(Released {
                serial: entry.serial,
                layer: entry.group.layer,
                until: entry.until,
            });
            self.commit_group(entry.group, &mut report.errors);
        }

        self.refresh();
        Ok(report)
    }

    /// Lists parked groups in submission order.
    pub fn deferred(&self) -> impl Iterator<Item = DeferredInfo> + '_ {
        self.deferred.iter().map(|entry| DeferredInfo {
            serial: entry.serial,
            layer: entry.group.layer,
            until: entry.until,
            mutations: entry.group.mutations.len(),
            status: if self.store.is_alive(entry.until.barrier) {
                DeferredStatus::Waiting
            } else {
                DeferredStatus::Unresolvable
            },
        })
    }

    /// Reports whether a layer's latest requested geometry is visible yet.
    pub fn geometry_phase(&self, id: LayerId) -> SceneResult<GeometryPhase> {
        if let Some(entry) = self.deferred.iter().find(|e| e.group.layer == id) {
            return Ok(GeometryPhase::PendingDeferredUntil(entry.until));
        }
        if self.store.is_latch_pending(id)? {
            Ok(GeometryPhase::PendingBufferLatched)
        } else {
            Ok(GeometryPhase::Committed)
        }
    }

    /// Hands over every change accumulated since the last call.
    pub fn take_changes(&mut self) -> FrameChanges {
        let mut changes = core::mem::take(&mut self.changes);
        changes.normalize();
        changes
    }

    /// Returns the resolved paint order, back to front.
    #[must_use]
    pub fn paint_order(&self) -> Vec<LayerId> {
        self.store
            .paint_order()
            .iter()
            .map(|entry| self.store.id_at(entry.index))
            .collect()
    }

    /// Plans a capture of one layer stack.
    pub fn capture_full_screen(&self, ctx: &CompositionContext) -> SceneResult<CapturePlan> {
        self.ensure_evaluated()?;
        Ok(self.store.plan_full_screen(ctx))
    }

    /// Plans a capture of `root` and its structural descendants.
    pub fn capture_subtree(&self, root: LayerId) -> SceneResult<CapturePlan> {
        let idx = self.store.slot(root)?;
        self.ensure_evaluated()?;
        Ok(self.store.plan_subtree(idx))
    }

    fn ensure_evaluated(&self) -> SceneResult<()> {
        if self.store.is_stale() {
            Err(SceneError::InconsistentCapture)
        } else {
            Ok(())
        }
    }

    fn barrier_reached(&self, until: DeferUntil) -> bool {
        self.store
            .latched_frame(until.barrier)
            .is_ok_and(|latched| latched >= until.frame)
    }

    fn refresh(&mut self) {
        let changes = self.store.evaluate();
        self.changes.extend(changes);
    }

    /// Commits one layer's mutations in order, then settles its size.
    fn commit_group(&mut self, group: LayerGroup, errors: &mut Vec<SceneError>) {
        let layer = group.layer;
        let Ok(kind) = self.store.kind(layer) else {
            errors.push(SceneError::UnknownLayer(layer));
            return;
        };
        // Parked before a detach, released after it.
        if self.store.is_detached(layer).unwrap_or(false) {
            errors.push(SceneError::DetachedLayer(layer));
            return;
        }
        // Color layers have no buffer to wait for.
        let immediate = !group.applies_with_resize || kind == LayerKind::Color;
        for mutation in group.mutations {
            if let Err(err) = self.apply_mutation(layer, mutation, immediate) {
                errors.push(err);
            }
        }
        if let Err(err) = self.store.settle_size(layer) {
            errors.push(err);
        }
    }

    fn apply_mutation(&mut self, layer: LayerId, mutation: Mutation, immediate: bool) -> SceneResult<()> {
        let store = &mut self.store;
        match mutation {
            Mutation::Position(p) => store.set_position(layer, p, immediate),
            Mutation::Size(size) => store.request_size(layer, size),
            Mutation::Crop(crop) => store.set_crop(layer, crop, immediate),
            Mutation::FinalCrop(crop) => store.set_final_crop(layer, crop, immediate),
            Mutation::Matrix(matrix) => store.set_matrix(layer, matrix),
            Mutation::Alpha(alpha) => store.set_alpha(layer, alpha),
            Mutation::Layer(z) => store.set_layer(layer, z),
            Mutation::RelativeLayer { target, z } => store.set_relative_layer(layer, target, z),
            Mutation::LayerStack(stack) => store.set_layer_stack(layer, stack),
            Mutation::Flags(flags) => store.set_flags(layer, flags),
            Mutation::Color(color) => store.set_color(layer, color),
            Mutation::OverrideScalingMode(mode) => store.set_scaling_mode(layer, mode),
            Mutation::Reparent(parent) => store.reparent(layer, parent),
            Mutation::ReparentChildren(parent) => store.reparent_children(layer, parent),
            Mutation::DetachChildren => store.detach_children(layer).map(|_| ()),
        }
    }
}
