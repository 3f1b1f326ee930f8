// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for transactions, latches and composition passes.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! instrumentation calls as the scene changes. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`LayerChange`] events and the
//!   corresponding `TraceSink` method.

#[cfg(feature = "trace-rich")]
use alloc::vec::Vec;

use crate::buffer::FrameNumber;
use crate::capture::CapturePlan;
use crate::layer::{FrameChanges, LatchOutcome, LayerId};
use crate::scene::{ApplyReport, LatchReport, Released};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which kind of capture was planned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    /// One layer stack, in paint order.
    FullScreen,
    /// One layer and its structural descendants.
    Subtree,
}

/// Which category of layer state changed.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerField {
    /// Derived geometry (transform, clips, visibility, layer stack).
    Geometry,
    /// Effective alpha.
    Opacity,
    /// Displayed buffer or color.
    Content,
    /// Became hidden or visible.
    Visibility,
    /// Created or destroyed.
    Lifecycle,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted after a transaction was applied.
#[derive(Clone, Copy, Debug)]
pub struct TransactionEvent {
    /// Composition pass the transaction landed before.
    pub pass: u64,
    /// Whether the caller waits for the next pass.
    pub synchronous: bool,
    /// Per-layer groups in the transaction.
    pub layers: usize,
    /// Groups committed.
    pub committed: usize,
    /// Groups parked behind a barrier.
    pub deferred: usize,
    /// Non-fatal errors recorded.
    pub errors: usize,
}

impl TransactionEvent {
    /// Summarizes an [`ApplyReport`].
    #[must_use]
    pub fn new(pass: u64, synchronous: bool, report: &ApplyReport) -> Self {
        Self {
            pass,
            synchronous,
            layers: report.layers,
            committed: report.committed,
            deferred: report.deferred,
            errors: report.errors.len(),
        }
    }
}

/// Emitted when a buffer was offered to a layer.
#[derive(Clone, Copy, Debug)]
pub struct LatchEvent {
    /// Composition pass performing the latch.
    pub pass: u64,
    /// Receiving layer.
    pub layer: LayerId,
    /// Frame number of the buffer.
    pub frame: FrameNumber,
    /// What happened to the buffer.
    pub outcome: LatchOutcome,
    /// Deferred groups released by this latch.
    pub released: usize,
}

impl LatchEvent {
    /// Summarizes a [`LatchReport`].
    #[must_use]
    pub fn new(pass: u64, layer: LayerId, frame: FrameNumber, report: &LatchReport) -> Self {
        Self {
            pass,
            layer,
            frame,
            outcome: report.outcome,
            released: report.released.len(),
        }
    }
}

/// Emitted for every deferred group released by a latch.
#[derive(Clone, Copy, Debug)]
pub struct DeferredReleaseEvent {
    /// Composition pass performing the release.
    pub pass: u64,
    /// Submission serial of the parked group.
    pub serial: u64,
    /// Layer whose mutations committed.
    pub layer: LayerId,
    /// Barrier layer.
    pub barrier: LayerId,
    /// Barrier frame that was reached.
    pub frame: FrameNumber,
}

impl DeferredReleaseEvent {
    /// Describes one released group.
    #[must_use]
    pub fn new(pass: u64, released: &Released) -> Self {
        Self {
            pass,
            serial: released.serial,
            layer: released.layer,
            barrier: released.until.barrier,
            frame: released.until.frame,
        }
    }
}

/// Emitted at the end of a composition pass.
#[derive(Clone, Copy, Debug)]
pub struct PassEvent {
    /// Pass counter after this pass.
    pub pass: u64,
    /// Transactions flushed by this pass.
    pub transactions: usize,
    /// Buffers latched by this pass.
    pub latches: usize,
    /// Layers whose geometry changed since the previous pass.
    pub geometry_changes: usize,
    /// Layers whose content changed since the previous pass.
    pub content_changes: usize,
    /// Whether the paint order was rebuilt.
    pub order_changed: bool,
    /// Items in the display plan.
    pub items: usize,
}

impl PassEvent {
    /// Summarizes a pass from its changes and resulting plan.
    #[must_use]
    pub fn new(
        pass: u64,
        transactions: usize,
        latches: usize,
        changes: &FrameChanges,
        plan: &CapturePlan,
    ) -> Self {
        Self {
            pass,
            transactions,
            latches,
            geometry_changes: changes.geometry.len(),
            content_changes: changes.content.len(),
            order_changed: changes.order_changed,
            items: plan.items.len(),
        }
    }
}

/// Emitted after a capture was planned.
#[derive(Clone, Copy, Debug)]
pub struct CaptureEvent {
    /// Last completed composition pass.
    pub pass: u64,
    /// Which kind of capture.
    pub kind: CaptureKind,
    /// Capture width.
    pub width: u32,
    /// Capture height.
    pub height: u32,
    /// Items in the plan.
    pub items: usize,
}

impl CaptureEvent {
    /// Summarizes a planned capture.
    #[must_use]
    pub fn new(pass: u64, kind: CaptureKind, plan: &CapturePlan) -> Self {
        Self {
            pass,
            kind,
            width: plan.width,
            height: plan.height,
            items: plan.items.len(),
        }
    }
}

/// A per-pass layer change record.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerChange {
    /// Slot index of the layer that changed.
    pub layer_index: u32,
    /// Which category changed.
    pub field: LayerField,
}

/// Flattens [`FrameChanges`] into one record per layer and category.
#[cfg(feature = "trace-rich")]
#[must_use]
pub fn layer_changes(changes: &FrameChanges) -> Vec<LayerChange> {
    let lists: [(&[u32], LayerField); 7] = [
        (&changes.added, LayerField::Lifecycle),
        (&changes.removed, LayerField::Lifecycle),
        (&changes.geometry, LayerField::Geometry),
        (&changes.opacities, LayerField::Opacity),
        (&changes.content, LayerField::Content),
        (&changes.hidden, LayerField::Visibility),
        (&changes.unhidden, LayerField::Visibility),
    ];
    lists
        .iter()
        .flat_map(|(list, field)| {
            list.iter().map(|&layer_index| LayerChange {
                layer_index,
                field: *field,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the scene and the composition loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called after a transaction was applied.
    fn on_transaction(&mut self, e: &TransactionEvent) {
        _ = e;
    }

    /// Called after a buffer was offered to a layer.
    fn on_latch(&mut self, e: &LatchEvent) {
        _ = e;
    }

    /// Called for each deferred group a latch released.
    fn on_deferred_release(&mut self, e: &DeferredReleaseEvent) {
        _ = e;
    }

    /// Called at the end of a composition pass.
    fn on_pass(&mut self, e: &PassEvent) {
        _ = e;
    }

    /// Called after a capture was planned.
    fn on_capture(&mut self, e: &CaptureEvent) {
        _ = e;
    }

    /// Called with per-pass layer changes (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_layer_changes(&mut self, pass: u64, changes: &[LayerChange]) {
        _ = (pass, changes);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`TransactionEvent`].
    #[inline]
    pub fn transaction(&mut self, e: &TransactionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_transaction(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LatchEvent`].
    #[inline]
    pub fn latch(&mut self, e: &LatchEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_latch(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DeferredReleaseEvent`].
    #[inline]
    pub fn deferred_release(&mut self, e: &DeferredReleaseEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_deferred_release(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PassEvent`].
    #[inline]
    pub fn pass(&mut self, e: &PassEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pass(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CaptureEvent`].
    #[inline]
    pub fn capture(&mut self, e: &CaptureEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_capture(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits layer changes (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn layer_changes(&mut self, pass: u64, changes: &[LayerChange]) {
        if let Some(s) = &mut self.sink {
            s.on_layer_changes(pass, changes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        passes: u32,
        captures: u32,
    }

    impl TraceSink for Counting {
        fn on_pass(&mut self, _e: &PassEvent) {
            self.passes += 1;
        }

        fn on_capture(&mut self, _e: &CaptureEvent) {
            self.captures += 1;
        }
    }

    #[test]
    fn tracer_dispatches_only_with_feature() {
        let mut sink = Counting::default();
        {
            let mut tracer = Tracer::new(&mut sink);
            let plan = CapturePlan::new(4, 4);
            tracer.pass(&PassEvent::new(1, 0, 0, &FrameChanges::default(), &plan));
            tracer.capture(&CaptureEvent::new(1, CaptureKind::Subtree, &plan));
        }
        let expected = u32::from(cfg!(feature = "trace"));
        assert_eq!(sink.passes, expected);
        assert_eq!(sink.captures, expected);
    }

    #[test]
    fn none_tracer_is_silent() {
        let mut tracer = Tracer::none();
        tracer.pass(&PassEvent::new(
            1,
            0,
            0,
            &FrameChanges::default(),
            &CapturePlan::new(1, 1),
        ));
    }

    #[cfg(feature = "trace-rich")]
    #[test]
    fn frame_changes_flatten_per_field() {
        let changes = FrameChanges {
            geometry: alloc::vec![1, 2],
            content: alloc::vec![2],
            ..FrameChanges::default()
        };
        let records = layer_changes(&changes);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[2],
            LayerChange {
                layer_index: 2,
                field: LayerField::Content
            }
        );
    }
}
