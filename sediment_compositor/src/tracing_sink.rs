// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`TraceSink`] that forwards scene events to `tracing`.

use sediment_core::trace::{
    CaptureEvent, DeferredReleaseEvent, LatchEvent, PassEvent, TraceSink, TransactionEvent,
};
use tracing::{debug, trace};

/// Logs every trace event with the `tracing` macros.
///
/// Transactions, latches and deferred releases log at `DEBUG`; passes and
/// captures, which fire every frame, at `TRACE`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn on_transaction(&mut self, e: &TransactionEvent) {
        debug!(
            target: "sediment::transaction",
            pass = e.pass,
            synchronous = e.synchronous,
            layers = e.layers,
            committed = e.committed,
            deferred = e.deferred,
            errors = e.errors,
            "applied transaction"
        );
    }

    fn on_latch(&mut self, e: &LatchEvent) {
        debug!(
            target: "sediment::latch",
            pass = e.pass,
            layer = ?e.layer,
            frame = e.frame,
            outcome = ?e.outcome,
            released = e.released,
            "latched buffer"
        );
    }

    fn on_deferred_release(&mut self, e: &DeferredReleaseEvent) {
        debug!(
            target: "sediment::deferred",
            pass = e.pass,
            serial = e.serial,
            layer = ?e.layer,
            barrier = ?e.barrier,
            frame = e.frame,
            "released deferred mutations"
        );
    }

    fn on_pass(&mut self, e: &PassEvent) {
        trace!(
            target: "sediment::pass",
            pass = e.pass,
            transactions = e.transactions,
            latches = e.latches,
            geometry_changes = e.geometry_changes,
            content_changes = e.content_changes,
            order_changed = e.order_changed,
            items = e.items,
            "composed"
        );
    }

    fn on_capture(&mut self, e: &CaptureEvent) {
        trace!(
            target: "sediment::capture",
            pass = e.pass,
            kind = ?e.kind,
            width = e.width,
            height = e.height,
            items = e.items,
            "planned capture"
        );
    }
}
