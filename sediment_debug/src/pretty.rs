// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use sediment_core::layer::LatchOutcome;
use sediment_core::trace::{
    CaptureEvent, CaptureKind, DeferredReleaseEvent, LatchEvent, LayerChange, PassEvent,
    TraceSink, TransactionEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn outcome_name(outcome: LatchOutcome) -> &'static str {
    match outcome {
        LatchOutcome::Accepted {
            resize_completed: true,
        } => "resized",
        LatchOutcome::Accepted {
            resize_completed: false,
        } => "shown",
        LatchOutcome::Rejected => "REJECTED",
    }
}

fn capture_name(kind: CaptureKind) -> &'static str {
    match kind {
        CaptureKind::FullScreen => "screen",
        CaptureKind::Subtree => "subtree",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_transaction(&mut self, e: &TransactionEvent) {
        let mode = if e.synchronous { "sync" } else { "async" };
        let _ = writeln!(
            self.writer,
            "[txn] pass={} {mode} layers={} committed={} deferred={} errors={}",
            e.pass, e.layers, e.committed, e.deferred, e.errors,
        );
    }

    fn on_latch(&mut self, e: &LatchEvent) {
        let _ = writeln!(
            self.writer,
            "[latch] pass={} layer={} frame={} {} released={}",
            e.pass,
            e.layer.index(),
            e.frame,
            outcome_name(e.outcome),
            e.released,
        );
    }

    fn on_deferred_release(&mut self, e: &DeferredReleaseEvent) {
        let _ = writeln!(
            self.writer,
            "[deferred] pass={} #{} layer={} barrier={}@{}",
            e.pass,
            e.serial,
            e.layer.index(),
            e.barrier.index(),
            e.frame,
        );
    }

    fn on_pass(&mut self, e: &PassEvent) {
        let order = if e.order_changed { " reordered" } else { "" };
        let _ = writeln!(
            self.writer,
            "[pass] pass={} txns={} latches={} geometry={} content={} items={}{order}",
            e.pass, e.transactions, e.latches, e.geometry_changes, e.content_changes, e.items,
        );
    }

    fn on_capture(&mut self, e: &CaptureEvent) {
        let _ = writeln!(
            self.writer,
            "[capture] pass={} {} {}x{} items={}",
            e.pass,
            capture_name(e.kind),
            e.width,
            e.height,
            e.items,
        );
    }

    fn on_layer_changes(&mut self, pass: u64, changes: &[LayerChange]) {
        let _ = writeln!(self.writer, "[layers] pass={pass} changes={}", changes.len());
    }
}

#[cfg(test)]
mod tests {
    use sediment_core::buffer::{BufferDesc, BufferId};
    use sediment_core::layer::{ClientId, LayerDesc};
    use sediment_core::scene::Scene;

    use super::*;

    #[test]
    fn pretty_print_latch() {
        let mut scene = Scene::new();
        let layer = scene
            .create_layer(ClientId(1), LayerDesc::buffer("l", 4, 4))
            .unwrap();
        let report = scene
            .latch_buffer(layer, 1, BufferDesc::new(BufferId(0), 8, 8))
            .unwrap();

        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_latch(&LatchEvent::new(3, layer, 1, &report));
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.starts_with("[latch] pass=3"), "got: {output}");
        assert!(output.contains("REJECTED"), "got: {output}");
    }

    #[test]
    fn pretty_print_pass() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_pass(&PassEvent {
            pass: 7,
            transactions: 2,
            latches: 1,
            geometry_changes: 3,
            content_changes: 1,
            order_changed: true,
            items: 4,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            output,
            "[pass] pass=7 txns=2 latches=1 geometry=3 content=1 items=4 reordered\n"
        );
    }
}
