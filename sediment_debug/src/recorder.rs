// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON event recording.
//!
//! [`JsonRecorder`] implements [`TraceSink`] and keeps one JSON object per
//! event, tagged with an `"event"` field. [`JsonRecorder::write_json_lines`]
//! writes them out one object per line, ready for `jq` or a notebook.
//!
//! Layer change events store every record, not just the count.

use std::io::{self, Write};

use serde_json::{Value, json};

use sediment_core::layer::LatchOutcome;
use sediment_core::trace::{
    CaptureEvent, CaptureKind, DeferredReleaseEvent, LatchEvent, LayerChange, LayerField,
    PassEvent, TraceSink, TransactionEvent,
};

/// A [`TraceSink`] that records events as JSON values.
#[derive(Debug, Default)]
pub struct JsonRecorder {
    events: Vec<Value>,
}

impl JsonRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[Value] {
        &self.events
    }

    /// Returns the recorded events of one kind, e.g. `"latch"`.
    pub fn events_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.events.iter().filter(move |e| e["event"] == kind)
    }

    /// Consumes the recorder and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<Value> {
        self.events
    }

    /// Drops every recorded event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Writes each event as one line of JSON.
    pub fn write_json_lines(&self, writer: &mut dyn Write) -> io::Result<()> {
        for event in &self.events {
            serde_json::to_writer(&mut *writer, event)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

fn outcome_value(outcome: LatchOutcome) -> Value {
    match outcome {
        LatchOutcome::Accepted { resize_completed } => json!({
            "accepted": true,
            "resize_completed": resize_completed,
        }),
        LatchOutcome::Rejected => json!({ "accepted": false }),
    }
}

fn field_name(field: LayerField) -> &'static str {
    match field {
        LayerField::Geometry => "geometry",
        LayerField::Opacity => "opacity",
        LayerField::Content => "content",
        LayerField::Visibility => "visibility",
        LayerField::Lifecycle => "lifecycle",
    }
}

impl TraceSink for JsonRecorder {
    fn on_transaction(&mut self, e: &TransactionEvent) {
        self.events.push(json!({
            "event": "transaction",
            "pass": e.pass,
            "synchronous": e.synchronous,
            "layers": e.layers,
            "committed": e.committed,
            "deferred": e.deferred,
            "errors": e.errors,
        }));
    }

    fn on_latch(&mut self, e: &LatchEvent) {
        self.events.push(json!({
            "event": "latch",
            "pass": e.pass,
            "layer": e.layer.index(),
            "frame": e.frame,
            "outcome": outcome_value(e.outcome),
            "released": e.released,
        }));
    }

    fn on_deferred_release(&mut self, e: &DeferredReleaseEvent) {
        self.events.push(json!({
            "event": "deferred_release",
            "pass": e.pass,
            "serial": e.serial,
            "layer": e.layer.index(),
            "barrier": e.barrier.index(),
            "frame": e.frame,
        }));
    }

    fn on_pass(&mut self, e: &PassEvent) {
        self.events.push(json!({
            "event": "pass",
            "pass": e.pass,
            "transactions": e.transactions,
            "latches": e.latches,
            "geometry_changes": e.geometry_changes,
            "content_changes": e.content_changes,
            "order_changed": e.order_changed,
            "items": e.items,
        }));
    }

    fn on_capture(&mut self, e: &CaptureEvent) {
        let kind = match e.kind {
            CaptureKind::FullScreen => "full_screen",
            CaptureKind::Subtree => "subtree",
        };
        self.events.push(json!({
            "event": "capture",
            "pass": e.pass,
            "kind": kind,
            "width": e.width,
            "height": e.height,
            "items": e.items,
        }));
    }

    fn on_layer_changes(&mut self, pass: u64, changes: &[LayerChange]) {
        let records: Vec<Value> = changes
            .iter()
            .map(|c| json!({ "layer": c.layer_index, "field": field_name(c.field) }))
            .collect();
        self.events.push(json!({
            "event": "layer_changes",
            "pass": pass,
            "changes": records,
        }));
    }
}

#[cfg(test)]
mod tests {
    use sediment_core::buffer::{BufferDesc, BufferId};
    use sediment_core::layer::{ClientId, LayerDesc};
    use sediment_core::scene::Scene;
    use sediment_core::trace::{Tracer, layer_changes};
    use sediment_core::transaction::Transaction;

    use super::*;

    /// Drives a small scene and traces what happened.
    fn record() -> JsonRecorder {
        let mut scene = Scene::new();
        let layer = scene
            .create_layer(ClientId(1), LayerDesc::buffer("l", 4, 4))
            .unwrap();
        let mut recorder = JsonRecorder::new();

        let report = scene.apply(
            Transaction::new()
                .set_alpha(layer, 0.5)
                .defer_until(layer, layer, 1),
        );
        let latch = scene
            .latch_buffer(layer, 1, BufferDesc::new(BufferId(9), 4, 4))
            .unwrap();
        let changes = scene.take_changes();

        let mut tracer = Tracer::new(&mut recorder);
        tracer.transaction(&TransactionEvent::new(1, true, &report));
        tracer.latch(&LatchEvent::new(1, layer, 1, &latch));
        for released in &latch.released {
            tracer.deferred_release(&DeferredReleaseEvent::new(1, released));
        }
        tracer.layer_changes(1, &layer_changes(&changes));
        recorder
    }

    #[test]
    fn events_are_tagged_in_order() {
        let recorder = record();
        let kinds: Vec<&str> = recorder
            .events()
            .iter()
            .map(|e| e["event"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            ["transaction", "latch", "deferred_release", "layer_changes"]
        );

        let latch = recorder.events_of("latch").next().unwrap();
        assert_eq!(latch["frame"], 1);
        assert_eq!(latch["outcome"]["accepted"], true);
        assert_eq!(latch["released"], 1);

        let txn = recorder.events_of("transaction").next().unwrap();
        assert_eq!(txn["deferred"], 1);
    }

    #[test]
    fn json_lines_parse_back() {
        let recorder = record();
        let mut out = Vec::new();
        recorder.write_json_lines(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, recorder.events());

        let changes = &parsed[3]["changes"];
        assert!(
            changes
                .as_array()
                .unwrap()
                .iter()
                .any(|c| c["field"] == "lifecycle"),
            "creation is reported as a lifecycle change"
        );
    }
}
