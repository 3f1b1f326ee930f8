// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pretty-printing and JSON recording of sediment trace events.
//!
//! This crate provides [`TraceSink`](sediment_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: one human-readable line per event.
//! - [`recorder::JsonRecorder`]: keeps every event as a JSON object and
//!   writes them out as JSON lines.

pub mod pretty;
pub mod recorder;
