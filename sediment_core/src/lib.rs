// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transactional layer composition.
//!
//! `sediment_core` keeps a tree of layers, each placed by a position, a 2×2
//! matrix, a size and crops, and commits changes to it in atomic
//! transactions. Geometry that depends on a client's buffer (a resize, or
//! position changes flagged to apply with the resize) is held back until a
//! buffer of the right size arrives. It is `no_std` compatible (with
//! `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   Transaction ──► Scene::apply ──► LayerStore (committed + requested)
//!                                          │
//!   BufferDesc ──► Scene::latch_buffer ────┤
//!                                          ▼
//!                              LayerStore::evaluate ──► FrameChanges
//!                                          │
//!                                          ▼
//!             Scene::capture_* ──► CapturePlan ──► Renderer::render
//! ```
//!
//! **[`layer`]**: Struct-of-arrays layer tree with generational handles,
//! per-layer geometry latching and derived world state.
//!
//! **[`transaction`]**: Builder for atomic batches of mutations, with
//! per-layer barriers and the geometry-applies-with-resize flag.
//!
//! **[`scene`]**: The single writer. Applies transactions, latches buffers,
//! releases [`deferred`] groups and plans captures.
//!
//! **[`zorder`]**: Paint-order resolution across absolute and relative z.
//!
//! **[`capture`]**: Full-screen and subtree capture planning.
//!
//! **[`dirty`]**: Multi-channel dirty tracking via `understory_dirty`.
//!
//! **[`backend`]**: The [`Renderer`](backend::Renderer) trait.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types, with
//! the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-layer
//!   change events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod buffer;
pub mod capture;
pub mod deferred;
pub mod dirty;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod output;
pub mod scene;
pub mod trace;
pub mod transaction;
pub mod transform;
pub mod zorder;
