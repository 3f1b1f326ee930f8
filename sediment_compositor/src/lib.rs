// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Threaded composition service over `sediment_core`.
//!
//! `sediment_core` is a single-threaded scene. This crate puts it behind a
//! lock and adds the moving parts of a display server:
//!
//! - [`Compositor`]: the shared service. Applies transactions synchronously
//!   or at the next pass, latches queued buffers and plans the display.
//! - [`Client`]: a connection that owns the layers it creates.
//! - [`BufferQueue`]: a per-layer buffer producer with frame numbering.
//! - [`RefreshDriver`]: a thread that composes at a fixed interval.
//! - [`TracingSink`]: logs scene trace events through `tracing`.
//!
//! # Example
//!
//! ```
//! use sediment_compositor::{ApplyMode, Compositor, CompositorConfig};
//! use sediment_core::buffer::{BufferDesc, BufferId};
//! use sediment_core::layer::LayerDesc;
//!
//! let compositor = Compositor::new(CompositorConfig::HEADLESS);
//! let client = compositor.client();
//! let layer = client.create_layer(LayerDesc::buffer("app", 64, 64))?;
//!
//! let queue = compositor.buffer_queue(layer)?;
//! queue.queue(BufferDesc::new(BufferId(1), 64, 64))?;
//!
//! let txn = client.transaction().set_position(layer, 10.0, 10.0);
//! compositor.apply(txn, ApplyMode::Synchronous)?;
//!
//! assert_eq!(compositor.latched_frame(layer)?, 1);
//! assert_eq!(compositor.capture_display()?.items.len(), 1);
//! # Ok::<(), sediment_compositor::CompositorError>(())
//! ```

mod client;
mod compositor;
mod config;
mod error;
mod refresh;
mod stream;
mod tracing_sink;

pub use client::Client;
pub use compositor::{ApplyMode, Composition, Compositor};
pub use config::CompositorConfig;
pub use error::{CompositorError, CompositorResult};
pub use refresh::RefreshDriver;
pub use stream::BufferQueue;
pub use tracing_sink::TracingSink;
