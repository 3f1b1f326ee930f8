// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor configuration.

use core::time::Duration;

use sediment_core::capture::CompositionContext;
use sediment_core::output::LayerStackId;

/// Default capacity of the buffer event queue.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default time a synchronous apply waits for the next composition pass.
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_millis(500);

/// Display and queue parameters for a [`Compositor`](crate::Compositor).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositorConfig {
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
    /// The layer stack shown on the display.
    pub layer_stack: LayerStackId,
    /// How long a synchronous apply waits for a composition pass while a
    /// refresh driver is running.
    pub sync_timeout: Duration,
    /// Capacity of the buffer event queue. Producers block while it is full.
    pub queue_capacity: usize,
}

impl CompositorConfig {
    /// A 1080p display on layer stack 0.
    pub const FULL_HD: Self = Self::new(1920, 1080);

    /// A small display for tests and headless tools.
    pub const HEADLESS: Self = Self::new(256, 256);

    /// Creates a configuration for a display of the given size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layer_stack: LayerStackId(0),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Shows a different layer stack on the display.
    #[must_use]
    pub const fn with_layer_stack(mut self, layer_stack: LayerStackId) -> Self {
        self.layer_stack = layer_stack;
        self
    }

    /// Sets the synchronous apply timeout.
    #[must_use]
    pub const fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Sets the buffer event queue capacity. Zero is raised to one.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// The full-screen capture context for the display.
    #[must_use]
    pub const fn display_context(&self) -> CompositionContext {
        CompositionContext::new(self.layer_stack, self.width, self.height)
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self::FULL_HD
    }
}
