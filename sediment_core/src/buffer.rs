// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer descriptors and scaling modes.
//!
//! Buffers are allocated and filled outside the core. A layer only ever sees a
//! [`BufferDesc`]: an opaque [`BufferId`] plus the buffer's pixel dimensions,
//! which is all the latch rules need.

use core::fmt;

use crate::geometry::IntSize;

/// Monotonic per-layer frame counter. Frame numbers start at 1; a layer that
/// never latched a buffer reports 0.
pub type FrameNumber = u64;

/// An opaque reference to externally owned pixel storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

/// A buffer as delivered by a producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    /// Backing storage.
    pub id: BufferId,
    /// Pixel dimensions.
    pub size: IntSize,
}

impl BufferDesc {
    /// Creates a descriptor.
    #[inline]
    #[must_use]
    pub const fn new(id: BufferId, width: u32, height: u32) -> Self {
        Self {
            id,
            size: IntSize::new(width, height),
        }
    }
}

/// How a buffer whose dimensions differ from the layer size is displayed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScalingMode {
    /// Buffers must match the layer size. A resize waits for a buffer of the
    /// new dimensions; mismatched buffers are dropped.
    #[default]
    Freeze,
    /// Any buffer is stretched to the layer bounds, so resizes show at once.
    ScaleToWindow,
}
