// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer geometry latching.
//!
//! Every layer carries two views of its placement:
//!
//! - the **committed** [`Geometry`], the only thing composition and capture
//!   read, and
//! - the **requested** position, size, crop and final crop, i.e. the most
//!   recent values a transaction asked for.
//!
//! Most fields commit the moment a transaction is applied. Three mechanisms
//! hold values back:
//!
//! 1. **Resize latching.** A new size is recorded immediately but only becomes
//!    the committed size once a buffer with those dimensions is latched. Layers
//!    without a displayed buffer (color layers, buffer layers that never
//!    latched) and layers under [`ScalingMode::ScaleToWindow`] resize at once.
//! 2. **Frozen geometry.** A transaction flagged *geometry applies with resize*
//!    freezes position, crop and final crop. While frozen, new values for those
//!    fields replace the held values but do not commit. The buffer that
//!    completes the resize commits them together and unfreezes the layer.
//! 3. **Deferred transactions** are parked outside this state entirely (see
//!    [`DeferredQueue`](crate::deferred::DeferredQueue)) and replay through the
//!    same setters once their barrier frame is latched.

use kurbo::{Affine, Point};

use super::evaluate::WorldGeometry;
use crate::buffer::{BufferDesc, FrameNumber, ScalingMode};
use crate::geometry::{Geometry, IntRect, IntSize, LayerFlags};
use crate::transform::Matrix22;

/// The subset of geometry that can be held back by a pending resize.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Requested {
    position: Point,
    size: IntSize,
    crop: Option<IntRect>,
    final_crop: Option<IntRect>,
}

/// Result of offering a buffer to a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatchOutcome {
    /// The buffer is now displayed.
    Accepted {
        /// Whether this buffer completed a pending resize and released any
        /// frozen geometry.
        resize_completed: bool,
    },
    /// The buffer's dimensions did not match the size the layer expects. The
    /// frame counter still advanced; the displayed content did not change.
    Rejected,
}

impl LatchOutcome {
    /// Returns `true` if the buffer is now displayed.
    #[inline]
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Committed plus requested geometry for one layer.
#[derive(Clone, Debug)]
pub(crate) struct GeometryState {
    pub(crate) committed: Geometry,
    requested: Requested,
    frozen: bool,
    pub(crate) buffer: Option<BufferDesc>,
    pub(crate) latched_frame: FrameNumber,
}

impl GeometryState {
    pub(crate) fn new(size: IntSize, flags: LayerFlags) -> Self {
        let committed = Geometry::new(size, flags);
        Self {
            requested: Requested {
                position: committed.position,
                size,
                crop: None,
                final_crop: None,
            },
            committed,
            frozen: false,
            buffer: None,
            latched_frame: 0,
        }
    }

    /// Returns the most recently requested size.
    #[inline]
    pub(crate) fn requested_size(&self) -> IntSize {
        self.requested.size
    }

    /// Returns `true` while a resize or frozen geometry waits for a buffer.
    #[inline]
    pub(crate) fn is_latch_pending(&self) -> bool {
        self.frozen || self.requested.size != self.committed.size
    }

    /// Records a position. Returns `true` if the committed value changed.
    pub(crate) fn set_position(&mut self, position: Point, immediate: bool) -> bool {
        self.requested.position = position;
        let commit = self.hold_unless(immediate);
        commit && store_if_changed(&mut self.committed.position, position)
    }

    /// Records a local crop. Returns `true` if the committed value changed.
    pub(crate) fn set_crop(&mut self, crop: Option<IntRect>, immediate: bool) -> bool {
        self.requested.crop = crop;
        let commit = self.hold_unless(immediate);
        commit && store_if_changed(&mut self.committed.crop, crop)
    }

    /// Records a final crop. Returns `true` if the committed value changed.
    pub(crate) fn set_final_crop(&mut self, crop: Option<IntRect>, immediate: bool) -> bool {
        self.requested.final_crop = crop;
        let commit = self.hold_unless(immediate);
        commit && store_if_changed(&mut self.committed.final_crop, crop)
    }

    /// Records a size request. The committed size is settled separately by
    /// [`settle_size`](Self::settle_size) once the whole transaction group
    /// has been applied.
    pub(crate) fn request_size(&mut self, size: IntSize) {
        self.requested.size = size;
    }

    /// Commits the requested size if nothing needs to wait for a buffer.
    ///
    /// Returns `true` if the committed size changed.
    pub(crate) fn settle_size(&mut self, scaling: ScalingMode) -> bool {
        if self.requested.size == self.committed.size {
            return false;
        }
        if self.buffer.is_none() || scaling == ScalingMode::ScaleToWindow {
            self.committed.size = self.requested.size;
            return true;
        }
        false
    }

    /// Offers a newly queued buffer to the layer.
    pub(crate) fn latch(
        &mut self,
        frame: FrameNumber,
        buffer: BufferDesc,
        scaling: ScalingMode,
    ) -> LatchOutcome {
        self.latched_frame = self.latched_frame.max(frame);
        let stretch = scaling == ScalingMode::ScaleToWindow;

        if self.is_latch_pending() {
            if !stretch && buffer.size != self.requested.size {
                return LatchOutcome::Rejected;
            }
            self.committed.size = self.requested.size;
            self.committed.position = self.requested.position;
            self.committed.crop = self.requested.crop;
            self.committed.final_crop = self.requested.final_crop;
            self.frozen = false;
            self.buffer = Some(buffer);
            return LatchOutcome::Accepted {
                resize_completed: true,
            };
        }

        if !stretch && buffer.size != self.committed.size {
            return LatchOutcome::Rejected;
        }
        self.buffer = Some(buffer);
        LatchOutcome::Accepted {
            resize_completed: false,
        }
    }

    /// Folds a former parent's derived state into this layer's own, in both
    /// views, bypassing latching.
    ///
    /// Used when a parent binding is severed: the layer keeps its screen
    /// placement, opacity, visibility, layer stack and scaling mode. A final
    /// crop survives only if the parent frame is axis-aligned; otherwise it is
    /// dropped.
    pub(crate) fn rebase(&mut self, parent: &WorldGeometry) {
        let frame = parent.child_frame;
        let g = &mut self.committed;
        let (matrix, position) = Matrix22::split_affine(frame * g.matrix.placement(g.position));
        g.position = position;
        g.matrix = matrix;
        g.final_crop = g.final_crop.and_then(|crop| rebase_rect(frame, crop));
        g.alpha *= parent.alpha;
        g.flags.hidden |= parent.hidden;
        g.layer_stack = parent.layer_stack;
        g.scaling = g.scaling.or(Some(parent.scaling));

        self.requested.position = frame * self.requested.position;
        self.requested.final_crop = self
            .requested
            .final_crop
            .and_then(|crop| rebase_rect(frame, crop));
    }

    /// Freezes geometry for a non-immediate write; returns whether the write
    /// may commit now.
    fn hold_unless(&mut self, immediate: bool) -> bool {
        let commit = immediate && !self.frozen;
        self.frozen |= !immediate;
        commit
    }
}

/// Maps a crop through an axis-aligned frame, or `None` when the frame
/// rotates, shears or flips.
#[expect(
    clippy::cast_possible_truncation,
    reason = "crop edges are integral and in display range"
)]
fn rebase_rect(frame: Affine, crop: IntRect) -> Option<IntRect> {
    let [a, b, c, d, _, _] = frame.as_coeffs();
    if b != 0.0 || c != 0.0 || a <= 0.0 || d <= 0.0 {
        return None;
    }
    let r = frame.transform_rect_bbox(crop.to_rect());
    Some(IntRect::new(
        r.x0.round() as i32,
        r.y0.round() as i32,
        r.x1.round() as i32,
        r.y1.round() as i32,
    ))
}

/// Stores `value` into `slot`, returning whether it differed.
fn store_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
