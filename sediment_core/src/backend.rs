// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renderer contract.
//!
//! The core stops at a [`CapturePlan`]: which layers draw, in what order,
//! with what transform, clip and alpha. Turning a plan into pixels belongs to
//! a *renderer*. `sediment_render` ships a CPU reference renderer; GPU or
//! platform renderers implement the same trait.
//!
//! # Composition loop pseudocode
//!
//! ```rust,ignore
//! fn on_refresh(scene: &mut Scene, renderer: &mut impl Renderer) {
//!     // Latch: offer newly queued buffers, releasing deferred groups
//!     for (layer, frame, buffer) in queued_buffers() {
//!         scene.latch_buffer(layer, frame, buffer)?;
//!     }
//!
//!     // Plan: flatten the committed scene for one display
//!     let plan = scene.capture_full_screen(&display_context)?;
//!
//!     // Render: turn the plan into pixels
//!     let frame = renderer.render(&plan);
//! }
//! ```

use crate::capture::CapturePlan;

/// Turns capture plans into output.
pub trait Renderer {
    /// What a render produces (an image, a GPU submission, ...).
    type Output;

    /// Draws `plan` back to front over an opaque black background.
    fn render(&mut self, plan: &CapturePlan) -> Self::Output;
}
