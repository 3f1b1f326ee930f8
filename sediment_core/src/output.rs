// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer-stack identification.
//!
//! A [`LayerStackId`] selects which display a root layer (and everything
//! parented under it) participates in. Core treats the value as opaque; a
//! capture only includes layers whose effective stack equals the one named in
//! its [`CompositionContext`](crate::capture::CompositionContext).

use core::fmt;

/// Identifies the display a layer tree is composed onto.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LayerStackId(pub u32);

impl fmt::Debug for LayerStackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerStackId({})", self.0)
    }
}
