// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree data model.
//!
//! A *layer* is a node in a compositing tree. Each layer has:
//!
//! - An identity ([`LayerId`]), a generational handle that becomes stale when
//!   the layer is destroyed, and an owning [`ClientId`].
//! - Topology: parent, first-child and sibling links forming an ordered tree.
//! - Stacking: an absolute z among its siblings, or a z relative to an
//!   arbitrary other layer (see [`Stacking`]).
//! - **Committed geometry** ([`Geometry`](crate::geometry::Geometry)) plus a
//!   requested view that may be held back until a buffer latches (see
//!   [`LatchOutcome`]).
//! - **Derived state** ([`WorldGeometry`]) produced by
//!   [`evaluate`](LayerStore::evaluate): screen transform, clips, alpha
//!   product, effective visibility and layer stack.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles.
//!
//! # Dirty tracking
//!
//! Mutations mark the matching channel (see [`dirty`](crate::dirty)):
//!
//! - **GEOMETRY** / **OPACITY** propagate to all structural descendants.
//! - **CONTENT** is local-only.
//! - **TOPOLOGY** / **STACKING** trigger a paint-order rebuild.

mod desc;
mod evaluate;
mod id;
mod state;
mod store;
mod traverse;

pub(crate) use evaluate::{Anchor, derive};
pub(crate) use store::StackSlot;

pub use desc::{LayerDesc, LayerKind};
pub use evaluate::{FrameChanges, WorldGeometry};
pub use id::{ClientId, INVALID, LayerId};
pub use state::LatchOutcome;
pub use store::{LayerStore, Stacking};
pub use traverse::Children;
