// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene error types.
//!
//! Handle-level errors are local: inside [`Scene::apply`](crate::scene::Scene::apply)
//! they are collected into the [`ApplyReport`](crate::scene::ApplyReport) and the
//! rest of the transaction still commits.

use thiserror::Error;

use crate::layer::LayerId;

/// Errors produced by the layer store and the committer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SceneError {
    /// A handle refers to a destroyed (or never created) layer.
    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerId),

    /// Layer creation named a parent that does not exist.
    #[error("invalid parent {0:?}")]
    InvalidParent(LayerId),

    /// A reparent would make a layer its own ancestor.
    #[error("parenting {layer:?} under {parent:?} would create a cycle")]
    HierarchyCycle {
        /// The layer being moved.
        layer: LayerId,
        /// The requested parent.
        parent: LayerId,
    },

    /// A relative-z edge (or a reparent) would make the paint order recursive.
    #[error("stacking {layer:?} against {target:?} would create a cycle")]
    StackingCycle {
        /// The layer being stacked.
        layer: LayerId,
        /// The stacking target.
        target: LayerId,
    },

    /// A transaction addressed a layer that `detach_children` cut loose from
    /// its parent. Its owning client no longer controls it.
    #[error("layer {0:?} was detached from its client")]
    DetachedLayer(LayerId),

    /// A buffer was delivered to a color layer.
    #[error("layer {0:?} does not accept buffers")]
    NotBufferLayer(LayerId),

    /// A deferred transaction waits on a layer that no longer exists.
    ///
    /// The deferred mutations stay parked until their own layer is destroyed.
    #[error("deferred mutations for {layer:?} wait on destroyed layer {barrier:?}")]
    UnresolvableDeferred {
        /// Layer whose mutations are parked.
        layer: LayerId,
        /// The destroyed barrier layer.
        barrier: LayerId,
    },

    /// A capture observed derived state that was not re-evaluated after a
    /// commit. Indicates a bug in the committer.
    #[error("capture observed an unevaluated scene")]
    InconsistentCapture,
}

/// Shorthand for results carrying a [`SceneError`].
pub type SceneResult<T> = Result<T, SceneError>;
