// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor error types.

use core::time::Duration;

use sediment_core::error::SceneError;
use thiserror::Error;

/// Errors produced by the compositor service.
#[derive(Debug, Error)]
pub enum CompositorError {
    /// A scene operation failed.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// A synchronous apply committed, but no composition pass followed
    /// within the timeout.
    #[error("no composition pass within {0:?}")]
    SyncTimeout(Duration),

    /// The compositor behind a buffer queue was dropped.
    #[error("buffer queue closed")]
    QueueClosed,

    /// The refresh thread could not be started.
    #[error("failed to spawn refresh thread")]
    Spawn(#[source] std::io::Error),
}

/// Shorthand for results carrying a [`CompositorError`].
pub type CompositorResult<T> = Result<T, CompositorError>;
