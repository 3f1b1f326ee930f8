// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Committed mutations mark channels through [`understory_dirty`]; each
//! evaluation drains them and recomputes derived state.
//!
//! - **Propagating**: [`GEOMETRY`] and [`OPACITY`] use
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) over child-to-parent
//!   dependency edges. Position, matrix, size, crops, scaling mode, the hidden
//!   flag and layer-stack membership all feed the inherited frame, so they
//!   share [`GEOMETRY`].
//! - **Local-only**: [`CONTENT`] (latched buffer or fill color).
//! - **Ordering**: [`TOPOLOGY`] (create, destroy, reparent) and [`STACKING`]
//!   (absolute or relative z) invalidate the resolved paint order.

use understory_dirty::Channel;

/// Placement, bounds, clipping, visibility or layer-stack changed.
pub const GEOMETRY: Channel = Channel::new(0);

/// Alpha changed.
pub const OPACITY: Channel = Channel::new(1);

/// Displayed buffer or fill color changed.
pub const CONTENT: Channel = Channel::new(2);

/// Tree structure changed.
pub const TOPOLOGY: Channel = Channel::new(3);

/// Absolute z or relative-z edge changed.
pub const STACKING: Channel = Channel::new(4);
