// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parked per-layer mutation groups waiting on a barrier frame.

use alloc::vec::Vec;

use crate::layer::LayerId;
use crate::transaction::{DeferUntil, LayerGroup};

/// Whether a parked entry can still be released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeferredStatus {
    /// The barrier layer is alive and has not latched the frame yet.
    Waiting,
    /// The barrier layer was destroyed. The entry stays parked until its own
    /// layer is destroyed.
    Unresolvable,
}

/// A read-only view of one parked entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferredInfo {
    /// Submission serial; entries release in ascending order.
    pub serial: u64,
    /// Layer whose mutations are parked.
    pub layer: LayerId,
    /// Release condition.
    pub until: DeferUntil,
    /// Number of parked mutations.
    pub mutations: usize,
    /// Current status.
    pub status: DeferredStatus,
}

#[derive(Clone, Debug)]
pub(crate) struct DeferredEntry {
    pub(crate) serial: u64,
    pub(crate) until: DeferUntil,
    pub(crate) group: LayerGroup,
}

/// FIFO of parked mutation groups.
#[derive(Clone, Debug, Default)]
pub struct DeferredQueue {
    entries: Vec<DeferredEntry>,
    next_serial: u64,
}

impl DeferredQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of parked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is parked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parks a group and returns its serial.
    pub(crate) fn park(&mut self, until: DeferUntil, group: LayerGroup) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.entries.push(DeferredEntry {
            serial,
            until,
            group,
        });
        serial
    }

    /// Removes and returns every entry for which `ready` holds, in submission
    /// order.
    pub(crate) fn take_ready(&mut self, mut ready: impl FnMut(DeferUntil) -> bool) -> Vec<DeferredEntry> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if ready(self.entries[i].until) {
                taken.push(self.entries.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }

    /// Drops every entry whose own layer is in `destroyed`. Returns how many
    /// were dropped.
    pub(crate) fn drop_layers(&mut self, destroyed: &[LayerId]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !destroyed.contains(&e.group.layer));
        before - self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &DeferredEntry> + '_ {
        self.entries.iter()
    }
}
