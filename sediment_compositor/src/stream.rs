// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer buffer producers.
//!
//! A [`BufferQueue`] numbers each buffer it queues and hands it to the
//! compositor over a bounded channel. Queueing never touches the scene lock;
//! the buffer is latched by the next composition pass.

use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use sediment_core::buffer::{BufferDesc, FrameNumber};
use sediment_core::layer::LayerId;

use crate::error::{CompositorError, CompositorResult};

/// A queued buffer waiting for the next composition pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BufferEvent {
    pub(crate) layer: LayerId,
    pub(crate) frame: FrameNumber,
    pub(crate) buffer: BufferDesc,
}

/// Producer end of one layer's buffer stream.
///
/// Clones share the frame counter, so frames from every clone are numbered
/// in one sequence starting at 1.
#[derive(Clone, Debug)]
pub struct BufferQueue {
    layer: LayerId,
    /// Last frame number handed out. Held across the send so frames enter
    /// the channel in number order.
    last: Arc<Mutex<FrameNumber>>,
    events: Sender<BufferEvent>,
}

impl BufferQueue {
    pub(crate) fn new(layer: LayerId, last: Arc<Mutex<FrameNumber>>, events: Sender<BufferEvent>) -> Self {
        Self { layer, last, events }
    }

    /// The layer this queue feeds.
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Queues a buffer and returns its frame number.
    ///
    /// Blocks while the compositor's event queue is full. Fails with
    /// [`CompositorError::QueueClosed`] once the compositor is gone; the
    /// frame number is not consumed in that case.
    pub fn queue(&self, buffer: BufferDesc) -> CompositorResult<FrameNumber> {
        let mut last = self.last.lock();
        let frame = *last + 1;
        self.events
            .send(BufferEvent {
                layer: self.layer,
                frame,
                buffer,
            })
            .map_err(|_| CompositorError::QueueClosed)?;
        *last = frame;
        tracing::trace!(target: "sediment::stream", layer = ?self.layer, frame, "queued buffer");
        Ok(frame)
    }

    /// The number the next queued buffer will get.
    #[must_use]
    pub fn next_frame_number(&self) -> FrameNumber {
        *self.last.lock() + 1
    }

    /// The number of the most recently queued buffer, or 0 if none was.
    #[must_use]
    pub fn last_queued_frame(&self) -> FrameNumber {
        *self.last.lock()
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;
    use sediment_core::buffer::BufferId;
    use sediment_core::layer::{ClientId, LayerDesc};
    use sediment_core::scene::Scene;

    use super::*;

    fn layer() -> LayerId {
        Scene::new()
            .create_layer(ClientId(0), LayerDesc::buffer("l", 1, 1))
            .unwrap()
    }

    #[test]
    fn frames_are_numbered_from_one_across_clones() {
        let (tx, rx) = bounded(8);
        let queue = BufferQueue::new(layer(), Arc::default(), tx);
        let clone = queue.clone();
        assert_eq!(queue.next_frame_number(), 1);
        assert_eq!(queue.queue(BufferDesc::new(BufferId(1), 1, 1)).unwrap(), 1);
        assert_eq!(clone.queue(BufferDesc::new(BufferId(2), 1, 1)).unwrap(), 2);
        assert_eq!(queue.last_queued_frame(), 2);

        let frames: Vec<_> = rx.try_iter().map(|e| e.frame).collect();
        assert_eq!(frames, [1, 2]);
    }

    #[test]
    fn closed_queue_keeps_the_counter() {
        let (tx, rx) = bounded(1);
        let queue = BufferQueue::new(layer(), Arc::default(), tx);
        drop(rx);
        assert!(matches!(
            queue.queue(BufferDesc::new(BufferId(1), 1, 1)),
            Err(CompositorError::QueueClosed)
        ));
        assert_eq!(queue.next_frame_number(), 1);
    }
}
