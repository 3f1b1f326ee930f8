// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Background composition at a fixed interval.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{debug, warn};

use crate::compositor::Compositor;
use crate::error::{CompositorError, CompositorResult};

/// Runs [`Compositor::compose`] on a dedicated thread until dropped.
///
/// While at least one driver is attached, synchronous applies wait for the
/// driver's next pass instead of composing on the caller's thread.
#[derive(Debug)]
pub struct RefreshDriver {
    compositor: Compositor,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshDriver {
    /// Starts composing every `interval`.
    pub fn start(compositor: &Compositor, interval: Duration) -> CompositorResult<Self> {
        let (stop, stopped) = bounded(0);
        let worker = compositor.clone();
        compositor.attach_driver();
        let handle = thread::Builder::new()
            .name("sediment-refresh".into())
            .spawn(move || refresh_loop(&worker, &stopped, interval));
        match handle {
            Ok(handle) => {
                debug!(target: "sediment::refresh", ?interval, "refresh driver started");
                Ok(Self {
                    compositor: compositor.clone(),
                    stop: Some(stop),
                    handle: Some(handle),
                })
            }
            Err(err) => {
                compositor.detach_driver();
                Err(CompositorError::Spawn(err))
            }
        }
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for RefreshDriver {
    fn drop(&mut self) {
        // Disconnecting the channel ends the loop.
        drop(self.stop.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!(target: "sediment::refresh", "refresh thread panicked");
        }
        self.compositor.detach_driver();
        debug!(target: "sediment::refresh", "refresh driver stopped");
    }
}

fn refresh_loop(compositor: &Compositor, stopped: &Receiver<()>, interval: Duration) {
    loop {
        match stopped.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(err) = compositor.compose() {
                    warn!(target: "sediment::refresh", %err, "composition pass failed");
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
