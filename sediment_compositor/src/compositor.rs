// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared compositor service.
//!
//! One [`Compositor`] owns the [`Scene`] behind a `parking_lot` mutex. Clients
//! submit transactions through it, producers queue buffers through
//! [`BufferQueue`]s, and a composition pass ([`Compositor::compose`]) folds
//! both into the scene and plans the display.
//!
//! ```text
//!   Client ──apply(async)──► queued ──┐
//!   Client ──apply(sync)───────────────┼──► Scene ──► display plan
//!   BufferQueue ──channel──► arrivals ─┘      ▲
//!                                compose() ───┘
//! ```
//!
//! A synchronous apply returns after a pass that follows its commit. With a
//! [`RefreshDriver`](crate::RefreshDriver) attached it waits for the driver's
//! next pass; without one it runs the pass itself.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded};
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use sediment_core::buffer::FrameNumber;
use sediment_core::capture::{CapturePlan, CompositionContext};
use sediment_core::deferred::DeferredInfo;
use sediment_core::error::SceneError;
use sediment_core::geometry::{Geometry, IntSize};
use sediment_core::layer::{ClientId, FrameChanges, LayerDesc, LayerId, LayerKind};
use sediment_core::scene::{ApplyReport, GeometryPhase, LatchReport, Scene};
use sediment_core::trace::{
    CaptureEvent, CaptureKind, DeferredReleaseEvent, LatchEvent, PassEvent, TraceSink, Tracer,
    TransactionEvent,
};
use sediment_core::transaction::Transaction;
use tracing::{debug, trace, warn};

use crate::client::Client;
use crate::config::CompositorConfig;
use crate::error::{CompositorError, CompositorResult};
use crate::stream::{BufferEvent, BufferQueue};
use crate::tracing_sink::TracingSink;

/// How [`Compositor::apply`] hands a transaction over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ApplyMode {
    /// Commit now, then wait for the following composition pass.
    #[default]
    Synchronous,
    /// Queue for the next composition pass and return at once.
    Asynchronous,
}

/// Result of one composition pass.
#[derive(Clone, Debug)]
pub struct Composition {
    /// Pass counter after this pass; the first pass is 1.
    pub pass: u64,
    /// Asynchronous transactions committed by this pass.
    pub transactions: usize,
    /// Buffers latched and now displayed.
    pub latched: usize,
    /// Buffers whose size did not match their layer. Their frame numbers
    /// still count as latched.
    pub rejected: usize,
    /// Scene changes since the previous pass.
    pub changes: FrameChanges,
    /// The display plan.
    pub plan: CapturePlan,
    /// Non-fatal errors raised while flushing and latching.
    pub errors: Vec<SceneError>,
}

/// State guarded by the scene lock.
struct Inner {
    scene: Scene,
    queued: VecDeque<Transaction>,
    sink: Box<dyn TraceSink + Send>,
    pass: u64,
    streams: HashMap<LayerId, Arc<Mutex<FrameNumber>>>,
}

impl Inner {
    fn tracer(&mut self) -> Tracer<'_> {
        Tracer::new(&mut *self.sink)
    }

    fn commit(&mut self, txn: Transaction, synchronous: bool) -> ApplyReport {
        let report = self.scene.apply(txn);
        for err in &report.errors {
            warn!(target: "sediment::compositor", %err, "transaction error");
        }
        let event = TransactionEvent::new(self.pass + 1, synchronous, &report);
        self.tracer().transaction(&event);
        report
    }

    /// Commits queued asynchronous transactions in submission order.
    fn flush_queued(&mut self, errors: &mut Vec<SceneError>) -> usize {
        let mut flushed = 0;
        while let Some(txn) = self.queued.pop_front() {
            let report = self.commit(txn, false);
            errors.extend(report.errors);
            flushed += 1;
        }
        flushed
    }

    fn trace_latch(&mut self, pass: u64, event: &BufferEvent, report: &LatchReport) {
        let mut tracer = Tracer::new(&mut *self.sink);
        tracer.latch(&LatchEvent::new(pass, event.layer, event.frame, report));
        for released in &report.released {
            tracer.deferred_release(&DeferredReleaseEvent::new(pass, released));
        }
    }
}

struct Shared {
    config: CompositorConfig,
    inner: Mutex<Inner>,
    composed: Condvar,
    events: Sender<BufferEvent>,
    arrivals: Receiver<BufferEvent>,
    next_client: AtomicU32,
    drivers: AtomicUsize,
}

impl Shared {
    /// Runs one composition pass with the scene lock held.
    fn compose(&self, inner: &mut Inner) -> CompositorResult<Composition> {
        let mut errors = Vec::new();
        let transactions = inner.flush_queued(&mut errors);
        let pass = inner.pass + 1;

        let mut latched = 0;
        let mut rejected = 0;
        let pending = self.arrivals.len();
        for event in self.arrivals.try_iter().take(pending) {
            match inner
                .scene
                .latch_buffer(event.layer, event.frame, event.buffer)
            {
                Ok(report) => {
                    if report.outcome.is_accepted() {
                        latched += 1;
                    } else {
                        rejected += 1;
                    }
                    trace!(
                        target: "sediment::compositor",
                        layer = ?event.layer,
                        frame = event.frame,
                        outcome = ?report.outcome,
                        "latched buffer"
                    );
                    inner.trace_latch(pass, &event, &report);
                    errors.extend(report.errors);
                }
                Err(err) => {
                    debug!(target: "sediment::compositor", %err, frame = event.frame, "dropped buffer");
                    errors.push(err);
                }
            }
        }

        let changes = inner.scene.take_changes();
        #[cfg(feature = "trace-rich")]
        inner
            .tracer()
            .layer_changes(pass, &sediment_core::trace::layer_changes(&changes));
        let plan = inner
            .scene
            .capture_full_screen(&self.config.display_context())?;
        inner.pass = pass;
        inner.tracer().pass(&PassEvent::new(
            pass,
            transactions,
            latched,
            &changes,
            &plan,
        ));
        self.composed.notify_all();

        Ok(Composition {
            pass,
            transactions,
            latched,
            rejected,
            changes,
            plan,
            errors,
        })
    }
}

/// A cheaply clonable handle to the compositor service.
///
/// All clones share one scene. Every method takes the scene lock for the
/// duration of the call, except [`BufferQueue::queue`] which never does.
#[derive(Clone)]
pub struct Compositor {
    shared: Arc<Shared>,
}

impl core::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Compositor")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(CompositorConfig::default())
    }
}

impl Compositor {
    /// Creates a compositor with an empty scene, logging trace events
    /// through [`TracingSink`].
    #[must_use]
    pub fn new(config: CompositorConfig) -> Self {
        let (events, arrivals) = bounded(config.queue_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    scene: Scene::new(),
                    queued: VecDeque::new(),
                    sink: Box::new(TracingSink),
                    pass: 0,
                    streams: HashMap::new(),
                }),
                composed: Condvar::new(),
                events,
                arrivals,
                next_client: AtomicU32::new(1),
                drivers: AtomicUsize::new(0),
            }),
        }
    }

    /// The configuration this compositor was created with.
    #[must_use]
    pub fn config(&self) -> &CompositorConfig {
        &self.shared.config
    }

    /// Replaces the trace sink.
    pub fn set_trace_sink(&self, sink: impl TraceSink + Send + 'static) {
        self.shared.inner.lock().sink = Box::new(sink);
    }

    /// Opens a client connection with a fresh id.
    #[must_use]
    pub fn client(&self) -> Client {
        let id = self.shared.next_client.fetch_add(1, Ordering::Relaxed);
        Client::new(self.clone(), ClientId(id))
    }

    // -- Layers ---------------------------------------------------------------

    pub(crate) fn create_layer(&self, client: ClientId, desc: LayerDesc) -> CompositorResult<LayerId> {
        let mut inner = self.shared.inner.lock();
        let id = inner.scene.create_layer(client, desc)?;
        debug!(target: "sediment::compositor", layer = ?id, ?client, "created layer");
        Ok(id)
    }

    pub(crate) fn destroy_layer(&self, id: LayerId) -> CompositorResult<Vec<LayerId>> {
        let mut inner = self.shared.inner.lock();
        let destroyed = inner.scene.destroy_layer(id)?;
        for layer in &destroyed {
            inner.streams.remove(layer);
        }
        debug!(target: "sediment::compositor", layer = ?id, count = destroyed.len(), "destroyed layers");
        Ok(destroyed)
    }

    /// Returns the producer end of a buffer layer's stream.
    ///
    /// Every call for the same layer shares one frame counter.
    pub fn buffer_queue(&self, layer: LayerId) -> CompositorResult<BufferQueue> {
        let mut inner = self.shared.inner.lock();
        if inner.scene.layers().kind(layer)? != LayerKind::Buffer {
            return Err(SceneError::NotBufferLayer(layer).into());
        }
        let last = Arc::clone(inner.streams.entry(layer).or_default());
        Ok(BufferQueue::new(layer, last, self.shared.events.clone()))
    }

    // -- Transactions ---------------------------------------------------------

    /// Hands a transaction to the compositor.
    ///
    /// Asynchronous transactions are queued and return `None`; they commit in
    /// submission order at the next pass, or just before the next
    /// synchronous one. A synchronous transaction commits at once and
    /// returns its report after a later composition pass. If that pass does
    /// not come within [`CompositorConfig::sync_timeout`], the call fails
    /// with [`CompositorError::SyncTimeout`]; the transaction stays
    /// committed.
    pub fn apply(&self, txn: Transaction, mode: ApplyMode) -> CompositorResult<Option<ApplyReport>> {
        let mut inner = self.shared.inner.lock();
        if mode == ApplyMode::Asynchronous {
            inner.queued.push_back(txn);
            trace!(target: "sediment::compositor", queued = inner.queued.len(), "queued transaction");
            return Ok(None);
        }

        let mut errors = Vec::new();
        inner.flush_queued(&mut errors);
        let report = inner.commit(txn, true);

        if self.shared.drivers.load(Ordering::Acquire) == 0 {
            self.shared.compose(&mut inner)?;
            return Ok(Some(report));
        }

        let target = inner.pass;
        let timeout = self.shared.config.sync_timeout;
        let deadline = Instant::now() + timeout;
        while inner.pass <= target {
            if self
                .shared
                .composed
                .wait_until(&mut inner, deadline)
                .timed_out()
                && inner.pass <= target
            {
                warn!(target: "sediment::compositor", ?timeout, "synchronous apply timed out");
                return Err(CompositorError::SyncTimeout(timeout));
            }
        }
        Ok(Some(report))
    }

    /// Number of asynchronous transactions waiting for a pass.
    #[must_use]
    pub fn pending_transactions(&self) -> usize {
        self.shared.inner.lock().queued.len()
    }

    // -- Composition ----------------------------------------------------------

    /// Runs one composition pass.
    ///
    /// Commits queued transactions, latches queued buffers in arrival order,
    /// collects the scene changes, plans the display and wakes synchronous
    /// appliers.
    pub fn compose(&self) -> CompositorResult<Composition> {
        let mut inner = self.shared.inner.lock();
        self.shared.compose(&mut inner)
    }

    /// Number of completed composition passes.
    #[must_use]
    pub fn pass(&self) -> u64 {
        self.shared.inner.lock().pass
    }

    pub(crate) fn attach_driver(&self) {
        self.shared.drivers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn detach_driver(&self) {
        self.shared.drivers.fetch_sub(1, Ordering::AcqRel);
    }

    // -- Captures -------------------------------------------------------------

    /// Plans a capture of one layer stack from committed state.
    pub fn capture_full_screen(&self, ctx: &CompositionContext) -> CompositorResult<CapturePlan> {
        let mut inner = self.shared.inner.lock();
        let plan = inner.scene.capture_full_screen(ctx)?;
        let pass = inner.pass;
        inner
            .tracer()
            .capture(&CaptureEvent::new(pass, CaptureKind::FullScreen, &plan));
        Ok(plan)
    }

    /// Plans a capture of the configured display.
    pub fn capture_display(&self) -> CompositorResult<CapturePlan> {
        self.capture_full_screen(&self.shared.config.display_context())
    }

    /// Plans a capture of `root` and its structural descendants.
    pub fn capture_subtree(&self, root: LayerId) -> CompositorResult<CapturePlan> {
        let mut inner = self.shared.inner.lock();
        let plan = inner.scene.capture_subtree(root)?;
        let pass = inner.pass;
        inner
            .tracer()
            .capture(&CaptureEvent::new(pass, CaptureKind::Subtree, &plan));
        Ok(plan)
    }

    // -- Queries --------------------------------------------------------------

    /// Runs `f` against the scene with the lock held.
    pub fn with_scene<R>(&self, f: impl FnOnce(&Scene) -> R) -> R {
        f(&self.shared.inner.lock().scene)
    }

    /// Committed geometry of a layer.
    pub fn geometry(&self, id: LayerId) -> CompositorResult<Geometry> {
        Ok(*self.shared.inner.lock().scene.layers().geometry(id)?)
    }

    /// Most recently requested size of a layer.
    pub fn requested_size(&self, id: LayerId) -> CompositorResult<IntSize> {
        Ok(self.shared.inner.lock().scene.layers().requested_size(id)?)
    }

    /// Highest frame number latched by a layer, or 0.
    pub fn latched_frame(&self, id: LayerId) -> CompositorResult<FrameNumber> {
        Ok(self.shared.inner.lock().scene.layers().latched_frame(id)?)
    }

    /// Whether a layer's requested geometry is visible yet.
    pub fn geometry_phase(&self, id: LayerId) -> CompositorResult<GeometryPhase> {
        Ok(self.shared.inner.lock().scene.geometry_phase(id)?)
    }

    /// Parked deferred groups, in submission order.
    #[must_use]
    pub fn pending_deferred(&self) -> Vec<DeferredInfo> {
        self.shared.inner.lock().scene.deferred().collect()
    }

    /// The resolved paint order, back to front.
    #[must_use]
    pub fn paint_order(&self) -> Vec<LayerId> {
        self.shared.inner.lock().scene.paint_order()
    }
}
