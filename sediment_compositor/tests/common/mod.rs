// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared harness for the pixel scenario suites.
//!
//! Every scenario runs against a headless 256×256 compositor and renders
//! through [`CpuRenderer`]. Synchronous applies compose inline, so a
//! screenshot taken right after [`Harness::apply`] shows the transaction.

#![allow(dead_code, reason = "each suite uses a different subset")]

use std::ops::{Deref, DerefMut};

use sediment_compositor::{ApplyMode, Client, Composition, Compositor, CompositorConfig};
use sediment_core::backend::Renderer;
use sediment_core::buffer::FrameNumber;
use sediment_core::capture::{CapturePlan, CompositionContext};
use sediment_core::geometry::Color;
use sediment_core::layer::{LayerDesc, LayerId};
use sediment_core::scene::ApplyReport;
use sediment_core::transaction::Transaction;
use sediment_render::{CpuRenderer, Image, Rgba8};

pub const DISPLAY: u32 = 256;

pub const RED: Rgba8 = Rgba8::rgb(195, 63, 63);
pub const BLUE: Rgba8 = Rgba8::rgb(63, 63, 195);
pub const GREY: Rgba8 = Rgba8::rgb(200, 200, 200);
pub const GREEN: Rgba8 = Rgba8::rgb(43, 207, 131);
pub const BLACK: Rgba8 = Rgba8::BLACK;

/// Z of the background layer.
pub const BG_Z: i32 = i32::MAX - 2;
/// Z of the foreground layer.
pub const FG_Z: i32 = i32::MAX - 1;

pub struct Harness {
    pub compositor: Compositor,
    pub client: Client,
    renderer: CpuRenderer,
}

impl Harness {
    pub fn new() -> Self {
        let compositor = Compositor::new(CompositorConfig::HEADLESS);
        let client = compositor.client();
        Self {
            compositor,
            client,
            renderer: CpuRenderer::new(),
        }
    }

    pub fn buffer_layer(&self, name: &str, width: u32, height: u32) -> LayerId {
        self.client
            .create_layer(LayerDesc::buffer(name, width, height))
            .unwrap()
    }

    pub fn child_layer(&self, parent: LayerId, name: &str, width: u32, height: u32) -> LayerId {
        self.client
            .create_child(parent, LayerDesc::buffer(name, width, height))
            .unwrap()
    }

    pub fn color_layer(&self, name: &str, width: u32, height: u32, color: Rgba8) -> LayerId {
        let layer = self
            .client
            .create_layer(LayerDesc::color(name, width, height))
            .unwrap();
        self.apply(
            Transaction::new().set_color(layer, Color::from_rgb8(color.r, color.g, color.b)),
        );
        layer
    }

    /// Applies synchronously and insists on a clean report.
    pub fn apply(&self, txn: Transaction) -> ApplyReport {
        let report = self
            .compositor
            .apply(txn, ApplyMode::Synchronous)
            .unwrap()
            .expect("synchronous applies report");
        assert!(report.is_clean(), "transaction failed: {report:?}");
        report
    }

    /// Queues a solid buffer for `layer` without composing.
    pub fn fill(&mut self, layer: LayerId, width: u32, height: u32, color: Rgba8) -> FrameNumber {
        let desc = self
            .renderer
            .buffers_mut()
            .insert(Image::filled(width, height, color));
        self.compositor
            .buffer_queue(layer)
            .unwrap()
            .queue(desc)
            .unwrap()
    }

    /// Queues a solid buffer and composes so it latches.
    pub fn present(&mut self, layer: LayerId, width: u32, height: u32, color: Rgba8) -> Composition {
        self.fill(layer, width, height, color);
        self.compose()
    }

    pub fn compose(&self) -> Composition {
        self.compositor.compose().unwrap()
    }

    pub fn render(&mut self, plan: &CapturePlan) -> Shot {
        Shot(self.renderer.render(plan))
    }

    /// Renders the display from committed state.
    pub fn screenshot(&mut self) -> Shot {
        let plan = self.compositor.capture_display().unwrap();
        self.render(&plan)
    }

    pub fn capture(&mut self, ctx: &CompositionContext) -> Shot {
        let plan = self.compositor.capture_full_screen(ctx).unwrap();
        self.render(&plan)
    }

    pub fn capture_subtree(&mut self, root: LayerId) -> Shot {
        let plan = self.compositor.capture_subtree(root).unwrap();
        self.render(&plan)
    }

    pub fn display_context(&self) -> CompositionContext {
        self.compositor.config().display_context()
    }
}

/// A full-display blue background with a 64×64 red layer at (64, 64) above
/// it.
pub struct Stage {
    pub harness: Harness,
    pub bg: LayerId,
    pub fg: LayerId,
}

impl Stage {
    pub fn new() -> Self {
        let mut harness = Harness::new();
        let bg = harness.buffer_layer("bg", DISPLAY, DISPLAY);
        let fg = harness.buffer_layer("fg", 64, 64);
        harness.fill(bg, DISPLAY, DISPLAY, BLUE);
        harness.fill(fg, 64, 64, RED);
        harness.apply(
            Transaction::new()
                .set_layer(bg, BG_Z)
                .set_layer(fg, FG_Z)
                .set_position(fg, 64.0, 64.0),
        );
        Self { harness, bg, fg }
    }
}

impl Deref for Stage {
    type Target = Harness;

    fn deref(&self) -> &Harness {
        &self.harness
    }
}

impl DerefMut for Stage {
    fn deref_mut(&mut self) -> &mut Harness {
        &mut self.harness
    }
}

/// A rendered frame with pixel assertions.
pub struct Shot(pub Image);

impl Shot {
    /// Checks every pixel of the half-open region `[x0, x1) × [y0, y1)`,
    /// allowing one step of rounding per channel.
    #[track_caller]
    pub fn expect_region(&self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba8) {
        for y in y0..y1 {
            for x in x0..x1 {
                let got = self.0.pixel(x, y);
                assert!(
                    got.rgb_distance(color) <= 1,
                    "pixel ({x}, {y}) is {got:?}, expected {color:?}"
                );
            }
        }
    }

    #[track_caller]
    pub fn expect_pixel(&self, x: u32, y: u32, color: Rgba8) {
        self.expect_region(x, y, x + 1, y + 1, color);
    }

    #[track_caller]
    pub fn expect_fg(&self, x: u32, y: u32) {
        self.expect_pixel(x, y, RED);
    }

    #[track_caller]
    pub fn expect_bg(&self, x: u32, y: u32) {
        self.expect_pixel(x, y, BLUE);
    }

    #[track_caller]
    pub fn expect_child(&self, x: u32, y: u32) {
        self.expect_pixel(x, y, GREY);
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}
