// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Straight alpha-over rasterization of capture plans.
//!
//! Every output pixel is sampled once per item at its center. A pixel is
//! covered when its center lies inside the capture clip (half-open) and maps
//! back into the item's local clip (half-open). Buffers are sampled nearest,
//! colors are solid. Each covered pixel blends
//!
//! ```text
//!   dst = src · a + dst · (1 − a),   a = item alpha · src alpha
//! ```
//!
//! and is rounded to the nearest integer before the next item draws.

use kurbo::{Point, Rect, Vec2};
use sediment_core::backend::Renderer;
use sediment_core::capture::{CaptureContent, CaptureItem, CapturePlan};

use crate::buffers::BufferStore;
use crate::image::{Image, Rgba8};

/// Renders capture plans into [`Image`]s on the CPU.
#[derive(Debug, Default)]
pub struct CpuRenderer {
    buffers: BufferStore,
}

/// Where an item's pixels come from.
enum Source<'a> {
    Solid(Rgba8),
    Image(&'a Image),
}

impl Source<'_> {
    fn sample(&self, local: Point, content_scale: Vec2) -> Rgba8 {
        match self {
            Self::Solid(color) => *color,
            Self::Image(image) => {
                let x = texel(local.x * content_scale.x, image.width());
                let y = texel(local.y * content_scale.y, image.height());
                image.pixel(x, y)
            }
        }
    }
}

impl CpuRenderer {
    /// Creates a renderer with an empty buffer store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer sampling from `buffers`.
    #[must_use]
    pub fn with_buffers(buffers: BufferStore) -> Self {
        Self { buffers }
    }

    /// Returns the buffer store.
    #[must_use]
    pub fn buffers(&self) -> &BufferStore {
        &self.buffers
    }

    /// Returns the buffer store for registering new buffers.
    pub fn buffers_mut(&mut self) -> &mut BufferStore {
        &mut self.buffers
    }

    fn draw_item(&self, target: &mut Image, item: &CaptureItem) {
        let det = item.transform.determinant();
        if !det.is_finite() || det * det < 1e-24 {
            return;
        }
        let source = match item.content {
            CaptureContent::Color(color) => Source::Solid(Rgba8::from_color(color)),
            CaptureContent::Buffer(desc) => match self.buffers.get(desc.id) {
                Some(image) if image.width() > 0 && image.height() > 0 => Source::Image(image),
                _ => return,
            },
        };
        let inverse = item.transform.inverse();

        let mut bounds = item.transform.transform_rect_bbox(item.local_clip);
        if let Some(clip) = item.clip {
            bounds = bounds.intersect(clip);
        }
        let bounds = bounds.intersect(Rect::new(
            0.0,
            0.0,
            f64::from(target.width()),
            f64::from(target.height()),
        ));
        if bounds.area() <= 0.0 {
            return;
        }
        let (x0, x1) = pixel_span(bounds.x0, bounds.x1);
        let (y0, y1) = pixel_span(bounds.y0, bounds.y1);

        for y in y0..y1 {
            for x in x0..x1 {
                let center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if item.clip.is_some_and(|clip| !clip.contains(center)) {
                    continue;
                }
                let local = inverse * center;
                if !item.local_clip.contains(local) {
                    continue;
                }
                let src = source.sample(local, item.content_scale);
                let alpha = item.alpha * f32::from(src.a) / 255.0;
                let dst = target.pixel(x, y);
                target.set_pixel(x, y, blend(src, dst, alpha));
            }
        }
    }
}

impl Renderer for CpuRenderer {
    type Output = Image;

    fn render(&mut self, plan: &CapturePlan) -> Image {
        let mut target = Image::filled(plan.width, plan.height, Rgba8::BLACK);
        for item in &plan.items {
            self.draw_item(&mut target, item);
        }
        target
    }
}

/// Straight alpha-over of one pixel, rounded to nearest.
fn blend(src: Rgba8, dst: Rgba8, alpha: f32) -> Rgba8 {
    let alpha = alpha.clamp(0.0, 1.0);
    let mix = |s: u8, d: u8| round_channel(f32::from(s) * alpha + f32::from(d) * (1.0 - alpha));
    Rgba8::new(
        mix(src.r, dst.r),
        mix(src.g, dst.g),
        mix(src.b, dst.b),
        round_channel(255.0 * alpha + f32::from(dst.a) * (1.0 - alpha)),
    )
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "value is clamped to 0.0..=255.5 before the cast"
)]
fn round_channel(v: f32) -> u8 {
    (v.clamp(0.0, 255.0) + 0.5) as u8
}

/// Pixel indices whose centers may fall in `[lo, hi)`; both ends are
/// already clamped to the target.
#[expect(
    clippy::cast_possible_truncation,
    reason = "inputs are clamped to the target extent"
)]
fn pixel_span(lo: f64, hi: f64) -> (u32, u32) {
    // Truncation floors non-negative values.
    let start = lo.max(0.0) as u32;
    let hi = hi.max(0.0);
    let end = hi as u32;
    (start, if f64::from(end) < hi { end + 1 } else { end })
}

/// Nearest texel index for a buffer coordinate.
#[expect(
    clippy::cast_possible_truncation,
    reason = "result is clamped to the buffer extent"
)]
fn texel(coord: f64, extent: u32) -> u32 {
    let max = f64::from(extent - 1);
    coord.clamp(0.0, max) as u32
}
