// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plain geometry value types shared by the layer store and capture engine.

use kurbo::{Point, Rect};

use crate::buffer::ScalingMode;
use crate::output::LayerStackId;
use crate::transform::Matrix22;

/// Integer width and height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl IntSize {
    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the rectangle `(0, 0, width, height)`.
    #[inline]
    #[must_use]
    pub fn to_rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// An integer rectangle given by its edges. `right` and `bottom` are
/// exclusive.
///
/// A rectangle with `right < left` or `bottom < top` is *invalid*; crop
/// setters treat it as "no crop". `IntRect::new(0, 0, -1, -1)` is the
/// conventional way to clear a crop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl IntRect {
    /// Creates a rectangle from its edges.
    #[inline]
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Returns `true` unless the rectangle has negative width or height.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.right >= self.left && self.bottom >= self.top
    }

    /// Returns `Some(self)` for a valid rectangle, `None` otherwise.
    #[inline]
    #[must_use]
    pub const fn valid(self) -> Option<Self> {
        if self.is_valid() { Some(self) } else { None }
    }

    /// Converts to a floating-point rectangle.
    #[inline]
    #[must_use]
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        )
    }
}

/// Straight (non-premultiplied) RGB color in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
}

impl Color {
    /// Opaque black, the color of a color layer nobody colored.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a color from float channels.
    #[inline]
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Creates a color from 8-bit channels.
    #[inline]
    #[must_use]
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
        )
    }
}

/// Per-layer boolean flags.
///
/// Setting [`hidden`](Self::hidden) suppresses the layer and its structural
/// subtree. Layers stacked relative to a hidden layer are unaffected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerFlags {
    /// Whether the layer (and its children) is hidden.
    pub hidden: bool,
}

impl LayerFlags {
    /// Flags for a hidden layer.
    pub const HIDDEN: Self = Self { hidden: true };
}

/// The committed geometry of one layer, as composition sees it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    /// Offset of the layer origin in its parent's frame.
    pub position: Point,
    /// Layer bounds are `(0, 0, size.width, size.height)` in local space.
    pub size: IntSize,
    /// Local-space crop, intersected with the bounds.
    pub crop: Option<IntRect>,
    /// Crop in the parent's frame, applied after the local crop and inherited
    /// by children.
    pub final_crop: Option<IntRect>,
    /// Linear part of the placement.
    pub matrix: Matrix22,
    /// Layer alpha in `0.0..=1.0`.
    pub alpha: f32,
    /// Display selector; only meaningful on root layers.
    pub layer_stack: LayerStackId,
    /// Visibility flags.
    pub flags: LayerFlags,
    /// Fill color of a color layer.
    pub color: Color,
    /// Scaling-mode override. `None` inherits from the parent.
    pub scaling: Option<ScalingMode>,
}

impl Geometry {
    /// Geometry of a freshly created layer.
    #[must_use]
    pub fn new(size: IntSize, flags: LayerFlags) -> Self {
        Self {
            position: Point::ORIGIN,
            size,
            crop: None,
            final_crop: None,
            matrix: Matrix22::IDENTITY,
            alpha: 1.0,
            layer_stack: LayerStackId::default(),
            flags,
            color: Color::BLACK,
            scaling: None,
        }
    }
}
