// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The 2×2 layer matrix.
//!
//! A layer is placed by its 2×2 matrix (applied about the layer origin)
//! followed by a translation to its position. Coefficients use the sampling
//! names clients pass when setting a matrix:
//!
//! ```text
//!   x' = dsdx·x + dtdy·y + position.x
//!   y' = dtdx·x + dsdy·y + position.y
//! ```
//!
//! Composition down the parent chain is done with [`kurbo::Affine`]; this type
//! only carries the linear part a client sets.

use core::ops::Mul;

use kurbo::{Affine, Point};

/// The linear part of a layer's placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix22 {
    /// Contribution of local x to screen x.
    pub dsdx: f64,
    /// Contribution of local x to screen y.
    pub dtdx: f64,
    /// Contribution of local y to screen x.
    pub dtdy: f64,
    /// Contribution of local y to screen y.
    pub dsdy: f64,
}

impl Default for Matrix22 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix22 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0);

    /// Creates a matrix from its four coefficients, in client argument order.
    #[inline]
    #[must_use]
    pub const fn new(dsdx: f64, dtdx: f64, dtdy: f64, dsdy: f64) -> Self {
        Self {
            dsdx,
            dtdx,
            dtdy,
            dsdy,
        }
    }

    /// Creates a non-uniform scale.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy)
    }

    /// Returns the determinant. Zero means the layer collapses to a line or
    /// point and draws nothing.
    #[inline]
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.dsdx * self.dsdy - self.dtdy * self.dtdx
    }

    /// Returns `true` if every coefficient is finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.dsdx.is_finite() && self.dtdx.is_finite() && self.dtdy.is_finite() && self.dsdy.is_finite()
    }

    /// Returns the matrix as an affine map with no translation.
    #[inline]
    #[must_use]
    pub fn to_affine(self) -> Affine {
        Affine::new([self.dsdx, self.dtdx, self.dtdy, self.dsdy, 0.0, 0.0])
    }

    /// Returns the full local placement: this matrix, then a translation to
    /// `position`.
    #[inline]
    #[must_use]
    pub fn placement(self, position: Point) -> Affine {
        Affine::new([
            self.dsdx, self.dtdx, self.dtdy, self.dsdy, position.x, position.y,
        ])
    }

    /// Splits an affine map back into a matrix and a position.
    ///
    /// Inverse of [`placement`](Self::placement).
    #[inline]
    #[must_use]
    pub fn split_affine(affine: Affine) -> (Self, Point) {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        (Self::new(a, b, c, d), Point::new(e, f))
    }
}

impl Mul for Matrix22 {
    type Output = Self;

    /// `(self * rhs)` applies `rhs` first.
    fn mul(self, rhs: Self) -> Self {
        Self {
            dsdx: self.dsdx * rhs.dsdx + self.dtdy * rhs.dtdx,
            dtdx: self.dtdx * rhs.dsdx + self.dsdy * rhs.dtdx,
            dtdy: self.dsdx * rhs.dtdy + self.dtdy * rhs.dsdy,
            dsdy: self.dtdx * rhs.dtdy + self.dsdy * rhs.dsdy,
        }
    }
}
