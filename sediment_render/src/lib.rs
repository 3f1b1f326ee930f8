// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU reference renderer for sediment capture plans.
//!
//! This crate turns a [`CapturePlan`](sediment_core::capture::CapturePlan)
//! into pixels. It defines:
//!
//! - [`Rgba8`] and [`Image`]: straight-alpha RGBA8 pixels
//! - [`BufferStore`]: the pixel contents behind each
//!   [`BufferId`](sediment_core::buffer::BufferId)
//! - [`CpuRenderer`]: a [`Renderer`](sediment_core::backend::Renderer) that
//!   samples at pixel centers and blends with straight alpha-over

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod buffers;
mod image;
mod raster;

pub use buffers::BufferStore;
pub use image::{Image, Rgba8};
pub use raster::CpuRenderer;
