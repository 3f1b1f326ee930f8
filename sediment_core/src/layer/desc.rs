// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer creation parameters.

use alloc::string::String;

use super::id::LayerId;
use crate::geometry::{IntSize, LayerFlags};

/// What a layer draws.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Displays buffers delivered through its buffer stream.
    #[default]
    Buffer,
    /// Fills its bounds with a solid color and never takes buffers.
    Color,
}

/// Everything needed to create a layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerDesc {
    /// Debug name.
    pub name: String,
    /// Optional parent.
    pub parent: Option<LayerId>,
    /// Buffer or color layer.
    pub kind: LayerKind,
    /// Initial size.
    pub size: IntSize,
    /// Initial flags.
    pub flags: LayerFlags,
}

impl LayerDesc {
    /// Describes a root buffer layer.
    #[must_use]
    pub fn buffer(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            parent: None,
            kind: LayerKind::Buffer,
            size: IntSize::new(width, height),
            flags: LayerFlags::default(),
        }
    }

    /// Describes a root color layer.
    #[must_use]
    pub fn color(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            kind: LayerKind::Color,
            ..Self::buffer(name, width, height)
        }
    }

    /// Places the layer under `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: LayerId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Creates the layer hidden.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.flags.hidden = true;
        self
    }
}
