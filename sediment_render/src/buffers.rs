// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel contents behind buffer ids.

use hashbrown::HashMap;
use sediment_core::buffer::{BufferDesc, BufferId};

use crate::image::Image;

/// Owns the pixels of every client buffer the renderer may sample.
///
/// The core only ever sees a [`BufferDesc`]; producers register an image here
/// and hand the returned descriptor to a buffer queue.
#[derive(Debug, Default)]
pub struct BufferStore {
    images: HashMap<BufferId, Image>,
    next_id: u64,
}

impl BufferStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an image under a fresh id.
    pub fn insert(&mut self, image: Image) -> BufferDesc {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        let desc = BufferDesc::new(id, image.width(), image.height());
        self.images.insert(id, image);
        desc
    }

    /// Returns the image for `id`.
    #[must_use]
    pub fn get(&self, id: BufferId) -> Option<&Image> {
        self.images.get(&id)
    }

    /// Returns the image for `id` for in-place edits.
    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut Image> {
        self.images.get_mut(&id)
    }

    /// Releases the image for `id`.
    pub fn remove(&mut self, id: BufferId) -> Option<Image> {
        self.images.remove(&id)
    }

    /// Returns the number of registered buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns `true` if no buffer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Rgba8;

    #[test]
    fn ids_are_not_reused() {
        let mut store = BufferStore::new();
        let a = store.insert(Image::filled(2, 3, Rgba8::BLACK));
        assert_eq!((a.size.width, a.size.height), (2, 3));
        assert!(store.remove(a.id).is_some());
        let b = store.insert(Image::filled(1, 1, Rgba8::BLACK));
        assert_ne!(a.id, b.id);
        assert!(store.get(a.id).is_none());
        assert_eq!(store.len(), 1);
    }
}
