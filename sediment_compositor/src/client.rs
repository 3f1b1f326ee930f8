// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Client connections.

use sediment_core::layer::{ClientId, LayerDesc, LayerId};
use sediment_core::transaction::Transaction;

use crate::compositor::Compositor;
use crate::error::CompositorResult;

/// One client connection to a [`Compositor`].
///
/// Layers remember the client that created them: destroying a layer takes
/// its same-client descendants with it, and detaching children only cuts
/// loose the children of other clients.
#[derive(Clone, Debug)]
pub struct Client {
    compositor: Compositor,
    id: ClientId,
}

impl Client {
    pub(crate) fn new(compositor: Compositor, id: ClientId) -> Self {
        Self { compositor, id }
    }

    /// This connection's id.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The compositor this client talks to.
    #[must_use]
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Creates a layer as described.
    pub fn create_layer(&self, desc: LayerDesc) -> CompositorResult<LayerId> {
        self.compositor.create_layer(self.id, desc)
    }

    /// Creates a layer under `parent`, which may belong to another client.
    pub fn create_child(&self, parent: LayerId, desc: LayerDesc) -> CompositorResult<LayerId> {
        self.create_layer(desc.with_parent(parent))
    }

    /// Destroys a layer and its same-client descendants. Returns every
    /// destroyed handle.
    pub fn destroy_layer(&self, id: LayerId) -> CompositorResult<Vec<LayerId>> {
        self.compositor.destroy_layer(id)
    }

    /// Starts an empty transaction.
    #[must_use]
    pub fn transaction(&self) -> Transaction {
        Transaction::new()
    }
}
