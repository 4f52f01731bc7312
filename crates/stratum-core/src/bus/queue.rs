//! One bounded FIFO queue per layer.
//!
//! Each layer gets a bounded `mpsc` channel. Enqueueing uses `try_send`, so a
//! producer never waits for space: a handler re-submitting follow-ups from
//! inside a dispatch worker gets `QueueFull` instead of deadlocking on its own
//! (or another layer's) full queue.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use stratum_types::message::{LayerId, LayerMessage};
use tokio::sync::{mpsc, Mutex};

use super::controller::BusError;

/// Receiving end of a layer queue.
///
/// Owned by the set so it outlives any single worker. The running worker
/// holds the lock for its whole lifetime; a worker started after a restart
/// waits for the previous one to let go.
pub(crate) type QueueReceiver = Arc<Mutex<mpsc::Receiver<Arc<LayerMessage>>>>;

struct LayerQueue {
    sender: mpsc::Sender<Arc<LayerMessage>>,
    receiver: QueueReceiver,
}

/// Fixed set of per-layer bounded queues.
pub struct QueueSet {
    queues: HashMap<LayerId, LayerQueue>,
    /// Layers in configuration order.
    order: Vec<LayerId>,
    capacity: usize,
}

impl QueueSet {
    /// Create one queue of `capacity` slots for each layer.
    ///
    /// `capacity` must be non-zero.
    pub fn new(layers: &[LayerId], capacity: usize) -> Self {
        let mut queues = HashMap::with_capacity(layers.len());
        for layer in layers {
            let (sender, receiver) = mpsc::channel(capacity);
            queues.insert(
                layer.clone(),
                LayerQueue {
                    sender,
                    receiver: Arc::new(Mutex::new(receiver)),
                },
            );
        }
        Self {
            queues,
            order: layers.to_vec(),
            capacity,
        }
    }

    pub fn contains(&self, layer: &LayerId) -> bool {
        self.queues.contains_key(layer)
    }

    pub fn layers(&self) -> &[LayerId] {
        &self.order
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue `message` on its target layer without waiting.
    pub fn try_enqueue(&self, message: Arc<LayerMessage>) -> Result<(), BusError> {
        let layer = &message.to_layer;
        let queue = self
            .queues
            .get(layer)
            .ok_or_else(|| BusError::UnknownDestination(layer.clone()))?;

        let layer = layer.clone();
        queue.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BusError::QueueFull(layer),
            mpsc::error::TrySendError::Closed(_) => BusError::QueueClosed(layer),
        })
    }

    /// Number of messages waiting on `layer`.
    pub fn depth(&self, layer: &LayerId) -> Option<usize> {
        self.queues
            .get(layer)
            .map(|q| self.capacity - q.sender.capacity())
    }

    pub fn depths(&self) -> BTreeMap<LayerId, usize> {
        self.order
            .iter()
            .filter_map(|layer| Some((layer.clone(), self.depth(layer)?)))
            .collect()
    }

    pub(crate) fn receiver(&self, layer: &LayerId) -> Option<QueueReceiver> {
        self.queues.get(layer).map(|q| Arc::clone(&q.receiver))
    }
}

impl std::fmt::Debug for QueueSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSet")
            .field("layers", &self.order)
            .field("capacity", &self.capacity)
            .finish()
    }
}
