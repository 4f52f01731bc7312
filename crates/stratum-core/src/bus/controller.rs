//! `LayerBus` lifecycle, routing, and introspection.
//!
//! The bus owns one bounded queue per layer, the handler registry, the
//! history log and the counters. A single `RwLock<BusState>` guards everything
//! except the queues, which synchronize themselves. The lock is never held
//! across an `.await` or while handler code runs.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::join_all;
use stratum_types::config::{BusConfig, ConfigError};
use stratum_types::event::{BusEvent, EmergenceEvent};
use stratum_types::message::{LayerId, LayerMessage};
use stratum_types::metrics::BusMetrics;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::history::HistoryLog;
use super::queue::QueueSet;
use super::registry::HandlerRegistry;
use super::worker;
use crate::emergence::EmergenceDetector;
use crate::event::EventBus;
use crate::handler::{BoxLayerHandler, LayerHandler};

/// Errors returned by bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// `start` was called on a running bus.
    #[error("layer bus is already running")]
    AlreadyRunning,

    /// `send` was called on a stopped bus.
    #[error("layer bus is not running")]
    NotRunning,

    /// The target layer is not one of the configured layers.
    #[error("unknown layer: {0}")]
    UnknownDestination(LayerId),

    /// The target layer's queue has no free capacity.
    #[error("queue full for layer {0}")]
    QueueFull(LayerId),

    /// The target layer's queue no longer has a receiver.
    #[error("queue closed for layer {0}")]
    QueueClosed(LayerId),

    /// The configuration cannot back a bus.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// `start` was called outside a Tokio runtime.
    #[error("no Tokio runtime available to spawn workers")]
    NoRuntime,
}

/// Everything guarded by the bus lock.
pub(crate) struct BusState {
    pub(crate) running: bool,
    cancel: CancellationToken,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) history: HistoryLog,
    pub(crate) processed: u64,
    pub(crate) handler_failures: u64,
    emergence_count: u64,
    emergence_log: VecDeque<EmergenceEvent>,
}

pub(crate) struct BusInner {
    config: BusConfig,
    state: RwLock<BusState>,
    pub(crate) queues: QueueSet,
    pub(crate) events: EventBus,
    detector: EmergenceDetector,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BusInner {
    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, BusState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, BusState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `message` in history, then route it onto its layer's queue.
    pub(crate) fn send(&self, message: LayerMessage) -> Result<(), BusError> {
        let message = Arc::new(message);
        {
            let mut state = self.write_state();
            if !state.running {
                return Err(BusError::NotRunning);
            }
            state.history.push(Arc::clone(&message));
        }

        let message_id = message.id;
        let to_layer = message.to_layer.clone();
        self.queues.try_enqueue(message)?;
        debug!(%message_id, layer = %to_layer, "message enqueued");
        Ok(())
    }

    /// One emergence sweep: analyze under the read lock, record under the
    /// write lock, then notify.
    pub(crate) fn detect_emergence(&self) -> Vec<EmergenceEvent> {
        let events = {
            let state = self.read_state();
            self.detector.sweep(&state.history)
        };
        if events.is_empty() {
            return events;
        }

        {
            let mut state = self.write_state();
            let cap = self.detector.config().event_log_capacity;
            for event in &events {
                state.emergence_count += 1;
                state.emergence_log.push_back(event.clone());
                while state.emergence_log.len() > cap {
                    state.emergence_log.pop_front();
                }
            }
        }

        for event in &events {
            info!(rule = %event.rule, counts = ?event.counts, "emergence detected");
            self.events.publish(BusEvent::EmergenceDetected(event.clone()));
        }
        events
    }
}

/// In-process bus routing `LayerMessage`s between a fixed set of layers.
///
/// Each layer has a bounded queue drained by one dispatch worker, which hands
/// messages to the layer's registered handler and re-sends whatever follow-ups
/// it returns. A detector task periodically scans recent history for
/// emergence patterns.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct LayerBus {
    inner: Arc<BusInner>,
}

impl LayerBus {
    /// Build an inactive bus from `config`.
    pub fn new(config: BusConfig) -> Result<Self, BusError> {
        config.validate()?;

        let queues = QueueSet::new(&config.layers, config.queue_capacity);
        let state = BusState {
            running: false,
            cancel: CancellationToken::new(),
            handlers: HandlerRegistry::new(),
            history: HistoryLog::new(config.history_capacity),
            processed: 0,
            handler_failures: 0,
            emergence_count: 0,
            emergence_log: VecDeque::new(),
        };

        Ok(Self {
            inner: Arc::new(BusInner {
                events: EventBus::new(config.event_capacity),
                detector: EmergenceDetector::new(config.detector.clone()),
                queues,
                state: RwLock::new(state),
                tasks: Mutex::new(Vec::new()),
                config,
            }),
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Configured layers, in configuration order.
    pub fn layers(&self) -> &[LayerId] {
        self.inner.queues.layers()
    }

    pub fn is_running(&self) -> bool {
        self.inner.read_state().running
    }

    /// Install `handler` for `layer`, replacing any existing one.
    ///
    /// Returns `true` when a previous handler was replaced. Replacement is
    /// logged and published as [`BusEvent::HandlerReplaced`]. Messages already
    /// queued are handled by whichever handler is registered when they are
    /// dequeued.
    pub fn register_handler<H>(&self, layer: impl Into<LayerId>, handler: H) -> Result<bool, BusError>
    where
        H: LayerHandler + 'static,
    {
        let layer = layer.into();
        if !self.inner.queues.contains(&layer) {
            return Err(BusError::UnknownDestination(layer));
        }

        let replaced = self
            .inner
            .write_state()
            .handlers
            .insert(layer.clone(), BoxLayerHandler::new(handler))
            .is_some();

        if replaced {
            warn!(%layer, "replaced existing layer handler");
            self.inner
                .events
                .publish(BusEvent::HandlerReplaced { layer });
        } else {
            debug!(%layer, "registered layer handler");
        }
        Ok(replaced)
    }

    /// Remove the handler for `layer`. Returns `true` if one was registered.
    pub fn unregister_handler(&self, layer: &LayerId) -> bool {
        let removed = self.inner.write_state().handlers.remove(layer).is_some();
        if removed {
            debug!(%layer, "unregistered layer handler");
        }
        removed
    }

    /// Spawn one dispatch worker per layer plus the emergence detector.
    ///
    /// Must be called from within a Tokio runtime. A stopped bus may be
    /// started again; messages still queued are picked up by the new workers.
    pub fn start(&self) -> Result<(), BusError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime)?;

        // Held until every handle is recorded, so a concurrent `shutdown`
        // joins the full set.
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        let cancel = {
            let mut state = self.inner.write_state();
            if state.running {
                return Err(BusError::AlreadyRunning);
            }
            state.running = true;
            state.cancel = CancellationToken::new();
            state.cancel.clone()
        };

        tasks.retain(|handle| !handle.is_finished());
        for layer in self.layers() {
            tasks.push(runtime.spawn(worker::dispatch(
                Arc::clone(&self.inner),
                layer.clone(),
                cancel.clone(),
            )));
        }
        tasks.push(runtime.spawn(worker::detect(
            Arc::clone(&self.inner),
            self.inner.config.detector.period(),
            cancel,
        )));
        drop(tasks);

        if self.inner.read_state().handlers.is_empty() {
            warn!("layer bus started without handlers, every message will be dropped");
        }

        info!(layers = self.layers().len(), "layer bus started");
        Ok(())
    }

    /// Signal every worker and the detector to exit, without waiting.
    ///
    /// No-op on a stopped bus. Workers finish the message they are handling
    /// before they observe cancellation; use [`LayerBus::shutdown`] to wait.
    pub fn stop(&self) {
        let mut state = self.inner.write_state();
        if !state.running {
            return;
        }
        state.running = false;
        state.cancel.cancel();
        info!("layer bus stopped");
    }

    /// Stop the bus and wait until every spawned task has exited.
    pub async fn shutdown(&self) {
        self.stop();
        let handles: Vec<_> = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("bus task ended abnormally: {e}");
            }
        }
        debug!("layer bus quiescent");
    }

    /// Record `message` in history and enqueue it on its target layer.
    ///
    /// History reflects send attempts: the message is recorded even when
    /// routing then fails with `UnknownDestination` or `QueueFull`. Never
    /// blocks.
    pub fn send(&self, message: LayerMessage) -> Result<(), BusError> {
        self.inner.send(message)
    }

    /// Run one emergence sweep now, returning the events it detected.
    pub fn detect_emergence(&self) -> Vec<EmergenceEvent> {
        self.inner.detect_emergence()
    }

    /// Subscribe to bus notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.events.subscribe()
    }

    /// Consistent point-in-time snapshot of counters and queue depths.
    pub fn metrics(&self) -> BusMetrics {
        let state = self.inner.read_state();
        BusMetrics {
            running: state.running,
            processed: state.processed,
            emergence_count: state.emergence_count,
            handler_failures: state.handler_failures,
            history_size: state.history.len(),
            queue_depths: self.inner.queues.depths(),
        }
    }

    /// Up to `n` most recent history entries, oldest first.
    pub fn recent_messages(&self, n: usize) -> Vec<Arc<LayerMessage>> {
        self.inner.read_state().history.recent(n)
    }

    /// Up to `n` most recent retained emergence events, oldest first.
    pub fn emergence_events(&self, n: usize) -> Vec<EmergenceEvent> {
        let state = self.inner.read_state();
        let start = state.emergence_log.len().saturating_sub(n);
        state.emergence_log.range(start..).cloned().collect()
    }

    /// State snapshot reported by each registered handler.
    pub fn layer_states(&self) -> BTreeMap<LayerId, serde_json::Value> {
        let handlers: Vec<_> = self
            .inner
            .read_state()
            .handlers
            .iter()
            .map(|(layer, handler)| (layer.clone(), Arc::clone(handler)))
            .collect();

        handlers
            .into_iter()
            .map(|(layer, handler)| (layer, handler.state()))
            .collect()
    }
}

impl std::fmt::Debug for LayerBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read_state();
        f.debug_struct("LayerBus")
            .field("layers", &self.inner.queues.layers())
            .field("running", &state.running)
            .field("handlers", &state.handlers.len())
            .field(
                "history",
                &format_args!("{}/{}", state.history.len(), state.history.capacity()),
            )
            .field("subscribers", &self.inner.events.subscriber_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
