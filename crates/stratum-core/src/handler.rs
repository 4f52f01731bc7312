//! Layer handler trait for pluggable per-layer processing.
//!
//! Defines the `LayerHandler` trait that collaborators implement to process
//! the messages routed to one layer, plus `BoxLayerHandler`, the object-safe
//! wrapper the bus stores in its registry:
//! 1. `LayerHandlerDyn` is an object-safe mirror of `LayerHandler` with boxed futures
//! 2. A blanket impl covers every `T: LayerHandler`
//! 3. `BoxLayerHandler` wraps `Box<dyn LayerHandlerDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use stratum_types::message::LayerMessage;
use thiserror::Error;

/// Errors a handler may return for a single message.
///
/// The dispatch worker drops the message on any error; nothing is retried.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Processing failed.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler does not accept this kind of message.
    #[error("unsupported message type '{0}'")]
    Unsupported(String),
}

/// Processing capability registered for one layer.
///
/// Each call is awaited to completion by the layer's dispatch worker before
/// the next queued message is taken, so an implementation never sees two
/// messages of its layer at once.
pub trait LayerHandler: Send + Sync {
    /// Process one message, returning the follow-up messages to send.
    ///
    /// Follow-ups may target any layer, including this handler's own. Each
    /// is routed independently and may be rejected (for example when the
    /// target queue is full) without affecting the others.
    fn process_message(
        &self,
        message: &LayerMessage,
    ) -> impl Future<Output = Result<Vec<LayerMessage>, HandlerError>> + Send;

    /// Arbitrary snapshot of the handler's internal state, for introspection.
    fn state(&self) -> serde_json::Value;
}

/// Object-safe version of [`LayerHandler`] with boxed futures.
pub trait LayerHandlerDyn: Send + Sync {
    fn process_message_boxed<'a>(
        &'a self,
        message: &'a LayerMessage,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LayerMessage>, HandlerError>> + Send + 'a>>;

    fn state(&self) -> serde_json::Value;
}

impl<T: LayerHandler> LayerHandlerDyn for T {
    fn process_message_boxed<'a>(
        &'a self,
        message: &'a LayerMessage,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LayerMessage>, HandlerError>> + Send + 'a>> {
        Box::pin(self.process_message(message))
    }

    fn state(&self) -> serde_json::Value {
        LayerHandler::state(self)
    }
}

/// Type-erased layer handler.
pub struct BoxLayerHandler {
    inner: Box<dyn LayerHandlerDyn>,
}

impl BoxLayerHandler {
    pub fn new<T: LayerHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Box::new(handler),
        }
    }

    pub async fn process_message(
        &self,
        message: &LayerMessage,
    ) -> Result<Vec<LayerMessage>, HandlerError> {
        self.inner.process_message_boxed(message).await
    }

    pub fn state(&self) -> serde_json::Value {
        self.inner.state()
    }
}

impl std::fmt::Debug for BoxLayerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLayerHandler").finish_non_exhaustive()
    }
}
