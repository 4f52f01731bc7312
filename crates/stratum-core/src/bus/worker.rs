//! Background tasks spawned by `LayerBus::start`.
//!
//! - `dispatch` -- one per layer; drains the layer queue strictly in order
//! - `detect` -- the periodic emergence sweep

use std::sync::Arc;
use std::time::Duration;

use stratum_types::event::BusEvent;
use stratum_types::message::{LayerId, LayerMessage};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use super::controller::BusInner;

/// Drain `layer`'s queue until `cancel` fires.
///
/// Messages are processed one at a time: the next message is not taken until
/// the handler call for the current one has completed.
pub(crate) async fn dispatch(inner: Arc<BusInner>, layer: LayerId, cancel: CancellationToken) {
    let Some(receiver) = inner.queues.receiver(&layer) else {
        return;
    };
    let span = info_span!("layer_worker", %layer);

    async move {
        // A worker from a previous start may still be finishing its last message.
        let mut rx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            rx = receiver.lock() => rx,
        };
        debug!("dispatch worker running");

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(message) => message,
                    None => break,
                },
            };
            process(&inner, &layer, &message).await;
        }

        debug!("dispatch worker exiting");
    }
    .instrument(span)
    .await
}

async fn process(inner: &BusInner, layer: &LayerId, message: &LayerMessage) {
    let handler = inner.read_state().handlers.get(layer);
    let Some(handler) = handler else {
        debug!(message_id = %message.id, "no handler registered, message dropped");
        inner.events.publish(BusEvent::MessageDropped {
            layer: layer.clone(),
            message_id: message.id,
        });
        return;
    };

    match handler.process_message(message).await {
        Ok(follow_ups) => {
            for follow_up in follow_ups {
                let follow_up_id = follow_up.id;
                if let Err(e) = inner.send(follow_up) {
                    warn!(message_id = %follow_up_id, "follow-up rejected: {e}");
                    inner.events.publish(BusEvent::FollowUpRejected {
                        layer: layer.clone(),
                        message_id: follow_up_id,
                        error: e.to_string(),
                    });
                }
            }
            inner.write_state().processed += 1;
        }
        Err(e) => {
            warn!(message_id = %message.id, "handler failed: {e}");
            {
                let mut state = inner.write_state();
                state.processed += 1;
                state.handler_failures += 1;
            }
            inner.events.publish(BusEvent::HandlerFailed {
                layer: layer.clone(),
                message_id: message.id,
                error: e.to_string(),
            });
        }
    }
}

/// Run an emergence sweep every `period` until `cancel` fires.
pub(crate) async fn detect(inner: Arc<BusInner>, period: Duration, cancel: CancellationToken) {
    let Some(first_tick) = Instant::now().checked_add(period) else {
        warn!(?period, "detector period out of range, periodic sweeps disabled");
        return;
    };
    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                inner.detect_emergence();
            }
        }
    }
    debug!("emergence detector exiting");
}
