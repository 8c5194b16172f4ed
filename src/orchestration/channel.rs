//! Single-writer output channel between a session producer and the wire.
//!
//! The producer runs in its own task and pushes events through an
//! [`EventSender`]; the consumer reads them as a stream. The stream ends
//! when the producer returns (or panics), so no event can follow close and
//! an abnormal exit cannot leak the channel.

use std::future::Future;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::OutboundEvent;

/// Sending half handed to the session producer.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<OutboundEvent>,
}

impl EventSender {
    /// Append one event in call order. Returns `false` when the consumer
    /// is gone; the producer treats that as its cancellation signal.
    pub async fn send(&self, event: OutboundEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

/// Factory for session output channels.
pub struct OutputChannel;

impl OutputChannel {
    /// Spawn `producer` with a send handle and return the receiving stream.
    pub fn open<F, Fut>(buffer: usize, producer: F) -> ReceiverStream<OutboundEvent>
    where
        F: FnOnce(EventSender) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(producer(EventSender { tx }));
        ReceiverStream::new(rx)
    }
}
