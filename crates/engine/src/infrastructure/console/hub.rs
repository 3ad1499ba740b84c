//! Console fan-out hub.
//!
//! Owns, per session, the set of subscriber endpoints. A single long-lived
//! task drains one command channel (register / unregister / broadcast), which
//! is the hub's only serialization point; subscriber sockets are driven by
//! their own loops elsewhere. Per-subscriber delivery uses a bounded queue,
//! and a subscriber that cannot keep up is closed and removed.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use simbench_domain::{SessionId, SubscriberId};
use simbench_shared::{ConsoleFrame, ConsoleMessage, ConsoleStream};

use crate::application::ports::outbound::ConsolePort;

/// Depth of each subscriber's delivery queue.
pub const SUBSCRIBER_QUEUE_DEPTH: usize = 256;
/// Depth of the hub's command channel.
const COMMAND_QUEUE_DEPTH: usize = 1024;

enum HubCommand {
    Register {
        session_id: SessionId,
        subscriber_id: SubscriberId,
        tx: mpsc::Sender<ConsoleMessage>,
    },
    Unregister {
        session_id: SessionId,
        subscriber_id: SubscriberId,
    },
    Broadcast {
        frame: ConsoleFrame,
    },
    SessionClosed {
        session_id: SessionId,
    },
}

/// Handle to the fan-out hub; cheap to clone.
#[derive(Clone)]
pub struct ConsoleHub {
    commands: mpsc::Sender<HubCommand>,
}

impl ConsoleHub {
    /// Create the hub and spawn its coordinator task.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        tokio::spawn(run_hub(rx));
        Self { commands: tx }
    }

    /// Register a subscriber for one session's console stream.
    ///
    /// The returned receiver yields framed output until the subscriber is
    /// dropped for falling behind, unsubscribes, or the session closes.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
    ) -> (SubscriberId, mpsc::Receiver<ConsoleMessage>) {
        let subscriber_id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        let _ = self
            .commands
            .send(HubCommand::Register {
                session_id,
                subscriber_id,
                tx,
            })
            .await;
        (subscriber_id, rx)
    }

    pub async fn unsubscribe(&self, session_id: SessionId, subscriber_id: SubscriberId) {
        let _ = self
            .commands
            .send(HubCommand::Unregister {
                session_id,
                subscriber_id,
            })
            .await;
    }
}

impl Default for ConsoleHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsolePort for ConsoleHub {
    async fn publish(&self, session_id: SessionId, stream: ConsoleStream, chunk: Vec<u8>) {
        let _ = self
            .commands
            .send(HubCommand::Broadcast {
                frame: ConsoleFrame {
                    session_id,
                    stream,
                    data: chunk,
                },
            })
            .await;
    }

    async fn session_closed(&self, session_id: SessionId) {
        let _ = self
            .commands
            .send(HubCommand::SessionClosed { session_id })
            .await;
    }
}

async fn run_hub(mut commands: mpsc::Receiver<HubCommand>) {
    let mut subscribers: HashMap<SessionId, HashMap<SubscriberId, mpsc::Sender<ConsoleMessage>>> =
        HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register {
                session_id,
                subscriber_id,
                tx,
            } => {
                let _ = tx
                    .try_send(ConsoleMessage::Subscribed { session_id })
                    .ok();
                subscribers
                    .entry(session_id)
                    .or_default()
                    .insert(subscriber_id, tx);
                tracing::debug!(
                    session_id = %session_id,
                    subscriber_id = %subscriber_id,
                    "console subscriber registered"
                );
            }
            HubCommand::Unregister {
                session_id,
                subscriber_id,
            } => {
                if let Some(session_subs) = subscribers.get_mut(&session_id) {
                    session_subs.remove(&subscriber_id);
                    if session_subs.is_empty() {
                        subscribers.remove(&session_id);
                    }
                }
            }
            HubCommand::Broadcast { frame } => {
                let Some(session_subs) = subscribers.get_mut(&frame.session_id) else {
                    continue;
                };
                let mut lagging = Vec::new();
                for (subscriber_id, tx) in session_subs.iter() {
                    if tx
                        .try_send(ConsoleMessage::Output(frame.clone()))
                        .is_err()
                    {
                        lagging.push(*subscriber_id);
                    }
                }
                for subscriber_id in lagging {
                    session_subs.remove(&subscriber_id);
                    tracing::warn!(
                        session_id = %frame.session_id,
                        subscriber_id = %subscriber_id,
                        "console subscriber dropped: queue full or closed"
                    );
                }
                if session_subs.is_empty() {
                    subscribers.remove(&frame.session_id);
                }
            }
            HubCommand::SessionClosed { session_id } => {
                if let Some(session_subs) = subscribers.remove(&session_id) {
                    for tx in session_subs.into_values() {
                        let _ = tx.try_send(ConsoleMessage::Closed { session_id }).ok();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::application::ports::outbound::ConsoleWriter;

    #[tokio::test]
    async fn subscriber_sees_chunks_in_write_order() {
        let hub = Arc::new(ConsoleHub::new());
        let session_id = SessionId::new();
        let (_sub, mut rx) = hub.subscribe(session_id).await;

        assert_eq!(
            rx.recv().await,
            Some(ConsoleMessage::Subscribed { session_id })
        );

        let writer = ConsoleWriter::new(hub.clone(), session_id);
        writer.write(ConsoleStream::Stdout, b"first").await;
        writer.write(ConsoleStream::Stdout, b"second").await;

        match rx.recv().await {
            Some(ConsoleMessage::Output(frame)) => assert_eq!(frame.data, b"first"),
            other => panic!("unexpected message: {other:?}"),
        }
        match rx.recv().await {
            Some(ConsoleMessage::Output(frame)) => assert_eq!(frame.data, b"second"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chunks_are_scoped_to_their_session() {
        let hub = Arc::new(ConsoleHub::new());
        let session_a = SessionId::new();
        let session_b = SessionId::new();
        let (_sub, mut rx_b) = hub.subscribe(session_b).await;
        assert_eq!(
            rx_b.recv().await,
            Some(ConsoleMessage::Subscribed { session_id: session_b })
        );

        ConsoleWriter::new(hub.clone(), session_a)
            .write(ConsoleStream::Stdout, b"not for b")
            .await;
        ConsoleWriter::new(hub.clone(), session_b)
            .write(ConsoleStream::Stdout, b"for b")
            .await;

        match rx_b.recv().await {
            Some(ConsoleMessage::Output(frame)) => {
                assert_eq!(frame.session_id, session_b);
                assert_eq!(frame.data, b"for b");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_subscriber_is_disconnected() {
        let hub = Arc::new(ConsoleHub::new());
        let session_id = SessionId::new();
        let (_sub, mut rx) = hub.subscribe(session_id).await;

        let writer = ConsoleWriter::new(hub.clone(), session_id);
        // Never drain: overflow the bounded queue (plus the Subscribed ack).
        for i in 0..(SUBSCRIBER_QUEUE_DEPTH + 16) {
            writer
                .write(ConsoleStream::Stdout, format!("chunk {i}").as_bytes())
                .await;
        }
        // The command channel is FIFO, so once a later subscribe is
        // acknowledged every broadcast above has been processed.
        let (_barrier, mut barrier_rx) = hub.subscribe(session_id).await;
        assert_eq!(
            barrier_rx.recv().await,
            Some(ConsoleMessage::Subscribed { session_id })
        );

        // Every message observed is bytewise intact, and the stream ends
        // (None) because the subscriber was removed, not with a Closed frame.
        let mut received = 0usize;
        while let Some(msg) = rx.recv().await {
            match msg {
                ConsoleMessage::Subscribed { .. } => {}
                ConsoleMessage::Output(frame) => {
                    assert_eq!(frame.data, format!("chunk {received}").as_bytes());
                    received += 1;
                }
                ConsoleMessage::Closed { .. } => panic!("session was not closed"),
            }
        }
        assert!(received <= SUBSCRIBER_QUEUE_DEPTH);
    }

    #[tokio::test]
    async fn session_close_notifies_subscribers() {
        let hub = Arc::new(ConsoleHub::new());
        let session_id = SessionId::new();
        let (_sub, mut rx) = hub.subscribe(session_id).await;
        assert_eq!(
            rx.recv().await,
            Some(ConsoleMessage::Subscribed { session_id })
        );

        let writer = ConsoleWriter::new(hub.clone(), session_id);
        writer.closed().await;

        assert_eq!(rx.recv().await, Some(ConsoleMessage::Closed { session_id }));
        assert_eq!(rx.recv().await, None);
    }
}
