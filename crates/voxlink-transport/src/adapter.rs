use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use voxlink_protocol::{InboundMessage, OutboundMessage};

use crate::MessageChannel;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Keep-alive ping spacing; `None` disables pings.
    pub ping_interval: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval: Some(Duration::from_secs(20)),
        }
    }
}

/// What the orchestrator sees from the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Inbound(InboundMessage),
    /// The channel closed or errored. Terminal; sends after this are
    /// dropped and the adapter task exits.
    Closed,
}

/// Pumps typed envelopes over a raw channel in both directions.
///
/// Outbound sends are fire-and-forget. Inbound frames that fail to
/// parse (unknown `type` included) are logged and skipped so newer
/// servers do not break older clients.
pub struct TransportAdapter;

impl TransportAdapter {
    pub fn spawn(
        mut channel: Box<dyn MessageChannel>,
        mut outbound_rx: mpsc::Receiver<OutboundMessage>,
        event_tx: mpsc::Sender<TransportEvent>,
        config: TransportConfig,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(target: "transport", "transport adapter started");

            let mut ping_timer = config.ping_interval.map(tokio::time::interval);
            if let Some(t) = ping_timer.as_mut() {
                // The first interval tick fires immediately; skip it.
                t.tick().await;
            }

            loop {
                tokio::select! {
                    maybe_outbound = outbound_rx.recv() => {
                        match maybe_outbound {
                            Some(message) => {
                                if !Self::send_message(&mut *channel, &message).await {
                                    break;
                                }
                            }
                            None => {
                                debug!(target: "transport", "outbound queue closed, shutting down channel");
                                channel.close().await;
                                return;
                            }
                        }
                    }
                    maybe_frame = channel.recv() => {
                        match maybe_frame {
                            Some(raw) => Self::dispatch_inbound(&raw, &event_tx).await,
                            None => break,
                        }
                    }
                    _ = async {
                        match ping_timer.as_mut() {
                            Some(t) => { t.tick().await; }
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        let ping = OutboundMessage::Ping { timestamp: now_ms() };
                        if !Self::send_message(&mut *channel, &ping).await {
                            break;
                        }
                    }
                }
            }

            info!(target: "transport", "voice channel closed");
            let _ = event_tx.send(TransportEvent::Closed).await;
        })
    }

    async fn send_message(channel: &mut dyn MessageChannel, message: &OutboundMessage) -> bool {
        let json = match message.to_json() {
            Ok(j) => j,
            Err(e) => {
                warn!(target: "transport", "failed to encode outbound message: {}", e);
                return true;
            }
        };
        match channel.send(json).await {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "transport", "send failed, treating channel as closed: {}", e);
                false
            }
        }
    }

    async fn dispatch_inbound(raw: &str, event_tx: &mpsc::Sender<TransportEvent>) {
        match InboundMessage::parse(raw) {
            Ok(message) => {
                let _ = event_tx.send(TransportEvent::Inbound(message)).await;
            }
            Err(e) => {
                // Forward-compatible no-op for unrecognized types.
                warn!(target: "transport", "ignoring unparseable inbound message: {}", e);
            }
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportError;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Channel scripted with inbound frames; records what was sent.
    struct ScriptedChannel {
        inbound: VecDeque<String>,
        sent_tx: mpsc::UnboundedSender<String>,
        closed: bool,
    }

    #[async_trait]
    impl MessageChannel for ScriptedChannel {
        async fn send(&mut self, text: String) -> Result<(), TransportError> {
            if self.closed {
                return Err(TransportError::Closed);
            }
            let _ = self.sent_tx.send(text);
            Ok(())
        }

        async fn recv(&mut self) -> Option<String> {
            match self.inbound.pop_front() {
                Some(frame) => Some(frame),
                None => {
                    // Keep the channel open until the adapter drops it.
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn close(&mut self) {
            self.closed = true;
        }
    }

    fn scripted(
        inbound: Vec<&str>,
    ) -> (Box<dyn MessageChannel>, mpsc::UnboundedReceiver<String>) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        (
            Box::new(ScriptedChannel {
                inbound: inbound.into_iter().map(String::from).collect(),
                sent_tx,
                closed: false,
            }),
            sent_rx,
        )
    }

    fn no_ping() -> TransportConfig {
        TransportConfig {
            ping_interval: None,
        }
    }

    #[tokio::test]
    async fn inbound_frames_become_typed_events() {
        let (channel, _sent) = scripted(vec![
            r#"{"type":"connection","message":"ready"}"#,
            r#"{"type":"response","text":"hi"}"#,
        ]);
        let (_outbound_tx, outbound_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let _task = TransportAdapter::spawn(channel, outbound_rx, event_tx, no_ping());

        assert!(matches!(
            event_rx.recv().await.unwrap(),
            TransportEvent::Inbound(InboundMessage::Connection { .. })
        ));
        assert!(matches!(
            event_rx.recv().await.unwrap(),
            TransportEvent::Inbound(InboundMessage::Response { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_inbound_type_is_skipped() {
        let (channel, _sent) = scripted(vec![
            r#"{"type":"shiny_new_thing","x":1}"#,
            r#"{"type":"processing"}"#,
        ]);
        let (_outbound_tx, outbound_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let _task = TransportAdapter::spawn(channel, outbound_rx, event_tx, no_ping());

        // The unknown frame produces nothing; the next valid one does.
        assert!(matches!(
            event_rx.recv().await.unwrap(),
            TransportEvent::Inbound(InboundMessage::Processing { .. })
        ));
    }

    #[tokio::test]
    async fn outbound_messages_are_serialized_and_sent() {
        let (channel, mut sent) = scripted(vec![]);
        let (outbound_tx, outbound_rx) = mpsc::channel(8);
        let (event_tx, _event_rx) = mpsc::channel(8);

        let _task = TransportAdapter::spawn(channel, outbound_rx, event_tx, no_ping());

        outbound_tx
            .send(OutboundMessage::Text {
                text: "hello".into(),
                timestamp: 7,
            })
            .await
            .unwrap();

        let raw = sent.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "hello");
    }

    #[tokio::test]
    async fn dropping_outbound_queue_closes_channel() {
        let (channel, _sent) = scripted(vec![]);
        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundMessage>(8);
        let (event_tx, _event_rx) = mpsc::channel(8);

        let task = TransportAdapter::spawn(channel, outbound_rx, event_tx, no_ping());
        drop(outbound_tx);
        task.await.unwrap();
    }
}
