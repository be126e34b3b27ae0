//! Publish/subscribe adapter for peer editing notifications.
//!
//! One websocket per page, subscribed to a single shared topic. Publishing is
//! fire-and-forget: frames are queued onto a writer task and nothing waits for
//! delivery. Peers compensate for lost frames through the periodic resend in
//! [`crate::edit_session`].

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use shared::{
    domain::{ClientIdentity, EventId},
    protocol::{ChannelFrame, EditingNotification, EditingStatus},
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Where editing status goes. Implementations must not block and must not
/// report delivery failures to the caller.
pub trait EditingStatusPublisher: Send + Sync {
    fn send_editing_status(&self, event_id: EventId, status: EditingStatus);
}

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub url: Url,
    pub topic: String,
    pub identity: ClientIdentity,
}

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    EditingStatus(EditingNotification),
    Error(String),
    Disconnected,
}

struct ActiveConnection {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: Option<JoinHandle<()>>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        // The writer exits on its own once `outbound` is dropped.
        self.reader.abort();
    }
}

pub struct NotificationChannel {
    settings: ChannelSettings,
    connection: Mutex<Option<ActiveConnection>>,
    events: broadcast::Sender<ChannelEvent>,
}

impl NotificationChannel {
    pub fn new(settings: ChannelSettings) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            settings,
            connection: Mutex::new(None),
            events,
        })
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.settings.identity
    }

    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|active| !active.outbound.is_closed())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    pub async fn connect(&self) -> Result<()> {
        let url = self.settings.url.as_str();
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect notification channel: {url}"))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let subscribe = serde_json::to_string(&ChannelFrame::Subscribe {
            topic: self.settings.topic.clone(),
        })
        .context("failed to encode subscribe frame")?;
        // Queued first so it reaches the broker ahead of any publish.
        outbound
            .send(Message::Text(subscribe))
            .context("notification channel writer closed before subscribing")?;

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(err) = ws_writer.send(message).await {
                    debug!(%err, "channel: websocket send failed; stopping writer");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let topic = self.settings.topic.clone();
        let events = self.events.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = ws_reader.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ChannelFrame>(&text) {
                        Ok(ChannelFrame::Deliver {
                            topic: delivered,
                            message,
                        }) if delivered == topic => {
                            match EditingNotification::from_envelope(&message) {
                                Ok(notification) => {
                                    let _ = events.send(ChannelEvent::EditingStatus(notification));
                                }
                                Err(err) => {
                                    let _ = events.send(ChannelEvent::Error(err.to_string()));
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            let _ = events
                                .send(ChannelEvent::Error(format!("invalid channel frame: {err}")));
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = events.send(ChannelEvent::Error(format!(
                            "websocket receive failed: {err}"
                        )));
                        break;
                    }
                }
            }
            let _ = events.send(ChannelEvent::Disconnected);
        });

        let previous = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ActiveConnection {
                outbound,
                reader,
                writer: Some(writer),
            });
        if let Some(previous) = previous {
            let _ = previous.outbound.send(Message::Close(None));
        }

        info!(
            url,
            topic = %self.settings.topic,
            identity = %self.settings.identity,
            "channel: connected"
        );
        Ok(())
    }

    /// Closes the websocket after frames already queued have been written.
    /// Does nothing when not connected.
    pub async fn disconnect(&self) {
        let active = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(mut active) = active else {
            return;
        };
        let _ = active.outbound.send(Message::Close(None));
        let writer = active.writer.take();
        drop(active);
        if let Some(writer) = writer {
            if timeout(WRITER_FLUSH_TIMEOUT, writer).await.is_err() {
                debug!("channel: writer did not flush before disconnect");
            }
        }
        let _ = self.events.send(ChannelEvent::Disconnected);
        info!(topic = %self.settings.topic, "channel: disconnected");
    }
}

impl EditingStatusPublisher for NotificationChannel {
    fn send_editing_status(&self, event_id: EventId, status: EditingStatus) {
        let notification =
            EditingNotification::new(event_id, status, self.settings.identity.clone());
        let frame = match notification.to_envelope(Some(Utc::now())) {
            Ok(message) => ChannelFrame::Publish {
                topic: self.settings.topic.clone(),
                message,
            },
            Err(err) => {
                warn!(event_id = event_id.0, %err, "channel: dropping editing status");
                return;
            }
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                warn!(event_id = event_id.0, %err, "channel: dropping editing status");
                return;
            }
        };

        let guard = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(active) => {
                if active.outbound.send(Message::Text(text)).is_err() {
                    debug!(event_id = event_id.0, ?status, "channel: writer gone; status dropped");
                }
            }
            None => {
                debug!(event_id = event_id.0, ?status, "channel: not connected; status dropped");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
