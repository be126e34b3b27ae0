use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ClientIdentity, EventId},
    error::ProtocolError,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EditingStatus {
    Editing,
    Stopped,
}

/// "Client `from` is (or stopped) editing event `event_id`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingNotification {
    pub event_id: EventId,
    pub status: EditingStatus,
    pub from: ClientIdentity,
}

/// Chat-shaped payload carried on the broadcast topic. The editing status
/// travels JSON-encoded inside `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEnvelope {
    pub from: ClientIdentity,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditingText {
    event_id: EventId,
    status: EditingStatus,
}

impl EditingNotification {
    pub fn new(event_id: EventId, status: EditingStatus, from: ClientIdentity) -> Self {
        Self {
            event_id,
            status,
            from,
        }
    }

    pub fn to_envelope(&self, time: Option<DateTime<Utc>>) -> Result<TopicEnvelope, ProtocolError> {
        let text = serde_json::to_string(&EditingText {
            event_id: self.event_id,
            status: self.status,
        })
        .map_err(ProtocolError::Encode)?;
        Ok(TopicEnvelope {
            from: self.from.clone(),
            text,
            time,
        })
    }

    pub fn from_envelope(envelope: &TopicEnvelope) -> Result<Self, ProtocolError> {
        let body: EditingText =
            serde_json::from_str(&envelope.text).map_err(|source| ProtocolError::NotEditingStatus {
                from: envelope.from.to_string(),
                source,
            })?;
        Ok(Self {
            event_id: body.event_id,
            status: body.status,
            from: envelope.from.clone(),
        })
    }
}

/// Frames exchanged with the topic broker over the websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChannelFrame {
    Subscribe {
        topic: String,
    },
    Publish {
        topic: String,
        message: TopicEnvelope,
    },
    Deliver {
        topic: String,
        message: TopicEnvelope,
    },
}
