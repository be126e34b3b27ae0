use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("topic message from {from} is not an editing status: {source}")]
    NotEditingStatus {
        from: String,
        source: serde_json::Error,
    },
    #[error("failed to encode editing status: {0}")]
    Encode(serde_json::Error),
}
