use thiserror::Error;

use crate::client::ConnectionId;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("Connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    #[error("Failed to send to {id}: {reason}")]
    Send { id: ConnectionId, reason: String },
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;
