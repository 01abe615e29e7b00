//! Error types for the gateway crate

use thiserror::Error;

/// Gateway-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Command queue full")]
    QueueFull,

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Duplicate order id: {0}")]
    DuplicateOrder(String),

    #[error("Invalid order {order_id}: {reason}")]
    InvalidOrder { order_id: String, reason: String },
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
