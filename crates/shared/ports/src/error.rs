use thiserror::Error;

/// Errors raised by a persistence backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unknown tradestrategy: {0}")]
    UnknownTradestrategy(String),

    #[error("Tradestrategy {id} is {from}; cannot move to {to}")]
    TerminalStatus { id: String, from: String, to: String },

    #[error("Store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
