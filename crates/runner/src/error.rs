use meridian_core::ConfigurationError;
use meridian_ports::StoreError;
use thiserror::Error;

/// Errors raised by the engine host itself; rule faults travel as
/// [`RuleFault`](crate::RuleFault)s instead
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unknown strategy '{strategy}' for tradestrategy {tradestrategy_id}")]
    UnknownStrategy {
        tradestrategy_id: String,
        strategy: String,
    },

    #[error("Tradestrategy {0} is already running")]
    DuplicateTradestrategy(String),

    #[error("Unknown tradestrategy: {0}")]
    UnknownTradestrategy(String),

    #[error("Worker for {0} has stopped")]
    WorkerStopped(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
