use thiserror::Error;

pub mod deposits;
pub mod shortener;
pub mod store;
pub mod submissions;
pub mod tasks;
pub mod users;
pub mod withdrawals;

/// Failures of the balance-mutating request queues (withdrawals, deposits,
/// store purchases). Kept typed so the HTTP layer can distinguish a user
/// error from a lost race or a genuine fault.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient available balance")]
    InsufficientFunds,
    #[error("request {0} not found")]
    NotFound(String),
    #[error("request {0} is no longer pending")]
    NotPending(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
