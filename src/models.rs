pub mod deposits;
pub mod shortener;
pub mod store;
pub mod submissions;
pub mod tasks;
pub mod users;
pub mod withdrawals;
