//! Utility modules for flyer-acquire

pub mod db_retry;
pub mod file_store;
pub mod http;
pub mod keyed_lock;
#[cfg(test)]
pub(crate) mod test_server;

pub use db_retry::retry_on_lock;
pub use keyed_lock::KeyedLocks;
