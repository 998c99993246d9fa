//! Utility modules for coachlink-addr

pub mod db_retry;
pub mod pacing;

pub use db_retry::retry_on_lock;
pub use pacing::pause;
