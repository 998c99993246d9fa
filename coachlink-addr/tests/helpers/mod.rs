//! Test Helper Utilities
//!
//! Shared utilities for testing coachlink-addr

#![allow(dead_code)]

pub mod db_utils;
pub mod fake_oracle;

pub use db_utils::{
    create_test_db, seed_customer_messages, test_config, test_date, test_orchestrator, watermark_ms,
};
pub use fake_oracle::FakeOracle;
