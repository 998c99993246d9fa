//! # coachlink Common Library
//!
//! Shared code for the coachlink services:
//! - Error and result types
//! - TOML configuration model and root folder resolution
//! - Watermark and schedule time helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
