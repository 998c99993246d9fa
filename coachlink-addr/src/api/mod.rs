//! HTTP API handlers for coachlink-addr

pub mod health;
pub mod pipeline;

pub use health::health_routes;
pub use pipeline::pipeline_routes;
