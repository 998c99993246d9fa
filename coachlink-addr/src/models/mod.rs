//! Data models for coachlink-addr
//!
//! - Chat messages read from the message source
//! - Address records and identity mappings written by the pipeline
//! - Pipeline run summaries

pub mod address_record;
pub mod chat_message;
pub mod identity_mapping;
pub mod pipeline_run;

pub use address_record::{AddressRecord, MessageKind};
pub use chat_message::{ChatMessage, SenderRole};
pub use identity_mapping::IdentityMapping;
pub use pipeline_run::{PipelineRun, PipelineSummary, RunTrigger};
