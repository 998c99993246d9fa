//! Address records extracted from chat messages
//!
//! Write-once: at most one record per (identity, timestamp), never updated.

use serde::{Deserialize, Serialize};

/// Kind of message an address was extracted from (`msg_type` column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Plain chat text
    ChatText,
}

impl MessageKind {
    pub fn code(&self) -> i64 {
        match self {
            MessageKind::ChatText => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MessageKind::ChatText),
            _ => None,
        }
    }
}

/// Address harvested from one chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub identity: String,
    /// Timestamp of the originating message, epoch milliseconds
    pub timestamp: i64,
    /// Address text as returned by the extraction oracle
    pub raw_address: String,
    /// Body of the originating message
    pub source_body: String,
    pub kind: MessageKind,
}
