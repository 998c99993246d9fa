//! Chat messages supplied by the messaging platform

use serde::{Deserialize, Serialize};

/// Who sent a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    /// The coached customer
    Customer,
    /// Health coach / staff account
    Coach,
    /// Platform notifications
    System,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Customer => "customer",
            SenderRole::Coach => "coach",
            SenderRole::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Some(SenderRole::Customer),
            "coach" => Some(SenderRole::Coach),
            "system" => Some(SenderRole::System),
            _ => None,
        }
    }
}

/// Immutable chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Messaging-platform account identifier
    pub identity: String,
    /// Send time, epoch milliseconds
    pub timestamp: i64,
    pub body: String,
    pub sender_role: SenderRole,
}
