//! Messaging identity → commerce customer links

use serde::{Deserialize, Serialize};

/// One-time link from a messaging identity to a customer record.
/// Terminal once written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityMapping {
    pub identity: String,
    pub customer_id: String,
}
