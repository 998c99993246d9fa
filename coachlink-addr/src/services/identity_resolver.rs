//! Identity resolution
//!
//! Links messaging identities to commerce customers through the address
//! records extracted from their chats:
//!
//! classify → mask sensitive terms → canonicalize → ledger substring lookup
//! → stage mapping → insert-if-absent
//!
//! Identities that already have a mapping are never looked up again. A
//! lookup miss is not an error; the identity simply stays unresolved until a
//! later run finds a matching address.

use coachlink_common::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::db;
use crate::models::{AddressRecord, IdentityMapping};
use crate::services::address_canonicalizer::AddressCanonicalizer;
use crate::services::address_classifier::AddressClassifier;
use crate::services::sensitive_terms::SensitiveTermFilter;

/// Counts from one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub records_considered: usize,
    /// Identity already mapped before or earlier in this pass
    pub already_mapped: usize,
    pub implausible: usize,
    pub lookup_misses: usize,
    pub mappings_staged: usize,
    pub mappings_created: usize,
}

/// Resolves address records to customer ids
pub struct IdentityResolver {
    db: SqlitePool,
    ledger_db: SqlitePool,
    classifier: AddressClassifier,
    canonicalizer: AddressCanonicalizer,
    sensitive_terms: SensitiveTermFilter,
}

impl IdentityResolver {
    pub fn new(
        db: SqlitePool,
        ledger_db: SqlitePool,
        classifier: AddressClassifier,
        canonicalizer: AddressCanonicalizer,
        sensitive_terms: SensitiveTermFilter,
    ) -> Self {
        Self {
            db,
            ledger_db,
            classifier,
            canonicalizer,
            sensitive_terms,
        }
    }

    /// Lookup key for a raw address, or None when it is not a plausible address
    pub fn lookup_key(&self, raw_address: &str) -> Option<String> {
        if !self.classifier.is_plausible_address(raw_address) {
            return None;
        }
        let masked = self.sensitive_terms.mask(raw_address.trim());
        let key = self.canonicalizer.canonicalize(&masked);
        if key.trim().is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Resolve `records` and store new mappings
    pub async fn resolve(&self, records: &[AddressRecord]) -> Result<ResolutionStats> {
        let mut stats = ResolutionStats {
            records_considered: records.len(),
            ..Default::default()
        };
        let mut staged: Vec<IdentityMapping> = Vec::new();
        let mut settled: HashSet<&str> = HashSet::new();

        for record in records {
            if settled.contains(record.identity.as_str()) {
                stats.already_mapped += 1;
                continue;
            }
            if db::identity_mappings::exists(&self.db, &record.identity).await? {
                settled.insert(record.identity.as_str());
                stats.already_mapped += 1;
                continue;
            }

            let Some(key) = self.lookup_key(&record.raw_address) else {
                tracing::debug!(
                    identity = %record.identity,
                    address = %record.raw_address,
                    "Address not plausible, skipped"
                );
                stats.implausible += 1;
                continue;
            };

            let customer_id =
                db::order_ledger::lookup_customer_id_by_address_substring(&self.ledger_db, &key)
                    .await?
                    .filter(|id| !id.trim().is_empty());

            match customer_id {
                Some(customer_id) => {
                    tracing::debug!(
                        identity = %record.identity,
                        key = %key,
                        customer_id = %customer_id,
                        "Identity resolved"
                    );
                    settled.insert(record.identity.as_str());
                    staged.push(IdentityMapping {
                        identity: record.identity.clone(),
                        customer_id,
                    });
                }
                None => {
                    tracing::debug!(identity = %record.identity, key = %key, "No ledger match");
                    stats.lookup_misses += 1;
                }
            }
        }

        stats.mappings_staged = staged.len();

        let max_lock_wait_ms = db::settings::get_max_lock_wait_ms(&self.db).await?;
        stats.mappings_created =
            match db::identity_mappings::insert_if_absent(&self.db, &staged, max_lock_wait_ms).await {
                Ok(created) => created,
                Err(e) => {
                    tracing::error!(
                        staged = staged.len(),
                        error = %e,
                        "Failed to save identity mappings"
                    );
                    return Err(e);
                }
            };

        tracing::info!(
            records = stats.records_considered,
            already_mapped = stats.already_mapped,
            implausible = stats.implausible,
            lookup_misses = stats.lookup_misses,
            mappings_created = stats.mappings_created,
            "Identity resolution finished"
        );

        Ok(stats)
    }
}
