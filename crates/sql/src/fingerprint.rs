use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::canonical::CanonicalQuery;
use crate::schema::Entity;

/// Cache key for a canonical query.
///
/// The digest covers entity, projection, predicates with their parameter
/// values, date bounds, ordering, limit and company. The entity is kept
/// alongside so entries can be invalidated per entity.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub entity: Entity,
    digest: [u8; 32],
}

impl Fingerprint {
    pub fn of(query: &CanonicalQuery) -> Self {
        let mut hasher = Sha256::new();
        // Field order of the derived serialization is fixed, so the encoding is stable.
        match serde_json::to_vec(query) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(format!("{:?}", query).as_bytes()),
        }
        Self {
            entity: query.entity,
            digest: hasher.finalize().into(),
        }
    }

    pub fn to_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First 12 hex chars, enough to correlate log lines.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::QueryBuilder;
    use tallygate_common::models::FilterSet;

    fn fp(fs: &FilterSet) -> Fingerprint {
        Fingerprint::of(&QueryBuilder::default().build(fs).unwrap())
    }

    #[test]
    fn test_identical_queries_share_fingerprint() {
        let a = FilterSet::new("Voucher").predicate("VoucherType", "=", "Sales");
        let b = FilterSet::new("voucher").predicate("voucher_type".replace('_', ""), "=", "Sales");
        assert_eq!(fp(&a), fp(&b));
    }

    #[test]
    fn test_equivalent_decimals_share_fingerprint() {
        let a = FilterSet::new("Voucher").predicate("Amount", ">", "100.00");
        let b = FilterSet::new("Voucher").predicate("Amount", ">", 100);
        assert_eq!(fp(&a), fp(&b));
    }

    #[test]
    fn test_parameter_change_changes_fingerprint() {
        let a = FilterSet::new("Voucher").predicate("VoucherType", "=", "Sales");
        let b = FilterSet::new("Voucher").predicate("VoucherType", "=", "Purchase");
        assert_ne!(fp(&a), fp(&b));
    }

    #[test]
    fn test_limit_changes_fingerprint() {
        let a = FilterSet::new("Ledger").limit(10);
        let b = FilterSet::new("Ledger").limit(11);
        assert_ne!(fp(&a), fp(&b));
    }

    #[test]
    fn test_hex_format() {
        let f = fp(&FilterSet::new("Company"));
        assert_eq!(f.to_hex().len(), 64);
        assert_eq!(f.short().len(), 12);
        assert!(f.to_string().starts_with("Company:"));
    }
}
