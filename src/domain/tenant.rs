//! Tenant-owned web properties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomainId, SourceTag, UserId};

/// A web property tracked for exactly one user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDomain {
    /// Domain identifier (immutable).
    pub domain_id: DomainId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner: UserId,
    /// Whether the WooCommerce fetcher pulls this domain.
    pub woocommerce_enabled: bool,
    /// Whether the Analytics fetcher pulls this domain.
    pub ga_enabled: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last metadata change.
    pub updated_at: DateTime<Utc>,
}

impl TrackedDomain {
    /// Creates a domain with both sources disabled.
    ///
    /// An empty `name` falls back to the domain identifier.
    #[must_use]
    pub fn new(domain_id: DomainId, name: &str, owner: UserId) -> Self {
        let now = Utc::now();
        let name = if name.trim().is_empty() {
            domain_id.to_string()
        } else {
            name.trim().to_string()
        };
        Self {
            domain_id,
            name,
            owner,
            woocommerce_enabled: false,
            ga_enabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the source flags, consuming and returning `self`.
    #[must_use]
    pub const fn with_sources(mut self, woocommerce_enabled: bool, ga_enabled: bool) -> Self {
        self.woocommerce_enabled = woocommerce_enabled;
        self.ga_enabled = ga_enabled;
        self
    }

    /// Whether the given upstream is enabled for this domain.
    #[must_use]
    pub const fn source_enabled(&self, tag: SourceTag) -> bool {
        match tag {
            SourceTag::WooCommerce => self.woocommerce_enabled,
            SourceTag::GoogleAnalytics => self.ga_enabled,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_defaults_to_domain() {
        let (Ok(d), Ok(u)) = (DomainId::parse("shop.example"), UserId::parse("alice")) else {
            panic!("valid ids");
        };
        let domain = TrackedDomain::new(d, "  ", u);
        assert_eq!(domain.name, "shop.example");
        assert!(!domain.source_enabled(SourceTag::WooCommerce));
    }

    #[test]
    fn with_sources_sets_flags() {
        let (Ok(d), Ok(u)) = (DomainId::parse("shop.example"), UserId::parse("alice")) else {
            panic!("valid ids");
        };
        let domain = TrackedDomain::new(d, "Shop", u).with_sources(true, false);
        assert!(domain.source_enabled(SourceTag::WooCommerce));
        assert!(!domain.source_enabled(SourceTag::GoogleAnalytics));
    }
}
