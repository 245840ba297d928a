//! Startup tenant seed.
//!
//! Users are provisioned out of band. For local setups and demos a JSON
//! file can declare users and their domains, applied idempotently when
//! the gateway starts:
//!
//! ```json
//! { "users": [ { "user_id": "alice", "domains": [
//!     { "domain_id": "shop.example.com", "name": "Shop",
//!       "woocommerce_enabled": true, "ga_enabled": true } ] } ] }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::TenantStore;
use crate::domain::{DomainId, TrackedDomain, UserId};
use crate::error::GatewayError;

/// Seed file contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantSeed {
    /// Users to create.
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// One seeded user.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    /// User id (token subject).
    pub user_id: UserId,
    /// Domains owned by the user.
    #[serde(default)]
    pub domains: Vec<SeedDomain>,
}

/// One seeded domain.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDomain {
    /// Domain identifier.
    pub domain_id: DomainId,
    /// Display name; defaults to the identifier.
    #[serde(default)]
    pub name: String,
    /// WooCommerce flag.
    #[serde(default)]
    pub woocommerce_enabled: bool,
    /// Analytics flag.
    #[serde(default)]
    pub ga_enabled: bool,
}

impl TenantSeed {
    /// Parses a seed from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] for malformed JSON or empty
    /// identifiers.
    pub fn from_json(json: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(json).map_err(|e| GatewayError::InvalidInput(format!("tenant seed: {e}")))
    }

    /// Reads and parses a seed file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] if the file cannot be read
    /// and [`GatewayError::InvalidInput`] if it does not parse.
    pub async fn load(path: &Path) -> Result<Self, GatewayError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            GatewayError::StorageFailure(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Applies the seed, returning the number of domains written.
    ///
    /// # Errors
    ///
    /// Propagates store failures, including
    /// [`GatewayError::AccessDenied`] when a seeded domain already belongs
    /// to another user.
    pub async fn apply(&self, store: &dyn TenantStore) -> Result<usize, GatewayError> {
        let mut written = 0;
        for user in &self.users {
            store.ensure_user(&user.user_id).await?;
            for seed in &user.domains {
                let domain =
                    TrackedDomain::new(seed.domain_id.clone(), &seed.name, user.user_id.clone())
                        .with_sources(seed.woocommerce_enabled, seed.ga_enabled);
                store.upsert_domain(domain).await?;
                written += 1;
            }
        }
        tracing::info!(users = self.users.len(), domains = written, "tenant seed applied");
        Ok(written)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryTenantStore;

    const SEED: &str = r#"{
        "users": [
            { "user_id": "alice", "domains": [
                { "domain_id": "shop.example.com", "name": "Shop", "woocommerce_enabled": true },
                { "domain_id": "blog.example.com", "ga_enabled": true }
            ] },
            { "user_id": "bob" }
        ]
    }"#;

    #[tokio::test]
    async fn applies_users_and_domains() {
        let Ok(seed) = TenantSeed::from_json(SEED) else {
            panic!("valid seed");
        };
        let store = InMemoryTenantStore::new();
        let Ok(written) = seed.apply(&store).await else {
            panic!("apply failed");
        };
        assert_eq!(written, 2);

        let Ok(alice) = UserId::parse("alice") else {
            panic!("valid user");
        };
        let Ok(domains) = store.user_domains(&alice).await else {
            panic!("listing failed");
        };
        assert_eq!(domains.len(), 2);
        assert!(domains.iter().any(|d| d.name == "blog.example.com" && d.ga_enabled));

        let Ok(again) = seed.apply(&store).await else {
            panic!("re-apply failed");
        };
        assert_eq!(again, 2);
    }

    #[test]
    fn blank_ids_are_rejected() {
        let result = TenantSeed::from_json(r#"{ "users": [ { "user_id": "  " } ] }"#);
        assert!(matches!(result, Err(GatewayError::InvalidInput(_))));
    }
}
