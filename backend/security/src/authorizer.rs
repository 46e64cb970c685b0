//! API key authorization decision.
use std::sync::Arc;

use async_trait::async_trait;

use crate::keystore::{KeyStore, KeyStoreError};

/// Membership lookup the authorizer depends on.
#[async_trait]
pub trait KeyLookup: Send + Sync {
    async fn contains(&self, key: &str) -> Result<bool, KeyStoreError>;
}

#[async_trait]
impl KeyLookup for KeyStore {
    async fn contains(&self, key: &str) -> Result<bool, KeyStoreError> {
        self.exists(key).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized,
    Unauthorized,
    /// The caller sent no key at all. A malformed request, not a bad key.
    MissingKey,
}

/// Stateless gate in front of the forwarding path.
#[derive(Clone)]
pub struct Authorizer {
    lookup: Arc<dyn KeyLookup>,
}

impl Authorizer {
    pub fn new(lookup: Arc<dyn KeyLookup>) -> Self {
        Self { lookup }
    }

    /// Decide whether `candidate` may use the gateway.
    ///
    /// An absent or empty candidate yields `MissingKey` without consulting
    /// the store. Store failures are returned as errors, never as
    /// `Unauthorized`.
    pub async fn authorize(&self, candidate: Option<&str>) -> Result<Authorization, KeyStoreError> {
        let Some(key) = candidate.filter(|k| !k.is_empty()) else {
            return Ok(Authorization::MissingKey);
        };

        if self.lookup.contains(key).await? {
            Ok(Authorization::Authorized)
        } else {
            Ok(Authorization::Unauthorized)
        }
    }
}
