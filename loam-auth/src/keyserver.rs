//! The seam to the external key-discovery service.
//!
//! The auth core never talks to the key service directly; it is handed a
//! [`KeyLookup`] and asks it for one thing: the public key registered for
//! a user name. How keys are actually discovered is someone else's module.

use std::collections::HashMap;

use async_trait::async_trait;
use loam_api::{ApiError, UserName};
use loam_crypto::PublicKey;

#[async_trait]
pub trait KeyLookup: Send + Sync {
    /// Fetch the public key registered for `user`. Fails with `NotExist`
    /// when the user has no record. The server collapses every failure
    /// here into `Permission` before answering a client.
    async fn lookup(&self, user: &UserName) -> Result<PublicKey, ApiError>;
}

/// A fixed in-memory key table. Backs in-process services and tests.
#[derive(Default)]
pub struct StaticKeys {
    keys: HashMap<UserName, PublicKey>,
}

impl StaticKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: UserName, key: PublicKey) {
        self.keys.insert(user, key);
    }

    pub fn with(mut self, user: UserName, key: PublicKey) -> Self {
        self.insert(user, key);
        self
    }
}

#[async_trait]
impl KeyLookup for StaticKeys {
    async fn lookup(&self, user: &UserName) -> Result<PublicKey, ApiError> {
        self.keys
            .get(user)
            .cloned()
            .ok_or_else(|| ApiError::not_exist(format!("no key record for {user}")))
    }
}
