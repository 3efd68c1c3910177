//! Authentication contract consumed at connect time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use realm_common::AccountId;

/// Verdict on one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDecision {
    pub accepted: bool,
    pub account_id: Option<AccountId>,
    pub retry_after_ms: Option<u64>,
}

impl AuthDecision {
    pub fn accept(account: AccountId) -> Self {
        Self {
            accepted: true,
            account_id: Some(account),
            retry_after_ms: None,
        }
    }

    pub fn reject(retry_after_ms: Option<u64>) -> Self {
        Self {
            accepted: false,
            account_id: None,
            retry_after_ms,
        }
    }
}

pub trait Authenticator {
    fn authenticate(&mut self, credential: &str, origin: &str) -> AuthDecision;
}

/// Accepts a fixed set of credentials, each bound to one account.
#[derive(Debug, Clone, Default)]
pub struct AllowListAuthenticator {
    credentials: BTreeMap<String, AccountId>,
    retry_after_ms: Option<u64>,
}

impl AllowListAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, credential: impl Into<String>, account: AccountId) -> Self {
        self.credentials.insert(credential.into(), account);
        self
    }

    /// Back-off hint attached to rejections.
    pub fn with_retry_after(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }
}

impl Authenticator for AllowListAuthenticator {
    fn authenticate(&mut self, credential: &str, origin: &str) -> AuthDecision {
        match self.credentials.get(credential) {
            Some(&account) => AuthDecision::accept(account),
            None => {
                tracing::debug!(origin, "unknown credential");
                AuthDecision::reject(self.retry_after_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_maps_credentials_to_accounts() {
        let mut auth = AllowListAuthenticator::new()
            .allow("token-a", AccountId(42))
            .with_retry_after(500);
        assert_eq!(auth.authenticate("token-a", "127.0.0.1"), AuthDecision::accept(AccountId(42)));
        let denied = auth.authenticate("nope", "127.0.0.1");
        assert!(!denied.accepted);
        assert_eq!(denied.retry_after_ms, Some(500));
    }
}
