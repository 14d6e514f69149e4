//! Bearer-token authorization for the plugin endpoints.
//!
//! The authenticator runs in one of two modes:
//!
//! - **open**: no verification token is configured. Requests without a
//!   bearer token pass with an empty permission list.
//! - **token-gated**: a bearer token is mandatory.
//!
//! A presented token is always resolved against the [`TokenStore`], in
//! either mode. Resolution fails with one [`TokenFailure`] kind:
//!
//! | Kind | Cause |
//! |------|-------|
//! | `no_token` | Gated mode and no token presented |
//! | `invalid_token` | Token unknown to the store |
//! | `expired_token` | Positive expiry time in the past |
//! | `no_permissions` | Token carries no permissions |
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A stored access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub permissions: Vec<String>,
    /// Epoch millis; `None` or non-positive never expires
    pub expired_time: Option<i64>,
}

/// Lookup of access tokens issued by the host.
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when the token is unknown; `Err` only for store I/O failures.
    fn find(&self, token: &str) -> anyhow::Result<Option<AccessToken>>;
}

/// Machine-readable reason a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenFailure {
    NoToken,
    InvalidToken,
    ExpiredToken,
    NoPermissions,
}

impl TokenFailure {
    /// Value echoed in the `WWW-Authenticate` challenge.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenFailure::NoToken => "no_token",
            TokenFailure::InvalidToken => "invalid_token",
            TokenFailure::ExpiredToken => "expired_token",
            TokenFailure::NoPermissions => "no_permissions",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            TokenFailure::NoToken => "The token is not specified.",
            TokenFailure::InvalidToken => "Your token is invalid.",
            TokenFailure::ExpiredToken => "The token is expired.",
            TokenFailure::NoPermissions => "Your token does not contain permissions for this system.",
        }
    }
}

impl std::fmt::Display for TokenFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permissions resolved for the current request, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(Vec<String>);

impl Permissions {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Keep the first occurrence of each value.
    pub fn from_iter_dedup<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !out.contains(&value) {
                out.push(value);
            }
        }
        Self(out)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Permissions followed by `defaults`, de-duplicated.
    pub fn with_defaults(&self, defaults: &[String]) -> Vec<String> {
        Self::from_iter_dedup(self.0.iter().chain(defaults).cloned()).0
    }
}

/// Resolves bearer tokens into [`Permissions`].
pub struct Authenticator {
    verification_token: String,
    store: Arc<dyn TokenStore>,
}

impl Authenticator {
    pub fn new(verification_token: impl Into<String>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            verification_token: verification_token.into(),
            store,
        }
    }

    /// True when no verification token is configured.
    pub fn is_open(&self) -> bool {
        self.verification_token.trim().is_empty()
    }

    /// The `auth` block of the discovery manifest.
    pub fn ai_plugin_auth_json(&self) -> String {
        if self.is_open() {
            return serde_json::json!({ "type": "none" }).to_string();
        }
        // Built by hand to keep the key order clients expect.
        let token = serde_json::Value::String(self.verification_token.clone()).to_string();
        format!(
            "{{\"type\":\"service_http\",\"authorization_type\":\"bearer\",\"verification_tokens\":{{\"openai\":{token}}}}}"
        )
    }

    /// Resolve `token` at time `now_millis`.
    pub fn authenticate(
        &self,
        token: Option<&str>,
        now_millis: i64,
    ) -> Result<Permissions, ApiError> {
        let token = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token,
            None if self.is_open() => return Ok(Permissions::empty()),
            None => return Err(ApiError::InvalidAccessToken(TokenFailure::NoToken)),
        };

        let access_token = self
            .store
            .find(token)
            .map_err(ApiError::Upstream)?
            .ok_or(ApiError::InvalidAccessToken(TokenFailure::InvalidToken))?;

        if let Some(expired_time) = access_token.expired_time {
            if expired_time > 0 && expired_time < now_millis {
                return Err(ApiError::InvalidAccessToken(TokenFailure::ExpiredToken));
            }
        }

        let permissions = Permissions::from_iter_dedup(access_token.permissions);
        if permissions.is_empty() {
            return Err(ApiError::InvalidAccessToken(TokenFailure::NoPermissions));
        }
        Ok(permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTokenStore;

    const NOW: i64 = 1_700_000_000_000;

    fn store() -> Arc<MemoryTokenStore> {
        let store = MemoryTokenStore::new();
        store.insert(AccessToken {
            token: "good".into(),
            permissions: vec!["Radmin".into(), "Ruser".into(), "Radmin".into()],
            expired_time: None,
        });
        store.insert(AccessToken {
            token: "expired".into(),
            permissions: vec!["Radmin".into()],
            expired_time: Some(NOW - 1),
        });
        store.insert(AccessToken {
            token: "future".into(),
            permissions: vec!["Radmin".into()],
            expired_time: Some(NOW + 60_000),
        });
        store.insert(AccessToken {
            token: "zero-expiry".into(),
            permissions: vec!["Radmin".into()],
            expired_time: Some(0),
        });
        store.insert(AccessToken {
            token: "bare".into(),
            permissions: vec![],
            expired_time: None,
        });
        Arc::new(store)
    }

    fn failure(result: Result<Permissions, ApiError>) -> TokenFailure {
        match result {
            Err(ApiError::InvalidAccessToken(kind)) => kind,
            other => panic!("expected token failure, got {other:?}"),
        }
    }

    #[test]
    fn test_open_mode_without_token_yields_empty_permissions() {
        let auth = Authenticator::new("", store());
        assert!(auth.is_open());
        assert_eq!(auth.authenticate(None, NOW).unwrap(), Permissions::empty());
        assert_eq!(auth.authenticate(Some("  "), NOW).unwrap(), Permissions::empty());
    }

    #[test]
    fn test_open_mode_still_checks_presented_tokens() {
        let auth = Authenticator::new("", store());
        assert_eq!(failure(auth.authenticate(Some("nope"), NOW)), TokenFailure::InvalidToken);
    }

    #[test]
    fn test_gated_mode_requires_token() {
        let auth = Authenticator::new("secret", store());
        assert_eq!(failure(auth.authenticate(None, NOW)), TokenFailure::NoToken);
    }

    #[test]
    fn test_permissions_are_deduplicated_in_order() {
        let auth = Authenticator::new("secret", store());
        let permissions = auth.authenticate(Some("good"), NOW).unwrap();
        assert_eq!(permissions.as_slice(), ["Radmin", "Ruser"]);
    }

    #[test]
    fn test_expiry() {
        let auth = Authenticator::new("secret", store());
        assert_eq!(failure(auth.authenticate(Some("expired"), NOW)), TokenFailure::ExpiredToken);
        assert!(auth.authenticate(Some("future"), NOW).is_ok());
        assert!(auth.authenticate(Some("zero-expiry"), NOW).is_ok());
    }

    #[test]
    fn test_token_without_permissions_is_rejected() {
        let auth = Authenticator::new("secret", store());
        assert_eq!(failure(auth.authenticate(Some("bare"), NOW)), TokenFailure::NoPermissions);
    }

    #[test]
    fn test_store_failure_is_upstream() {
        struct Down;
        impl TokenStore for Down {
            fn find(&self, _: &str) -> anyhow::Result<Option<AccessToken>> {
                anyhow::bail!("token index unavailable")
            }
        }
        let auth = Authenticator::new("secret", Arc::new(Down));
        assert!(matches!(auth.authenticate(Some("x"), NOW), Err(ApiError::Upstream(_))));
    }

    #[test]
    fn test_manifest_auth_block() {
        let open = Authenticator::new("", store());
        assert_eq!(open.ai_plugin_auth_json(), r#"{"type":"none"}"#);

        let gated = Authenticator::new("to\"ken", store());
        assert_eq!(
            gated.ai_plugin_auth_json(),
            r#"{"type":"service_http","authorization_type":"bearer","verification_tokens":{"openai":"to\"ken"}}"#
        );
    }

    #[test]
    fn test_with_defaults_appends_once() {
        let permissions = Permissions::from_iter_dedup(["Radmin", "Rguest"]);
        let roles = permissions.with_defaults(&["Rguest".to_string(), "Rother".to_string()]);
        assert_eq!(roles, ["Radmin", "Rguest", "Rother"]);
        assert_eq!(Permissions::empty().with_defaults(&["Rguest".into()]), ["Rguest"]);
    }
}
