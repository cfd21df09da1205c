//! Authentication hook for validating player identity.
//!
//! Gridforge doesn't implement authentication itself. Tokens are issued
//! by whatever login system sits in front of the game (JWT, session
//! cookie service, API keys). The server only asks an [`Authenticator`]
//! to turn the token presented during the upgrade into an [`Identity`].

use std::collections::HashMap;

use gridforge_protocol::UserId;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Who a connection belongs to, as vouched for by the [`Authenticator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: u64, username: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id),
            username: username.into(),
        }
    }
}

/// Validates a client's auth token and returns their identity.
///
/// # Trait bounds
///
/// - `Send + Sync` → the authenticator is shared by every connection
///   task, and Tokio may poll those on any thread.
/// - `'static` → it lives as long as the server.
///
/// # Example
///
/// ```rust
/// use gridforge_session::{Authenticator, Identity, SessionError};
///
/// /// Accepts numeric tokens and uses them as the user id.
/// /// Only for development.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn validate(&self, token: &str) -> Result<Identity, SessionError> {
///         let id: u64 = token.parse().map_err(|_| {
///             SessionError::AuthFailed("token must be a number".into())
///         })?;
///         Ok(Identity::new(id, format!("dev-{id}")))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the user behind it.
    ///
    /// # Returns
    /// - `Ok(Identity)`: the token is good
    /// - `Err(SessionError::AuthFailed)`: the token is unknown, expired,
    ///   or malformed. The connection is closed with a policy violation.
    fn validate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}

/// An [`Authenticator`] backed by a fixed token table.
///
/// Loaded from JSON mapping tokens to identities:
///
/// ```json
/// { "alice-token": { "user_id": 1, "username": "alice" } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a token.
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    /// Parses a token table from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    async fn validate(&self, token: &str) -> Result<Identity, SessionError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_authenticator_accepts_known_token() {
        let auth = StaticTokenAuthenticator::new()
            .with_token("a", Identity::new(1, "alice"))
            .with_token("b", Identity::new(2, "bob"));

        let identity = auth.validate("b").await.unwrap();
        assert_eq!(identity, Identity::new(2, "bob"));
        assert_eq!(auth.len(), 2);
    }

    #[tokio::test]
    async fn test_static_authenticator_rejects_unknown_token() {
        let auth = StaticTokenAuthenticator::new().with_token("a", Identity::new(1, "alice"));
        let err = auth.validate("nope").await.unwrap_err();
        assert!(matches!(err, SessionError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_static_authenticator_from_json() {
        let auth = StaticTokenAuthenticator::from_json(
            r#"{ "t1": { "user_id": 7, "username": "carol" } }"#,
        )
        .unwrap();
        assert_eq!(auth.validate("t1").await.unwrap().user_id, UserId(7));
        assert!(StaticTokenAuthenticator::from_json("[]").is_err());
    }
}
