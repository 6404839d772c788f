//! Narrow interface to the external identity provider.
//!
//! The core trusts whatever stable user id the provider resolves; everything
//! about how that id was authenticated lives outside this crate.

use futures::future::BoxFuture;
use uuid::Uuid;

/// Resolves a presented player token to a stable user id.
pub trait IdentityProvider: Send + Sync {
    /// Resolve `token` to the caller's user id, or `None` when the token is
    /// unknown or malformed.
    fn resolve(&self, token: &str) -> BoxFuture<'static, Option<Uuid>>;
}

/// Development provider treating the token itself as the player's UUID.
///
/// Stands in for the real identity service in local deployments and tests;
/// production wiring installs a provider that verifies the token upstream.
#[derive(Debug, Default, Clone)]
pub struct TokenIsUserId;

impl IdentityProvider for TokenIsUserId {
    fn resolve(&self, token: &str) -> BoxFuture<'static, Option<Uuid>> {
        let parsed = Uuid::parse_str(token.trim()).ok();
        Box::pin(async move { parsed })
    }
}
