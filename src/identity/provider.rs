// IdentityProvider trait - backend-agnostic authentication interface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// An authenticated session. Its presence switches selection storage from the
/// local guest cache to the user-scoped backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    /// How the session was established: "password", "magic_link", "oauth:<name>"
    pub method: String,
    pub created_at: String, // ISO 8601
}

/// Identity provider interface.
///
/// Selection code only asks "is there a session, and whose is it", and
/// reacts to changes through `on_session_change`. Sign-in flows a provider
/// cannot offer fall back to the default `Err` implementations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, or `None` for a guest.
    async fn get_session(&self) -> Result<Option<Session>, String>;

    /// Receiver that observes every sign-in and sign-out.
    fn on_session_change(&self) -> watch::Receiver<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, String>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), String>;

    async fn sign_out(&self) -> Result<(), String>;

    /// Send a one-time sign-in link to `email`.
    async fn sign_in_with_magic_link(&self, _email: &str) -> Result<(), String> {
        Err("Magic link sign-in not supported by this provider".to_string())
    }

    /// Start an OAuth flow with the named external provider.
    async fn sign_in_with_oauth(&self, provider: &str) -> Result<(), String> {
        Err(format!("OAuth sign-in with '{}' not supported by this provider", provider))
    }
}
