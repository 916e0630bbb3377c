// GuestOnlyProvider - identity provider for builds without an account backend

use async_trait::async_trait;
use tokio::sync::watch;

use super::provider::{IdentityProvider, Session};

/// Provider that never has a session.
///
/// Every selection goes to the local guest cache. Sign-in attempts fail with
/// a readable message instead of silently succeeding.
pub struct GuestOnlyProvider {
    session_tx: watch::Sender<Option<Session>>,
}

impl GuestOnlyProvider {
    pub fn new() -> Self {
        let (session_tx, _rx) = watch::channel(None);
        Self { session_tx }
    }
}

impl Default for GuestOnlyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for GuestOnlyProvider {
    async fn get_session(&self) -> Result<Option<Session>, String> {
        Ok(None)
    }

    fn on_session_change(&self) -> watch::Receiver<Option<Session>> {
        self.session_tx.subscribe()
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, String> {
        Err("Accounts are not available; continuing in guest mode".to_string())
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<(), String> {
        Err("Accounts are not available; continuing in guest mode".to_string())
    }

    async fn sign_out(&self) -> Result<(), String> {
        Ok(())
    }
}
