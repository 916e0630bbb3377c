// LocalIdentityProvider - in-process accounts with salted SHA-256 passwords

use async_trait::async_trait;
use log::info;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use super::provider::{IdentityProvider, Session};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user_id: String,
    salt: String,
    password_hash: String,
}

/// Identity provider that keeps accounts in memory.
///
/// Suitable for single-device use and tests. Magic-link requests are recorded
/// and completed through `complete_magic_link`, standing in for the user
/// clicking the emailed link. OAuth is not offered.
pub struct LocalIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    pending_links: Mutex<Vec<String>>,
    session_tx: watch::Sender<Option<Session>>,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_email(email: &str) -> Result<String, String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(format!("Invalid email address '{}'", email)),
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (session_tx, _rx) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            pending_links: Mutex::new(Vec::new()),
            session_tx,
        }
    }

    fn start_session(&self, user_id: String, email: String, method: &str) -> Session {
        let session = Session {
            user_id,
            email: Some(email),
            method: method.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        info!("Identity: signed in {} via {}", session.user_id, method);
        self.session_tx.send_replace(Some(session.clone()));
        session
    }

    /// Emails with an outstanding magic link, oldest first.
    pub fn pending_magic_links(&self) -> Vec<String> {
        self.pending_links.lock()
            .map(|links| links.clone())
            .unwrap_or_default()
    }

    /// Redeem the outstanding link for `email`, creating the account if the
    /// address has never signed up.
    pub fn complete_magic_link(&self, email: &str) -> Result<Session, String> {
        let email = normalize_email(email)?;
        {
            let mut links = self.pending_links.lock()
                .map_err(|e| format!("Failed to acquire lock: {}", e))?;
            let Some(pos) = links.iter().position(|e| *e == email) else {
                return Err(format!("No pending sign-in link for {}", email));
            };
            links.remove(pos);
        }

        let user_id = {
            let mut accounts = self.accounts.lock()
                .map_err(|e| format!("Failed to acquire lock: {}", e))?;
            accounts
                .entry(email.clone())
                .or_insert_with(|| Account {
                    user_id: Uuid::new_v4().to_string(),
                    salt: Uuid::new_v4().to_string(),
                    password_hash: String::new(),
                })
                .user_id
                .clone()
        };

        Ok(self.start_session(user_id, email, "magic_link"))
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, String> {
        Ok(self.session_tx.borrow().clone())
    }

    fn on_session_change(&self) -> watch::Receiver<Option<Session>> {
        self.session_tx.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, String> {
        let email = normalize_email(email)?;
        let user_id = {
            let accounts = self.accounts.lock()
                .map_err(|e| format!("Failed to acquire lock: {}", e))?;
            match accounts.get(&email) {
                Some(account)
                    if !account.password_hash.is_empty()
                        && account.password_hash == hash_password(&account.salt, password) =>
                {
                    account.user_id.clone()
                }
                _ => return Err("Invalid login credentials".to_string()),
            }
        };
        Ok(self.start_session(user_id, email, "password"))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), String> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ));
        }

        let mut accounts = self.accounts.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;
        if accounts.contains_key(&email) {
            return Err(format!("User {} already registered", email));
        }

        let salt = Uuid::new_v4().to_string();
        accounts.insert(
            email.clone(),
            Account {
                user_id: Uuid::new_v4().to_string(),
                password_hash: hash_password(&salt, password),
                salt,
            },
        );
        info!("Identity: registered {}", email);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), String> {
        if self.session_tx.borrow().is_some() {
            info!("Identity: signed out");
        }
        self.session_tx.send_replace(None);
        Ok(())
    }

    async fn sign_in_with_magic_link(&self, email: &str) -> Result<(), String> {
        let email = normalize_email(email)?;
        let mut links = self.pending_links.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;
        if !links.contains(&email) {
            links.push(email.clone());
        }
        info!("Identity: magic link requested for {}", email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = LocalIdentityProvider::new();
        provider.sign_up("User@Example.com", "hunter22").await.unwrap();

        let session = provider.sign_in("user@example.com", "hunter22").await.unwrap();
        assert_eq!(session.email.as_deref(), Some("user@example.com"));
        assert_eq!(session.method, "password");
        assert_eq!(provider.get_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let provider = LocalIdentityProvider::new();
        provider.sign_up("a@example.com", "correct-horse").await.unwrap();
        let err = provider.sign_in("a@example.com", "wrong-horse").await.unwrap_err();
        assert_eq!(err, "Invalid login credentials");
        assert!(provider.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let provider = LocalIdentityProvider::new();
        assert!(provider.sign_up("not-an-email", "longenough").await.is_err());
        assert!(provider.sign_up("a@example.com", "short").await.is_err());
        provider.sign_up("a@example.com", "longenough").await.unwrap();
        assert!(provider.sign_up("A@example.com", "longenough").await.is_err());
    }

    #[tokio::test]
    async fn test_session_changes_are_observable() {
        let provider = LocalIdentityProvider::new();
        let mut rx = provider.on_session_change();
        provider.sign_up("a@example.com", "longenough").await.unwrap();

        provider.sign_in("a@example.com", "longenough").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        provider.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn test_magic_link_flow() {
        let provider = LocalIdentityProvider::new();
        provider.sign_in_with_magic_link("new@example.com").await.unwrap();
        assert_eq!(provider.pending_magic_links(), vec!["new@example.com"]);

        let session = provider.complete_magic_link("new@example.com").unwrap();
        assert_eq!(session.method, "magic_link");
        assert!(provider.pending_magic_links().is_empty());
        assert!(provider.complete_magic_link("new@example.com").is_err());
    }

    #[tokio::test]
    async fn test_magic_link_account_cannot_password_sign_in() {
        let provider = LocalIdentityProvider::new();
        provider.sign_in_with_magic_link("new@example.com").await.unwrap();
        provider.complete_magic_link("new@example.com").unwrap();
        provider.sign_out().await.unwrap();
        assert!(provider.sign_in("new@example.com", "").await.is_err());
    }

    #[tokio::test]
    async fn test_oauth_is_not_offered() {
        let provider = LocalIdentityProvider::new();
        assert!(provider.sign_in_with_oauth("github").await.is_err());
    }
}
