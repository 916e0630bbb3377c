// SelectionManager - per-catalog selection state with optimistic commits

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::reconcile;
use super::store::SelectionBackend;
use crate::cache::LocalCache;
use crate::catalog::{CatalogEntry, CatalogKind, CatalogSnapshot};
use crate::error::AppError;
use crate::identity::{IdentityProvider, Session};

/// Whether a published view has been confirmed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPhase {
    /// Published before the store round-trip finished.
    Tentative,
    /// Re-read from the store (or the guest cache) after a load or commit.
    Settled,
}

/// The ordered list of selected apps as the UI should render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionView {
    pub entries: Vec<CatalogEntry>,
    pub phase: ViewPhase,
}

impl SelectionView {
    fn settled(entries: Vec<CatalogEntry>) -> Self {
        Self { entries, phase: ViewPhase::Settled }
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }
}

/// Clears the saving flag when a commit ends, however it ends.
struct SavingGuard<'a>(&'a AtomicBool);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns one catalog's selection for the current session.
///
/// Signed-in users read and write through the `SelectionBackend`; guests go
/// to the `LocalCache` under the catalog's guest key. The session is looked
/// up at the start of every operation, so a sign-in between two calls
/// switches storage without rebuilding the manager.
pub struct SelectionManager {
    kind: CatalogKind,
    backend: Arc<dyn SelectionBackend>,
    cache: Arc<dyn LocalCache>,
    identity: Arc<dyn IdentityProvider>,
    catalog: RwLock<Option<CatalogSnapshot>>,
    selected: Mutex<Vec<String>>,
    /// Set once `selected` reflects storage (after `load`, a commit, or a seeding toggle).
    seeded: AtomicBool,
    view_tx: watch::Sender<SelectionView>,
    saving: AtomicBool,
}

impl SelectionManager {
    pub fn new(
        kind: CatalogKind,
        backend: Arc<dyn SelectionBackend>,
        cache: Arc<dyn LocalCache>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let (view_tx, _rx) = watch::channel(SelectionView::settled(Vec::new()));
        Self {
            kind,
            backend,
            cache,
            identity,
            catalog: RwLock::new(None),
            selected: Mutex::new(Vec::new()),
            seeded: AtomicBool::new(false),
            view_tx,
            saving: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    /// Refresh the catalog, materialize the view, and seed the selected set from it.
    pub async fn load(&self) -> Result<Vec<CatalogEntry>, AppError> {
        self.refresh_catalog().await.map_err(AppError::Store)?;
        let entries = self.materialize().await?;

        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        *self.lock_selected().map_err(AppError::Store)? = ids;
        self.seeded.store(true, Ordering::SeqCst);
        self.view_tx.send_replace(SelectionView::settled(entries.clone()));

        info!(
            "Selection: loaded {} {} app(s)",
            entries.len(),
            self.kind.as_str()
        );
        Ok(entries)
    }

    /// Read the current ordered selection from whichever store the session uses.
    ///
    /// Ids the catalog cannot resolve are dropped.
    pub async fn materialize(&self) -> Result<Vec<CatalogEntry>, AppError> {
        let catalog = self.snapshot().await.map_err(AppError::Store)?;
        let session = self.identity.get_session().await.map_err(AppError::Store)?;
        let ids = self.read_ids(session.as_ref()).await.map_err(AppError::Store)?;
        Ok(catalog.resolve_all(&ids))
    }

    /// Flip membership of `entry_id` in the in-memory selection.
    ///
    /// Guests persist the new list immediately. Returns whether the id is now selected.
    /// Before the first `load`, the stored selection is read so the toggle
    /// applies on top of it.
    pub async fn toggle(&self, entry_id: &str) -> Result<bool, AppError> {
        let catalog = self.snapshot().await.map_err(AppError::Store)?;
        if !catalog.contains(entry_id) {
            return Err(AppError::UnknownEntry(entry_id.to_string()));
        }
        let session = self.identity.get_session().await.map_err(AppError::Store)?;

        let stored = if self.seeded.load(Ordering::SeqCst) {
            None
        } else {
            let ids = self.read_ids(session.as_ref()).await.map_err(AppError::Store)?;
            Some(
                catalog
                    .resolve_all(&ids)
                    .into_iter()
                    .map(|e| e.id)
                    .collect::<Vec<_>>(),
            )
        };

        let mut selected = self.lock_selected().map_err(AppError::Store)?;
        if let Some(stored) = stored {
            if !self.seeded.swap(true, Ordering::SeqCst) {
                *selected = stored;
            }
        }
        let mut updated = selected.clone();
        let now_selected = match updated.iter().position(|id| id == entry_id) {
            Some(pos) => {
                updated.remove(pos);
                false
            }
            None => {
                updated.push(entry_id.to_string());
                true
            }
        };

        if session.is_none() {
            self.write_guest_ids(&updated).map_err(AppError::Store)?;
        }
        *selected = updated;

        debug!(
            "Selection: toggled {} app {} -> {}",
            self.kind.as_str(),
            entry_id,
            now_selected
        );
        Ok(now_selected)
    }

    /// Persist `selected` in the display order given by `ordered`.
    ///
    /// Publishes the merged order as a tentative view first, then writes it
    /// and publishes the re-read result as settled. On a store error the
    /// previous view and selected set come back and the error is returned;
    /// writes that already landed are not undone.
    pub async fn commit(
        &self,
        selected: &[String],
        ordered: &[String],
    ) -> Result<Vec<CatalogEntry>, AppError> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::SaveInProgress);
        }
        let _guard = SavingGuard(&self.saving);

        let catalog = self.snapshot().await.map_err(AppError::Store)?;
        if let Some(unknown) = selected
            .iter()
            .chain(ordered.iter())
            .find(|id| !catalog.contains(id))
        {
            return Err(AppError::UnknownEntry(unknown.clone()));
        }

        let session = self.identity.get_session().await.map_err(AppError::Store)?;
        let final_ids = reconcile::final_order(selected, ordered);

        let previous_view = self.view_tx.borrow().clone();
        let previous_selected = {
            let mut current = self.lock_selected().map_err(AppError::Store)?;
            std::mem::replace(&mut *current, final_ids.clone())
        };
        let previously_seeded = self.seeded.swap(true, Ordering::SeqCst);
        self.view_tx.send_replace(SelectionView {
            entries: catalog.resolve_all(&final_ids),
            phase: ViewPhase::Tentative,
        });

        if let Err(e) = self.persist(session.as_ref(), &final_ids).await {
            warn!("Selection: save failed, restoring previous view: {}", e);
            self.view_tx.send_replace(previous_view);
            if let Ok(mut current) = self.selected.lock() {
                *current = previous_selected;
            }
            self.seeded.store(previously_seeded, Ordering::SeqCst);
            return Err(AppError::Store(e));
        }

        let entries = match self.materialize().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Selection: saved but re-read failed, keeping committed order: {}", e);
                catalog.resolve_all(&final_ids)
            }
        };
        self.view_tx.send_replace(SelectionView::settled(entries.clone()));

        info!(
            "Selection: saved {} {} app(s)",
            final_ids.len(),
            self.kind.as_str()
        );
        Ok(entries)
    }

    pub fn view(&self) -> SelectionView {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SelectionView> {
        self.view_tx.subscribe()
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_selected(&self, entry_id: &str) -> bool {
        self.selected
            .lock()
            .map(|s| s.iter().any(|id| id == entry_id))
            .unwrap_or(false)
    }

    /// The catalog snapshot, fetched on first use.
    pub async fn catalog(&self) -> Result<CatalogSnapshot, AppError> {
        self.snapshot().await.map_err(AppError::Store)
    }

    /// True when the last published view has no apps, so the user should be
    /// asked to pick some.
    pub fn needs_initial_selection(&self) -> bool {
        self.view_tx.borrow().entries.is_empty()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Reload on every sign-in and sign-out.
    ///
    /// The task holds only a weak reference and ends once the manager is dropped
    /// or the identity provider goes away.
    pub fn watch_session(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut session_rx = self.identity.on_session_change();

        tokio::spawn(async move {
            while session_rx.changed().await.is_ok() {
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                let user = session_rx
                    .borrow_and_update()
                    .as_ref()
                    .map(|s| s.user_id.clone());
                info!(
                    "Selection: session changed ({}), reloading {} apps",
                    user.as_deref().unwrap_or("guest"),
                    manager.kind.as_str()
                );
                if let Err(e) = manager.load().await {
                    warn!("Selection: reload after session change failed: {}", e);
                }
            }
        })
    }

    async fn refresh_catalog(&self) -> Result<CatalogSnapshot, String> {
        let entries = self.backend.list_catalog(self.kind).await?;
        let snapshot = CatalogSnapshot::new(entries);
        *self.catalog.write()
            .map_err(|e| format!("Failed to acquire catalog lock: {}", e))? = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn snapshot(&self) -> Result<CatalogSnapshot, String> {
        let cached = self.catalog.read()
            .map_err(|e| format!("Failed to acquire catalog lock: {}", e))?
            .clone();
        match cached {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh_catalog().await,
        }
    }

    async fn read_ids(&self, session: Option<&Session>) -> Result<Vec<String>, String> {
        match session {
            Some(session) => {
                let rows = self.backend.list_selections(&session.user_id, self.kind).await?;
                Ok(reconcile::sort_by_priority(&rows))
            }
            None => self.read_guest_ids(),
        }
    }

    async fn persist(&self, session: Option<&Session>, order: &[String]) -> Result<(), String> {
        let Some(session) = session else {
            return self.write_guest_ids(order);
        };

        let existing = self.backend.list_selections(&session.user_id, self.kind).await?;
        let rows = reconcile::ranked_rows(&session.user_id, self.kind, order);
        self.backend.upsert_selections(&rows).await?;

        let stale = reconcile::stale_ids(&existing, order);
        if !stale.is_empty() {
            self.backend
                .delete_selections(&session.user_id, self.kind, &stale)
                .await?;
        }
        Ok(())
    }

    fn read_guest_ids(&self) -> Result<Vec<String>, String> {
        let Some(raw) = self.cache.get(self.kind.guest_cache_key())? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                warn!(
                    "Selection: ignoring unreadable guest list under {}: {}",
                    self.kind.guest_cache_key(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    fn write_guest_ids(&self, ids: &[String]) -> Result<(), String> {
        let json = serde_json::to_string(ids)
            .map_err(|e| format!("Failed to serialize guest selection: {}", e))?;
        self.cache.set(self.kind.guest_cache_key(), &json)
    }

    fn lock_selected(&self) -> Result<std::sync::MutexGuard<'_, Vec<String>>, String> {
        self.selected.lock()
            .map_err(|e| format!("Failed to acquire selection lock: {}", e))
    }
}
