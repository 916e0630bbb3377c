use async_trait::async_trait;

use crate::catalog::{CatalogEntry, CatalogKind, SelectionEntry};

/// Backend-agnostic storage for catalogs and per-user selections.
///
/// The selection manager calls this trait, never a concrete implementation.
/// Each method is one independent round-trip; callers get no transaction
/// spanning several calls.
#[async_trait]
pub trait SelectionBackend: Send + Sync {
    /// Every entry of `kind`, in catalog order.
    async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, String>;

    /// The user's rows for `kind`, in fetch (insertion) order. Not sorted by priority.
    async fn list_selections(
        &self,
        user_id: &str,
        kind: CatalogKind,
    ) -> Result<Vec<SelectionEntry>, String>;

    /// Insert or update rows keyed by (user_id, catalog, entry_id).
    /// Returns the number of rows written.
    async fn upsert_selections(&self, rows: &[SelectionEntry]) -> Result<usize, String>;

    /// Remove the user's rows for the given entry ids. Missing rows are not an error.
    /// Returns the number of rows removed.
    async fn delete_selections(
        &self,
        user_id: &str,
        kind: CatalogKind,
        entry_ids: &[String],
    ) -> Result<usize, String>;
}
