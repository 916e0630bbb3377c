pub mod builtin;

use serde::{Deserialize, Serialize};

/// Sentinel user id for selections owned by an unauthenticated session.
pub const GUEST_USER_ID: &str = "guest";

/// Which of the two app catalogs an entry or selection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Payment,
    Point,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Payment => "payment",
            CatalogKind::Point => "point",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "payment" => Ok(CatalogKind::Payment),
            "point" => Ok(CatalogKind::Point),
            other => Err(format!("Unknown catalog '{}'", other)),
        }
    }

    /// Local cache key holding the guest's ordered id list for this catalog.
    pub fn guest_cache_key(&self) -> &'static str {
        match self {
            CatalogKind::Payment => "guestSelectedApps",
            CatalogKind::Point => "guestSelectedPointApps",
        }
    }
}

/// Static metadata for one payment or point app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub logo_ref: Option<String>,
    /// Always present; the universal fallback when no scheme applies.
    pub web_url: String,
    pub ios_scheme: Option<String>,
    pub android_scheme: Option<String>,
    pub ios_store_url: Option<String>,
    pub android_store_url: Option<String>,
    pub api_available: bool,
}

/// One app a user has picked, with its display rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub user_id: String,
    pub catalog: CatalogKind,
    pub entry_id: String,
    /// Lower ranks display first; `None` sorts after every ranked row.
    pub priority: Option<i64>,
    pub is_active: bool,
}

/// Read-only snapshot of one catalog, loaded once per session.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    entries: Vec<CatalogEntry>,
}

impl CatalogSnapshot {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map ids to entries in order, silently dropping ids the catalog no longer has.
    pub fn resolve_all<'a, I>(&self, ids: I) -> Vec<CatalogEntry>
    where
        I: IntoIterator<Item = &'a String>,
    {
        ids.into_iter()
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }
}
