// Selection module - which apps a user picked, and in what order

pub mod manager;
pub mod reconcile;
pub mod sqlite_store;
pub mod store;

pub use manager::{SelectionManager, SelectionView, ViewPhase};
pub use reconcile::{move_down, move_up};
pub use sqlite_store::SqliteSelectionStore;
pub use store::SelectionBackend;
