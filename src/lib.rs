// DDS Ledger - Core Library
// Cash-flow entries classified by status, type, category and subcategory.
// Exposes storage, queries and mutations for the API server and tests.

pub mod db;
pub mod entries;
pub mod error;
pub mod filter;
pub mod models;
pub mod reference;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod config;

// Re-export commonly used types
pub use db::{in_transaction, open_database, open_in_memory, setup_database};
pub use entries::{count_entries, create_entry, delete_entry, get_entry, list_entries, update_entry};
pub use error::{DdsError, Result};
pub use filter::{EntryFilter, EntryOrder, EntryQuery};
pub use models::{
    Category, Entry, EntryInput, FlowType, RefCatalog, ResolvedEntry, Status, Subcategory,
};
pub use reference::{
    create_category, create_status, create_subcategory, create_type, list_categories,
    list_statuses, list_subcategories, list_types, reference_catalog,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
