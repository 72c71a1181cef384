//! Multi-index store.
//!
//! One physical table of `(HK, SK)`-addressed records with optional related
//! keys `K1SK`/`K2SK`. Five keys-only indexes answer the secondary access
//! patterns; callers re-fetch full records by primary key.
//!
//! ```text
//! index   partition  sort
//! K1SK    K1SK       SK
//! K2SK    K2SK       SK
//! K1HK    K1SK       HK
//! K2HK    K2SK       HK
//! SKHK    SK         HK
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod table;
pub mod types;

pub use backend::TableBackend;
pub use error::StoreError;
pub use memory::MemoryTable;
pub use postgres::PgTable;
pub use table::Table;
pub use types::{KeyIndex, PrimaryKey, Record, SortRange};
