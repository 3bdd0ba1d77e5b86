//! # zendb
//!
//! An embedded key-value storage engine built on a copy-on-write B+ tree.
//! The tree stores fixed-size pages through an abstract [`PageStore`]; an
//! edit never modifies a live page, it writes new pages and supersedes the
//! old ones, so every committed root describes a complete, immutable
//! version of the data.
//!
//! ## Example
//!
//! ```rust
//! use zendb::DB;
//!
//! fn main() -> zendb::Result<()> {
//!     let db = DB::in_memory()?;
//!     db.insert(b"pessoa-1", b"Timtim")?;
//!     db.insert(b"pessoa-2", b"Coutinho")?;
//!     assert_eq!(db.get(b"pessoa-1")?.as_deref(), Some(&b"Timtim"[..]));
//!     assert_eq!(db.get(b"pessoa-3")?, None);
//!     Ok(())
//! }
//! ```
//!
//! For data that outlives the process, open a file-backed database
//! instead:
//!
//! ```rust,no_run
//! # fn main() -> zendb::Result<()> {
//! let db = zendb::DB::open_or_create("/path/to/a/db/file")?;
//! db.insert(b"some_key", b"some_val")?;
//! db.sync()?;
//! # Ok(())
//! # }
//! ```
mod api;
mod core;

pub use api::*;
pub use core::consts;
pub use core::page_store::{InMemory, MmapFile};
