//! The storage boundary of the tree: allocation, retrieval and release of
//! fixed-size pages identified by opaque 64-bit page numbers.

mod in_memory;
mod mmap_file;

use std::ops::Deref;

pub use in_memory::InMemory;
pub use mmap_file::MmapFile;

use crate::core::error::PageError;

type Result<T> = std::result::Result<T, PageError>;

/// A store of fixed-size pages that backs a copy-on-write B+ tree.
///
/// The tree consumes three operations: [`read_page`](PageStore::read_page),
/// [`write_page`](PageStore::write_page) (allocate and persist a fresh
/// page) and [`free_page`](PageStore::free_page). A page, once written, is
/// immutable: the tree never asks for a page to be changed, only for
/// superseded pages to be freed. The remaining methods carry the store's
/// meta state — the persisted root page number — and flushing; the tree
/// itself never calls them.
pub trait PageStore {
    /// A read-only handle to one page's bytes.
    type Page: Deref<Target = [u8]>;

    /// Reads a page. An unknown or freed page number is an error: the tree
    /// never invents ids it did not receive from
    /// [`write_page`](PageStore::write_page).
    fn read_page(&self, page_num: u64) -> Result<Self::Page>;

    /// Allocates a page, persists `page` into it, and returns the fresh
    /// page number. `page` must not exceed
    /// [`PAGE_SIZE`](crate::core::consts::PAGE_SIZE); shorter buffers are
    /// zero-padded.
    fn write_page(&self, page: &[u8]) -> Result<u64>;

    /// Releases a page. Freeing the same page number twice is an error.
    fn free_page(&self, page_num: u64) -> Result<()>;

    /// The root page number recorded by [`set_root`](PageStore::set_root),
    /// or `None` on a store that never held one.
    fn root(&self) -> Result<Option<u64>>;

    /// Records the root page number of the committed tree version.
    fn set_root(&self, page_num: u64) -> Result<()>;

    /// Flushes all written state to durable storage.
    fn sync(&self) -> Result<()>;
}
