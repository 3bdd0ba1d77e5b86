//! A single-file page store backed by a memory map.
//!
//! The file is one header block followed by an array of fixed-size pages:
//!
//! ```ignore
//! | magic | root | num_pages | reserved |  pages ...  |
//! |  8B   |  8B  |    8B     |  -> 4KB  | n × 4KB     |
//! ```
//!
//! The file grows by doubling and is remapped in place as pages are
//! allocated. Reads copy the page out of the map, so a later remap never
//! invalidates a handle. Crash recovery is out of scope: `sync` flushes
//! the map, but no ordering between data and header writes is enforced.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use memmap2::{MmapMut, MmapOptions};
use tracing::debug;

use crate::core::consts::PAGE_SIZE;
use crate::core::error::PageError;
use crate::core::page_store::PageStore;

type Result<T> = std::result::Result<T, PageError>;

const MAGIC: &[u8; 8] = b"zendb\0v1";
/// Header sentinel for "no root recorded yet".
const NO_ROOT: u64 = u64::MAX;
const ROOT_OFFSET: usize = 8;
const NUM_PAGES_OFFSET: usize = 16;
/// The header occupies one page-sized block before page 0.
const HEADER_BLOCK: usize = PAGE_SIZE;

/// A page store persisted in a single memory-mapped file.
#[derive(Clone)]
pub struct MmapFile {
    state: Arc<Mutex<State>>,
}

struct State {
    file: File,
    mmap: MmapMut,
    /// Page number the next never-before-allocated page will get.
    next_page: u64,
    /// Freed page numbers available for reuse.
    // TODO: persist the free list in the header block; pages freed in a
    // session and not reused again before closing leak on reopen.
    free: Vec<u64>,
}

impl MmapFile {
    /// Opens the file at `path`, creating and initializing it if it does
    /// not exist or is empty.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            return Self::create(file, path.as_ref());
        }
        Self::open(file, path.as_ref(), len)
    }

    fn create(file: File, path: &Path) -> Result<Self> {
        file.set_len(HEADER_BLOCK as u64)?;
        let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        mmap[..MAGIC.len()].copy_from_slice(MAGIC);
        mmap[ROOT_OFFSET..ROOT_OFFSET + 8].copy_from_slice(&NO_ROOT.to_le_bytes());
        mmap[NUM_PAGES_OFFSET..NUM_PAGES_OFFSET + 8].copy_from_slice(&0u64.to_le_bytes());
        debug!(path = %path.display(), "created database file");
        Ok(MmapFile {
            state: Arc::new(Mutex::new(State {
                file,
                mmap,
                next_page: 0,
                free: Vec::new(),
            })),
        })
    }

    fn open(file: File, path: &Path, len: usize) -> Result<Self> {
        if len < HEADER_BLOCK {
            return Err(PageError::InvalidFile(
                "file is smaller than the header block".into(),
            ));
        }
        if len % PAGE_SIZE != 0 {
            return Err(PageError::InvalidFile(
                "file size is not a multiple of the page size".into(),
            ));
        }
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        if &mmap[..MAGIC.len()] != MAGIC {
            return Err(PageError::InvalidFile("unrecognized magic bytes".into()));
        }
        let next_page =
            u64::from_le_bytes(mmap[NUM_PAGES_OFFSET..NUM_PAGES_OFFSET + 8].try_into().unwrap());
        let data_end = next_page
            .checked_mul(PAGE_SIZE as u64)
            .and_then(|bytes| bytes.checked_add(HEADER_BLOCK as u64));
        if !data_end.is_some_and(|end| end <= len as u64) {
            return Err(PageError::InvalidFile(
                "page count exceeds the file size".into(),
            ));
        }
        let root = u64::from_le_bytes(mmap[ROOT_OFFSET..ROOT_OFFSET + 8].try_into().unwrap());
        if root != NO_ROOT && root >= next_page {
            return Err(PageError::InvalidFile(
                "root points outside the allocated pages".into(),
            ));
        }
        debug!(path = %path.display(), pages = next_page, "opened database file");
        Ok(MmapFile {
            state: Arc::new(Mutex::new(State {
                file,
                mmap,
                next_page,
                free: Vec::new(),
            })),
        })
    }

    fn page_offset(page_num: u64) -> usize {
        HEADER_BLOCK + page_num as usize * PAGE_SIZE
    }
}

impl State {
    /// Grows the file and remaps it so that `page_num` is addressable.
    fn grow_for(&mut self, page_num: u64) -> Result<()> {
        let needed = MmapFile::page_offset(page_num) + PAGE_SIZE;
        if needed <= self.mmap.len() {
            return Ok(());
        }
        let new_len = needed.max(2 * self.mmap.len());
        self.file.set_len(new_len as u64)?;
        self.mmap = unsafe { MmapOptions::new().map_mut(&self.file)? };
        Ok(())
    }
}

impl PageStore for MmapFile {
    type Page = Box<[u8]>;

    fn read_page(&self, page_num: u64) -> Result<Self::Page> {
        let state = self.state.lock().unwrap();
        if page_num >= state.next_page || state.free.contains(&page_num) {
            return Err(PageError::NotFound(page_num));
        }
        let offset = Self::page_offset(page_num);
        Ok(state.mmap[offset..offset + PAGE_SIZE].into())
    }

    fn write_page(&self, page: &[u8]) -> Result<u64> {
        assert!(
            page.len() <= PAGE_SIZE,
            "page of {} bytes exceeds the page size",
            page.len()
        );
        let mut state = self.state.lock().unwrap();
        let page_num = match state.free.pop() {
            Some(reused) => reused,
            None => {
                let fresh = state.next_page;
                state.grow_for(fresh)?;
                state.next_page += 1;
                fresh
            }
        };
        let offset = Self::page_offset(page_num);
        state.mmap[offset..offset + page.len()].copy_from_slice(page);
        state.mmap[offset + page.len()..offset + PAGE_SIZE].fill(0);
        Ok(page_num)
    }

    fn free_page(&self, page_num: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if page_num >= state.next_page || state.free.contains(&page_num) {
            return Err(PageError::NotFound(page_num));
        }
        state.free.push(page_num);
        Ok(())
    }

    fn root(&self) -> Result<Option<u64>> {
        let state = self.state.lock().unwrap();
        let root = u64::from_le_bytes(state.mmap[ROOT_OFFSET..ROOT_OFFSET + 8].try_into().unwrap());
        Ok((root != NO_ROOT).then_some(root))
    }

    fn set_root(&self, page_num: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        debug_assert!(page_num < state.next_page);
        let num_pages = state.next_page;
        state.mmap[ROOT_OFFSET..ROOT_OFFSET + 8].copy_from_slice(&page_num.to_le_bytes());
        state.mmap[NUM_PAGES_OFFSET..NUM_PAGES_OFFSET + 8]
            .copy_from_slice(&num_pages.to_le_bytes());
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        let state = self.state.lock().unwrap();
        state.mmap.flush()?;
        Ok(())
    }
}
