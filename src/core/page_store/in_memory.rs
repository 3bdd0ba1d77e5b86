use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::consts::PAGE_SIZE;
use crate::core::error::PageError;
use crate::core::page_store::PageStore;

type Result<T> = std::result::Result<T, PageError>;

/// An in-memory store of pages, backed by a hash map. Serves as the test
/// double for the tree and as a usable store for throwaway databases.
#[derive(Clone)]
pub struct InMemory {
    state: Arc<Mutex<State>>,
}

struct State {
    counter: u64,
    root: Option<u64>,
    pages: HashMap<u64, Box<[u8]>>,
}

impl InMemory {
    /// Creates a new in-memory page store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                counter: 0,
                root: None,
                pages: HashMap::new(),
            })),
        }
    }
}

impl Default for InMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore for InMemory {
    type Page = Box<[u8]>;

    fn read_page(&self, page_num: u64) -> Result<Self::Page> {
        let state = self.state.lock().unwrap();
        state
            .pages
            .get(&page_num)
            .cloned()
            .ok_or(PageError::NotFound(page_num))
    }

    fn write_page(&self, page: &[u8]) -> Result<u64> {
        assert!(
            page.len() <= PAGE_SIZE,
            "page of {} bytes exceeds the page size",
            page.len()
        );
        let mut state = self.state.lock().unwrap();
        let page_num = state.counter;
        state.counter += 1;
        let mut buf = vec![0u8; PAGE_SIZE].into_boxed_slice();
        buf[..page.len()].copy_from_slice(page);
        let evicted = state.pages.insert(page_num, buf);
        debug_assert!(evicted.is_none());
        Ok(page_num)
    }

    fn free_page(&self, page_num: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .pages
            .remove(&page_num)
            .map(|_| ())
            .ok_or(PageError::NotFound(page_num))
    }

    fn root(&self) -> Result<Option<u64>> {
        Ok(self.state.lock().unwrap().root)
    }

    fn set_root(&self, page_num: u64) -> Result<()> {
        self.state.lock().unwrap().root = Some(page_num);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn functional_test() {
        let store = InMemory::new();
        assert!(
            matches!(store.read_page(0), Err(PageError::NotFound(0))),
            "page 0 should not yet exist"
        );
        let page_num = store.write_page(&[42u8; 16]).unwrap();
        let page = store.read_page(page_num).unwrap();
        assert_eq!(page.len(), PAGE_SIZE, "pages are stored zero-padded");
        assert_eq!(page[0], 42);
        assert_eq!(page[16], 0);

        store.free_page(page_num).unwrap();
        assert!(matches!(
            store.read_page(page_num),
            Err(PageError::NotFound(_))
        ));
        assert!(
            matches!(store.free_page(page_num), Err(PageError::NotFound(_))),
            "freeing twice is an error"
        );
    }

    #[test]
    fn fresh_page_numbers_are_never_reissued() {
        let store = InMemory::new();
        let a = store.write_page(&[1]).unwrap();
        store.free_page(a).unwrap();
        let b = store.write_page(&[2]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn root_roundtrip() {
        let store = InMemory::new();
        assert_eq!(store.root().unwrap(), None);
        store.set_root(7).unwrap();
        assert_eq!(store.root().unwrap(), Some(7));
    }
}
