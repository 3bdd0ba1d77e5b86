pub mod error;

use std::path::Path;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use error::DbError;

use crate::core::page_store::{InMemory, MmapFile};
use crate::core::tree::Tree;

pub use crate::core::page_store::PageStore;

pub type Result<T> = std::result::Result<T, DbError>;

/// An embedded key-value database over a copy-on-write B+ tree.
///
/// `DB` tracks the committed root page of the tree. Reads run against the
/// root current at call time; writes are serialized behind a mutex, and a
/// new root is published and persisted only after the whole insert path
/// has succeeded — a failed write is never observable through the handle.
pub struct DB<S: PageStore> {
    store: S,
    root: ArcSwap<u64>,
    write_lock: Mutex<()>,
}

impl DB<InMemory> {
    /// Creates an empty database kept entirely in memory.
    pub fn in_memory() -> Result<Self> {
        Self::with_store(InMemory::new())
    }
}

impl DB<MmapFile> {
    /// Opens (or creates) a database persisted in a single file.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_store(MmapFile::open_or_create(path)?)
    }
}

impl<S: PageStore> DB<S> {
    /// Opens a database over any page store. A store without a recorded
    /// root gets a fresh empty tree.
    pub fn with_store(store: S) -> Result<Self> {
        let root = match store.root()? {
            Some(root) => root,
            None => {
                let root = Tree::create(&store)?;
                store.set_root(root)?;
                root
            }
        };
        Ok(DB {
            store,
            root: ArcSwap::from_pointee(root),
            write_lock: Mutex::new(()),
        })
    }

    /// Gets the value corresponding to the key, or `None` if absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let root = **self.root.load();
        Ok(Tree::new(&self.store, root).get(key)?)
    }

    /// Inserts a key-value pair, or updates the value of an existing key.
    ///
    /// Keys are limited to 1..=[`MAX_KEY_SIZE`](crate::consts::MAX_KEY_SIZE)
    /// bytes and values to 1..=[`MAX_VALUE_SIZE`](crate::consts::MAX_VALUE_SIZE);
    /// empty or oversized input is rejected before the store is touched.
    pub fn insert(&self, key: &[u8], val: &[u8]) -> Result<()> {
        let _writer = self.write_lock.lock().unwrap();
        let root = **self.root.load();
        let tree = Tree::new(&self.store, root).insert(key, val)?;
        self.store.set_root(tree.root())?;
        self.root.store(Arc::new(tree.root()));
        Ok(())
    }

    /// Flushes the underlying store.
    pub fn sync(&self) -> Result<()> {
        Ok(self.store.sync()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consts;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    fn tree_of<S: PageStore>(db: &DB<S>) -> Tree<'_, S> {
        Tree::new(&db.store, **db.root.load())
    }

    #[test]
    fn insert_then_get() {
        let db = DB::in_memory().unwrap();
        db.insert(b"pessoa-1", b"Timtim").unwrap();
        db.insert(b"pessoa-2", b"Coutinho").unwrap();
        assert_eq!(db.get(b"pessoa-1").unwrap(), Some(b"Timtim".to_vec()));
        assert_eq!(db.get(b"pessoa-2").unwrap(), Some(b"Coutinho".to_vec()));
        assert_eq!(db.get(b"pessoa-3").unwrap(), None);
    }

    #[test]
    fn update_keeps_exactly_one_entry() {
        let db = DB::in_memory().unwrap();
        db.insert(b"k", b"v1").unwrap();
        db.insert(b"k", b"v2").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v2".to_vec()));
        let entries = tree_of(&db).collect().unwrap();
        assert_eq!(entries, vec![(b"k".to_vec(), b"v2".to_vec())]);
    }

    #[test]
    fn reinsert_is_idempotent() {
        let db = DB::in_memory().unwrap();
        db.insert(b"k", b"v").unwrap();
        let once = tree_of(&db).collect().unwrap();
        db.insert(b"k", b"v").unwrap();
        let twice = tree_of(&db).collect().unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_invalid_input() {
        let db = DB::in_memory().unwrap();
        db.insert(b"k", b"v").unwrap();

        let oversized_key = vec![0u8; consts::MAX_KEY_SIZE + 1];
        let oversized_val = vec![0u8; consts::MAX_VALUE_SIZE + 1];
        assert!(db.insert(b"", b"v").is_err());
        assert!(db.insert(b"k2", b"").is_err());
        assert!(db.insert(&oversized_key, b"v").is_err());
        assert!(db.insert(b"k2", &oversized_val).is_err());

        // None of the failures disturbed the committed version.
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(b"k2").unwrap(), None);
    }

    #[test]
    fn get_on_an_empty_database() {
        let db = DB::in_memory().unwrap();
        assert_eq!(db.get(b"anything").unwrap(), None);
        assert_eq!(db.get(b"").unwrap(), None);
    }

    #[test]
    fn split_preserves_order_and_content() {
        let db = DB::in_memory().unwrap();
        let val = vec![6u8; 1000];
        let mut expected = BTreeMap::new();
        // Shuffled insertion order to exercise splits away from the edges.
        let mut keys: Vec<u32> = (0..50).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        keys.shuffle(&mut rng);
        for i in keys {
            let key = format!("key-{i:04}").into_bytes();
            db.insert(&key, &val).unwrap();
            expected.insert(key, val.clone());
        }
        let tree = tree_of(&db);
        assert!(tree.height().unwrap() >= 2, "the fill must split the root");
        let entries = tree.collect().unwrap();
        assert_eq!(
            entries,
            expected.into_iter().collect::<Vec<_>>(),
            "entries must stay sorted and complete across splits"
        );
    }

    #[test]
    fn five_hundred_large_values() {
        let db = DB::in_memory().unwrap();
        let val = vec![1u8; 1000];
        for i in 0..500 {
            db.insert(format!("key-{i:04}").as_bytes(), &val).unwrap();
        }
        assert!(tree_of(&db).height().unwrap() >= 2);
        for i in 0..500 {
            assert_eq!(
                db.get(format!("key-{i:04}").as_bytes()).unwrap(),
                Some(val.clone()),
                "key-{i:04} must survive the splits"
            );
        }
    }

    #[test]
    fn height_grows_one_level_at_a_time() {
        let db = DB::in_memory().unwrap();
        let val = vec![2u8; 1000];
        let mut height = tree_of(&db).height().unwrap();
        assert_eq!(height, 1);
        for i in 0..200 {
            db.insert(format!("key-{i:04}").as_bytes(), &val).unwrap();
            let new_height = tree_of(&db).height().unwrap();
            assert!(
                new_height == height || new_height == height + 1,
                "height jumped from {height} to {new_height}"
            );
            height = new_height;
        }
        assert!(height >= 2);
    }

    #[test]
    fn random_workload_matches_a_btreemap() {
        let db = DB::in_memory().unwrap();
        let mut expected: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..800 {
            // A small key space so updates are frequent.
            let key = format!("key-{:03}", rng.random_range(0..200)).into_bytes();
            let val_len = rng.random_range(1..=50);
            let val: Vec<u8> = (0..val_len).map(|_| rng.random()).collect();
            db.insert(&key, &val).unwrap();
            expected.insert(key, val);
        }
        for (key, val) in &expected {
            assert_eq!(db.get(key).unwrap().as_ref(), Some(val));
        }
        let entries = tree_of(&db).collect().unwrap();
        assert_eq!(entries, expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn persists_across_reopen() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let db = DB::open_or_create(file.path()).unwrap();
            db.insert(b"pessoa-1", b"Timtim").unwrap();
            db.insert(b"pessoa-2", b"Coutinho").unwrap();
            db.sync().unwrap();
        }
        let db = DB::open_or_create(file.path()).unwrap();
        assert_eq!(db.get(b"pessoa-1").unwrap(), Some(b"Timtim".to_vec()));
        assert_eq!(db.get(b"pessoa-2").unwrap(), Some(b"Coutinho".to_vec()));
        // And the reopened tree accepts further writes.
        db.insert(b"pessoa-3", b"Maria").unwrap();
        assert_eq!(db.get(b"pessoa-3").unwrap(), Some(b"Maria".to_vec()));
    }
}
