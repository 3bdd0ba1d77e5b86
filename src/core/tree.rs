//! A copy-on-write B+ tree over an abstract page store.
//!
//! An edit never modifies a live page. The mutator descends from the root
//! to the target leaf, rebuilds every node along that path into fresh
//! buffers, splits whatever overflowed, and persists the results as brand
//! new pages — so a structural change is expressed entirely as "allocate
//! new page(s), return new page id(s)". The pages that were descended
//! through are superseded and freed once the whole path has succeeded,
//! and the caller adopts the returned root. Until it does, the previous
//! root still describes a complete, untouched version of the tree; that
//! old-versions-are-never-mutated property is what a future concurrent
//! reader extension would build on.

mod node;

use tracing::{debug, trace};

use crate::core::consts;
use crate::core::error::{NodeError, TreeError};
use crate::core::page_store::PageStore;
use node::{Node, NodeBuilder, NodeType};

type Result<T> = std::result::Result<T, TreeError>;

/// A handle to one version of the tree: a page store plus the root page
/// number of that version.
pub struct Tree<'s, S: PageStore> {
    store: &'s S,
    root: u64,
}

impl<'s, S: PageStore> Tree<'s, S> {
    /// Opens the tree version rooted at `root`.
    pub fn new(store: &'s S, root: u64) -> Self {
        Tree { store, root }
    }

    /// Writes the single empty leaf that roots a brand-new tree and
    /// returns its page number.
    pub fn create(store: &S) -> Result<u64> {
        let root = NodeBuilder::new(NodeType::Leaf, 0).build();
        Ok(store.write_page(root.page())?)
    }

    /// The root page number of this version.
    pub fn root(&self) -> u64 {
        self.root
    }

    fn read(&self, page_num: u64) -> Result<Node<S::Page>> {
        let page = self.store.read_page(page_num)?;
        Ok(Node::from_buf(page)?)
    }

    /// Gets the value corresponding to the key. Absence is not an error.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_at(self.root, key)
    }

    fn get_at(&self, page_num: u64, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let node = self.read(page_num)?;
        match node.node_type() {
            NodeType::Leaf => Ok(match node.lookup_le(key) {
                Some(i) if node.key(i) == key => Some(node.value(i).to_vec()),
                _ => None,
            }),
            NodeType::Internal => {
                let i = node.lookup_le(key).unwrap_or(0);
                self.get_at(node.child_pointer(i), key)
            }
        }
    }

    /// Inserts a key-value pair, or updates the value of an existing key.
    ///
    /// Returns the tree rooted at the (possibly new) root page number,
    /// which the caller must adopt. Pages superseded along the path —
    /// every descended-into child and the old root — are freed only after
    /// the whole path has succeeded, so a failed insert leaves the old
    /// version fully intact; at worst it has allocated pages nothing
    /// references.
    pub fn insert(self, key: &[u8], val: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(NodeError::EmptyKey.into());
        }
        if val.is_empty() {
            return Err(NodeError::EmptyValue.into());
        }
        if key.len() > consts::MAX_KEY_SIZE {
            return Err(NodeError::MaxKeySize(key.len()).into());
        }
        if val.len() > consts::MAX_VALUE_SIZE {
            return Err(NodeError::MaxValueSize(val.len()).into());
        }

        let mut superseded = vec![self.root];
        let children = self.insert_at(self.root, key, val, &mut superseded)?;
        let root = if children.len() == 1 {
            children[0].1
        } else {
            // The old root split: synthesize a new internal root above the
            // splits. This is the only way the tree grows in height.
            let mut b = NodeBuilder::new(NodeType::Internal, children.len());
            for (first_key, page_num) in &children {
                b = b.append_entry(*page_num, first_key, &[]);
            }
            let root = self.store.write_page(b.build().page())?;
            debug!(
                root,
                children = children.len(),
                "root split; tree height grew by one"
            );
            root
        };
        for page_num in superseded {
            self.store.free_page(page_num)?;
        }
        Ok(Tree {
            store: self.store,
            root,
        })
    }

    /// Recursively rewrites the path from `page_num` down to the target
    /// leaf and returns the 1–3 page-sized replacements for `page_num`,
    /// each as its (first key, new page number) pair. Separator keys for
    /// the level above are always the replacement's own first key.
    fn insert_at(
        &self,
        page_num: u64,
        key: &[u8],
        val: &[u8],
        superseded: &mut Vec<u64>,
    ) -> Result<Vec<(Vec<u8>, u64)>> {
        let node = self.read(page_num)?;
        let built = match node.node_type() {
            NodeType::Leaf => match node.lookup_le(key) {
                Some(i) if node.key(i) == key => node::leaf_update(&node, i, key, val),
                // Insert right after the last key <= the search key.
                Some(i) => node::leaf_insert(&node, i + 1, key, val),
                // The search key precedes every key in the leaf.
                None => node::leaf_insert(&node, 0, key, val),
            },
            NodeType::Internal => {
                let i = node.lookup_le(key).unwrap_or(0);
                let child = node.child_pointer(i);
                let replacements = self.insert_at(child, key, val, superseded)?;
                superseded.push(child);
                node::replace_children(&node, i, &replacements)
            }
        };
        let parts = node::split3(built);
        if parts.len() > 1 {
            trace!(page_num, parts = parts.len(), "node split");
        }
        let mut replacements = Vec::with_capacity(parts.len());
        for part in parts {
            let new_page_num = self.store.write_page(part.page())?;
            replacements.push((part.key(0).to_vec(), new_page_num));
        }
        Ok(replacements)
    }
}

#[cfg(test)]
impl<S: PageStore> Tree<'_, S> {
    /// Gets the height of the tree by walking the leftmost spine. All
    /// leaves sit at the same depth, so any spine would do.
    pub(crate) fn height(&self) -> Result<u32> {
        let mut height = 1;
        let mut page_num = self.root;
        loop {
            let node = self.read(page_num)?;
            match node.node_type() {
                NodeType::Leaf => return Ok(height),
                NodeType::Internal => {
                    height += 1;
                    page_num = node.child_pointer(0);
                }
            }
        }
    }

    /// Collects every key-value pair in order.
    pub(crate) fn collect(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        self.collect_at(self.root, &mut out)?;
        Ok(out)
    }

    fn collect_at(&self, page_num: u64, out: &mut Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        let node = self.read(page_num)?;
        match node.node_type() {
            NodeType::Leaf => {
                for i in 0..node.num_keys() {
                    out.push((node.key(i).to_vec(), node.value(i).to_vec()));
                }
            }
            NodeType::Internal => {
                for i in 0..node.num_keys() {
                    self.collect_at(node.child_pointer(i), out)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PageError;
    use crate::core::page_store::InMemory;

    #[test]
    fn create_roots_an_empty_leaf() {
        let store = InMemory::new();
        let root = Tree::create(&store).unwrap();
        let tree = Tree::new(&store, root);
        assert_eq!(tree.get(b"missing").unwrap(), None);
        assert_eq!(tree.height().unwrap(), 1);
    }

    #[test]
    fn insert_supersedes_the_old_root() {
        let store = InMemory::new();
        let root = Tree::create(&store).unwrap();
        let tree = Tree::new(&store, root).insert(b"k", b"v").unwrap();
        assert_ne!(tree.root(), root);
        // The old root was freed as part of the copy-on-write rewrite.
        assert!(matches!(store.read_page(root), Err(PageError::NotFound(_))));
        assert_eq!(tree.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn inserts_keep_keys_ordered() {
        let store = InMemory::new();
        let root = Tree::create(&store).unwrap();
        let mut tree = Tree::new(&store, root);
        for key in [&b"m"[..], b"c", b"x", b"a", b"t"] {
            tree = tree.insert(key, b"v").unwrap();
        }
        let keys: Vec<_> = tree
            .collect()
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![
                b"a".to_vec(),
                b"c".to_vec(),
                b"m".to_vec(),
                b"t".to_vec(),
                b"x".to_vec()
            ]
        );
    }

    #[test]
    fn failed_insert_leaves_the_old_version_intact() {
        let store = InMemory::new();
        let root = Tree::create(&store).unwrap();
        let tree = Tree::new(&store, root).insert(b"k", b"v").unwrap();
        let root = tree.root();
        let oversized = vec![0u8; consts::MAX_VALUE_SIZE + 1];
        let result = Tree::new(&store, root).insert(b"k2", &oversized);
        assert!(matches!(
            result,
            Err(TreeError::Node(NodeError::MaxValueSize(_)))
        ));
        let tree = Tree::new(&store, root);
        assert_eq!(tree.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
