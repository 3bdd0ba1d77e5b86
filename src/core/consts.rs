//! Constants of the on-disk page layout.

/// Size of a B+ tree node page.
// 4KB, the typical OS page size.
pub const PAGE_SIZE: usize = 4096;

/// The maximum allowed key size in a tree.
pub const MAX_KEY_SIZE: usize = 1000;
/// The maximum allowed value size in a tree.
pub const MAX_VALUE_SIZE: usize = 3000;

/// Size of the node header: a 2-byte type tag plus a 2-byte key count.
pub(crate) const HEADER_SIZE: usize = 4;
/// Encoded size of a child pointer.
pub(crate) const POINTER_SIZE: usize = 8;
/// Encoded size of a key-value offset.
pub(crate) const OFFSET_SIZE: usize = 2;
/// Size of the per-entry header: a 2-byte key length plus a 2-byte value
/// length.
pub(crate) const KV_HEADER_SIZE: usize = 4;

const _: () = {
    assert!(PAGE_SIZE <= (1 << 16), "page size must fit in 16 bits");
    assert!(
        HEADER_SIZE + POINTER_SIZE + OFFSET_SIZE + KV_HEADER_SIZE + MAX_KEY_SIZE + MAX_VALUE_SIZE
            <= PAGE_SIZE,
        "a node holding one max-size entry must fit a page, \
         otherwise splitting cannot make progress"
    );
};
