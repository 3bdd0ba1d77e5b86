pub use crate::core::error::{NodeError, PageError, TreeError};

/// The error type returned by [`DB`](crate::DB) operations.
#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("Page store error: {0}")]
    Page(#[from] PageError),
}
