use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HologramError {
    #[error("page index {index} out of range (hologram has {len} pages)")]
    PageOutOfRange { index: usize, len: usize },

    #[error("line index {index} out of range (page has {len} lines)")]
    LineOutOfRange { index: usize, len: usize },

    #[error("a hologram named '{0}' is already registered")]
    DuplicateName(String),

    #[error("no hologram named '{0}'")]
    UnknownHologram(String),

    #[error("hologram '{0}' has been destroyed")]
    Destroyed(String),

    /// The fallback text parser accepts everything, so this means the parser
    /// chain was built without it.
    #[error("no content parser claimed line content {0:?}")]
    NoParserMatched(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
