use thiserror::Error;

use crate::ipset::SetError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("no such set: {0}")]
    NoSuchSet(String),

    #[error("set already exists: {0}")]
    SetExists(String),

    /// A configured entry failed while building a set.
    #[error("set {set:?}, entry {entry:?}: {source}")]
    Entry {
        set: String,
        entry: String,
        source: SetError,
    },

    #[error(transparent)]
    Set(#[from] SetError),

    #[error("control queue closed")]
    QueueClosed,
}
