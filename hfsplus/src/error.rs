use thiserror::Error;

/// Errors surfaced by the B-tree engine, the catalog traversal layer, and the
/// ambient volume/fork readers built on top of them.
///
/// `NotFound` is deliberately absent: a missing key is a normal outcome of a
/// lookup (`Option::None` / an empty `Vec`), not a failure of the read path.
#[derive(Error, Debug)]
pub enum HfsPlusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid HFS+ signature: 0x{0:04X} (expected 0x482B or 0x4858)")]
    InvalidSignature(u16),

    #[error("unsupported volume header version: {0}")]
    UnsupportedVersion(u16),

    /// A node number, record index, or logical offset fell outside the
    /// bounds the caller's own data (fork size, node count) establishes.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The on-disk structure violates one of the B-tree's invariants: a bad
    /// descriptor, a non-monotonic offset table, a key that overruns its
    /// record, an unexpected record-type tag.
    #[error("malformed B-tree structure: {0}")]
    Malformed(String),

    /// Descent exceeded the hard 8-level cap, via either the live recursion
    /// counter or the header's own `depth` field.
    #[error("B-tree depth exceeded: {0}")]
    DepthExceeded(u32),

    /// The caller's abort flag was observed set at the start of a node fetch.
    #[error("traversal aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, HfsPlusError>;
