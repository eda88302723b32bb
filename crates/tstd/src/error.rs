use thiserror::Error;

/// Errors raised while simulating or checking a T-STD buffering model.
#[derive(Error, Debug)]
pub enum TStdError {
    /// A buffer's `level` exceeded its `capacity` after an update.
    #[error("buffer {name} overflow: level {level} bits exceeds capacity {capacity} bits at t={timestamp}")]
    Overflow {
        /// The buffer's name (`TB`, `B`, `MB`, `EB`, or a custom name).
        name: String,
        /// Level in bits at the time of the violation.
        level: u64,
        /// Capacity in bits.
        capacity: u64,
        /// 27 MHz timestamp of the violation.
        timestamp: u64,
    },

    /// A buffer was asked to output more than its current `level` held.
    #[error("buffer {name} underflow: requested {requested} bits, level is only {level} bits at t={timestamp}")]
    Underflow {
        /// The buffer's name.
        name: String,
        /// Bits the output discipline attempted to remove.
        requested: u64,
        /// Level in bits immediately before removal.
        level: u64,
        /// 27 MHz timestamp of the violation.
        timestamp: u64,
    },

    /// A filter's decision function returned a child index with no
    /// corresponding output node, and no default (`label = -1`) route was
    /// registered.
    #[error("filter has no route for index {0} and no default void route")]
    NoFilterRoute(i64),

    /// `node_id` does not refer to a node registered in this arena, or
    /// refers to a node of the wrong kind for the operation attempted.
    #[error("invalid or mismatched node id {0:?}")]
    InvalidNode(crate::node::NodeId),
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, TStdError>;
