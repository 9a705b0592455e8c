use std::collections::BTreeMap;
use types::{CommitteeIndex, Epoch, Slot};

/// Resolved committee sizes for one slot: committee index to number of members.
///
/// Ordered so that the concatenated aggregation-bit layout of a multi-committee attestation is
/// well defined (committees ascending).
pub type CommitteesSize = BTreeMap<CommitteeIndex, usize>;

/// Access to committee sizes derived from chain state.
///
/// Implementations must be non-blocking: when the backing state is not immediately available
/// they return `None` rather than waiting for it. The pool treats `None` as "drop the
/// attestation".
pub trait CommitteeResolver: Send + Sync {
    /// The current epoch of the resolver's view of the chain, or `None` if no chain store exists
    /// yet.
    fn current_epoch(&self) -> Option<Epoch>;

    /// Committee sizes for `slot`, computed from the best available head state.
    ///
    /// Only sound when `slot` is within the current or previous epoch of the head.
    fn committees_size_from_head(&self, slot: Slot) -> Option<CommitteesSize>;

    /// Committee sizes for `slot`, computed from the state in effect at the start of `slot`'s
    /// epoch.
    ///
    /// Used for attestations older than the previous epoch; with a 64-slot retention window
    /// these can be at most one epoch behind that.
    fn committees_size_at_epoch_start(&self, slot: Slot) -> Option<CommitteesSize>;
}
