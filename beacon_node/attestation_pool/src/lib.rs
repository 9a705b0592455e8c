//! A pool of aggregated attestations for block production.
//!
//! Attestations arriving from gossip are grouped by their `AttestationData` hash tree root and
//! merged into maximally-useful aggregates on demand. The pool can serve attestations for
//! inclusion in a block (`get_attestations_for_block`) or a single best aggregate to publish as
//! part of the naive aggregation strategy (`create_aggregate_for`); in both cases returned
//! attestations are aggregated to cover as many validators as possible.
//!
//! All attestations handed to the pool must already be gossip-verified: no signature or
//! committee-membership checks happen here.

mod aggregate_builder;
mod attestation_bits;
mod attestation_group;
mod committees;
pub mod liveness;
mod metrics;

pub use crate::aggregate_builder::{AggregateAttestationBuilder, SignatureAggregator};
pub use crate::attestation_bits::AttestationBits;
pub use crate::attestation_group::{GroupStream, MatchingDataAttestationGroup, PooledAttestation};
pub use crate::committees::{CommitteeResolver, CommitteesSize};

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};
use tree_hash::TreeHash;
use types::{
    Attestation, AttestationData, BeaconState, ChainSpec, CommitteeIndex, EthSpec, Hash256, Slot,
};

/// The valid attestation retention period is 64 slots since deneb.
pub const ATTESTATION_RETENTION_SLOTS: u64 = 64;

/// Default maximum number of attestations to store in the pool.
///
/// With two million active validators there are roughly 62_500 distinct unaggregated
/// attestations per slot, so this is about three slots worth of pending work. Caching
/// everything for the full two-epoch validity window would cost far more memory than the lost
/// aggregates are worth.
pub const DEFAULT_MAXIMUM_ATTESTATION_COUNT: usize = 187_500;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// An aggregate was requested from a builder that aggregated nothing.
    EmptyAggregate,
    /// A bitfield operation failed. Indicates corrupt pool state.
    InvalidBitfield(ssz_types::Error),
    /// Aggregation bits do not line up with the committee layout they claim to cover.
    CommitteeLayoutMismatch,
    /// An Electra-style attestation was handled without resolved committee sizes.
    MissingCommitteesSize,
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Self {
        Error::InvalidBitfield(e)
    }
}

impl From<ssz::BitfieldError> for Error {
    fn from(e: ssz::BitfieldError) -> Self {
        let mapped = match e {
            ssz::BitfieldError::OutOfBounds { i, len } => {
                ssz_types::Error::OutOfBounds { i, len }
            }
            ssz::BitfieldError::MissingLengthInformation => {
                ssz_types::Error::MissingLengthInformation
            }
            ssz::BitfieldError::ExcessBits => ssz_types::Error::ExcessBits,
            ssz::BitfieldError::InvalidByteCount { given, expected } => {
                ssz_types::Error::InvalidByteCount { given, expected }
            }
        };
        Error::InvalidBitfield(mapped)
    }
}

/// Statistics about the attestations stored in the pool.
#[derive(Debug, Default, PartialEq)]
pub struct AttestationStats {
    /// Total number of attestations for all data/committees/forks.
    pub num_attestations: usize,
    /// Number of unique `AttestationData` attested to.
    pub num_attestation_data: usize,
    /// Maximum number of attestations stored for a single `AttestationData`.
    pub max_attestations_per_data: usize,
}

/// Consensus validity of attestation data against the state a block is being built on.
///
/// This belongs to state processing, not to the pool; it is injected per call.
pub trait AttestationValidator<E: EthSpec>: Send + Sync {
    /// Returns `None` when `data` can be included in a block built on `state`, or a
    /// human-readable reason why not.
    fn validate(&self, state: &BeaconState<E>, data: &AttestationData) -> Option<String>;
}

/// Fork membership of attestation data, answered by fork choice.
pub trait ForkChecker: Send + Sync {
    fn are_attestations_from_correct_fork(&self, data: &AttestationData) -> bool;
}

/// Maintains a pool of attestations for inclusion in proposed blocks.
///
/// The whole pool sits behind one lock: producers (gossip), the slot timer and block production
/// all serialize on it, which is cheap because every operation is short and allocation-light.
pub struct AggregatingAttestationPool<E: EthSpec> {
    pool: RwLock<PoolInner<E>>,
    committee_resolver: Arc<dyn CommitteeResolver>,
    signature_aggregator: Arc<dyn SignatureAggregator>,
    spec: ChainSpec,
    maximum_attestation_count: usize,
}

#[derive(Default)]
struct PoolInner<E: EthSpec> {
    attestation_group_by_data_hash: HashMap<Hash256, MatchingDataAttestationGroup<E>>,
    /// Slot-ordered index into the groups. Hashes are kept ordered so that iteration during
    /// block packing is deterministic.
    data_hash_by_slot: BTreeMap<Slot, BTreeSet<Hash256>>,
    size: usize,
}

impl<E: EthSpec> PoolInner<E> {
    /// Drop every group older than `first_valid_attestation_slot`, returning the number of
    /// attestations removed.
    fn remove_attestations_prior_to_slot(&mut self, first_valid_attestation_slot: Slot) -> usize {
        let retained = self
            .data_hash_by_slot
            .split_off(&first_valid_attestation_slot);
        let removed_slots = std::mem::replace(&mut self.data_hash_by_slot, retained);
        if removed_slots.is_empty() {
            return 0;
        }

        let mut removed_attestations = 0;
        for data_root in removed_slots.values().flatten() {
            if let Some(group) = self.attestation_group_by_data_hash.remove(data_root) {
                removed_attestations += group.size();
            }
        }
        trace!(
            %first_valid_attestation_slot,
            removed_slots = removed_slots.len(),
            removed_attestations,
            "pruned attestation groups"
        );

        self.size = self.size.saturating_sub(removed_attestations);
        self.update_size_gauge();
        removed_attestations
    }

    fn update_size_gauge(&self) {
        metrics::set_gauge(&metrics::ATTESTATION_POOL_SIZE, self.size as i64);
    }
}

impl<E: EthSpec> AggregatingAttestationPool<E> {
    pub fn new(
        spec: ChainSpec,
        committee_resolver: Arc<dyn CommitteeResolver>,
        signature_aggregator: Arc<dyn SignatureAggregator>,
        maximum_attestation_count: usize,
    ) -> Self {
        Self {
            pool: RwLock::new(PoolInner::default()),
            committee_resolver,
            signature_aggregator,
            spec,
            maximum_attestation_count,
        }
    }

    /// Add a gossip-verified attestation to the pool.
    ///
    /// Attestations whose committee sizes cannot be resolved, or whose bits are inconsistent
    /// with them, are dropped: the gossip firehose is unreliable by design and none of these
    /// failures are worth more than a debug line.
    pub fn insert_attestation(&self, attestation: Attestation<E>) {
        let data = *attestation.data();
        let data_root = data.tree_hash_root();

        let mut pool = self.pool.write();

        let added =
            match self.get_or_create_attestation_group(&mut pool, &attestation, data, data_root) {
                Some(group) => {
                    match PooledAttestation::from_attestation(&attestation, group.committees_size())
                    {
                        Ok(pooled) => group.add(pooled),
                        Err(e) => {
                            debug!(
                                error = ?e,
                                slot = %data.slot,
                                "attestation bits do not match their committees"
                            );
                            false
                        }
                    }
                }
                None => false,
            };
        if added {
            pool.size += 1;
            pool.update_size_gauge();
        }

        // Always keep the latest slot's attestations, so we never discard everything.
        let mut evicted = 0;
        while pool.data_hash_by_slot.len() > 1 && pool.size > self.maximum_attestation_count {
            trace!(
                size = pool.size,
                limit = self.maximum_attestation_count,
                "attestation pool over capacity"
            );
            let Some(oldest_slot) = pool.data_hash_by_slot.keys().next().copied() else {
                break;
            };
            evicted += pool.remove_attestations_prior_to_slot(oldest_slot + 1);
        }
        if evicted > 0 {
            metrics::inc_counter_by(
                &metrics::ATTESTATION_POOL_EVICTED_ATTESTATIONS,
                evicted as u64,
            );
        }
    }

    /// Drop attestations which have passed out of the retention window.
    pub fn on_slot(&self, slot: Slot) {
        if slot <= Slot::new(ATTESTATION_RETENTION_SLOTS) {
            return;
        }
        let first_valid_attestation_slot = slot - ATTESTATION_RETENTION_SLOTS;
        self.pool
            .write()
            .remove_attestations_prior_to_slot(first_valid_attestation_slot);
    }

    /// Record attestations included in a block at `slot`.
    ///
    /// Pool members whose signers are now entirely on chain are dropped.
    pub fn on_attestations_included_in_block<'a>(
        &self,
        slot: Slot,
        attestations: impl IntoIterator<Item = &'a Attestation<E>>,
    ) {
        let mut pool = self.pool.write();
        for attestation in attestations {
            self.record_attestation_inclusion(&mut pool, slot, attestation);
        }
    }

    /// Notify the pool of a re-org. Attestations included on the abandoned chain become
    /// relevant again.
    pub fn on_reorg(&self, common_ancestor_slot: Slot) {
        let mut pool = self.pool.write();
        for group in pool.attestation_group_by_data_hash.values_mut() {
            group.on_reorg(common_ancestor_slot);
        }
    }

    /// The total number of attestations stored.
    pub fn num_attestations(&self) -> usize {
        self.pool.read().size
    }

    /// Statistics about all stored attestations.
    pub fn attestation_stats(&self) -> AttestationStats {
        let pool = self.pool.read();
        let mut stats = AttestationStats::default();
        for group in pool.attestation_group_by_data_hash.values() {
            stats.num_attestations += group.size();
            stats.num_attestation_data += 1;
            stats.max_attestations_per_data =
                std::cmp::max(stats.max_attestations_per_data, group.size());
        }
        stats
    }

    /// Get an aggregated set of attestations for inclusion in a block built on
    /// `state_at_block_slot`.
    ///
    /// Newest slots are packed first; within a slot, aggregates covering more validators come
    /// first. Attestations targeting the previous epoch are admitted only while the state has
    /// capacity left for them, and the total is capped by the block schema in effect at the
    /// state's slot.
    pub fn get_attestations_for_block(
        &self,
        state_at_block_slot: &BeaconState<E>,
        validator: &dyn AttestationValidator<E>,
        fork_checker: &dyn ForkChecker,
    ) -> Result<Vec<Attestation<E>>, Error> {
        let _timer = metrics::start_timer(&metrics::ATTESTATION_POOL_PACKING_TIMES);

        let current_epoch = state_at_block_slot.current_epoch();
        let mut previous_epoch_limit = state_at_block_slot.previous_epoch_attestation_capacity();

        let fork_name = self
            .spec
            .fork_name_at_slot::<E>(state_at_block_slot.slot);
        let block_requires_committee_bits = fork_name.requires_committee_bits();
        let max_attestations = if block_requires_committee_bits {
            E::max_attestations_electra()
        } else {
            E::max_attestations()
        };

        let pool = self.pool.read();
        let mut attestations = Vec::new();

        // Anything at or after the block's slot can never be included; walk newest first.
        'slots: for (_, data_roots) in pool.data_hash_by_slot.range(..state_at_block_slot.slot).rev()
        {
            let mut slot_aggregates = Vec::new();
            for data_root in data_roots {
                let Some(group) = pool.attestation_group_by_data_hash.get(data_root) else {
                    continue;
                };
                if group.requires_committee_bits() != block_requires_committee_bits {
                    continue;
                }
                let data = group.attestation_data();
                if validator.validate(state_at_block_slot, data).is_some() {
                    continue;
                }
                if !fork_checker.are_attestations_from_correct_fork(data) {
                    continue;
                }
                for aggregate in group.stream(None, &*self.signature_aggregator) {
                    slot_aggregates.push((aggregate?, *data));
                }
            }

            // Stable sort, so equal participation keeps first-seen order.
            slot_aggregates
                .sort_by_key(|(aggregate, _)| std::cmp::Reverse(aggregate.num_set_bits()));

            for (aggregate, data) in slot_aggregates {
                if attestations.len() >= max_attestations {
                    break 'slots;
                }
                if data.slot.epoch(E::slots_per_epoch()) < current_epoch {
                    if previous_epoch_limit == 0 {
                        continue;
                    }
                    previous_epoch_limit -= 1;
                }
                attestations.push(aggregate.into_attestation(data));
            }
        }

        Ok(attestations)
    }

    /// List the stored attestations as aggregates, newest slot first. For operator diagnostics.
    pub fn get_attestations(
        &self,
        slot: Option<Slot>,
        committee_index: Option<CommitteeIndex>,
    ) -> Vec<Attestation<E>> {
        let pool = self.pool.read();
        let mut attestations = Vec::new();
        for (bucket_slot, data_roots) in pool.data_hash_by_slot.iter().rev() {
            if slot.is_some_and(|slot| slot != *bucket_slot) {
                continue;
            }
            for data_root in data_roots {
                let Some(group) = pool.attestation_group_by_data_hash.get(data_root) else {
                    continue;
                };
                let data = *group.attestation_data();
                for aggregate in group.stream(committee_index, &*self.signature_aggregator) {
                    match aggregate {
                        Ok(aggregate) => attestations.push(aggregate.into_attestation(data)),
                        Err(e) => debug!(error = ?e, "skipping unbuildable aggregate"),
                    }
                }
            }
        }
        attestations
    }

    /// Produce the best available aggregate for the attestation data with the given hash tree
    /// root, optionally restricted to a single committee.
    pub fn create_aggregate_for(
        &self,
        attestation_data_root: Hash256,
        committee_index: Option<CommitteeIndex>,
    ) -> Option<Attestation<E>> {
        let pool = self.pool.read();
        let group = pool
            .attestation_group_by_data_hash
            .get(&attestation_data_root)?;
        let data = *group.attestation_data();
        match group
            .stream(committee_index, &*self.signature_aggregator)
            .next()?
        {
            Ok(aggregate) => Some(aggregate.into_attestation(data)),
            Err(e) => {
                debug!(error = ?e, "failed to build requested aggregate");
                None
            }
        }
    }

    /// Look up the group for `data_root`, creating it if needed.
    ///
    /// Creating a group for an Electra attestation requires resolving its committee sizes;
    /// returns `None` (and the attestation is dropped) when that fails. An existing group
    /// already carries its sizes, so no lookup is repeated for it.
    fn get_or_create_attestation_group<'a>(
        &self,
        pool: &'a mut PoolInner<E>,
        attestation: &Attestation<E>,
        data: AttestationData,
        data_root: Hash256,
    ) -> Option<&'a mut MatchingDataAttestationGroup<E>> {
        if !pool.attestation_group_by_data_hash.contains_key(&data_root) {
            let committees_size = if attestation.requires_committee_bits() {
                match self.committees_size_for(&data) {
                    Some(sizes) => Some(sizes),
                    None => {
                        debug!(
                            slot = %data.slot,
                            block_root = ?data.beacon_block_root,
                            target_root = ?data.target.root,
                            "committee sizes unavailable, attestation not added to the pool"
                        );
                        return None;
                    }
                }
            } else {
                None
            };
            pool.data_hash_by_slot
                .entry(data.slot)
                .or_default()
                .insert(data_root);
            pool.attestation_group_by_data_hash
                .insert(data_root, MatchingDataAttestationGroup::new(data, committees_size));
        }
        pool.attestation_group_by_data_hash.get_mut(&data_root)
    }

    /// Resolve the committee sizes for an attestation's slot.
    ///
    /// Attestations from the current or previous epoch can use the head state; older ones (the
    /// retention window reaches at most one epoch further back) need the state in effect at the
    /// start of their own epoch.
    fn committees_size_for(&self, data: &AttestationData) -> Option<Arc<CommitteesSize>> {
        let current_epoch = self.committee_resolver.current_epoch()?;
        let attestation_epoch = data.slot.epoch(E::slots_per_epoch());
        debug!(%current_epoch, %attestation_epoch, "resolving committee sizes");

        let sizes = if attestation_epoch == current_epoch
            || attestation_epoch + 1 == current_epoch
        {
            self.committee_resolver.committees_size_from_head(data.slot)
        } else {
            self.committee_resolver
                .committees_size_at_epoch_start(data.slot)
        }?;
        Some(Arc::new(sizes))
    }

    fn record_attestation_inclusion(
        &self,
        pool: &mut PoolInner<E>,
        slot: Slot,
        attestation: &Attestation<E>,
    ) {
        let data = *attestation.data();
        let data_root = data.tree_hash_root();

        let removed =
            match self.get_or_create_attestation_group(pool, attestation, data, data_root) {
                Some(group) => {
                    match PooledAttestation::from_attestation(attestation, group.committees_size())
                    {
                        Ok(pooled) => group
                            .on_attestation_included_in_block(slot, &pooled)
                            .unwrap_or_else(|e| {
                                debug!(error = ?e, "failed to record included attestation");
                                0
                            }),
                        Err(e) => {
                            debug!(error = ?e, "included attestation does not match its group");
                            0
                        }
                    }
                }
                None => 0,
            };
        if removed > 0 {
            pool.size = pool.size.saturating_sub(removed);
            pool.update_size_gauge();
        }
    }
}
