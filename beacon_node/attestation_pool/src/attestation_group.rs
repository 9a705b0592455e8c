use crate::aggregate_builder::{AggregateAttestationBuilder, SignatureAggregator};
use crate::attestation_bits::AttestationBits;
use crate::committees::CommitteesSize;
use crate::Error;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use types::{
    AggregateSignature, Attestation, AttestationData, CommitteeIndex, EthSpec, Slot,
};

/// An attestation as stored in the pool: its bit content plus its opaque signature.
///
/// The shared `AttestationData` lives on the owning group, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledAttestation<E: EthSpec> {
    pub bits: AttestationBits<E>,
    pub signature: AggregateSignature,
}

impl<E: EthSpec> PooledAttestation<E> {
    pub fn from_attestation(
        attestation: &Attestation<E>,
        committees_size: Option<&Arc<CommitteesSize>>,
    ) -> Result<Self, Error> {
        Ok(Self {
            bits: AttestationBits::from_attestation(attestation, committees_size)?,
            signature: *attestation.signature(),
        })
    }

    pub fn num_set_bits(&self) -> usize {
        self.bits.num_set_bits()
    }

    pub fn into_attestation(self, data: AttestationData) -> Attestation<E> {
        self.bits.into_attestation(data, self.signature)
    }
}

/// Maintains a set of attestations which all share the same `AttestationData`.
///
/// Attestations which are already subsumed by the cumulative set of bits seen on chain are
/// rejected on entry, and members become prunable as inclusions are reported. Aggregates are
/// produced on demand by a greedy walk over the remaining members, largest first.
pub struct MatchingDataAttestationGroup<E: EthSpec> {
    data: AttestationData,
    committees_size: Option<Arc<CommitteesSize>>,
    /// Members bucketed by number of set bits; the aggregation walk visits buckets in reverse
    /// (descending) order and preserves insertion order within a bucket.
    attestations_by_bit_count: BTreeMap<usize, Vec<PooledAttestation<E>>>,
    /// The union of all bits seen included on chain, `None` until the first inclusion.
    included_validators: Option<AttestationBits<E>>,
    /// Included bit sets keyed by the slot of the including block, so a reorg can roll the
    /// union back to the common ancestor.
    included_validators_by_slot: BTreeMap<Slot, Vec<AttestationBits<E>>>,
}

impl<E: EthSpec> MatchingDataAttestationGroup<E> {
    pub fn new(data: AttestationData, committees_size: Option<Arc<CommitteesSize>>) -> Self {
        Self {
            data,
            committees_size,
            attestations_by_bit_count: BTreeMap::new(),
            included_validators: None,
            included_validators_by_slot: BTreeMap::new(),
        }
    }

    pub fn attestation_data(&self) -> &AttestationData {
        &self.data
    }

    pub fn committees_size(&self) -> Option<&Arc<CommitteesSize>> {
        self.committees_size.as_ref()
    }

    /// Whether this group holds post-Electra attestations. Groups never mix schemas.
    pub fn requires_committee_bits(&self) -> bool {
        self.committees_size.is_some()
    }

    /// The number of attestations stored.
    pub fn size(&self) -> usize {
        self.attestations_by_bit_count.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.attestations_by_bit_count.is_empty()
    }

    /// Add an attestation, returning whether the group grew.
    ///
    /// Duplicates, attestations of the wrong schema and attestations already covered by the
    /// included-on-chain bits are all refused.
    pub fn add(&mut self, attestation: PooledAttestation<E>) -> bool {
        if attestation.bits.requires_committee_bits() != self.requires_committee_bits() {
            debug!(
                slot = %self.data.slot,
                "attestation schema does not match its group"
            );
            return false;
        }
        if let Some(included) = &self.included_validators {
            if included.is_superset_of(&attestation.bits) {
                return false;
            }
        }
        let bucket = self
            .attestations_by_bit_count
            .entry(attestation.num_set_bits())
            .or_default();
        if bucket.contains(&attestation) {
            return false;
        }
        bucket.push(attestation);
        true
    }

    /// Record that `attestation` was included in a block at `slot`, pruning any member whose
    /// signers are now all on chain. Returns the number of members pruned.
    pub fn on_attestation_included_in_block(
        &mut self,
        slot: Slot,
        attestation: &PooledAttestation<E>,
    ) -> Result<usize, Error> {
        match &mut self.included_validators {
            Some(included) => included.or_inplace(&attestation.bits)?,
            None => self.included_validators = Some(attestation.bits.clone()),
        }

        let history = self.included_validators_by_slot.entry(slot).or_default();
        if !history.contains(&attestation.bits) {
            history.push(attestation.bits.clone());
        }

        Ok(self.prune_included())
    }

    /// Forget inclusions that happened after `common_ancestor_slot` and rebuild the seen set,
    /// so that attestations un-included by the reorg become aggregatable again.
    pub fn on_reorg(&mut self, common_ancestor_slot: Slot) {
        let removed_slots = self
            .included_validators_by_slot
            .split_off(&(common_ancestor_slot + 1));
        if removed_slots.is_empty() {
            return;
        }

        let mut rebuilt: Option<AttestationBits<E>> = None;
        for bits in self.included_validators_by_slot.values().flatten() {
            match &mut rebuilt {
                Some(acc) => {
                    if let Err(e) = acc.or_inplace(bits) {
                        debug!(error = ?e, slot = %self.data.slot, "stale inclusion dropped");
                    }
                }
                None => rebuilt = Some(bits.clone()),
            }
        }
        self.included_validators = rebuilt;
    }

    /// Stream aggregates over the remaining members, optionally restricted to one committee.
    ///
    /// Every member feeds exactly one aggregate per call: each pass seeds from the largest
    /// unconsumed member and absorbs whatever still fits. The stream is deterministic for a
    /// given group state and can be restarted from scratch by calling `stream` again.
    pub fn stream<'a>(
        &'a self,
        committee_index: Option<CommitteeIndex>,
        aggregator: &'a dyn SignatureAggregator,
    ) -> GroupStream<'a, E> {
        let candidates = self
            .attestations_by_bit_count
            .values()
            .rev()
            .flatten()
            .filter(|attestation| self.matches_committee_index(attestation, committee_index))
            .collect::<Vec<_>>();
        GroupStream {
            used: vec![false; candidates.len()],
            candidates,
            aggregator,
        }
    }

    fn matches_committee_index(
        &self,
        attestation: &PooledAttestation<E>,
        committee_index: Option<CommitteeIndex>,
    ) -> bool {
        let Some(index) = committee_index else {
            return true;
        };
        match attestation.bits {
            AttestationBits::Base { .. } => self.data.index == index,
            AttestationBits::Electra { .. } => attestation.bits.has_committee(index),
        }
    }

    fn prune_included(&mut self) -> usize {
        let Some(included) = &self.included_validators else {
            return 0;
        };
        let mut removed = 0;
        self.attestations_by_bit_count.retain(|_, bucket| {
            bucket.retain(|attestation| {
                let covered = included.is_superset_of(&attestation.bits);
                if covered {
                    removed += 1;
                }
                !covered
            });
            !bucket.is_empty()
        });
        removed
    }
}

/// Pull-based aggregate stream over a group's members.
pub struct GroupStream<'a, E: EthSpec> {
    candidates: Vec<&'a PooledAttestation<E>>,
    used: Vec<bool>,
    aggregator: &'a dyn SignatureAggregator,
}

impl<'a, E: EthSpec> Iterator for GroupStream<'a, E> {
    type Item = Result<PooledAttestation<E>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut builder = AggregateAttestationBuilder::new();
        for (i, attestation) in self.candidates.iter().enumerate() {
            if self.used[i] {
                continue;
            }
            match builder.aggregate(attestation) {
                Ok(true) => self.used[i] = true,
                Ok(false) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        if builder.is_empty() {
            None
        } else {
            Some(builder.build(self.aggregator))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        attestation_data, base_bits, electra_bits, signature, sizes, XorSignatureAggregator,
    };
    use types::MainnetEthSpec;

    type E = MainnetEthSpec;

    const LEN: usize = 10;

    fn group() -> MatchingDataAttestationGroup<E> {
        MatchingDataAttestationGroup::new(attestation_data(13, 1, 0), None)
    }

    fn pooled(sig: u8, validators: &[usize]) -> PooledAttestation<E> {
        PooledAttestation {
            bits: base_bits::<E>(LEN, validators),
            signature: signature(sig),
        }
    }

    fn collect_aggregates(
        group: &MatchingDataAttestationGroup<E>,
        committee_index: Option<CommitteeIndex>,
    ) -> Vec<PooledAttestation<E>> {
        group
            .stream(committee_index, &XorSignatureAggregator)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn add_rejects_duplicates() {
        let mut group = group();
        assert!(group.add(pooled(1, &[1, 2])));
        assert!(!group.add(pooled(1, &[1, 2])));
        assert_eq!(group.size(), 1);
    }

    #[test]
    fn add_rejects_attestations_covered_by_chain() {
        let mut group = group();
        group
            .on_attestation_included_in_block(Slot::new(20), &pooled(1, &[1, 2, 3]))
            .unwrap();

        assert!(!group.add(pooled(2, &[1, 3])));
        assert!(group.add(pooled(3, &[1, 4])));
    }

    #[test]
    fn included_attestations_are_pruned() {
        let mut group = group();
        group.add(pooled(1, &[1, 2]));
        group.add(pooled(2, &[3]));
        group.add(pooled(3, &[5, 6]));

        let removed = group
            .on_attestation_included_in_block(Slot::new(20), &pooled(4, &[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(group.size(), 1);
    }

    #[test]
    fn report_included_is_idempotent() {
        let mut group = group();
        group.add(pooled(1, &[1, 2]));

        let included = pooled(4, &[1, 2]);
        assert_eq!(
            group.on_attestation_included_in_block(Slot::new(20), &included),
            Ok(1)
        );
        assert_eq!(
            group.on_attestation_included_in_block(Slot::new(20), &included),
            Ok(0)
        );
    }

    #[test]
    fn reorg_restores_attestations_beyond_the_ancestor() {
        let mut group = group();
        group
            .on_attestation_included_in_block(Slot::new(20), &pooled(1, &[1, 2]))
            .unwrap();
        group
            .on_attestation_included_in_block(Slot::new(22), &pooled(2, &[3, 4]))
            .unwrap();

        // The inclusion at slot 22 is rolled back, the one at slot 20 survives.
        group.on_reorg(Slot::new(21));

        assert!(group.add(pooled(3, &[3, 4])));
        assert!(!group.add(pooled(4, &[1, 2])));
    }

    #[test]
    fn reorg_at_or_after_all_inclusions_changes_nothing() {
        let mut group = group();
        group
            .on_attestation_included_in_block(Slot::new(20), &pooled(1, &[1, 2]))
            .unwrap();

        group.on_reorg(Slot::new(20));
        assert!(!group.add(pooled(2, &[1, 2])));
    }

    #[test]
    fn stream_aggregates_disjoint_members() {
        let mut group = group();
        group.add(pooled(1, &[1, 2]));
        group.add(pooled(2, &[3, 4]));
        group.add(pooled(3, &[5]));

        let aggregates = collect_aggregates(&group, None);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].bits, base_bits::<E>(LEN, &[1, 2, 3, 4, 5]));
    }

    #[test]
    fn stream_emits_disjoint_aggregates_for_overlapping_members() {
        let mut group = group();
        group.add(pooled(1, &[1, 2, 3]));
        group.add(pooled(2, &[3, 4]));
        group.add(pooled(3, &[4, 5]));

        let aggregates = collect_aggregates(&group, None);
        // {1,2,3} absorbs {4,5}; {3,4} is left for a second pass. Every member is consumed by
        // exactly one aggregate.
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].bits, base_bits::<E>(LEN, &[1, 2, 3, 4, 5]));
        assert_eq!(aggregates[1].bits, base_bits::<E>(LEN, &[3, 4]));
    }

    #[test]
    fn stream_prefers_higher_bit_counts() {
        let mut group = group();
        group.add(pooled(1, &[1]));
        group.add(pooled(2, &[2, 3, 4]));
        group.add(pooled(3, &[5, 6]));

        let aggregates = collect_aggregates(&group, None);
        assert_eq!(aggregates.len(), 1);
        // Seeded from the largest member.
        assert_eq!(
            aggregates[0].bits,
            base_bits::<E>(LEN, &[1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn stream_is_restartable_and_deterministic() {
        let mut group = group();
        group.add(pooled(1, &[1, 2, 3]));
        group.add(pooled(2, &[3, 4]));

        assert_eq!(collect_aggregates(&group, None), collect_aggregates(&group, None));
    }

    #[test]
    fn stream_filters_by_committee_for_base_groups() {
        let mut group = group();
        group.add(pooled(1, &[1, 2]));

        assert_eq!(collect_aggregates(&group, Some(1)).len(), 1);
        assert!(collect_aggregates(&group, Some(2)).is_empty());
    }

    #[test]
    fn stream_filters_by_committee_for_electra_groups() {
        let committees = sizes(&[(1, 4), (3, 4)]);
        let mut group = MatchingDataAttestationGroup::<E>::new(
            attestation_data(13, 0, 0),
            Some(Arc::new(committees.clone())),
        );
        group.add(PooledAttestation {
            bits: electra_bits::<E>(&committees, &[1], &[0, 1]),
            signature: signature(1),
        });
        group.add(PooledAttestation {
            bits: electra_bits::<E>(&committees, &[3], &[2]),
            signature: signature(2),
        });

        // Both committees aggregate into one attestation when unfiltered.
        let all = collect_aggregates(&group, None);
        assert_eq!(all.len(), 1);
        assert_eq!(
            all[0].bits,
            electra_bits::<E>(&committees, &[1, 3], &[0, 1, 6])
        );

        assert_eq!(collect_aggregates(&group, Some(1)).len(), 1);
        assert_eq!(collect_aggregates(&group, Some(3)).len(), 1);
        assert!(collect_aggregates(&group, Some(0)).is_empty());
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let committees = sizes(&[(0, 4)]);
        let mut group = group();
        assert!(!group.add(PooledAttestation {
            bits: electra_bits::<E>(&committees, &[0], &[0]),
            signature: signature(1),
        }));
        assert_eq!(group.size(), 0);
    }
}
