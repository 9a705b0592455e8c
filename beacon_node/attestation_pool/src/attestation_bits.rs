use crate::committees::CommitteesSize;
use crate::Error;
use std::collections::BTreeMap;
use std::sync::Arc;
use types::{
    AggregateSignature, Attestation, AttestationBase, AttestationData, AttestationElectra,
    BitList, BitVector, CommitteeIndex, EthSpec,
};

/// The aggregatable bit content of an attestation.
///
/// `Base` attestations cover a single committee, so their bits are directly comparable whenever
/// the lists have equal length. `Electra` attestations may span several committees: their
/// aggregation bits are the concatenation of one segment per participating committee, in
/// committee order, with segment lengths given by the resolved committee sizes. All cross-layout
/// operations (union, superset, disjointness) go through that segment arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum AttestationBits<E: EthSpec> {
    Base {
        aggregation_bits: BitList<E::MaxValidatorsPerCommittee>,
    },
    Electra {
        aggregation_bits: BitList<E::MaxValidatorsPerSlot>,
        committee_bits: BitVector<E::MaxCommitteesPerSlot>,
        committees_size: Arc<CommitteesSize>,
    },
}

/// Committee index to `(offset, size)` within a concatenated aggregation bitlist.
type CommitteeOffsets = BTreeMap<CommitteeIndex, (usize, usize)>;

impl<E: EthSpec> AttestationBits<E> {
    /// Capture the bits of `attestation`.
    ///
    /// Electra attestations require the committee sizes resolved for their slot; an attestation
    /// whose aggregation bits do not line up with those sizes is rejected.
    pub fn from_attestation(
        attestation: &Attestation<E>,
        committees_size: Option<&Arc<CommitteesSize>>,
    ) -> Result<Self, Error> {
        match attestation {
            Attestation::Base(att) => Ok(Self::Base {
                aggregation_bits: att.aggregation_bits.clone(),
            }),
            Attestation::Electra(att) => {
                let committees_size = committees_size
                    .cloned()
                    .ok_or(Error::MissingCommitteesSize)?;
                let offsets = committee_offsets::<E>(&att.committee_bits, &committees_size)?;
                if att.aggregation_bits.len() != total_len(&offsets) {
                    return Err(Error::CommitteeLayoutMismatch);
                }
                Ok(Self::Electra {
                    aggregation_bits: att.aggregation_bits.clone(),
                    committee_bits: att.committee_bits.clone(),
                    committees_size,
                })
            }
        }
    }

    /// Rebuild a full attestation around these bits.
    pub fn into_attestation(
        self,
        data: AttestationData,
        signature: AggregateSignature,
    ) -> Attestation<E> {
        match self {
            Self::Base { aggregation_bits } => Attestation::Base(AttestationBase {
                aggregation_bits,
                data,
                signature,
            }),
            Self::Electra {
                aggregation_bits,
                committee_bits,
                ..
            } => Attestation::Electra(AttestationElectra {
                aggregation_bits,
                data,
                committee_bits,
                signature,
            }),
        }
    }

    pub fn requires_committee_bits(&self) -> bool {
        matches!(self, Self::Electra { .. })
    }

    pub fn num_set_bits(&self) -> usize {
        match self {
            Self::Base { aggregation_bits } => aggregation_bits.num_set_bits(),
            Self::Electra {
                aggregation_bits, ..
            } => aggregation_bits.num_set_bits(),
        }
    }

    /// Whether `committee_index` participates. Always false for `Base`, whose committee is named
    /// by the attestation data rather than the bits.
    pub fn has_committee(&self, committee_index: CommitteeIndex) -> bool {
        match self {
            Self::Base { .. } => false,
            Self::Electra { committee_bits, .. } => committee_bits
                .get(committee_index as usize)
                .unwrap_or(false),
        }
    }

    /// True when `other` can be merged into `self` without double-counting a signer.
    ///
    /// Attestations of different schemas never aggregate.
    pub fn can_aggregate_with(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Base { aggregation_bits },
                Self::Base {
                    aggregation_bits: other_bits,
                },
            ) => {
                aggregation_bits.len() == other_bits.len()
                    && aggregation_bits.intersection(other_bits).is_zero()
            }
            (
                Self::Electra {
                    aggregation_bits,
                    committee_bits,
                    committees_size,
                },
                Self::Electra {
                    aggregation_bits: other_bits,
                    committee_bits: other_committee_bits,
                    ..
                },
            ) => {
                let shares_a_committee = committee_bits
                    .iter()
                    .zip(other_committee_bits.iter())
                    .any(|(ours, theirs)| ours && theirs);
                if !shares_a_committee {
                    return true;
                }
                let (Ok(offsets), Ok(other_offsets)) = (
                    committee_offsets::<E>(committee_bits, committees_size),
                    committee_offsets::<E>(other_committee_bits, committees_size),
                ) else {
                    return false;
                };
                for (committee, (offset, size)) in &offsets {
                    let Some((other_offset, _)) = other_offsets.get(committee) else {
                        continue;
                    };
                    for i in 0..*size {
                        if aggregation_bits.get(offset + i).unwrap_or(false)
                            && other_bits.get(other_offset + i).unwrap_or(false)
                        {
                            return false;
                        }
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// True when every signer asserted by `other` is also asserted by `self`.
    pub fn is_superset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Base { aggregation_bits },
                Self::Base {
                    aggregation_bits: other_bits,
                },
            ) => {
                aggregation_bits.len() == other_bits.len()
                    && other_bits.difference(aggregation_bits).is_zero()
            }
            (
                Self::Electra {
                    aggregation_bits,
                    committee_bits,
                    committees_size,
                },
                Self::Electra {
                    aggregation_bits: other_bits,
                    committee_bits: other_committee_bits,
                    ..
                },
            ) => {
                let (Ok(offsets), Ok(other_offsets)) = (
                    committee_offsets::<E>(committee_bits, committees_size),
                    committee_offsets::<E>(other_committee_bits, committees_size),
                ) else {
                    return false;
                };
                for (committee, (other_offset, size)) in &other_offsets {
                    let Some((offset, _)) = offsets.get(committee) else {
                        return false;
                    };
                    for i in 0..*size {
                        if other_bits.get(other_offset + i).unwrap_or(false)
                            && !aggregation_bits.get(offset + i).unwrap_or(false)
                        {
                            return false;
                        }
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// Merge the signers of `other` into `self`, extending the committee layout if `other`
    /// covers committees `self` does not.
    pub fn or_inplace(&mut self, other: &Self) -> Result<(), Error> {
        match (&mut *self, other) {
            (
                Self::Base { aggregation_bits },
                Self::Base {
                    aggregation_bits: other_bits,
                },
            ) => {
                if aggregation_bits.len() != other_bits.len() {
                    return Err(Error::CommitteeLayoutMismatch);
                }
                *aggregation_bits = aggregation_bits.union(other_bits);
                Ok(())
            }
            (
                Self::Electra {
                    aggregation_bits,
                    committee_bits,
                    committees_size,
                },
                Self::Electra {
                    aggregation_bits: other_bits,
                    committee_bits: other_committee_bits,
                    ..
                },
            ) => {
                let mut merged_committee_bits: BitVector<E::MaxCommitteesPerSlot> =
                    BitVector::new();
                for (committee, (ours, theirs)) in committee_bits
                    .iter()
                    .zip(other_committee_bits.iter())
                    .enumerate()
                {
                    if ours || theirs {
                        merged_committee_bits.set(committee, true)?;
                    }
                }
                let offsets = committee_offsets::<E>(committee_bits, committees_size)?;
                let other_offsets =
                    committee_offsets::<E>(other_committee_bits, committees_size)?;
                let merged_offsets =
                    committee_offsets::<E>(&merged_committee_bits, committees_size)?;

                let mut merged_bits: BitList<E::MaxValidatorsPerSlot> =
                    BitList::with_capacity(total_len(&merged_offsets))?;
                for (committee, (merged_offset, size)) in &merged_offsets {
                    for (source_bits, source_offsets) in
                        [(&*aggregation_bits, &offsets), (other_bits, &other_offsets)]
                    {
                        let Some((source_offset, _)) = source_offsets.get(committee) else {
                            continue;
                        };
                        for i in 0..*size {
                            if source_bits.get(source_offset + i).unwrap_or(false) {
                                merged_bits.set(merged_offset + i, true)?;
                            }
                        }
                    }
                }

                *aggregation_bits = merged_bits;
                *committee_bits = merged_committee_bits;
                Ok(())
            }
            _ => Err(Error::CommitteeLayoutMismatch),
        }
    }
}

/// Lay out the committees named by `committee_bits` within a concatenated aggregation bitlist.
fn committee_offsets<E: EthSpec>(
    committee_bits: &BitVector<E::MaxCommitteesPerSlot>,
    committees_size: &CommitteesSize,
) -> Result<CommitteeOffsets, Error> {
    let mut offsets = CommitteeOffsets::new();
    let mut offset = 0;
    for (committee, bit) in committee_bits.iter().enumerate() {
        if !bit {
            continue;
        }
        let size = *committees_size
            .get(&(committee as CommitteeIndex))
            .ok_or(Error::CommitteeLayoutMismatch)?;
        offsets.insert(committee as CommitteeIndex, (offset, size));
        offset += size;
    }
    Ok(offsets)
}

fn total_len(offsets: &CommitteeOffsets) -> usize {
    offsets.values().map(|(_, size)| size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{base_bits, electra_bits, sizes};
    use types::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[test]
    fn base_disjointness() {
        let a = base_bits::<E>(8, &[1, 3, 5]);
        let b = base_bits::<E>(8, &[0, 2, 4]);
        let c = base_bits::<E>(8, &[1, 2]);

        assert!(a.can_aggregate_with(&b));
        assert!(b.can_aggregate_with(&a));
        assert!(!a.can_aggregate_with(&c));
    }

    #[test]
    fn base_length_mismatch_never_aggregates() {
        let a = base_bits::<E>(8, &[1]);
        let b = base_bits::<E>(16, &[2]);

        assert!(!a.can_aggregate_with(&b));
        assert!(!a.is_superset_of(&b));
        assert_eq!(
            a.clone().or_inplace(&b),
            Err(Error::CommitteeLayoutMismatch)
        );
    }

    #[test]
    fn base_union_and_superset() {
        let mut a = base_bits::<E>(8, &[1, 3]);
        let b = base_bits::<E>(8, &[5, 7]);

        a.or_inplace(&b).unwrap();
        assert_eq!(a, base_bits::<E>(8, &[1, 3, 5, 7]));
        assert!(a.is_superset_of(&b));
        assert!(!b.is_superset_of(&a));
    }

    #[test]
    fn schemas_never_mix() {
        let base = base_bits::<E>(4, &[0]);
        let electra = electra_bits::<E>(&sizes(&[(0, 4)]), &[0], &[1]);

        assert!(!base.can_aggregate_with(&electra));
        assert!(!electra.is_superset_of(&base));
        assert!(base.clone().or_inplace(&electra).is_err());
    }

    #[test]
    fn electra_same_committee() {
        let sizes = sizes(&[(1, 6)]);
        let a = electra_bits::<E>(&sizes, &[1], &[0, 2]);
        let b = electra_bits::<E>(&sizes, &[1], &[1, 3]);
        let c = electra_bits::<E>(&sizes, &[1], &[2]);

        assert!(a.can_aggregate_with(&b));
        assert!(!a.can_aggregate_with(&c));
        assert!(a.is_superset_of(&c));
    }

    #[test]
    fn electra_disjoint_committees_merge() {
        let sizes = sizes(&[(1, 4), (3, 2)]);
        // Committee 3 arrives first; committee order still wins in the merged layout.
        let mut a = electra_bits::<E>(&sizes, &[3], &[0, 1]);
        let b = electra_bits::<E>(&sizes, &[1], &[2]);

        assert!(a.can_aggregate_with(&b));
        a.or_inplace(&b).unwrap();

        // Merged layout: committee 1 occupies bits 0..4, committee 3 occupies bits 4..6.
        assert_eq!(a, electra_bits::<E>(&sizes, &[1, 3], &[2, 4, 5]));
        assert_eq!(a.num_set_bits(), 3);
        assert!(a.has_committee(1));
        assert!(a.has_committee(3));
        assert!(!a.has_committee(2));
    }

    #[test]
    fn electra_shared_committee_overlap_is_rejected() {
        let sizes = sizes(&[(0, 4), (1, 4)]);
        let a = electra_bits::<E>(&sizes, &[0, 1], &[0, 5]);
        // Bit 1 of committee 1 is set in both.
        let b = electra_bits::<E>(&sizes, &[1], &[1]);

        assert!(!a.can_aggregate_with(&b));
    }

    #[test]
    fn electra_shared_committee_disjoint_bits_aggregate() {
        let sizes = sizes(&[(0, 4), (1, 4)]);
        let mut a = electra_bits::<E>(&sizes, &[0, 1], &[0, 5]);
        let b = electra_bits::<E>(&sizes, &[1], &[2]);

        assert!(a.can_aggregate_with(&b));
        a.or_inplace(&b).unwrap();
        assert_eq!(a, electra_bits::<E>(&sizes, &[0, 1], &[0, 5, 6]));
    }

    #[test]
    fn electra_superset_across_layouts() {
        let sizes = sizes(&[(0, 4), (1, 4)]);
        let both = electra_bits::<E>(&sizes, &[0, 1], &[0, 1, 4, 5]);
        let narrow = electra_bits::<E>(&sizes, &[1], &[0, 1]);

        assert!(both.is_superset_of(&narrow));
        assert!(!narrow.is_superset_of(&both));
    }

    #[test]
    fn layout_mismatch_detected_at_capture() {
        use types::{AggregateSignature, Attestation, AttestationData, AttestationElectra};

        let mut committee_bits: BitVector<<E as EthSpec>::MaxCommitteesPerSlot> =
            BitVector::new();
        committee_bits.set(0, true).unwrap();

        // Committee 0 has 4 members, but the bitlist claims 6.
        let attestation = Attestation::<E>::Electra(AttestationElectra {
            aggregation_bits: BitList::with_capacity(6).unwrap(),
            data: AttestationData::default(),
            committee_bits,
            signature: AggregateSignature::empty(),
        });

        let committees = Arc::new(sizes(&[(0, 4)]));
        assert_eq!(
            AttestationBits::<E>::from_attestation(&attestation, Some(&committees)),
            Err(Error::CommitteeLayoutMismatch)
        );
        assert_eq!(
            AttestationBits::<E>::from_attestation(&attestation, None),
            Err(Error::MissingCommitteesSize)
        );
    }
}
