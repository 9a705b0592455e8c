use crate::{
    Checkpoint, Epoch, EthSpec, FixedVector, Hash256, PendingAttestation, Slot, Unsigned,
    VariableList,
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    SlotOutOfBounds,
}

/// The state of the beacon chain, trimmed to the fields attestation handling reads.
///
/// Block packing needs the slot, the previous-epoch inclusion capacity and (indirectly, through
/// the injected validity check) the justified checkpoints; the liveness counters additionally
/// read the historical block roots and the pending attestation lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash, Derivative)]
#[derivative(PartialEq)]
#[serde(bound = "E: EthSpec")]
pub struct BeaconState<E: EthSpec> {
    pub slot: Slot,
    pub block_roots: FixedVector<Hash256, E::SlotsPerHistoricalRoot>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub previous_epoch_attestations: VariableList<PendingAttestation<E>, E::MaxPendingAttestations>,
    pub current_epoch_attestations: VariableList<PendingAttestation<E>, E::MaxPendingAttestations>,
}

impl<E: EthSpec> BeaconState<E> {
    /// The epoch corresponding to `self.slot`.
    pub fn current_epoch(&self) -> Epoch {
        self.slot.epoch(E::slots_per_epoch())
    }

    /// The epoch prior to `self.current_epoch()`, clamped to the genesis epoch.
    pub fn previous_epoch(&self) -> Epoch {
        let current_epoch = self.current_epoch();
        if current_epoch > E::genesis_epoch() {
            current_epoch - 1
        } else {
            current_epoch
        }
    }

    /// Return the block root at a recent `slot`.
    ///
    /// Only roots strictly prior to `self.slot` and within `SLOTS_PER_HISTORICAL_ROOT` are
    /// available.
    pub fn get_block_root(&self, slot: Slot) -> Result<&Hash256, Error> {
        if slot < self.slot && self.slot <= slot + E::SlotsPerHistoricalRoot::to_u64() {
            Ok(&self.block_roots[slot.as_usize() % E::slots_per_historical_root()])
        } else {
            Err(Error::SlotOutOfBounds)
        }
    }

    /// How many more attestations targeting the previous epoch a block built on this state may
    /// include.
    ///
    /// The `previous_epoch_attestations` list is bounded, so a block can only append what is left
    /// of that bound.
    pub fn previous_epoch_attestation_capacity(&self) -> usize {
        E::max_pending_attestations().saturating_sub(self.previous_epoch_attestations.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;

    type E = MinimalEthSpec;

    #[test]
    fn block_root_bounds() {
        let mut state = BeaconState::<E>::default();
        state.slot = Slot::new(10);

        assert!(state.get_block_root(Slot::new(9)).is_ok());
        assert!(state.get_block_root(Slot::new(0)).is_ok());
        // The state's own slot is not yet in the history.
        assert_eq!(
            state.get_block_root(Slot::new(10)),
            Err(Error::SlotOutOfBounds)
        );

        // Too old once the history has wrapped.
        let mut state = BeaconState::<E>::default();
        state.slot = Slot::new(100);
        assert_eq!(
            state.get_block_root(Slot::new(100 - 65)),
            Err(Error::SlotOutOfBounds)
        );
        assert!(state.get_block_root(Slot::new(100 - 64)).is_ok());
    }

    #[test]
    fn previous_epoch_capacity_shrinks_as_attestations_accumulate() {
        let mut state = BeaconState::<E>::default();
        assert_eq!(
            state.previous_epoch_attestation_capacity(),
            E::max_pending_attestations()
        );

        state
            .previous_epoch_attestations
            .push(PendingAttestation {
                aggregation_bits: crate::BitList::with_capacity(4).unwrap(),
                data: crate::AttestationData::default(),
                inclusion_delay: Slot::new(1),
                proposer_index: 0,
            })
            .unwrap();
        assert_eq!(
            state.previous_epoch_attestation_capacity(),
            E::max_pending_attestations() - 1
        );
    }

    #[test]
    fn previous_epoch_clamps_at_genesis() {
        let mut state = BeaconState::<E>::default();
        assert_eq!(state.previous_epoch(), Epoch::new(0));

        state.slot = Epoch::new(3).start_slot(E::slots_per_epoch());
        assert_eq!(state.previous_epoch(), Epoch::new(2));
    }
}
