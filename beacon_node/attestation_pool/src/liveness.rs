//! Unique-validator liveness accounting over a state's pending attestation lists.
//!
//! A pending attestation only proves liveness of the `(slot, committee, bit)` positions it
//! asserts: the same bit in two different slots (or two different committees of one slot) is two
//! distinct liveness signals, while overlapping bits for the same `(slot, committee)` pair are
//! one.

use crate::metrics;
use itertools::Itertools;
use types::{BeaconState, EthSpec, Hash256, PendingAttestation};

/// Count the unique validators attested for in `attestations`.
pub fn get_live_validators<'a, E: EthSpec>(
    attestations: impl IntoIterator<Item = &'a PendingAttestation<E>>,
) -> u64 {
    attestations
        .into_iter()
        .map(|attestation| {
            (
                (attestation.data.slot, attestation.data.index),
                &attestation.aggregation_bits,
            )
        })
        .into_group_map()
        .into_values()
        .map(|bitlists| {
            let mut bitlists = bitlists.into_iter();
            let first = bitlists
                .next()
                .expect("group map values are non-empty")
                .clone();
            bitlists.fold(first, |union, bits| union.union(bits)).num_set_bits() as u64
        })
        .sum()
}

/// Count the unique validators whose attestations voted for the correct target checkpoint.
///
/// The correct target for an attestation is the block root at the start slot of its target
/// epoch. When that slot is not yet part of the state's root history (a state sitting exactly on
/// the epoch boundary), the head block root is the one being voted on.
pub fn get_correct_validators<'a, E: EthSpec>(
    state: &BeaconState<E>,
    head_block_root: Hash256,
    attestations: impl IntoIterator<Item = &'a PendingAttestation<E>>,
) -> u64 {
    get_live_validators(attestations.into_iter().filter(|attestation| {
        let epoch_start_slot = attestation
            .data
            .target
            .epoch
            .start_slot(E::slots_per_epoch());
        let actual_root = if epoch_start_slot >= state.slot {
            head_block_root
        } else {
            match state.get_block_root(epoch_start_slot) {
                Ok(root) => *root,
                Err(_) => return false,
            }
        };
        attestation.data.target.root == actual_root
    }))
}

/// Update the liveness gauges from `state`.
pub fn scrape_for_metrics<E: EthSpec>(state: &BeaconState<E>, head_block_root: Hash256) {
    metrics::set_gauge(
        &metrics::CURRENT_LIVE_VALIDATORS,
        get_live_validators(state.current_epoch_attestations.iter()) as i64,
    );
    metrics::set_gauge(
        &metrics::PREVIOUS_LIVE_VALIDATORS,
        get_live_validators(state.previous_epoch_attestations.iter()) as i64,
    );
    metrics::set_gauge(
        &metrics::CURRENT_CORRECT_VALIDATORS,
        get_correct_validators(state, head_block_root, state.current_epoch_attestations.iter())
            as i64,
    );
    metrics::set_gauge(
        &metrics::PREVIOUS_CORRECT_VALIDATORS,
        get_correct_validators(
            state,
            head_block_root,
            state.previous_epoch_attestations.iter(),
        ) as i64,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::pending_attestation;
    use types::{BeaconState, Checkpoint, Epoch, Hash256, MainnetEthSpec, Slot};

    type E = MainnetEthSpec;

    #[test]
    fn same_bits_in_different_slots_count_separately() {
        let attestations = vec![
            pending_attestation::<E>(13, 1, &[1, 3, 5, 7]),
            pending_attestation::<E>(14, 1, &[1, 3, 5, 7]),
        ];
        assert_eq!(get_live_validators::<E>(&attestations), 8);
    }

    #[test]
    fn same_bits_in_different_committees_count_separately() {
        let attestations = vec![
            pending_attestation::<E>(13, 1, &[1, 3, 5, 7]),
            pending_attestation::<E>(13, 2, &[1, 3, 5, 7]),
        ];
        assert_eq!(get_live_validators::<E>(&attestations), 8);
    }

    #[test]
    fn overlapping_bits_in_same_slot_and_committee_deduplicate() {
        let attestations = vec![
            pending_attestation::<E>(13, 1, &[1, 3, 5, 7]),
            pending_attestation::<E>(13, 1, &[1, 2, 3, 4]),
        ];
        assert_eq!(get_live_validators::<E>(&attestations), 6);
    }

    #[test]
    fn only_correct_target_votes_are_counted() {
        let block_root = Hash256::repeat_byte(0xaa);
        let target = Checkpoint {
            epoch: Slot::new(13).epoch(E::slots_per_epoch()),
            root: block_root,
        };
        let wrong_target = Checkpoint {
            epoch: target.epoch,
            root: Hash256::repeat_byte(0xbb),
        };

        let mut state = BeaconState::<E>::default();
        state.slot = Slot::new(15);
        let epoch_start_slot = target.epoch.start_slot(E::slots_per_epoch());
        state.block_roots[epoch_start_slot.as_usize() % E::slots_per_historical_root()] =
            block_root;

        let mut correct = pending_attestation::<E>(13, 1, &[1, 3, 5, 7]);
        correct.data.target = target;
        let mut incorrect = pending_attestation::<E>(13, 1, &[2, 4, 6, 8]);
        incorrect.data.target = wrong_target;

        let attestations = vec![correct, incorrect];
        assert_eq!(
            get_correct_validators(&state, Hash256::repeat_byte(0xcc), &attestations),
            4
        );
        assert_eq!(get_live_validators::<E>(&attestations), 8);
    }

    #[test]
    fn state_at_the_target_epoch_boundary_uses_the_head_root() {
        let head_root = Hash256::repeat_byte(0xaa);
        let epoch = Epoch::new(1);
        let slot = epoch.start_slot(E::slots_per_epoch());

        let mut state = BeaconState::<E>::default();
        state.slot = slot;

        let mut attestation = pending_attestation::<E>(slot.as_u64(), 1, &[1, 3, 5, 7]);
        attestation.data.target = Checkpoint {
            epoch,
            root: head_root,
        };

        let attestations = vec![attestation];
        assert_eq!(get_correct_validators(&state, head_root, &attestations), 4);
        assert_eq!(
            get_correct_validators(&state, Hash256::repeat_byte(0xbb), &attestations),
            0
        );
    }

    #[test]
    fn scrape_sets_all_gauges() {
        let mut state = BeaconState::<E>::default();
        state.slot = Slot::new(100);
        state
            .current_epoch_attestations
            .push(pending_attestation::<E>(98, 0, &[0, 1]))
            .unwrap();

        scrape_for_metrics(&state, Hash256::repeat_byte(0xaa));
    }
}
