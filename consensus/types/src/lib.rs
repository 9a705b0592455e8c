//! Ethereum consensus types used by the attestation aggregation pool.
//!
//! This crate is a deliberately narrow slice of the consensus type system: it contains the
//! containers an attestation pool handles (attestations in both the pre- and post-Electra
//! schemas, pending attestations, checkpoints) and a `BeaconState` trimmed to the fields block
//! packing and liveness accounting read. Everything SSZ-encodes and tree-hashes the way the full
//! types do, so hash-tree-roots computed here match the wire.

pub mod aggregate_signature;
pub mod attestation;
pub mod attestation_data;
pub mod beacon_state;
pub mod chain_spec;
pub mod checkpoint;
pub mod eth_spec;
pub mod fork_name;
pub mod pending_attestation;
pub mod slot_epoch;

pub use crate::aggregate_signature::{AggregateSignature, SIGNATURE_BYTES_LEN};
pub use crate::attestation::{
    Attestation, AttestationBase, AttestationElectra, AttestationRef, AttestationRefMut,
};
pub use crate::attestation_data::AttestationData;
pub use crate::beacon_state::BeaconState;
pub use crate::chain_spec::ChainSpec;
pub use crate::checkpoint::Checkpoint;
pub use crate::eth_spec::{EthSpec, EthSpecId, MainnetEthSpec, MinimalEthSpec};
pub use crate::fork_name::ForkName;
pub use crate::pending_attestation::PendingAttestation;
pub use crate::slot_epoch::{Epoch, Slot};

pub use ssz_types::{typenum, typenum::Unsigned, BitList, BitVector, FixedVector, VariableList};

pub type Hash256 = alloy_primitives::B256;
pub type CommitteeIndex = u64;
