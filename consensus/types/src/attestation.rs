use crate::{AggregateSignature, AttestationData, BitList, BitVector, EthSpec};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz::Decode;
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq)]
pub enum Error {
    SszTypesError(ssz_types::Error),
    IncorrectStateVariant,
}

/// A validator vote on a chain head and checkpoint pair, with a bitlist identifying the committee
/// members that signed it.
///
/// The `Base` variant is the phase0 schema where `data.index` names the committee. The `Electra`
/// variant (EIP-7549) sets `data.index` to zero and identifies the participating committees via
/// `committee_bits`; its aggregation bits span every participating committee, concatenated in
/// committee order.
#[superstruct(
    variants(Base, Electra),
    variant_attributes(
        derive(Debug, Clone, Serialize, Deserialize, Decode, Encode, TreeHash, Derivative),
        derivative(PartialEq, Hash(bound = "E: EthSpec")),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    cast_error(ty = "Error", expr = "Error::IncorrectStateVariant"),
    partial_getter_error(ty = "Error", expr = "Error::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Hash(bound = "E: EthSpec"))]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct Attestation<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "aggregation_bits_base"))]
    pub aggregation_bits: BitList<E::MaxValidatorsPerCommittee>,
    #[superstruct(only(Electra), partial_getter(rename = "aggregation_bits_electra"))]
    pub aggregation_bits: BitList<E::MaxValidatorsPerSlot>,
    pub data: AttestationData,
    #[superstruct(only(Electra))]
    pub committee_bits: BitVector<E::MaxCommitteesPerSlot>,
    pub signature: AggregateSignature,
}

impl<E: EthSpec> Decode for Attestation<E> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ssz::DecodeError> {
        if let Ok(result) = AttestationBase::from_ssz_bytes(bytes) {
            return Ok(Attestation::Base(result));
        }

        if let Ok(result) = AttestationElectra::from_ssz_bytes(bytes) {
            return Ok(Attestation::Electra(result));
        }

        Err(ssz::DecodeError::BytesInvalid(String::from(
            "bytes not valid for any fork variant",
        )))
    }
}

impl<E: EthSpec> Attestation<E> {
    /// True when this attestation uses the post-Electra schema.
    pub fn requires_committee_bits(&self) -> bool {
        matches!(self, Attestation::Electra(_))
    }

    /// The index of the (first) committee this attestation covers.
    pub fn committee_index(&self) -> u64 {
        match self {
            Attestation::Base(att) => att.data.index,
            Attestation::Electra(att) => att.committee_index(),
        }
    }

    pub fn num_set_aggregation_bits(&self) -> usize {
        match self {
            Attestation::Base(att) => att.aggregation_bits.num_set_bits(),
            Attestation::Electra(att) => att.aggregation_bits.num_set_bits(),
        }
    }

    pub fn is_aggregation_bits_zero(&self) -> bool {
        match self {
            Attestation::Base(att) => att.aggregation_bits.is_zero(),
            Attestation::Electra(att) => att.aggregation_bits.is_zero(),
        }
    }
}

impl<E: EthSpec> AttestationElectra<E> {
    pub fn committee_index(&self) -> u64 {
        *self.get_committee_indices().first().unwrap_or(&0u64)
    }

    /// The indices of all committees this attestation covers, ascending.
    pub fn get_committee_indices(&self) -> Vec<u64> {
        self.committee_bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| if bit { Some(index as u64) } else { None })
            .collect()
    }
}
