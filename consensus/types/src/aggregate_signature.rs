use crate::Hash256;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;

/// The byte-length of a BLS aggregate signature when serialized.
pub const SIGNATURE_BYTES_LEN: usize = 96;

/// An opaque aggregate signature.
///
/// The pool never verifies signatures (callers must provide already-validated attestations) and
/// never inspects their structure; it only carries the bytes and hands them to a
/// `SignatureAggregator` when attestations are merged. Keeping the type opaque keeps all
/// cryptography out of this workspace.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregateSignature([u8; SIGNATURE_BYTES_LEN]);

impl AggregateSignature {
    /// A signature over nothing, used as the starting point for aggregation.
    pub fn empty() -> Self {
        Self([0; SIGNATURE_BYTES_LEN])
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != SIGNATURE_BYTES_LEN {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: SIGNATURE_BYTES_LEN,
            });
        }
        let mut sig = [0; SIGNATURE_BYTES_LEN];
        sig.copy_from_slice(bytes);
        Ok(Self(sig))
    }

    pub fn serialize(&self) -> [u8; SIGNATURE_BYTES_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for AggregateSignature {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for AggregateSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", serde_utils::hex::encode(self.0))
    }
}

impl fmt::Display for AggregateSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", serde_utils::hex::encode(self.0))
    }
}

impl Encode for AggregateSignature {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn ssz_bytes_len(&self) -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0)
    }
}

impl Decode for AggregateSignature {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::deserialize(bytes)
    }
}

impl tree_hash::TreeHash for AggregateSignature {
    fn tree_hash_type() -> tree_hash::TreeHashType {
        tree_hash::TreeHashType::Vector
    }

    fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
        unreachable!("Vector should not be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("Vector should not be packed.")
    }

    fn tree_hash_root(&self) -> Hash256 {
        tree_hash::merkle_root(&self.0, 0)
    }
}

impl Serialize for AggregateSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&serde_utils::hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for AggregateSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = deserializer.deserialize_str(serde_utils::hex::PrefixedHexVisitor)?;
        Self::deserialize(&bytes).map_err(|e| serde::de::Error::custom(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssz_round_trip() {
        let mut bytes = [0; SIGNATURE_BYTES_LEN];
        bytes[0] = 0xc0;
        bytes[95] = 0x42;
        let sig = AggregateSignature::deserialize(&bytes).unwrap();

        assert_eq!(sig.as_ssz_bytes().len(), SIGNATURE_BYTES_LEN);
        assert_eq!(
            AggregateSignature::from_ssz_bytes(&sig.as_ssz_bytes()).unwrap(),
            sig
        );
    }

    #[test]
    fn rejects_bad_length() {
        assert!(AggregateSignature::deserialize(&[0; 95]).is_err());
        assert!(AggregateSignature::deserialize(&[0; 97]).is_err());
    }
}
