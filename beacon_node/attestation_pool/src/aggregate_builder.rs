use crate::attestation_bits::AttestationBits;
use crate::attestation_group::PooledAttestation;
use crate::Error;
use types::{AggregateSignature, EthSpec};

/// Combines opaque aggregate-signature blobs.
///
/// The pool treats signatures as bytes; the host supplies the actual BLS point addition through
/// this capability. `combine` must allocate a fresh blob and never mutate its inputs.
pub trait SignatureAggregator: Send + Sync {
    fn combine(&self, signatures: &[&AggregateSignature]) -> AggregateSignature;
}

/// Greedily accumulates bit-disjoint attestations over the same data into a single aggregate.
///
/// Feed it candidates in preference order via [`Self::aggregate`]; candidates whose signers
/// overlap the accumulator are refused and can be offered to a later builder pass.
pub struct AggregateAttestationBuilder<'a, E: EthSpec> {
    included_attestations: Vec<&'a PooledAttestation<E>>,
    current_bits: Option<AttestationBits<E>>,
}

impl<'a, E: EthSpec> AggregateAttestationBuilder<'a, E> {
    pub fn new() -> Self {
        Self {
            included_attestations: Vec::new(),
            current_bits: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.included_attestations.is_empty()
    }

    /// The attestations absorbed so far.
    pub fn included_attestations(&self) -> &[&'a PooledAttestation<E>] {
        &self.included_attestations
    }

    /// Absorb `attestation` if its signers are disjoint from the accumulator.
    ///
    /// Returns whether the attestation was absorbed. The first attestation seeds the accumulator
    /// and is always absorbed.
    pub fn aggregate(&mut self, attestation: &'a PooledAttestation<E>) -> Result<bool, Error> {
        match &mut self.current_bits {
            None => self.current_bits = Some(attestation.bits.clone()),
            Some(bits) => {
                if !bits.can_aggregate_with(&attestation.bits) {
                    return Ok(false);
                }
                bits.or_inplace(&attestation.bits)?;
            }
        }
        self.included_attestations.push(attestation);
        Ok(true)
    }

    /// Produce the aggregate, combining the absorbed signatures.
    ///
    /// Building with nothing aggregated indicates a bug in the caller.
    pub fn build(self, aggregator: &dyn SignatureAggregator) -> Result<PooledAttestation<E>, Error> {
        let bits = self.current_bits.ok_or(Error::EmptyAggregate)?;

        let signatures = self
            .included_attestations
            .iter()
            .map(|attestation| &attestation.signature)
            .collect::<Vec<_>>();
        let signature = match signatures.as_slice() {
            [single] => **single,
            _ => aggregator.combine(&signatures),
        };

        Ok(PooledAttestation { bits, signature })
    }
}

impl<'a, E: EthSpec> Default for AggregateAttestationBuilder<'a, E> {
    fn default() -> Self {
        Self::new()
    }
}
