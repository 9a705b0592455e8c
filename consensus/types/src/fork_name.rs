use crate::{ChainSpec, Epoch};
use std::fmt;
use std::str::FromStr;

/// The protocol milestones that change the attestation schema.
///
/// Forks between phase0 and Electra left attestations untouched, so they collapse onto `Base`
/// here. Electra (EIP-7549) moved the committee index out of `AttestationData` and into the
/// `committee_bits` field, enabling multi-committee aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ForkName {
    Base,
    Electra,
}

impl ForkName {
    pub fn list_all() -> Vec<ForkName> {
        vec![ForkName::Base, ForkName::Electra]
    }

    /// Set the activation epochs in the given `ChainSpec` so that the fork named by `self`
    /// is the only fork in effect from genesis.
    pub fn make_genesis_spec(&self, mut spec: ChainSpec) -> ChainSpec {
        match self {
            ForkName::Base => {
                spec.electra_fork_epoch = None;
                spec
            }
            ForkName::Electra => {
                spec.electra_fork_epoch = Some(Epoch::new(0));
                spec
            }
        }
    }

    /// Whether attestations under this fork carry the `committee_bits` field.
    pub fn requires_committee_bits(self) -> bool {
        self >= ForkName::Electra
    }
}

impl FromStr for ForkName {
    type Err = String;

    fn from_str(fork_name: &str) -> Result<Self, String> {
        Ok(match fork_name.to_lowercase().as_str() {
            "phase0" | "base" => ForkName::Base,
            "electra" => ForkName::Electra,
            _ => return Err(format!("unknown fork name: {}", fork_name)),
        })
    }
}

impl fmt::Display for ForkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ForkName::Base => "phase0".fmt(f),
            ForkName::Electra => "electra".fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_ord() {
        assert!(ForkName::Base < ForkName::Electra);
        assert!(!ForkName::Base.requires_committee_bits());
        assert!(ForkName::Electra.requires_committee_bits());
    }

    #[test]
    fn fork_name_round_trip() {
        for fork in ForkName::list_all() {
            assert_eq!(ForkName::from_str(&fork.to_string()), Ok(fork));
        }
    }
}
