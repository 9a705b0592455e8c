use crate::{Epoch, EthSpec, ForkName, Slot};
use serde::{Deserialize, Serialize};

/// The subset of the chain configuration that attestation handling depends on.
///
/// Fork activations are scheduled by epoch; `None` means the fork never activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub genesis_slot: Slot,
    pub electra_fork_epoch: Option<Epoch>,
}

impl ChainSpec {
    /// Ethereum Foundation mainnet configuration.
    pub fn mainnet() -> Self {
        Self {
            genesis_slot: Slot::new(0),
            electra_fork_epoch: Some(Epoch::new(364032)),
        }
    }

    /// The minimal (testing) configuration, with the same fork schedule as mainnet.
    pub fn minimal() -> Self {
        Self {
            electra_fork_epoch: Some(Epoch::new(364032)),
            ..Self::mainnet()
        }
    }

    /// Returns the name of the fork which is active at `slot`.
    pub fn fork_name_at_slot<E: EthSpec>(&self, slot: Slot) -> ForkName {
        self.fork_name_at_epoch(slot.epoch(E::slots_per_epoch()))
    }

    /// Returns the name of the fork which is active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        match self.electra_fork_epoch {
            Some(fork_epoch) if epoch >= fork_epoch => ForkName::Electra,
            _ => ForkName::Base,
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    #[test]
    fn fork_name_at_slot() {
        let spec = ChainSpec {
            genesis_slot: Slot::new(0),
            electra_fork_epoch: Some(Epoch::new(2)),
        };
        let slots_per_epoch = MainnetEthSpec::slots_per_epoch();

        assert_eq!(
            spec.fork_name_at_slot::<MainnetEthSpec>(Slot::new(0)),
            ForkName::Base
        );
        assert_eq!(
            spec.fork_name_at_slot::<MainnetEthSpec>(Slot::new(2 * slots_per_epoch - 1)),
            ForkName::Base
        );
        assert_eq!(
            spec.fork_name_at_slot::<MainnetEthSpec>(Slot::new(2 * slots_per_epoch)),
            ForkName::Electra
        );
    }

    #[test]
    fn fork_never_scheduled() {
        let spec = ForkName::Base.make_genesis_spec(ChainSpec::mainnet());
        assert_eq!(spec.fork_name_at_epoch(Epoch::max_value()), ForkName::Base);
    }
}
