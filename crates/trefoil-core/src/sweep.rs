//! Sweep transaction types.

use crate::keyset::SpendingKeyset;
use crate::recovery::PhysicalFactor;
use bitcoin::psbt::Psbt;
use bitcoin::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Which two of the three key-holders co-sign a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignaturePlan {
    AppAndServer,
    HardwareAndServer,
    /// Used for legacy to private-wallet migration; no server co-sign.
    AppAndHardware,
}

impl SignaturePlan {
    /// Whether the remote co-signer takes part.
    pub fn requires_server(&self) -> bool {
        !matches!(self, Self::AppAndHardware)
    }
}

/// Why a sweep is being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepContext {
    /// Dry run for previews. Never registers watch addresses.
    Estimate,
    /// Sweep after a factor-loss recovery; the lost factor cannot sign.
    Recovery(PhysicalFactor),
    /// Sweep of funds found on inactive keysets outside a recovery.
    InactiveWallet,
}

impl SweepContext {
    /// Whether this generation has side effects beyond wallet syncs.
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::Estimate)
    }

    /// Factor known to be lost, if any.
    pub fn lost_factor(&self) -> Option<PhysicalFactor> {
        match self {
            Self::Recovery(factor) => Some(*factor),
            Self::Estimate | Self::InactiveWallet => None,
        }
    }
}

/// An unsigned transaction draining one superseded keyset.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPsbt {
    pub psbt: Psbt,
    pub fee: Amount,
    pub signature_plan: SignaturePlan,
    pub source_keyset: SpendingKeyset,
    pub destination_address: Address,
}

impl SweepPsbt {
    /// Sum of the transaction's outputs.
    pub fn transfer_amount(&self) -> Amount {
        self.psbt
            .unsigned_tx
            .output
            .iter()
            .map(|output| output.value)
            .sum()
    }
}

/// Every sweep transaction needed to drain an account's inactive keysets.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub unsigned_psbts: Vec<SweepPsbt>,
}

impl Sweep {
    /// Wrap generated sweep transactions; `None` when there is nothing to sweep.
    pub fn from_psbts(unsigned_psbts: Vec<SweepPsbt>) -> Option<Self> {
        (!unsigned_psbts.is_empty()).then_some(Self { unsigned_psbts })
    }

    /// Total miner fee across all transactions.
    pub fn total_fee_amount(&self) -> Amount {
        self.unsigned_psbts.iter().map(|psbt| psbt.fee).sum()
    }

    /// Total amount arriving at the destination wallet.
    pub fn total_transfer_amount(&self) -> Amount {
        self.unsigned_psbts
            .iter()
            .map(SweepPsbt::transfer_amount)
            .sum()
    }
}
