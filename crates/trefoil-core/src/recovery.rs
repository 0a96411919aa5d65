//! Recovery records and the canonical `Recovery` status.
//!
//! Two records are persisted independently: the local attempt (what this
//! device has done) and the server snapshot (what the remote authority
//! currently believes). The canonical status is derived from both.

use crate::identifiers::FullAccountId;
use crate::keys::{
    AppGlobalAuthPublicKey, AppKeyBundle, AppRecoveryAuthPublicKey, HwAuthPublicKey, HwKeyBundle,
    SealedCsek,
};
use crate::keyset::F8eSpendingKeyset;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The factor a customer has lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalFactor {
    App,
    Hardware,
}

/// The remote authority's view of an in-progress Delay & Notify recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecovery {
    pub full_account_id: FullAccountId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub lost_factor: PhysicalFactor,
    pub destination_app_global_auth_pub_key: AppGlobalAuthPublicKey,
    pub destination_app_recovery_auth_pub_key: AppRecoveryAuthPublicKey,
    pub destination_hardware_auth_pub_key: HwAuthPublicKey,
}

impl ServerRecovery {
    /// Time left in the delay window, zero once it has elapsed.
    pub fn delay_remaining(&self, now: DateTime<Utc>) -> Duration {
        let remaining = self.end_time - now;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }

    /// Whether the delay window has elapsed and completion may proceed.
    pub fn is_delay_complete(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    /// Whether the snapshot names exactly the destination auth keys of a
    /// local attempt.
    pub fn has_destination_keys_of(&self, attempt: &LocalRecoveryAttempt) -> bool {
        self.destination_app_global_auth_pub_key == attempt.app_key_bundle.auth_key
            && self.destination_hardware_auth_pub_key == attempt.hw_key_bundle.auth_key
    }
}

/// A milestone reached by the local recovery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalRecoveryAttemptProgress {
    /// New key bundles exist locally; the remote has not necessarily seen them.
    CreatedPendingKeybundles {
        full_account_id: FullAccountId,
        lost_factor: PhysicalFactor,
        app_key_bundle: AppKeyBundle,
        hw_key_bundle: HwKeyBundle,
    },
    /// About to ask the remote to complete the recovery.
    AttemptingCompletion { sealed_csek: SealedCsek },
    /// The remote refused completion because the recovery no longer exists.
    CompletionAttemptFailedDueToServerCancellation,
    /// The remote accepted completion; new auth keys are in effect.
    RotatedAuthKeys,
    /// A new spending keyset was created with the remote.
    RotatedSpendingKeys { f8e_spending_keyset: F8eSpendingKeyset },
    /// The new keybox was backed up to cloud storage.
    BackedUpToCloud,
    /// Funds were swept out of superseded keysets; the recovery is over.
    SweptFunds,
}

impl LocalRecoveryAttemptProgress {
    /// Short stable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreatedPendingKeybundles { .. } => "created_pending_keybundles",
            Self::AttemptingCompletion { .. } => "attempting_completion",
            Self::CompletionAttemptFailedDueToServerCancellation => {
                "completion_attempt_failed_due_to_server_cancellation"
            }
            Self::RotatedAuthKeys => "rotated_auth_keys",
            Self::RotatedSpendingKeys { .. } => "rotated_spending_keys",
            Self::BackedUpToCloud => "backed_up_to_cloud",
            Self::SweptFunds => "swept_funds",
        }
    }
}

/// A milestone could not be applied because its predecessor is missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot record {milestone}: {reason}")]
pub struct OutOfOrderProgress {
    pub milestone: &'static str,
    pub reason: &'static str,
}

/// Persisted state of the local recovery attempt.
///
/// Each milestone fills in the fields needed to resume from it; a later
/// field is never set without all earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecoveryAttempt {
    pub full_account_id: FullAccountId,
    pub lost_factor: PhysicalFactor,
    pub app_key_bundle: AppKeyBundle,
    pub hw_key_bundle: HwKeyBundle,
    /// Sticky: once a server snapshot was observed for this attempt it stays
    /// set, distinguishing "canceled" from "never confirmed".
    pub had_server_recovery: bool,
    pub sealed_csek: Option<SealedCsek>,
    pub auth_keys_rotated: bool,
    pub server_spending_keyset: Option<F8eSpendingKeyset>,
    pub backed_up_to_cloud: bool,
}

impl LocalRecoveryAttempt {
    /// Whether the attempt no longer depends on the remote's agreement.
    pub fn is_server_independent(&self) -> bool {
        self.auth_keys_rotated
    }

    /// Apply a milestone to the current attempt.
    ///
    /// Returns the new attempt, or `None` when the milestone ends the
    /// recovery.
    pub fn apply(
        current: Option<&LocalRecoveryAttempt>,
        progress: LocalRecoveryAttemptProgress,
    ) -> Result<Option<LocalRecoveryAttempt>, OutOfOrderProgress> {
        let milestone = progress.name();
        let out_of_order = |reason| OutOfOrderProgress { milestone, reason };

        let require = || {
            current
                .cloned()
                .ok_or_else(|| out_of_order("no local recovery attempt"))
        };

        let attempt = match progress {
            LocalRecoveryAttemptProgress::CreatedPendingKeybundles {
                full_account_id,
                lost_factor,
                app_key_bundle,
                hw_key_bundle,
            } => LocalRecoveryAttempt {
                // Replaces whatever attempt existed before.
                full_account_id,
                lost_factor,
                app_key_bundle,
                hw_key_bundle,
                had_server_recovery: false,
                sealed_csek: None,
                auth_keys_rotated: false,
                server_spending_keyset: None,
                backed_up_to_cloud: false,
            },
            LocalRecoveryAttemptProgress::AttemptingCompletion { sealed_csek } => {
                let mut attempt = require()?;
                if attempt.auth_keys_rotated {
                    return Err(out_of_order("auth keys already rotated"));
                }
                attempt.sealed_csek = Some(sealed_csek);
                attempt
            }
            LocalRecoveryAttemptProgress::CompletionAttemptFailedDueToServerCancellation => {
                let mut attempt = require()?;
                if attempt.auth_keys_rotated {
                    return Err(out_of_order("auth keys already rotated"));
                }
                attempt.sealed_csek = None;
                attempt.had_server_recovery = true;
                attempt
            }
            LocalRecoveryAttemptProgress::RotatedAuthKeys => {
                let mut attempt = require()?;
                if attempt.sealed_csek.is_none() {
                    return Err(out_of_order("completion was never attempted"));
                }
                attempt.auth_keys_rotated = true;
                attempt
            }
            LocalRecoveryAttemptProgress::RotatedSpendingKeys {
                f8e_spending_keyset,
            } => {
                let mut attempt = require()?;
                if !attempt.auth_keys_rotated {
                    return Err(out_of_order("auth keys not rotated"));
                }
                attempt.server_spending_keyset = Some(f8e_spending_keyset);
                attempt
            }
            LocalRecoveryAttemptProgress::BackedUpToCloud => {
                let mut attempt = require()?;
                if attempt.server_spending_keyset.is_none() {
                    return Err(out_of_order("spending keys not rotated"));
                }
                attempt.backed_up_to_cloud = true;
                attempt
            }
            LocalRecoveryAttemptProgress::SweptFunds => {
                if !require()?.backed_up_to_cloud {
                    return Err(out_of_order("cloud backup not completed"));
                }
                return Ok(None);
            }
        };

        Ok(Some(attempt))
    }
}

/// Canonical reconciled recovery status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Not yet determined. Only ever the first value of a status stream.
    Loading,
    /// Nothing in progress.
    NoActiveRecovery,
    /// The remote has a recovery this device did not start.
    SomeoneElseIsRecovering { lost_factor: PhysicalFactor },
    /// This device started a recovery the remote no longer agrees with.
    NoLongerRecovering { lost_factor: PhysicalFactor },
    /// This device's recovery is still in progress.
    StillRecovering(StillRecovering),
}

impl Recovery {
    /// The in-progress recovery, if any.
    pub fn still_recovering(&self) -> Option<&StillRecovering> {
        match self {
            Self::StillRecovering(still) => Some(still),
            _ => None,
        }
    }
}

/// A recovery this device is still working through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StillRecovering {
    ServerDependent(ServerDependentRecovery),
    ServerIndependent(ServerIndependentRecovery),
    /// Completion was attempted but the server snapshot is gone; whether the
    /// remote completed or canceled is unknown until checked.
    MaybeNoLongerRecovering(MaybeNoLongerRecovering),
}

/// Recovery phases that still require the remote's agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerDependentRecovery {
    InitiatedRecovery(InitiatedRecovery),
}

/// Recovery pending the remote's delay window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedRecovery {
    pub full_account_id: FullAccountId,
    pub lost_factor: PhysicalFactor,
    pub app_key_bundle: AppKeyBundle,
    pub hw_key_bundle: HwKeyBundle,
    pub server_recovery: ServerRecovery,
}

/// Artifacts carried by every server-independent phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIndependentProgress {
    pub full_account_id: FullAccountId,
    pub lost_factor: PhysicalFactor,
    pub app_key_bundle: AppKeyBundle,
    pub hw_key_bundle: HwKeyBundle,
    pub sealed_csek: SealedCsek,
}

/// Recovery phases after the remote accepted completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerIndependentRecovery {
    RotatedAuthKeys(ServerIndependentProgress),
    CreatedSpendingKeys {
        progress: ServerIndependentProgress,
        f8e_spending_keyset: F8eSpendingKeyset,
    },
    BackedUpToCloud {
        progress: ServerIndependentProgress,
        f8e_spending_keyset: F8eSpendingKeyset,
    },
}

/// Ambiguous outcome after a completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeNoLongerRecovering {
    pub full_account_id: FullAccountId,
    pub lost_factor: PhysicalFactor,
    pub app_key_bundle: AppKeyBundle,
    pub hw_key_bundle: HwKeyBundle,
    pub sealed_csek: SealedCsek,
}
