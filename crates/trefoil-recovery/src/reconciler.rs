//! Recovery reconciliation
//!
//! Merges the local attempt and the server snapshot into the canonical
//! [`Recovery`] status. Pure and deterministic: ambiguity is expressed as a
//! status variant, never as an error.

use trefoil_core::recovery::{
    InitiatedRecovery, LocalRecoveryAttempt, MaybeNoLongerRecovering, Recovery,
    ServerDependentRecovery, ServerIndependentProgress, ServerIndependentRecovery, ServerRecovery,
    StillRecovering,
};

/// Derive the canonical recovery status from the two persisted records.
pub fn reconcile(
    local_attempt: Option<&LocalRecoveryAttempt>,
    server_recovery: Option<&ServerRecovery>,
) -> Recovery {
    let Some(attempt) = local_attempt else {
        return match server_recovery {
            Some(server) => Recovery::SomeoneElseIsRecovering {
                lost_factor: server.lost_factor,
            },
            None => Recovery::NoActiveRecovery,
        };
    };

    if let Some(independent) = server_independent(attempt) {
        return Recovery::StillRecovering(StillRecovering::ServerIndependent(independent));
    }

    match server_recovery {
        None => {
            if let Some(sealed_csek) = &attempt.sealed_csek {
                Recovery::StillRecovering(StillRecovering::MaybeNoLongerRecovering(
                    MaybeNoLongerRecovering {
                        full_account_id: attempt.full_account_id.clone(),
                        lost_factor: attempt.lost_factor,
                        app_key_bundle: attempt.app_key_bundle.clone(),
                        hw_key_bundle: attempt.hw_key_bundle.clone(),
                        sealed_csek: sealed_csek.clone(),
                    },
                ))
            } else if attempt.had_server_recovery {
                Recovery::NoLongerRecovering {
                    lost_factor: attempt.lost_factor,
                }
            } else {
                Recovery::NoActiveRecovery
            }
        }
        Some(server) if server.has_destination_keys_of(attempt) => Recovery::StillRecovering(
            StillRecovering::ServerDependent(ServerDependentRecovery::InitiatedRecovery(
                InitiatedRecovery {
                    full_account_id: attempt.full_account_id.clone(),
                    lost_factor: server.lost_factor,
                    app_key_bundle: attempt.app_key_bundle.clone(),
                    hw_key_bundle: attempt.hw_key_bundle.clone(),
                    server_recovery: server.clone(),
                },
            )),
        ),
        Some(server) => Recovery::NoLongerRecovering {
            lost_factor: server.lost_factor,
        },
    }
}

fn server_independent(attempt: &LocalRecoveryAttempt) -> Option<ServerIndependentRecovery> {
    if !attempt.auth_keys_rotated {
        return None;
    }
    // Rotation is only ever recorded after the sealed key, so this is present.
    let progress = ServerIndependentProgress {
        full_account_id: attempt.full_account_id.clone(),
        lost_factor: attempt.lost_factor,
        app_key_bundle: attempt.app_key_bundle.clone(),
        hw_key_bundle: attempt.hw_key_bundle.clone(),
        sealed_csek: attempt.sealed_csek.clone()?,
    };

    Some(match &attempt.server_spending_keyset {
        None => ServerIndependentRecovery::RotatedAuthKeys(progress),
        Some(keyset) if attempt.backed_up_to_cloud => ServerIndependentRecovery::BackedUpToCloud {
            progress,
            f8e_spending_keyset: keyset.clone(),
        },
        Some(keyset) => ServerIndependentRecovery::CreatedSpendingKeys {
            progress,
            f8e_spending_keyset: keyset.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use trefoil_core::recovery::PhysicalFactor;
    use trefoil_core::{AppGlobalAuthPublicKey, SealedCsek};
    use trefoil_testkit::fixtures::{local_attempt, matching_server_recovery, spending_keyset};

    #[test]
    fn no_records_means_no_recovery() {
        assert_eq!(reconcile(None, None), Recovery::NoActiveRecovery);
    }

    #[test]
    fn remote_only_recovery_is_someone_else() {
        let attempt = local_attempt(PhysicalFactor::App);
        let server = matching_server_recovery(&attempt);
        assert_eq!(
            reconcile(None, Some(&server)),
            Recovery::SomeoneElseIsRecovering {
                lost_factor: PhysicalFactor::App
            }
        );
    }

    #[test]
    fn unconfirmed_attempt_without_server_is_no_recovery() {
        let attempt = local_attempt(PhysicalFactor::App);
        assert_eq!(reconcile(Some(&attempt), None), Recovery::NoActiveRecovery);
    }

    #[test]
    fn confirmed_attempt_without_server_is_no_longer_recovering() {
        let mut attempt = local_attempt(PhysicalFactor::Hardware);
        attempt.had_server_recovery = true;
        assert_eq!(
            reconcile(Some(&attempt), None),
            Recovery::NoLongerRecovering {
                lost_factor: PhysicalFactor::Hardware
            }
        );
    }

    #[test]
    fn sealed_key_without_server_is_maybe_no_longer_recovering() {
        let mut attempt = local_attempt(PhysicalFactor::Hardware);
        attempt.had_server_recovery = true;
        attempt.sealed_csek = Some(SealedCsek(vec![7]));
        assert_matches!(
            reconcile(Some(&attempt), None),
            Recovery::StillRecovering(StillRecovering::MaybeNoLongerRecovering(m))
                if m.sealed_csek == SealedCsek(vec![7])
        );
    }

    #[test]
    fn server_independent_attempt_ignores_server() {
        let mut attempt = local_attempt(PhysicalFactor::App);
        attempt.sealed_csek = Some(SealedCsek(vec![1]));
        attempt.auth_keys_rotated = true;

        let mut other = matching_server_recovery(&attempt);
        other.destination_app_global_auth_pub_key = AppGlobalAuthPublicKey::new("someone-else");

        for server in [None, Some(&other)] {
            assert_matches!(
                reconcile(Some(&attempt), server),
                Recovery::StillRecovering(StillRecovering::ServerIndependent(
                    ServerIndependentRecovery::RotatedAuthKeys(_)
                ))
            );
        }
    }

    #[test]
    fn server_independent_phases_follow_milestones() {
        let mut attempt = local_attempt(PhysicalFactor::App);
        attempt.sealed_csek = Some(SealedCsek(vec![1]));
        attempt.auth_keys_rotated = true;
        attempt.server_spending_keyset = Some(spending_keyset(3, false).f8e_spending_keyset);

        assert_matches!(
            reconcile(Some(&attempt), None),
            Recovery::StillRecovering(StillRecovering::ServerIndependent(
                ServerIndependentRecovery::CreatedSpendingKeys { .. }
            ))
        );

        attempt.backed_up_to_cloud = true;
        assert_matches!(
            reconcile(Some(&attempt), None),
            Recovery::StillRecovering(StillRecovering::ServerIndependent(
                ServerIndependentRecovery::BackedUpToCloud { .. }
            ))
        );
    }

    #[test]
    fn matching_keys_is_initiated_and_mismatch_is_no_longer_recovering() {
        let attempt = local_attempt(PhysicalFactor::Hardware);
        let server = matching_server_recovery(&attempt);

        assert_matches!(
            reconcile(Some(&attempt), Some(&server)),
            Recovery::StillRecovering(StillRecovering::ServerDependent(
                ServerDependentRecovery::InitiatedRecovery(InitiatedRecovery {
                    lost_factor: PhysicalFactor::Hardware,
                    ..
                })
            ))
        );

        let mut changed = server;
        changed.destination_app_global_auth_pub_key = AppGlobalAuthPublicKey::new("A2");
        assert_eq!(
            reconcile(Some(&attempt), Some(&changed)),
            Recovery::NoLongerRecovering {
                lost_factor: PhysicalFactor::Hardware
            }
        );
    }
}
