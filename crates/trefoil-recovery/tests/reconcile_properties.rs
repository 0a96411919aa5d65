//! Property tests for recovery reconciliation.

use proptest::prelude::*;
use trefoil_core::{
    AppGlobalAuthPublicKey, LocalRecoveryAttempt, LocalRecoveryAttemptProgress, PhysicalFactor,
    Recovery, SealedCsek, ServerRecovery, StillRecovering,
};
use trefoil_recovery::reconcile;
use trefoil_testkit::fixtures::{
    created_pending_keybundles, matching_server_recovery, spending_keyset,
};

/// How far an attempt has progressed, in milestone order.
const MAX_LEVEL: u8 = 4;

#[derive(Debug, Clone, Copy)]
enum ServerView {
    Absent,
    Matching,
    Mismatched,
}

fn attempt_at(lost_factor: PhysicalFactor, level: u8, confirmed: bool) -> LocalRecoveryAttempt {
    let mut milestones = vec![created_pending_keybundles(lost_factor, 1)];
    if confirmed {
        // Server cancellation of a completion marks the attempt confirmed
        // without leaving a sealed key behind.
        milestones.push(LocalRecoveryAttemptProgress::AttemptingCompletion {
            sealed_csek: SealedCsek(vec![0]),
        });
        milestones
            .push(LocalRecoveryAttemptProgress::CompletionAttemptFailedDueToServerCancellation);
    }
    if level >= 1 {
        milestones.push(LocalRecoveryAttemptProgress::AttemptingCompletion {
            sealed_csek: SealedCsek(vec![level]),
        });
    }
    if level >= 2 {
        milestones.push(LocalRecoveryAttemptProgress::RotatedAuthKeys);
    }
    if level >= 3 {
        milestones.push(LocalRecoveryAttemptProgress::RotatedSpendingKeys {
            f8e_spending_keyset: spending_keyset(7, false).f8e_spending_keyset,
        });
    }
    if level >= 4 {
        milestones.push(LocalRecoveryAttemptProgress::BackedUpToCloud);
    }

    milestones
        .into_iter()
        .try_fold(None, |current: Option<LocalRecoveryAttempt>, progress| {
            LocalRecoveryAttempt::apply(current.as_ref(), progress)
        })
        .unwrap()
        .unwrap()
}

fn server_for(attempt: &LocalRecoveryAttempt, view: ServerView) -> Option<ServerRecovery> {
    match view {
        ServerView::Absent => None,
        ServerView::Matching => Some(matching_server_recovery(attempt)),
        ServerView::Mismatched => {
            let mut server = matching_server_recovery(attempt);
            server.destination_app_global_auth_pub_key = AppGlobalAuthPublicKey::new("elsewhere");
            Some(server)
        }
    }
}

fn arb_factor() -> impl Strategy<Value = PhysicalFactor> {
    prop_oneof![Just(PhysicalFactor::App), Just(PhysicalFactor::Hardware)]
}

fn arb_server_view() -> impl Strategy<Value = ServerView> {
    prop_oneof![
        Just(ServerView::Absent),
        Just(ServerView::Matching),
        Just(ServerView::Mismatched),
    ]
}

fn arb_records() -> impl Strategy<Value = (Option<LocalRecoveryAttempt>, Option<ServerRecovery>)> {
    (
        any::<bool>(),
        arb_factor(),
        0..=MAX_LEVEL,
        any::<bool>(),
        arb_server_view(),
    )
        .prop_map(|(has_attempt, lost_factor, level, confirmed, view)| {
            let attempt = attempt_at(lost_factor, level, confirmed);
            let server = server_for(&attempt, view);
            (has_attempt.then_some(attempt), server)
        })
}

proptest! {
    #[test]
    fn reconcile_is_deterministic((attempt, server) in arb_records()) {
        let first = reconcile(attempt.as_ref(), server.as_ref());
        let second = reconcile(attempt.clone().as_ref(), server.clone().as_ref());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn rotated_attempts_ignore_the_server((attempt, server) in arb_records()) {
        let Some(attempt) = attempt else {
            return Ok(());
        };
        prop_assume!(attempt.auth_keys_rotated);

        let with_server = reconcile(Some(&attempt), server.as_ref());
        let without_server = reconcile(Some(&attempt), None);

        prop_assert!(matches!(
            with_server,
            Recovery::StillRecovering(StillRecovering::ServerIndependent(_))
        ));
        prop_assert_eq!(with_server, without_server);
    }

    #[test]
    fn still_recovering_requires_a_local_attempt((attempt, server) in arb_records()) {
        let status = reconcile(attempt.as_ref(), server.as_ref());
        if attempt.is_none() {
            prop_assert!(status.still_recovering().is_none());
        }
        prop_assert_ne!(status, Recovery::Loading);
    }

    #[test]
    fn matching_server_keeps_an_unrotated_attempt_alive(
        lost_factor in arb_factor(),
        level in 0..=1u8,
        confirmed in any::<bool>(),
    ) {
        let attempt = attempt_at(lost_factor, level, confirmed);
        let server = matching_server_recovery(&attempt);

        let status = reconcile(Some(&attempt), Some(&server));

        prop_assert!(matches!(
            status,
            Recovery::StillRecovering(StillRecovering::ServerDependent(_))
        ));
    }
}
