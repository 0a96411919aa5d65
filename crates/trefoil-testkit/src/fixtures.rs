//! Deterministic fixtures.
//!
//! Numbered builders (`app_key_bundle(1)`, `spending_keyset(2, false)`) return
//! equal values for equal arguments and distinct keys for distinct numbers.

use bitcoin::absolute::LockTime;
use bitcoin::psbt::Psbt;
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, Network, ScriptBuf, Transaction, TxOut};
use chrono::{DateTime, Duration, TimeZone, Utc};
use trefoil_core::effects::UnsignedTransaction;
use trefoil_core::{
    AppGlobalAuthPublicKey, AppKeyBundle, AppRecoveryAuthPublicKey, AppSpendingPublicKey,
    F8eKeysetId, F8eSpendingKeyset, F8eSpendingPublicKey, FullAccount, FullAccountId,
    HwAuthPublicKey, HwFactorProofOfPossession, HwKeyBundle, HwSpendingPublicKey, Keybox,
    LocalId, LocalRecoveryAttempt, LocalRecoveryAttemptProgress, PhysicalFactor, ServerRecovery,
    SpendingKeyset,
};

pub const NETWORK: Network = Network::Regtest;

pub fn account_id() -> FullAccountId {
    FullAccountId::new("urn:wallet-account:000000000000000000000000")
}

/// Master fingerprint of the numbered app key.
pub fn app_fingerprint(n: u32) -> String {
    format!("{:08x}", 0xa000_0000u32 + n)
}

/// Master fingerprint of the numbered hardware.
pub fn hw_fingerprint(n: u32) -> String {
    format!("{:08x}", 0xb000_0000u32 + n)
}

pub fn app_spending_key(n: u32) -> AppSpendingPublicKey {
    AppSpendingPublicKey::new(format!("[{}/84'/1'/0']tpubApp{n}/*", app_fingerprint(n)))
}

pub fn hw_spending_key(n: u32) -> HwSpendingPublicKey {
    HwSpendingPublicKey::new(format!("[{}/84'/1'/0']tpubHw{n}/*", hw_fingerprint(n)))
}

pub fn app_key_bundle(n: u32) -> AppKeyBundle {
    AppKeyBundle {
        local_id: LocalId::new(format!("app-bundle-{n}")),
        spending_key: app_spending_key(n),
        auth_key: AppGlobalAuthPublicKey::new(format!("02a{n:063}")),
        recovery_auth_key: AppRecoveryAuthPublicKey::new(format!("02r{n:063}")),
        network: NETWORK,
    }
}

pub fn hw_key_bundle(n: u32) -> HwKeyBundle {
    HwKeyBundle {
        local_id: LocalId::new(format!("hw-bundle-{n}")),
        spending_key: hw_spending_key(n),
        auth_key: HwAuthPublicKey::new(format!("03h{n:063}")),
        network: NETWORK,
    }
}

pub fn proof_of_possession() -> HwFactorProofOfPossession {
    HwFactorProofOfPossession {
        hw_signed_token: "hw-signed-access-token".to_string(),
    }
}

/// Keyset `n` holding app key `n` and hardware key `n`.
pub fn spending_keyset(n: u32, is_private: bool) -> SpendingKeyset {
    SpendingKeyset {
        local_id: LocalId::new(format!("keyset-{n}")),
        f8e_spending_keyset: F8eSpendingKeyset {
            keyset_id: F8eKeysetId::new(format!("spending-keyset-{n}")),
            spending_public_key: F8eSpendingPublicKey::new(format!("[f8e0000{n}/84'/1'/0']tpubF8e{n}/*")),
            private_wallet_root_xpub: is_private.then(|| format!("tpubRoot{n}")),
        },
        network: NETWORK,
        app_key: app_spending_key(n),
        hardware_key: hw_spending_key(n),
    }
}

/// Keybox with `active` as the destination and every keyset listed in order.
pub fn keybox(active: SpendingKeyset, inactive: Vec<SpendingKeyset>) -> Keybox {
    let mut keysets = vec![active.clone()];
    keysets.extend(inactive);
    Keybox {
        local_id: LocalId::new("keybox"),
        full_account_id: account_id(),
        active_spending_keyset: active,
        keysets,
        active_app_key_bundle: app_key_bundle(0),
        active_hw_key_bundle: hw_key_bundle(0),
        can_use_keybox_keysets: true,
        network: NETWORK,
    }
}

pub fn full_account(keybox: Keybox) -> FullAccount {
    FullAccount::new(keybox)
}

/// A distinct regtest address per `n`.
pub fn address(n: u8) -> Address {
    Address::p2wsh(&ScriptBuf::from_bytes(vec![n]), NETWORK)
}

/// Unsigned full-balance sweep paying `amount` to `destination`.
pub fn unsigned_transaction(destination: &Address, amount: u64, fee: u64) -> UnsignedTransaction {
    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![],
        output: vec![TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: destination.script_pubkey(),
        }],
    };
    UnsignedTransaction {
        psbt: Psbt::from_unsigned_tx(tx).expect("unsigned transaction"),
        fee: Amount::from_sat(fee),
    }
}

/// Fixed reference time for server snapshots.
pub fn recovery_start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Milestone creating an attempt with app and hardware bundles `n`.
pub fn created_pending_keybundles(lost_factor: PhysicalFactor, n: u32) -> LocalRecoveryAttemptProgress {
    LocalRecoveryAttemptProgress::CreatedPendingKeybundles {
        full_account_id: account_id(),
        lost_factor,
        app_key_bundle: app_key_bundle(n),
        hw_key_bundle: hw_key_bundle(n),
    }
}

/// Fresh attempt using bundles 1, not yet confirmed by the server.
pub fn local_attempt(lost_factor: PhysicalFactor) -> LocalRecoveryAttempt {
    LocalRecoveryAttempt::apply(None, created_pending_keybundles(lost_factor, 1))
        .unwrap()
        .unwrap()
}

/// Server snapshot naming exactly the attempt's destination keys.
pub fn matching_server_recovery(attempt: &LocalRecoveryAttempt) -> ServerRecovery {
    let start_time = recovery_start_time();
    ServerRecovery {
        full_account_id: attempt.full_account_id.clone(),
        start_time,
        end_time: start_time + Duration::days(7),
        lost_factor: attempt.lost_factor,
        destination_app_global_auth_pub_key: attempt.app_key_bundle.auth_key.clone(),
        destination_app_recovery_auth_pub_key: attempt.app_key_bundle.recovery_auth_key.clone(),
        destination_hardware_auth_pub_key: attempt.hw_key_bundle.auth_key.clone(),
    }
}
