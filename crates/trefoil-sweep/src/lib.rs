//! # Trefoil Sweep
//!
//! Moves funds off superseded keysets into the account's active keyset,
//! after a factor-loss recovery or whenever an inactive keyset turns out to
//! hold funds.
//!
//! ## What Belongs Here
//!
//! - Per-keyset signature-plan selection and sweep transaction generation
//! - Private-wallet tweak application and watch-address registration
//! - The sweep-available signal and its periodic check
//!
//! ## What Does NOT Belong Here
//!
//! - Signing and broadcasting the generated transactions
//! - UTXO selection beyond a full-balance sweep (wallet implementations)
//! - Recovery state (`trefoil-recovery`)

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod generator;
pub mod service;

pub use generator::{select_signature_plan, SweepGenerator, SweepGeneratorError};
pub use service::SweepService;
