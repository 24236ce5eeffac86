//! # lendloop-core — Foundational Types for the Lendloop Engine
//!
//! The bedrock crate of the Lendloop workspace. It defines the primitive
//! types every other crate builds on: identifier newtypes, the UTC-only
//! `Timestamp`, the string-amount `Money` type, and the core error
//! hierarchy.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `RentalId`, `PartyId`,
//!    `ItemId`, `ClaimId`, `LedgerEntryId` — all newtypes over `Uuid` with
//!    validated constructors. No bare strings or raw UUIDs in signatures.
//!
//! 2. **UTC-only timestamps.** The `Timestamp` type carries a
//!    `DateTime<Utc>`; non-UTC inputs are converted at the boundary so no
//!    local-offset value can enter the system.
//!
//! 3. **No floats for money.** `Money` stores amounts as validated decimal
//!    strings and exposes checked minor-unit arithmetic. A floating-point
//!    amount cannot be constructed.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `lendloop-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, `Serialize`, `Deserialize`.

pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

pub use error::CoreError;
pub use identity::{ClaimId, ItemId, LedgerEntryId, PartyId, RentalId};
pub use money::Money;
pub use temporal::Timestamp;
