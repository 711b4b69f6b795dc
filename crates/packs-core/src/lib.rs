#![deny(missing_docs)]

//! # packs-core — Foundational Types for the Token-Economy Packs
//!
//! Every other crate in the workspace depends on this one. It has no
//! internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A [`UserId`] is not a
//!    bare `Uuid`, and a [`TokenAmount`] is not a bare `u64`.
//!
//! 2. **Checked token arithmetic.** [`TokenAmount`] exposes only checked
//!    addition/subtraction and floor-percentage helpers, so every split in
//!    the workspace rounds the same way.
//!
//! 3. **[`ValidationError`] for boundary checks.** Request validation in the
//!    API and configuration validation share one error vocabulary.

pub mod amount;
pub mod digest;
pub mod error;
pub mod identity;
pub mod undo;

pub use amount::TokenAmount;
pub use digest::{sha256_hex, EntryDigest};
pub use error::ValidationError;
pub use identity::UserId;
pub use undo::UndoLog;
