//! # Token Amounts
//!
//! The platform currency is an indivisible token. All amounts are whole
//! tokens held in a `u64`; fractional results (percentage cuts) always
//! round down, and the caller decides who receives the remainder.

use serde::{Deserialize, Serialize};

/// A non-negative number of tokens.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenAmount(u64);

impl TokenAmount {
    /// The zero amount.
    pub const ZERO: TokenAmount = TokenAmount(0);

    /// Wrap a raw token count.
    pub const fn new(tokens: u64) -> Self {
        Self(tokens)
    }

    /// The raw token count.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Whether this amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition. `None` on overflow.
    pub fn checked_add(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(other.0).map(TokenAmount)
    }

    /// Checked subtraction. `None` when `other > self`.
    pub fn checked_sub(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_sub(other.0).map(TokenAmount)
    }

    /// Addition clamped at `u64::MAX`.
    pub fn saturating_add(self, other: TokenAmount) -> TokenAmount {
        TokenAmount(self.0.saturating_add(other.0))
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, other: TokenAmount) -> TokenAmount {
        TokenAmount(self.0.saturating_sub(other.0))
    }

    /// `floor(self × percent / 100)`.
    ///
    /// Computed in `u128` so the intermediate product cannot overflow for
    /// any `u64` amount and `percent <= 100`.
    pub fn percent_floor(self, percent: u32) -> TokenAmount {
        let scaled = u128::from(self.0) * u128::from(percent) / 100;
        TokenAmount(scaled as u64)
    }

    /// `floor(self × bps / 10_000)` for basis-point multipliers, saturating
    /// at `u64::MAX`.
    pub fn apply_bps(self, bps: u32) -> TokenAmount {
        let scaled = u128::from(self.0) * u128::from(bps) / 10_000;
        TokenAmount(u64::try_from(scaled).unwrap_or(u64::MAX))
    }

    /// The amount as a signed ledger delta. `None` above `i64::MAX`.
    pub fn as_delta(&self) -> Option<i64> {
        i64::try_from(self.0).ok()
    }
}

impl From<u64> for TokenAmount {
    fn from(tokens: u64) -> Self {
        Self(tokens)
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
