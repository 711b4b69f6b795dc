//! # packs-engagement — Supporters, Missions and Pricing
//!
//! Per-user counters compared against static thresholds:
//!
//! - [`rankings`]: per-creator supporter leaderboards with TOP_1 / TOP_3 /
//!   TOP_10 badges.
//! - [`missions`]: daily, weekly and monthly creator missions that award XP
//!   and levels.
//! - [`pricing`]: basis-point price quotes driven by demand, creator level
//!   and safety risk.
//!
//! Nothing here moves tokens; spend amounts are reported by the caller
//! after the escrow ledger has accepted them.

pub mod missions;
pub mod pricing;
pub mod rankings;

pub use missions::{
    default_catalog, level_for_xp, ActivityOutcome, CreatorProgress, Mission, MissionBoard,
    MissionCadence, MissionCompletion, MissionMetric, MissionProgress,
};
pub use pricing::{quote, PriceBand, PriceQuote, PricingConfig, QuoteRequest, ServiceKind};
pub use rankings::{Badge, RankChange, SupporterEntry, SupporterRankings};
