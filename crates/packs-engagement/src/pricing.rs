//! # Dynamic Pricing
//!
//! `price = base × demand × level × trust`, each multiplier in basis points
//! (10 000 = 1.0×) and applied with floor rounding in order, then clamped to
//! the service's `[min, max]` band.

use packs_core::{TokenAmount, ValidationError};
use packs_rules::RiskLevel;
use serde::{Deserialize, Serialize};

const UNIT_BPS: u32 = 10_000;

/// Priced services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// One paid chat message.
    ChatMessage,
    /// One minute of a call.
    CallMinute,
    /// One event ticket.
    EventTicket,
}

impl ServiceKind {
    /// All services.
    pub const ALL: [ServiceKind; 3] = [Self::ChatMessage, Self::CallMinute, Self::EventTicket];

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatMessage => "chat_message",
            Self::CallMinute => "call_minute",
            Self::EventTicket => "event_ticket",
        }
    }
}

/// Base price and bounds for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    /// Price at 1.0× on every multiplier.
    pub base: TokenAmount,
    /// Lowest quotable price.
    pub min: TokenAmount,
    /// Highest quotable price.
    pub max: TokenAmount,
}

impl PriceBand {
    const fn new(base: u64, min: u64, max: u64) -> Self {
        Self {
            base: TokenAmount::new(base),
            min: TokenAmount::new(min),
            max: TokenAmount::new(max),
        }
    }

    fn validate(&self, field: &'static str) -> Result<(), ValidationError> {
        if self.min.is_zero() {
            return Err(ValidationError::ZeroAmount(field));
        }
        if !(self.min <= self.base && self.base <= self.max) {
            return Err(ValidationError::InvalidSetting {
                field,
                reason: format!(
                    "expected min <= base <= max, got {} / {} / {}",
                    self.min, self.base, self.max
                ),
            });
        }
        Ok(())
    }
}

/// Pricing table and multiplier limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Chat message band.
    pub chat_message: PriceBand,
    /// Call minute band.
    pub call_minute: PriceBand,
    /// Event ticket band.
    pub event_ticket: PriceBand,
    /// Demand multiplier cap.
    pub max_demand_bps: u32,
    /// Bonus per creator level above 1.
    pub level_step_bps: u32,
    /// Cap on the level bonus.
    pub max_level_bonus_bps: u32,
    /// Discount when the creator's risk level is elevated.
    pub elevated_risk_discount_bps: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            chat_message: PriceBand::new(10, 5, 50),
            call_minute: PriceBand::new(30, 15, 150),
            event_ticket: PriceBand::new(200, 100, 1_000),
            max_demand_bps: 20_000,
            level_step_bps: 500,
            max_level_bonus_bps: 5_000,
            elevated_risk_discount_bps: 1_000,
        }
    }
}

impl PricingConfig {
    /// The band for a service.
    pub fn band(&self, service: ServiceKind) -> &PriceBand {
        match service {
            ServiceKind::ChatMessage => &self.chat_message,
            ServiceKind::CallMinute => &self.call_minute,
            ServiceKind::EventTicket => &self.event_ticket,
        }
    }

    /// Check bands and multiplier limits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.chat_message.validate("pricing.chat_message")?;
        self.call_minute.validate("pricing.call_minute")?;
        self.event_ticket.validate("pricing.event_ticket")?;
        if self.max_demand_bps < UNIT_BPS {
            return Err(ValidationError::InvalidSetting {
                field: "pricing.max_demand_bps",
                reason: format!("must be at least {UNIT_BPS}"),
            });
        }
        if self.elevated_risk_discount_bps >= UNIT_BPS {
            return Err(ValidationError::InvalidSetting {
                field: "pricing.elevated_risk_discount_bps",
                reason: format!("must be below {UNIT_BPS}"),
            });
        }
        Ok(())
    }
}

/// Inputs to a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Service being priced.
    pub service: ServiceKind,
    /// Creator's mission level (1-based).
    pub creator_level: u32,
    /// Requests for this creator in the recent window.
    pub recent_requests: u64,
    /// Typical requests per window.
    pub baseline_requests: u64,
    /// Creator's current safety risk level.
    pub risk: RiskLevel,
}

/// A price quote with its multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Service priced.
    pub service: ServiceKind,
    /// Band base price.
    pub base: TokenAmount,
    /// Demand multiplier.
    pub demand_bps: u32,
    /// Level multiplier.
    pub level_bps: u32,
    /// Trust multiplier.
    pub trust_bps: u32,
    /// Final price.
    pub price: TokenAmount,
    /// Whether the band clamped the price.
    pub clamped: bool,
}

fn demand_bps(config: &PricingConfig, recent: u64, baseline: u64) -> u32 {
    if baseline == 0 {
        return UNIT_BPS;
    }
    let ratio = u128::from(recent) * u128::from(UNIT_BPS) / u128::from(baseline);
    let capped = ratio.min(u128::from(config.max_demand_bps)) as u32;
    capped.max(UNIT_BPS)
}

fn level_bps(config: &PricingConfig, level: u32) -> u32 {
    let bonus = config
        .level_step_bps
        .saturating_mul(level.saturating_sub(1))
        .min(config.max_level_bonus_bps);
    UNIT_BPS.saturating_add(bonus)
}

fn trust_bps(config: &PricingConfig, risk: RiskLevel) -> u32 {
    if risk.is_elevated() {
        UNIT_BPS.saturating_sub(config.elevated_risk_discount_bps)
    } else {
        UNIT_BPS
    }
}

/// Price one unit of a service.
pub fn quote(config: &PricingConfig, req: &QuoteRequest) -> PriceQuote {
    let band = config.band(req.service);
    let demand = demand_bps(config, req.recent_requests, req.baseline_requests);
    let level = level_bps(config, req.creator_level);
    let trust = trust_bps(config, req.risk);
    let raw = band.base.apply_bps(demand).apply_bps(level).apply_bps(trust);
    let price = raw.max(band.min).min(band.max);
    PriceQuote {
        service: req.service,
        base: band.base,
        demand_bps: demand,
        level_bps: level,
        trust_bps: trust,
        price,
        clamped: price != raw,
    }
}
