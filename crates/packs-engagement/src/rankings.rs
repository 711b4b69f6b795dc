//! # Supporter Rankings
//!
//! Each creator has a leaderboard of supporters ordered by total tokens
//! spent. Ties go to whoever spent first, then to the lower supporter id, so
//! the order is total and stable across recomputes.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use packs_core::{TokenAmount, UserId, ValidationError};
use serde::{Deserialize, Serialize};

/// Leaderboard badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Badge {
    /// Rank 1.
    #[serde(rename = "TOP_1")]
    Top1,
    /// Ranks 2 and 3.
    #[serde(rename = "TOP_3")]
    Top3,
    /// Ranks 4 through 10.
    #[serde(rename = "TOP_10")]
    Top10,
}

impl Badge {
    /// The badge for a 1-based rank, if any.
    pub fn for_rank(rank: usize) -> Option<Badge> {
        match rank {
            1 => Some(Self::Top1),
            2..=3 => Some(Self::Top3),
            4..=10 => Some(Self::Top10),
            _ => None,
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top1 => "TOP_1",
            Self::Top3 => "TOP_3",
            Self::Top10 => "TOP_10",
        }
    }
}

/// One supporter's standing with one creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupporterEntry {
    /// The creator.
    pub creator: UserId,
    /// The supporter.
    pub supporter: UserId,
    /// Lifetime tokens spent on the creator.
    pub total_spent: TokenAmount,
    /// First recorded spend.
    pub first_spend_at: DateTime<Utc>,
    /// Most recent recorded spend.
    pub last_spend_at: DateTime<Utc>,
    /// 1-based rank on the creator's leaderboard.
    pub rank: usize,
    /// Badge for the current rank.
    pub badge: Option<Badge>,
}

/// How a spend moved the supporter on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankChange {
    /// The creator.
    pub creator: UserId,
    /// The supporter.
    pub supporter: UserId,
    /// Rank before the spend (`None` on first spend).
    pub previous_rank: Option<usize>,
    /// Rank after the spend.
    pub new_rank: usize,
    /// Badge after the spend.
    pub badge: Option<Badge>,
    /// Lifetime total after the spend.
    pub total_spent: TokenAmount,
}

impl RankChange {
    /// Whether the supporter moved up (or entered the board).
    pub fn improved(&self) -> bool {
        self.previous_rank.map_or(true, |prev| self.new_rank < prev)
    }
}

/// Leaderboards for every creator.
#[derive(Debug, Default)]
pub struct SupporterRankings {
    boards: HashMap<UserId, Vec<SupporterEntry>>,
}

impl SupporterRankings {
    /// Empty leaderboards.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to a supporter's total and re-rank the creator's board.
    pub fn record_spend(
        &mut self,
        creator: UserId,
        supporter: UserId,
        amount: TokenAmount,
        now: DateTime<Utc>,
    ) -> Result<RankChange, ValidationError> {
        if amount.is_zero() {
            return Err(ValidationError::ZeroAmount("amount"));
        }
        let board = self.boards.entry(creator).or_default();
        let previous_rank = match board.iter_mut().find(|e| e.supporter == supporter) {
            Some(entry) => {
                entry.total_spent = entry.total_spent.saturating_add(amount);
                entry.last_spend_at = now;
                Some(entry.rank)
            }
            None => {
                board.push(SupporterEntry {
                    creator,
                    supporter,
                    total_spent: amount,
                    first_spend_at: now,
                    last_spend_at: now,
                    rank: 0,
                    badge: None,
                });
                None
            }
        };
        rerank(board);

        let entry = board
            .iter()
            .find(|e| e.supporter == supporter)
            .ok_or(ValidationError::EmptyField("supporter"))?;
        let change = RankChange {
            creator,
            supporter,
            previous_rank,
            new_rank: entry.rank,
            badge: entry.badge,
            total_spent: entry.total_spent,
        };
        tracing::debug!(
            creator = %creator,
            supporter = %supporter,
            amount = amount.value(),
            rank = change.new_rank,
            "supporter spend recorded"
        );
        Ok(change)
    }

    /// The top `limit` supporters of a creator.
    pub fn leaderboard(&self, creator: &UserId, limit: usize) -> Vec<SupporterEntry> {
        self.boards
            .get(creator)
            .map(|board| board.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// One supporter's entry on a creator's board.
    pub fn entry(&self, creator: &UserId, supporter: &UserId) -> Option<&SupporterEntry> {
        self.boards
            .get(creator)?
            .iter()
            .find(|e| e.supporter == *supporter)
    }

    /// Number of supporters on a creator's board.
    pub fn supporter_count(&self, creator: &UserId) -> usize {
        self.boards.get(creator).map_or(0, Vec::len)
    }
}

fn rerank(board: &mut [SupporterEntry]) {
    board.sort_by_key(|e| (Reverse(e.total_spent), e.first_spend_at, e.supporter));
    for (i, entry) in board.iter_mut().enumerate() {
        entry.rank = i + 1;
        entry.badge = Badge::for_rank(entry.rank);
    }
}
