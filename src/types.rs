//! Core data model shared across the scanner, store, and statistics engine.
//!
//! Amounts are integer minor units throughout. Timestamps are Unix seconds;
//! chrono enters the picture only for calendar-level derivations (months,
//! day buckets).

use serde::{Deserialize, Serialize};

/// A single proof-of-stake reward event, extracted from a coinstake
/// transaction. Immutable once written: the store inserts it if absent,
/// keyed on `txid`, and never updates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeEvent {
    pub address: String,
    pub txid: String,
    pub block_height: u64,
    pub block_time: i64,
    /// Reward paid out by this stake, minor units.
    pub reward_amount: i64,
    /// Principal that staked, minor units.
    pub stake_amount: i64,
    /// Age of the staking input, in blocks.
    pub stake_age: u64,
}

/// Block production mode. Proof-of-stake blocks are "minted", proof-of-work
/// blocks are "mined".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Minted,
    Mined,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Minted => "minted",
            BlockType::Mined => "mined",
        }
    }
}

/// Per-height analytics record. One row per height, overwritten on
/// re-extraction (last-writer-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockAnalytics {
    pub height: u64,
    pub hash: String,
    pub time: i64,
    pub block_type: BlockType,
    pub difficulty: f64,
    pub size: u64,
    pub reward_amount: i64,
    /// Payout address for minted blocks, absent for mined ones.
    pub staker_address: Option<String>,
}

/// An unspent transaction output tracked for staking eligibility.
///
/// Lifecycle: created -> eligible (once current height >= cooldown_until)
/// -> spent (terminal). Eligibility is derived, never stored: a spent
/// output is never eligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub address: String,
    pub txid: String,
    pub vout: u32,
    pub value: i64,
    pub creation_height: u64,
    pub cooldown_until: u64,
    pub is_spent: bool,
}

impl Utxo {
    pub fn is_eligible(&self, current_height: u64) -> bool {
        !self.is_spent && current_height >= self.cooldown_until
    }
}

/// Direction label for a half-window metric comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Improving,
    Stable,
    Declining,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Improving => "improving",
            TrendLabel::Stable => "stable",
            TrendLabel::Declining => "declining",
        }
    }

    /// Lenient parse for values read back from the store.
    pub fn parse(s: &str) -> TrendLabel {
        match s {
            "improving" => TrendLabel::Improving,
            "declining" => TrendLabel::Declining,
            _ => TrendLabel::Stable,
        }
    }
}

/// Annualized yield figures over the standard comparison windows.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct YieldWindows {
    pub all_time: f64,
    pub days_365: f64,
    pub days_90: f64,
    pub days_30: f64,
    pub days_7: f64,
}

/// Snapshot of an address's UTXO set against the current chain height.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UtxoHealth {
    pub current_count: u64,
    pub eligible_count: u64,
    pub cooldown_count: u64,
    pub current_value: i64,
    pub eligible_value: i64,
    pub largest_value: i64,
    pub smallest_value: i64,
}

/// Derived per-address metrics, fully recomputable from the stored
/// StakeEvent + UTXO history. Overwritten wholesale on each recompute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddressStatistics {
    pub address: String,
    pub total_stakes: u64,
    pub total_rewards: i64,
    pub total_staked: i64,
    pub first_stake_time: Option<i64>,
    pub last_stake_time: Option<i64>,
    pub annualized_yield: YieldWindows,
    /// total_rewards / total_staked * 100.
    pub return_ratio: f64,
    /// Frequency metrics; None with fewer than two events.
    pub avg_days_between_stakes: Option<f64>,
    pub stakes_per_week: Option<f64>,
    pub stakes_per_month: Option<f64>,
    pub utxo_health: UtxoHealth,
    /// Longest gap between consecutive stake events, whole days.
    pub longest_dry_spell_days: u64,
    /// Days elapsed since the most recent stake event.
    pub current_streak_days: u64,
    /// "YYYY-MM" of the calendar month with the highest reward sum.
    pub best_month: Option<String>,
    pub best_month_rewards: i64,
    pub worst_month: Option<String>,
    pub worst_month_rewards: i64,
    pub reward_trend: TrendLabel,
    pub frequency_trend: TrendLabel,
    /// Filled by the ranking pass, not by the statistics engine.
    pub rank: Option<u64>,
    pub percentile: Option<f64>,
    pub computed_at: i64,
}

impl Default for TrendLabel {
    fn default() -> Self {
        TrendLabel::Stable
    }
}

/// Recent-vs-baseline window comparison for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendMetrics {
    pub address: String,
    pub stake_change_pct: f64,
    pub reward_change_pct: f64,
    pub view_change_pct: f64,
    /// Weighted overall score: 0.4*stake + 0.4*reward + 0.2*view.
    pub score: f64,
    pub computed_at: i64,
}

/// A participant known to the chain node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub primary_addresses: Vec<String>,
}
