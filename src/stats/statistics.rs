//! Per-address statistics.
//!
//! `compute_address_statistics` is a pure function of the stored event
//! and UTXO history: same input, byte-identical output. All divisions
//! are guarded to return 0.0 instead of NaN or infinity.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::stats::trend::{label_for, trend_percent};
use crate::types::{AddressStatistics, StakeEvent, TrendLabel, Utxo, UtxoHealth, YieldWindows};

const SECONDS_PER_DAY: i64 = 86_400;

/// `(rewards / avg stake) * (365 / days) * 100`, with zero-guards.
pub fn annualized_yield(period_rewards: i64, avg_stake: f64, period_days: f64) -> f64 {
    if avg_stake <= 0.0 || period_days <= 0.0 {
        return 0.0;
    }
    (period_rewards as f64 / avg_stake) * (365.0 / period_days) * 100.0
}

pub fn compute_address_statistics(
    address: &str,
    events: &[StakeEvent],
    utxos: &[Utxo],
    current_height: u64,
    now: i64,
    stability_band_pct: f64,
) -> AddressStatistics {
    let mut sorted: Vec<&StakeEvent> = events.iter().collect();
    sorted.sort_by(|a, b| a.block_time.cmp(&b.block_time).then(a.txid.cmp(&b.txid)));

    let total_stakes = sorted.len() as u64;
    let total_rewards: i64 = sorted.iter().map(|e| e.reward_amount).sum();
    let total_staked: i64 = sorted.iter().map(|e| e.stake_amount).sum();
    let first_stake_time = sorted.first().map(|e| e.block_time);
    let last_stake_time = sorted.last().map(|e| e.block_time);

    let annualized = YieldWindows {
        all_time: all_time_yield(&sorted, first_stake_time, now),
        days_365: windowed_yield(&sorted, now, 365.0),
        days_90: windowed_yield(&sorted, now, 90.0),
        days_30: windowed_yield(&sorted, now, 30.0),
        days_7: windowed_yield(&sorted, now, 7.0),
    };

    let return_ratio = if total_staked > 0 {
        total_rewards as f64 / total_staked as f64 * 100.0
    } else {
        0.0
    };

    let (avg_days_between_stakes, stakes_per_week, stakes_per_month) =
        frequency_metrics(&sorted);

    let (best_month, best_month_rewards, worst_month, worst_month_rewards) =
        month_extremes(&sorted);

    let (longest_dry_spell_days, current_streak_days) = gaps(&sorted, now);

    let reward_trend = half_window_trend(&sorted, now, stability_band_pct, |half| {
        half.iter().map(|e| e.reward_amount as f64).sum()
    });
    let frequency_trend = half_window_trend(&sorted, now, stability_band_pct, |half| {
        half.len() as f64
    });

    AddressStatistics {
        address: address.to_string(),
        total_stakes,
        total_rewards,
        total_staked,
        first_stake_time,
        last_stake_time,
        annualized_yield: annualized,
        return_ratio,
        avg_days_between_stakes,
        stakes_per_week,
        stakes_per_month,
        utxo_health: utxo_health(utxos, current_height),
        longest_dry_spell_days,
        current_streak_days,
        best_month,
        best_month_rewards,
        worst_month,
        worst_month_rewards,
        reward_trend,
        frequency_trend,
        rank: None,
        percentile: None,
        computed_at: now,
    }
}

fn all_time_yield(sorted: &[&StakeEvent], first: Option<i64>, now: i64) -> f64 {
    let first = match first {
        Some(t) => t,
        None => return 0.0,
    };
    let days = (now - first) as f64 / SECONDS_PER_DAY as f64;
    let rewards: i64 = sorted.iter().map(|e| e.reward_amount).sum();
    annualized_yield(rewards, avg_stake(sorted), days)
}

fn windowed_yield(sorted: &[&StakeEvent], now: i64, days: f64) -> f64 {
    let cutoff = now - (days * SECONDS_PER_DAY as f64) as i64;
    let window: Vec<&StakeEvent> = sorted
        .iter()
        .filter(|e| e.block_time >= cutoff)
        .copied()
        .collect();
    let rewards: i64 = window.iter().map(|e| e.reward_amount).sum();
    annualized_yield(rewards, avg_stake(&window), days)
}

fn avg_stake(events: &[&StakeEvent]) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    events.iter().map(|e| e.stake_amount as f64).sum::<f64>() / events.len() as f64
}

/// Frequency metrics need at least two events to mean anything.
fn frequency_metrics(sorted: &[&StakeEvent]) -> (Option<f64>, Option<f64>, Option<f64>) {
    if sorted.len() < 2 {
        return (None, None, None);
    }
    let span_days = (sorted[sorted.len() - 1].block_time - sorted[0].block_time) as f64
        / SECONDS_PER_DAY as f64;
    let n = sorted.len() as f64;
    let avg = span_days / (n - 1.0);
    if span_days > 0.0 {
        (
            Some(avg),
            Some(n / (span_days / 7.0)),
            Some(n / (span_days / 30.0)),
        )
    } else {
        (Some(avg), None, None)
    }
}

fn month_extremes(sorted: &[&StakeEvent]) -> (Option<String>, i64, Option<String>, i64) {
    let mut by_month: BTreeMap<String, i64> = BTreeMap::new();
    for event in sorted {
        if let Some(dt) = DateTime::<Utc>::from_timestamp(event.block_time, 0) {
            *by_month.entry(dt.format("%Y-%m").to_string()).or_insert(0) +=
                event.reward_amount;
        }
    }
    let mut best: Option<(String, i64)> = None;
    let mut worst: Option<(String, i64)> = None;
    // Iteration is month-ascending, so ties resolve to the earliest month.
    for (month, rewards) in &by_month {
        if best.as_ref().map_or(true, |(_, r)| rewards > r) {
            best = Some((month.clone(), *rewards));
        }
        if worst.as_ref().map_or(true, |(_, r)| rewards < r) {
            worst = Some((month.clone(), *rewards));
        }
    }
    let (best_month, best_rewards) = best.map_or((None, 0), |(m, r)| (Some(m), r));
    let (worst_month, worst_rewards) = worst.map_or((None, 0), |(m, r)| (Some(m), r));
    (best_month, best_rewards, worst_month, worst_rewards)
}

/// Longest inter-event gap, and days elapsed since the last event.
fn gaps(sorted: &[&StakeEvent], now: i64) -> (u64, u64) {
    let longest = sorted
        .windows(2)
        .map(|pair| (pair[1].block_time - pair[0].block_time) / SECONDS_PER_DAY)
        .max()
        .unwrap_or(0)
        .max(0) as u64;
    let streak = match sorted.last() {
        Some(last) => ((now - last.block_time) / SECONDS_PER_DAY).max(0) as u64,
        None => 0,
    };
    (longest, streak)
}

fn utxo_health(utxos: &[Utxo], current_height: u64) -> UtxoHealth {
    let unspent: Vec<&Utxo> = utxos.iter().filter(|u| !u.is_spent).collect();
    let eligible: Vec<&&Utxo> = unspent
        .iter()
        .filter(|u| u.is_eligible(current_height))
        .collect();
    UtxoHealth {
        current_count: unspent.len() as u64,
        eligible_count: eligible.len() as u64,
        cooldown_count: (unspent.len() - eligible.len()) as u64,
        current_value: unspent.iter().map(|u| u.value).sum(),
        eligible_value: eligible.iter().map(|u| u.value).sum(),
        largest_value: unspent.iter().map(|u| u.value).max().unwrap_or(0),
        smallest_value: unspent.iter().map(|u| u.value).min().unwrap_or(0),
    }
}

/// Split the trailing 30 days in half and compare a metric across the
/// halves. Changes within the stability band read as stable.
fn half_window_trend<F>(
    sorted: &[&StakeEvent],
    now: i64,
    stability_band_pct: f64,
    metric: F,
) -> TrendLabel
where
    F: Fn(&[&StakeEvent]) -> f64,
{
    let window_start = now - 30 * SECONDS_PER_DAY;
    let midpoint = now - 15 * SECONDS_PER_DAY;
    let older: Vec<&StakeEvent> = sorted
        .iter()
        .filter(|e| e.block_time >= window_start && e.block_time < midpoint)
        .copied()
        .collect();
    let recent: Vec<&StakeEvent> = sorted
        .iter()
        .filter(|e| e.block_time >= midpoint)
        .copied()
        .collect();
    let change = trend_percent(metric(&recent), metric(&older));
    label_for(change, stability_band_pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(txid: &str, time: i64, reward: i64, stake: i64) -> StakeEvent {
        StakeEvent {
            address: "addr".into(),
            txid: txid.into(),
            block_height: 1,
            block_time: time,
            reward_amount: reward,
            stake_amount: stake,
            stake_age: 0,
        }
    }

    #[test]
    fn test_yield_zero_guards() {
        assert_eq!(annualized_yield(0, 500.0, 30.0), 0.0);
        assert_eq!(annualized_yield(100, 0.0, 30.0), 0.0);
        assert_eq!(annualized_yield(100, 500.0, 0.0), 0.0);
        assert!(annualized_yield(100, 500.0, 30.0).is_finite());
    }

    #[test]
    fn test_yield_formula() {
        // 100 rewards on 1000 avg stake over 365 days: 10% annualized.
        let y = annualized_yield(100, 1_000.0, 365.0);
        assert!((y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_dry_spell_and_streak() {
        let day = SECONDS_PER_DAY;
        let events = vec![
            event("t1", 0, 100, 1_000),
            event("t2", day, 200, 1_000),
            event("t3", 10 * day, 50, 1_000),
        ];
        let now = 12 * day;
        let stats = compute_address_statistics("addr", &events, &[], 100, now, 10.0);

        assert_eq!(stats.total_stakes, 3);
        assert_eq!(stats.total_rewards, 350);
        assert_eq!(stats.longest_dry_spell_days, 9);
        assert_eq!(stats.current_streak_days, 2);
        assert_eq!(stats.first_stake_time, Some(0));
        assert_eq!(stats.last_stake_time, Some(10 * day));
    }

    #[test]
    fn test_frequency_needs_two_events() {
        let stats = compute_address_statistics(
            "addr",
            &[event("t1", 1_000, 100, 1_000)],
            &[],
            100,
            2_000,
            10.0,
        );
        assert_eq!(stats.avg_days_between_stakes, None);
        assert_eq!(stats.stakes_per_week, None);
        assert_eq!(stats.stakes_per_month, None);
    }

    #[test]
    fn test_frequency_metrics() {
        let day = SECONDS_PER_DAY;
        // 3 events over 14 days.
        let events = vec![
            event("t1", 0, 10, 100),
            event("t2", 7 * day, 10, 100),
            event("t3", 14 * day, 10, 100),
        ];
        let stats = compute_address_statistics("addr", &events, &[], 100, 15 * day, 10.0);
        assert_eq!(stats.avg_days_between_stakes, Some(7.0));
        assert_eq!(stats.stakes_per_week, Some(1.5));
    }

    #[test]
    fn test_month_extremes() {
        // 2023-11 and 2023-12 timestamps.
        let nov = 1_699_000_000;
        let dec = 1_701_500_000;
        let events = vec![
            event("t1", nov, 300, 1_000),
            event("t2", dec, 40, 1_000),
            event("t3", dec + 1_000, 10, 1_000),
        ];
        let stats = compute_address_statistics("addr", &events, &[], 100, dec + 2_000, 10.0);
        assert_eq!(stats.best_month.as_deref(), Some("2023-11"));
        assert_eq!(stats.best_month_rewards, 300);
        assert_eq!(stats.worst_month.as_deref(), Some("2023-12"));
        assert_eq!(stats.worst_month_rewards, 50);
    }

    #[test]
    fn test_utxo_health_invariant() {
        let utxos = vec![
            Utxo {
                address: "addr".into(),
                txid: "a".into(),
                vout: 0,
                value: 100,
                creation_height: 10,
                cooldown_until: 50,
                is_spent: false,
            },
            Utxo {
                address: "addr".into(),
                txid: "b".into(),
                vout: 0,
                value: 200,
                creation_height: 90,
                cooldown_until: 590,
                is_spent: false,
            },
            Utxo {
                address: "addr".into(),
                txid: "c".into(),
                vout: 0,
                value: 400,
                creation_height: 5,
                cooldown_until: 40,
                is_spent: true,
            },
        ];
        let stats = compute_address_statistics("addr", &[], &utxos, 100, 1_000, 10.0);
        let h = &stats.utxo_health;
        assert_eq!(h.current_count, 2);
        assert_eq!(h.eligible_count, 1);
        assert_eq!(h.cooldown_count, 1);
        assert_eq!(h.current_value, 300);
        assert_eq!(h.eligible_value, 100);
        assert!(h.eligible_value <= h.current_value);
        assert_eq!(h.largest_value, 200);
        assert_eq!(h.smallest_value, 100);
    }

    #[test]
    fn test_trend_labels_from_half_windows() {
        let day = SECONDS_PER_DAY;
        let now = 40 * day;
        // Older half (days 10..25): rewards 100. Recent half: rewards 300.
        let events = vec![
            event("t1", now - 20 * day, 100, 1_000),
            event("t2", now - 5 * day, 300, 1_000),
        ];
        let stats = compute_address_statistics("addr", &events, &[], 100, now, 10.0);
        assert_eq!(stats.reward_trend, TrendLabel::Improving);
        // One event per half: frequency unchanged.
        assert_eq!(stats.frequency_trend, TrendLabel::Stable);
    }

    #[test]
    fn test_recomputation_is_deterministic() {
        let day = SECONDS_PER_DAY;
        let events = vec![
            event("t2", day, 200, 2_000),
            event("t1", 0, 100, 1_000),
            event("t3", 10 * day, 50, 500),
        ];
        let a = compute_address_statistics("addr", &events, &[], 100, 12 * day, 10.0);
        let b = compute_address_statistics("addr", &events, &[], 100, 12 * day, 10.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_history_is_all_zeroes() {
        let stats = compute_address_statistics("addr", &[], &[], 100, 1_000, 10.0);
        assert_eq!(stats.total_stakes, 0);
        assert_eq!(stats.annualized_yield, YieldWindows::default());
        assert_eq!(stats.return_ratio, 0.0);
        assert_eq!(stats.current_streak_days, 0);
        assert_eq!(stats.reward_trend, TrendLabel::Stable);
    }
}
