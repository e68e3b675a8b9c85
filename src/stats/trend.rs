//! Trend metrics: recent window vs the immediately preceding baseline.
//!
//! Windows are [now-7d, now) and [now-14d, now-7d). Metrics compared:
//! stake count, reward sum, and dashboard view count, folded into one
//! weighted score. Results carry a staleness threshold so repeated
//! lookups do not recompute.

use crate::error::ScanError;
use crate::store::EventStore;
use crate::types::{TrendLabel, TrendMetrics};

const SECONDS_PER_DAY: i64 = 86_400;

const STAKE_WEIGHT: f64 = 0.4;
const REWARD_WEIGHT: f64 = 0.4;
const VIEW_WEIGHT: f64 = 0.2;

/// Percent change with the degenerate-baseline rule: 0 when both sides
/// are zero, 100 when something appeared from nothing.
pub fn trend_percent(current: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        if current == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (current - baseline) / baseline * 100.0
    }
}

pub fn weighted_score(stake_pct: f64, reward_pct: f64, view_pct: f64) -> f64 {
    STAKE_WEIGHT * stake_pct + REWARD_WEIGHT * reward_pct + VIEW_WEIGHT * view_pct
}

pub fn label_for(change_pct: f64, stability_band_pct: f64) -> TrendLabel {
    if change_pct.abs() <= stability_band_pct {
        TrendLabel::Stable
    } else if change_pct > 0.0 {
        TrendLabel::Improving
    } else {
        TrendLabel::Declining
    }
}

pub fn is_stale(computed_at: i64, now: i64, staleness_hours: i64) -> bool {
    now - computed_at >= staleness_hours * 3_600
}

pub fn compute_trend_metrics(
    store: &EventStore,
    address: &str,
    now: i64,
) -> Result<TrendMetrics, ScanError> {
    let week = 7 * SECONDS_PER_DAY;
    let recent_from = now - week;
    let baseline_from = now - 2 * week;

    let stake_recent = store.stake_count_between(address, recent_from, now)? as f64;
    let stake_baseline = store.stake_count_between(address, baseline_from, recent_from)? as f64;
    let reward_recent = store.reward_sum_between(address, recent_from, now)? as f64;
    let reward_baseline = store.reward_sum_between(address, baseline_from, recent_from)? as f64;
    let view_recent = store.view_count_between(address, recent_from, now)? as f64;
    let view_baseline = store.view_count_between(address, baseline_from, recent_from)? as f64;

    let stake_change_pct = trend_percent(stake_recent, stake_baseline);
    let reward_change_pct = trend_percent(reward_recent, reward_baseline);
    let view_change_pct = trend_percent(view_recent, view_baseline);

    Ok(TrendMetrics {
        address: address.to_string(),
        stake_change_pct,
        reward_change_pct,
        view_change_pct,
        score: weighted_score(stake_change_pct, reward_change_pct, view_change_pct),
        computed_at: now,
    })
}

/// Recompute and persist, unless a fresh-enough record already exists.
/// Returns None when the stored record was reused.
pub fn refresh_trend_metrics(
    store: &EventStore,
    address: &str,
    now: i64,
    staleness_hours: i64,
) -> Result<Option<TrendMetrics>, ScanError> {
    if let Some(existing) = store.get_trend_metrics(address)? {
        if !is_stale(existing.computed_at, now, staleness_hours) {
            return Ok(None);
        }
    }
    let metrics = compute_trend_metrics(store, address, now)?;
    store.upsert_trend_metrics(&metrics)?;
    Ok(Some(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StakeEvent;

    #[test]
    fn test_trend_percent_rule() {
        assert_eq!(trend_percent(0.0, 0.0), 0.0);
        assert_eq!(trend_percent(5.0, 0.0), 100.0);
        assert_eq!(trend_percent(50.0, 100.0), -50.0);
        assert_eq!(trend_percent(150.0, 100.0), 50.0);
    }

    #[test]
    fn test_weighted_score() {
        let score = weighted_score(50.0, 100.0, -10.0);
        assert!((score - (20.0 + 40.0 - 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_label_band() {
        assert_eq!(label_for(9.9, 10.0), TrendLabel::Stable);
        assert_eq!(label_for(-10.0, 10.0), TrendLabel::Stable);
        assert_eq!(label_for(10.1, 10.0), TrendLabel::Improving);
        assert_eq!(label_for(-25.0, 10.0), TrendLabel::Declining);
    }

    fn event(txid: &str, time: i64, reward: i64) -> StakeEvent {
        StakeEvent {
            address: "addr".into(),
            txid: txid.into(),
            block_height: 1,
            block_time: time,
            reward_amount: reward,
            stake_amount: 1_000,
            stake_age: 0,
        }
    }

    #[test]
    fn test_compute_from_store_windows() {
        let store = EventStore::open_in_memory().unwrap();
        let now = 100 * SECONDS_PER_DAY;
        // Baseline week: one stake, 100 reward. Recent week: two stakes,
        // 300 reward total.
        store
            .insert_stake_event(&event("b1", now - 10 * SECONDS_PER_DAY, 100))
            .unwrap();
        store
            .insert_stake_event(&event("r1", now - 5 * SECONDS_PER_DAY, 100))
            .unwrap();
        store
            .insert_stake_event(&event("r2", now - 2 * SECONDS_PER_DAY, 200))
            .unwrap();
        store.record_view("addr", now - 3 * SECONDS_PER_DAY).unwrap();

        let metrics = compute_trend_metrics(&store, "addr", now).unwrap();
        assert_eq!(metrics.stake_change_pct, 100.0);
        assert_eq!(metrics.reward_change_pct, 200.0);
        // Views appeared from nothing.
        assert_eq!(metrics.view_change_pct, 100.0);
        assert!((metrics.score - (40.0 + 80.0 + 20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_staleness_short_circuits() {
        let store = EventStore::open_in_memory().unwrap();
        let now = 50 * SECONDS_PER_DAY;

        let first = refresh_trend_metrics(&store, "addr", now, 6).unwrap();
        assert!(first.is_some());

        // An hour later the stored record is still fresh.
        let second = refresh_trend_metrics(&store, "addr", now + 3_600, 6).unwrap();
        assert!(second.is_none());

        // Past the threshold it recomputes.
        let third = refresh_trend_metrics(&store, "addr", now + 7 * 3_600, 6).unwrap();
        assert!(third.is_some());
        assert_eq!(
            store.get_trend_metrics("addr").unwrap().unwrap().computed_at,
            now + 7 * 3_600
        );
    }
}
