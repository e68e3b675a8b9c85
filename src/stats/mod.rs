//! Derived metrics: per-address statistics, trend windows, global ranks.

pub mod ranking;
pub mod statistics;
pub mod trend;

pub use ranking::{assign_ranks, recompute_rankings};
pub use statistics::{annualized_yield, compute_address_statistics};
pub use trend::{
    compute_trend_metrics, is_stale, label_for, refresh_trend_metrics, trend_percent,
    weighted_score,
};

use crate::error::ScanError;
use crate::store::EventStore;
use crate::types::AddressStatistics;

/// Load one address's history, compute, and atomically replace its
/// statistics row. Rank/percentile are left for the ranking pass.
pub fn recompute_statistics(
    store: &EventStore,
    address: &str,
    current_height: u64,
    now: i64,
    stability_band_pct: f64,
) -> Result<AddressStatistics, ScanError> {
    let events = store.events_for_address(address)?;
    let utxos = store.utxos_for_address(address)?;
    let stats = statistics::compute_address_statistics(
        address,
        &events,
        &utxos,
        current_height,
        now,
        stability_band_pct,
    );
    store.replace_statistics(&stats)?;
    Ok(stats)
}
