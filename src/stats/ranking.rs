//! Global ranking pass.
//!
//! Always wholesale: order every address by total rewards descending and
//! rewrite rank/percentile in one transaction. Never incremental.

use crate::error::ScanError;
use crate::store::EventStore;

/// Assign 1-based ranks by total rewards descending, address ascending
/// as the tie-break so repeated passes are stable.
///
/// Percentile is `100 * rank / count`: the top earner holds the smallest
/// percentile and the last rank reads 100. Percentile therefore increases
/// with rank, not the other way around.
pub fn assign_ranks(mut totals: Vec<(String, i64)>) -> Vec<(String, u64, f64)> {
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let count = totals.len();
    totals
        .into_iter()
        .enumerate()
        .map(|(i, (address, _))| {
            let rank = (i + 1) as u64;
            (address, rank, 100.0 * rank as f64 / count as f64)
        })
        .collect()
}

/// Returns the number of addresses ranked.
pub fn recompute_rankings(store: &EventStore) -> Result<usize, ScanError> {
    let totals = store.total_rewards_by_address()?;
    let ranks = assign_ranks(totals);
    let count = ranks.len();
    store.update_ranks(&ranks)?;
    log::info!("🏆 ranked {} addresses", count);
    Ok(count)
}
