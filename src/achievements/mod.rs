//! Rule-based achievements: static catalog + idempotent evaluator.

pub mod catalog;
pub mod evaluator;

pub use catalog::{AchievementDefinition, Operator, Requirement, RequirementKind, CATALOG};
pub use evaluator::{consecutive_activity_days, evaluate_achievements, Evaluation};

use crate::error::ScanError;
use crate::store::EventStore;

/// Evaluate the catalog for every address with stored statistics.
/// Returns the number of newly unlocked achievements.
pub fn run_achievement_pass(store: &EventStore, now: i64) -> Result<u64, ScanError> {
    let mut unlocked = 0u64;
    for address in store.addresses_with_events()? {
        let stats = match store.get_statistics(&address)? {
            Some(stats) => stats,
            None => continue,
        };
        let events = store.events_for_address(&address)?;
        let evaluations = evaluate_achievements(store, &address, &stats, &events, now)?;
        unlocked += evaluations.iter().filter(|e| e.newly_unlocked).count() as u64;
    }
    if unlocked > 0 {
        log::info!("🏅 achievement pass unlocked {} new achievements", unlocked);
    }
    Ok(unlocked)
}
