//! Achievement evaluation.
//!
//! Evaluation is idempotent end to end: earned rows are insert-if-absent
//! on (address, slug), so re-running over an already-unlocked achievement
//! neither duplicates nor retracts anything.

use std::collections::{BTreeSet, HashSet};

use crate::achievements::catalog::{Operator, RequirementKind, CATALOG};
use crate::error::ScanError;
use crate::store::EventStore;
use crate::types::{AddressStatistics, StakeEvent};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub slug: &'static str,
    pub earned: bool,
    /// True only the first time the unlock row was written.
    pub newly_unlocked: bool,
    pub current: f64,
    pub target: f64,
}

/// Longest run of consecutive calendar days with at least one event.
/// Shared by both day-run requirement kinds.
pub fn consecutive_activity_days(events: &[StakeEvent]) -> u64 {
    let days: BTreeSet<i64> = events
        .iter()
        .map(|e| e.block_time.div_euclid(SECONDS_PER_DAY))
        .collect();

    let mut longest = 0u64;
    let mut run = 0u64;
    let mut previous: Option<i64> = None;
    for day in days {
        run = match previous {
            Some(p) if day == p + 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

fn current_value(
    kind: RequirementKind,
    stats: &AddressStatistics,
    events: &[StakeEvent],
) -> f64 {
    match kind {
        RequirementKind::StakeCount => stats.total_stakes as f64,
        RequirementKind::RewardSum => stats.total_rewards as f64,
        RequirementKind::ReturnRatio => stats.return_ratio,
        RequirementKind::ConsecutiveDays | RequirementKind::ActiveDayRun => {
            consecutive_activity_days(events) as f64
        }
        RequirementKind::FirstStakeBefore => stats
            .first_stake_time
            .map(|t| t as f64)
            .unwrap_or(f64::MAX),
        RequirementKind::Rank => stats.rank.map(|r| r as f64).unwrap_or(f64::MAX),
    }
}

fn satisfies(operator: Operator, current: f64, target: f64) -> bool {
    match operator {
        Operator::GreaterOrEqual => current >= target,
        Operator::Greater => current > target,
        Operator::LessOrEqual => current <= target,
        Operator::Less => current < target,
        Operator::Equal => current == target,
    }
}

/// Evaluate the full catalog for one address. Unlocks are persisted and
/// their progress rows removed; unmet achievements get a progress upsert.
pub fn evaluate_achievements(
    store: &EventStore,
    address: &str,
    stats: &AddressStatistics,
    events: &[StakeEvent],
    now: i64,
) -> Result<Vec<Evaluation>, ScanError> {
    let already_earned: HashSet<String> = store.earned_slugs(address)?.into_iter().collect();
    let mut evaluations = Vec::with_capacity(CATALOG.len());

    for def in CATALOG {
        let current = current_value(def.requirement.kind, stats, events);
        let target = def.requirement.value;
        let meets = satisfies(def.requirement.operator, current, target);
        let was_earned = already_earned.contains(def.slug);
        let mut newly_unlocked = false;

        if meets {
            if store.insert_earned(address, def.slug, now)? {
                newly_unlocked = true;
                log::info!("🏅 {} unlocked '{}'", address, def.name);
            }
            store.delete_progress(address, def.slug)?;
        } else if !was_earned {
            let percentage = match def.requirement.operator {
                Operator::GreaterOrEqual | Operator::Greater | Operator::Equal => {
                    if target == 0.0 {
                        0.0
                    } else {
                        (current / target * 100.0).clamp(0.0, 100.0)
                    }
                }
                // Upper-bound requirements (rank, first-stake date) have no
                // meaningful ratio: current/target overshoots 100% precisely
                // while unmet, and an unranked address sits at f64::MAX.
                // They read as 0% until satisfied.
                Operator::LessOrEqual | Operator::Less => 0.0,
            };
            store.upsert_progress(address, def.slug, current, target, percentage, now)?;
        }

        evaluations.push(Evaluation {
            slug: def.slug,
            earned: meets || was_earned,
            newly_unlocked,
            current,
            target,
        });
    }

    Ok(evaluations)
}
