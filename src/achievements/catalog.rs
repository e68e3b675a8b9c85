//! Static achievement catalog.
//!
//! Definitions are code, not data: the evaluator dispatches on the typed
//! requirement, so adding an achievement is adding a row here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementKind {
    /// Total stake event count.
    StakeCount,
    /// Total rewards, minor units.
    RewardSum,
    /// Lifetime return ratio, percent.
    ReturnRatio,
    /// Longest run of consecutive calendar days with at least one stake.
    ConsecutiveDays,
    /// Same computation as ConsecutiveDays. Kept as a distinct kind until
    /// product decides whether the two were ever meant to differ.
    ActiveDayRun,
    /// First stake before a Unix-seconds cutoff.
    FirstStakeBefore,
    /// Global rank by total rewards.
    Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    GreaterOrEqual,
    Greater,
    LessOrEqual,
    Less,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub operator: Operator,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AchievementDefinition {
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub requirement: Requirement,
}

const fn at_least(kind: RequirementKind, value: f64) -> Requirement {
    Requirement {
        kind,
        operator: Operator::GreaterOrEqual,
        value,
    }
}

const fn at_most(kind: RequirementKind, value: f64) -> Requirement {
    Requirement {
        kind,
        operator: Operator::LessOrEqual,
        value,
    }
}

pub const CATALOG: &[AchievementDefinition] = &[
    AchievementDefinition {
        slug: "first-stake",
        name: "First Stake",
        description: "Earn your first staking reward",
        requirement: at_least(RequirementKind::StakeCount, 1.0),
    },
    AchievementDefinition {
        slug: "ten-stakes",
        name: "Getting Warm",
        description: "Earn 10 staking rewards",
        requirement: at_least(RequirementKind::StakeCount, 10.0),
    },
    AchievementDefinition {
        slug: "hundred-stakes",
        name: "Centurion",
        description: "Earn 100 staking rewards",
        requirement: at_least(RequirementKind::StakeCount, 100.0),
    },
    AchievementDefinition {
        slug: "thousand-stakes",
        name: "Power Staker",
        description: "Earn 1,000 staking rewards",
        requirement: at_least(RequirementKind::StakeCount, 1_000.0),
    },
    AchievementDefinition {
        slug: "first-coin",
        name: "First Coin",
        description: "Accumulate one whole coin in rewards",
        requirement: at_least(RequirementKind::RewardSum, 100_000_000.0),
    },
    AchievementDefinition {
        slug: "reward-whale",
        name: "Reward Whale",
        description: "Accumulate 10 whole coins in rewards",
        requirement: at_least(RequirementKind::RewardSum, 1_000_000_000.0),
    },
    AchievementDefinition {
        slug: "efficient-staker",
        name: "Efficient Staker",
        description: "Reach a 1% lifetime return ratio",
        requirement: at_least(RequirementKind::ReturnRatio, 1.0),
    },
    AchievementDefinition {
        slug: "compounder",
        name: "Compounder",
        description: "Reach a 5% lifetime return ratio",
        requirement: at_least(RequirementKind::ReturnRatio, 5.0),
    },
    AchievementDefinition {
        slug: "week-streak",
        name: "Week Streak",
        description: "Stake on 7 consecutive days",
        requirement: at_least(RequirementKind::ConsecutiveDays, 7.0),
    },
    AchievementDefinition {
        slug: "month-streak",
        name: "Month Streak",
        description: "Stake on 30 consecutive days",
        requirement: at_least(RequirementKind::ConsecutiveDays, 30.0),
    },
    AchievementDefinition {
        slug: "daily-regular",
        name: "Daily Regular",
        description: "Stay active for 14 days straight",
        requirement: at_least(RequirementKind::ActiveDayRun, 14.0),
    },
    AchievementDefinition {
        slug: "early-adopter",
        name: "Early Adopter",
        description: "Staked before September 2020",
        requirement: at_most(RequirementKind::FirstStakeBefore, 1_598_918_400.0),
    },
    AchievementDefinition {
        slug: "top-ten",
        name: "Top Ten",
        description: "Reach the top 10 by total rewards",
        requirement: at_most(RequirementKind::Rank, 10.0),
    },
    AchievementDefinition {
        slug: "podium",
        name: "Podium",
        description: "Reach the top 3 by total rewards",
        requirement: at_most(RequirementKind::Rank, 3.0),
    },
];
