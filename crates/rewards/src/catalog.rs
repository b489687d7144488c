//! The built-in reward catalog.

use studytrack_core::{Criteria, CriterionType, Rarity, Reward, RewardId, RewardType, Timeframe};

struct Entry {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    kind: RewardType,
    category: &'static str,
    points: u64,
    rarity: Rarity,
    criterion: CriterionType,
    threshold: f64,
    timeframe: Timeframe,
}

const ENTRIES: &[Entry] = &[
    Entry {
        id: "first_session",
        name: "First Steps",
        description: "Complete your first study session",
        kind: RewardType::Badge,
        category: "sessions",
        points: 10,
        rarity: Rarity::Common,
        criterion: CriterionType::SessionsCount,
        threshold: 1.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "sessions_50",
        name: "Regular",
        description: "Complete 50 study sessions",
        kind: RewardType::Achievement,
        category: "sessions",
        points: 200,
        rarity: Rarity::Uncommon,
        criterion: CriterionType::SessionsCount,
        threshold: 50.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "busy_week",
        name: "Busy Week",
        description: "Complete 10 sessions in one week",
        kind: RewardType::Badge,
        category: "sessions",
        points: 50,
        rarity: Rarity::Uncommon,
        criterion: CriterionType::SessionsCount,
        threshold: 10.0,
        timeframe: Timeframe::Weekly,
    },
    Entry {
        id: "streak_3",
        name: "On a Roll",
        description: "Study 3 days in a row",
        kind: RewardType::Badge,
        category: "streaks",
        points: 30,
        rarity: Rarity::Common,
        criterion: CriterionType::StreakDays,
        threshold: 3.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "streak_7",
        name: "Week Warrior",
        description: "Study 7 days in a row",
        kind: RewardType::Badge,
        category: "streaks",
        points: 100,
        rarity: Rarity::Uncommon,
        criterion: CriterionType::StreakDays,
        threshold: 7.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "streak_30",
        name: "Unstoppable",
        description: "Study 30 days in a row",
        kind: RewardType::Achievement,
        category: "streaks",
        points: 500,
        rarity: Rarity::Epic,
        criterion: CriterionType::StreakDays,
        threshold: 30.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "hours_10",
        name: "Ten Hours In",
        description: "Study for 10 hours in total",
        kind: RewardType::Badge,
        category: "time",
        points: 50,
        rarity: Rarity::Common,
        criterion: CriterionType::StudyHours,
        threshold: 10.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "hours_100",
        name: "Centurion",
        description: "Study for 100 hours in total",
        kind: RewardType::Achievement,
        category: "time",
        points: 400,
        rarity: Rarity::Rare,
        criterion: CriterionType::StudyHours,
        threshold: 100.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "monthly_hours_20",
        name: "Solid Month",
        description: "Study for 20 hours within one month",
        kind: RewardType::Badge,
        category: "time",
        points: 120,
        rarity: Rarity::Uncommon,
        criterion: CriterionType::StudyHours,
        threshold: 20.0,
        timeframe: Timeframe::Monthly,
    },
    Entry {
        id: "first_goal",
        name: "Goal Getter",
        description: "Complete your first goal",
        kind: RewardType::Badge,
        category: "goals",
        points: 25,
        rarity: Rarity::Common,
        criterion: CriterionType::GoalsCompleted,
        threshold: 1.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "goals_10",
        name: "Finisher",
        description: "Complete 10 goals",
        kind: RewardType::Achievement,
        category: "goals",
        points: 250,
        rarity: Rarity::Rare,
        criterion: CriterionType::GoalsCompleted,
        threshold: 10.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "early_bird",
        name: "Early Bird",
        description: "Start 5 sessions before 7am",
        kind: RewardType::Badge,
        category: "habits",
        points: 40,
        rarity: Rarity::Uncommon,
        criterion: CriterionType::EarlyBird,
        threshold: 5.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "night_owl",
        name: "Night Owl",
        description: "Start 5 sessions after 10pm",
        kind: RewardType::Badge,
        category: "habits",
        points: 40,
        rarity: Rarity::Uncommon,
        criterion: CriterionType::NightOwl,
        threshold: 5.0,
        timeframe: Timeframe::Alltime,
    },
    Entry {
        id: "perfect_week",
        name: "Perfect Week",
        description: "Study every day of a calendar week",
        kind: RewardType::Achievement,
        category: "streaks",
        points: 150,
        rarity: Rarity::Rare,
        criterion: CriterionType::PerfectWeek,
        threshold: 1.0,
        timeframe: Timeframe::Weekly,
    },
];

/// The catalog shipped with the engine, sorted by id.
pub fn default_catalog() -> Vec<Reward> {
    let mut catalog: Vec<Reward> = ENTRIES
        .iter()
        .map(|e| Reward {
            id: RewardId::new(e.id),
            name: e.name.to_string(),
            description: e.description.to_string(),
            kind: e.kind,
            category: e.category.to_string(),
            points_value: e.points,
            rarity: e.rarity,
            criteria: Criteria {
                kind: e.criterion,
                threshold: e.threshold,
                timeframe: e.timeframe,
                key: None,
            },
        })
        .collect();
    catalog.sort_by(|a, b| a.id.cmp(&b.id));
    catalog
}
