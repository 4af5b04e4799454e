use serde::Serialize;

use crate::constants::{
    ACHIEVEMENT_PLAY_ONCE, ACHIEVEMENT_STREAK, ACHIEVEMENT_WIN_FIVE, ACHIEVEMENT_WIN_ONE,
    ACHIEVEMENT_WIN_TEN, STREAK_ACHIEVEMENT_THRESHOLD,
};

/// Catalog entry registered with the achievement service at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub image: &'static str,
    #[serde(rename = "imageType")]
    pub image_type: &'static str,
    pub multiple: bool,
}

const IMAGE_TYPE_EMOJI: &str = "emoji";

pub const CATALOG: [AchievementDefinition; 5] = [
    AchievementDefinition {
        name: ACHIEVEMENT_WIN_ONE,
        description: "Win your first memory game",
        image: "3rd_place_medal",
        image_type: IMAGE_TYPE_EMOJI,
        multiple: false,
    },
    AchievementDefinition {
        name: ACHIEVEMENT_WIN_FIVE,
        description: "Win 5 memory games",
        image: "2nd_place_medal",
        image_type: IMAGE_TYPE_EMOJI,
        multiple: false,
    },
    AchievementDefinition {
        name: ACHIEVEMENT_WIN_TEN,
        description: "Win 10 memory games",
        image: "1st_place_medal",
        image_type: IMAGE_TYPE_EMOJI,
        multiple: false,
    },
    AchievementDefinition {
        name: ACHIEVEMENT_PLAY_ONCE,
        description: "Play for the first time",
        image: "beginner",
        image_type: IMAGE_TYPE_EMOJI,
        multiple: false,
    },
    AchievementDefinition {
        name: ACHIEVEMENT_STREAK,
        description: "Match 4 pairs in a row",
        image: "bulb",
        image_type: IMAGE_TYPE_EMOJI,
        multiple: false,
    },
];

// Win-count milestones, lowest first
const WIN_MILESTONES: [(u32, &str); 3] = [
    (1, ACHIEVEMENT_WIN_ONE),
    (5, ACHIEVEMENT_WIN_FIVE),
    (10, ACHIEVEMENT_WIN_TEN),
];

/// Every milestone reached at `wins`; earlier ones re-fire and are deduplicated downstream.
pub fn win_achievements(wins: u32) -> Vec<&'static str> {
    WIN_MILESTONES
        .iter()
        .filter(|(threshold, _)| wins >= *threshold)
        .map(|(_, name)| *name)
        .collect()
}

pub fn streak_achievement(streak: u32) -> Option<&'static str> {
    (streak >= STREAK_ACHIEVEMENT_THRESHOLD).then_some(ACHIEVEMENT_STREAK)
}

pub fn completion_achievement() -> &'static str {
    ACHIEVEMENT_PLAY_ONCE
}
