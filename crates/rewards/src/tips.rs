//! Motivational tips picked by weight.

use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::selector::{SelectionError, Weighted, WeightedSelector};

/// Tip category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipCategory {
    /// Keeping the streak alive
    Streak,
    /// Concentration technique
    Focus,
    /// Planning and pacing
    Planning,
    /// Breaks and recovery
    Rest,
}

/// A motivational tip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    /// Text shown to the user
    pub text: String,
    /// Category
    pub category: TipCategory,
    /// Base selection weight
    pub weight: f64,
}

impl Tip {
    fn new(text: &str, category: TipCategory, weight: f64) -> Self {
        Self {
            text: text.to_string(),
            category,
            weight,
        }
    }
}

impl Weighted for Tip {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Picks tips, boosting the ones that fit the user's situation.
#[derive(Debug, Clone)]
pub struct TipPicker {
    tips: Vec<Tip>,
    streak_boost: f64,
    catch_up_boost: f64,
}

impl Default for TipPicker {
    fn default() -> Self {
        Self::new(default_tips())
    }
}

impl TipPicker {
    /// Picker over a tip list.
    pub fn new(tips: Vec<Tip>) -> Self {
        Self {
            tips,
            streak_boost: 4.0,
            catch_up_boost: 3.0,
        }
    }

    /// Tips known to the picker.
    pub fn tips(&self) -> &[Tip] {
        &self.tips
    }

    /// Choose a tip. Streak tips are boosted while a streak is at risk and
    /// planning tips while any goal is behind pace.
    pub fn pick<R: Rng>(
        &self,
        selector: &mut WeightedSelector<R>,
        streak_at_risk: bool,
        behind_pace: bool,
    ) -> Result<&Tip, SelectionError> {
        let weights: Vec<f64> = self
            .tips
            .iter()
            .map(|t| {
                let boost = match t.category {
                    TipCategory::Streak if streak_at_risk => self.streak_boost,
                    TipCategory::Planning if behind_pace => self.catch_up_boost,
                    _ => 1.0,
                };
                t.weight * boost
            })
            .collect();
        let index = selector.select(&weights)?;
        Ok(&self.tips[index])
    }
}

/// The built-in tip list.
pub fn default_tips() -> Vec<Tip> {
    vec![
        Tip::new("A short session today keeps your streak alive. Even 15 minutes counts.", TipCategory::Streak, 1.0),
        Tip::new("Study at the same time each day to make the habit automatic.", TipCategory::Streak, 1.0),
        Tip::new("Try 25 minutes of focus followed by a 5 minute break.", TipCategory::Focus, 1.5),
        Tip::new("Put your phone in another room before you start.", TipCategory::Focus, 1.0),
        Tip::new("Explain today's topic out loud as if teaching a friend.", TipCategory::Focus, 1.0),
        Tip::new("Split a big goal into weekly milestones you can actually hit.", TipCategory::Planning, 1.0),
        Tip::new("Behind on a goal? Add one extra short session this week rather than one marathon.", TipCategory::Planning, 1.0),
        Tip::new("Sleep consolidates what you learned. Do not trade it for another hour of cramming.", TipCategory::Rest, 0.5),
        Tip::new("A 10 minute walk between sessions helps you come back sharper.", TipCategory::Rest, 0.5),
    ]
}
