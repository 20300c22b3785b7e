//! Per-`(feature, tool)` consecutive-regression tracking with cooldown.
//!
//! Before applying a feature, consult [`FeatureHealth::should_skip`]; after
//! the attempt, record its [`Outcome`]. A run of `auto_disable_threshold`
//! `hurt` outcomes arms a cooldown that skips the feature for
//! `auto_disable_cooldown_requests` subsequent attempts.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Neutral,
    Hurt,
}

#[derive(Debug, Clone, Default)]
struct FeatureState {
    regression_streak: u32,
    cooldown_remaining: u32,
}

#[derive(Debug, Default)]
pub struct FeatureHealth {
    states: HashMap<String, FeatureState>,
    threshold: u32,
    cooldown_requests: u32,
}

impl FeatureHealth {
    pub fn new(threshold: u32, cooldown_requests: u32) -> Self {
        Self { states: HashMap::new(), threshold, cooldown_requests }
    }

    pub fn key(feature: &str, tool: Option<&str>) -> String {
        format!("{feature}:{}", tool.unwrap_or("_global"))
    }

    /// If a cooldown is active for `key`, decrement it and return `true`
    /// (skip the feature this attempt); otherwise return `false`.
    pub fn should_skip(&mut self, key: &str) -> bool {
        let state = self.states.entry(key.to_string()).or_default();
        if state.cooldown_remaining > 0 {
            state.cooldown_remaining -= 1;
            return true;
        }
        false
    }

    pub fn record(&mut self, key: &str, outcome: Outcome) {
        let state = self.states.entry(key.to_string()).or_default();
        match outcome {
            Outcome::Success => state.regression_streak = 0,
            Outcome::Neutral => state.regression_streak = state.regression_streak.saturating_sub(1),
            Outcome::Hurt => {
                state.regression_streak += 1;
                if state.regression_streak >= self.threshold {
                    state.cooldown_remaining = self.cooldown_requests;
                    state.regression_streak = 0;
                }
            }
        }
    }

    pub fn cooldown_remaining(&self, key: &str) -> u32 {
        self.states.get(key).map(|s| s.cooldown_remaining).unwrap_or(0)
    }
}
