use std::env;
use std::fs;

use crate::predict::{PredictConfig, TeamAdjustments};
use crate::ratings::RatingConfig;
use crate::select::SelectConfig;
use crate::value::ValueConfig;

/// All engine tuning in one explicit object, constructed once and passed by
/// reference into the entry points. Nothing in the library reads ambient
/// globals.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub rating: RatingConfig,
    pub predict: PredictConfig,
    pub value: ValueConfig,
    pub select: SelectConfig,
}

impl EngineConfig {
    /// Defaults overridden by environment variables (the binaries load `.env`
    /// first). Every knob keeps its default when the variable is unset or
    /// unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.rating.k_base = env_f64("ELO_K_BASE", cfg.rating.k_base);
        cfg.rating.k_margin_scale = env_f64("ELO_K_MARGIN_SCALE", cfg.rating.k_margin_scale);

        cfg.predict.base_home_goals = env_f64("BASE_HOME_GOALS", cfg.predict.base_home_goals);
        cfg.predict.base_away_goals = env_f64("BASE_AWAY_GOALS", cfg.predict.base_away_goals);
        cfg.predict.home_advantage = env_f64("HOME_ADVANTAGE", cfg.predict.home_advantage);

        cfg.value.value_ceiling = env_f64("VALUE_CEILING", cfg.value.value_ceiling);
        cfg.value.consistency_penalty =
            env_f64("CONSISTENCY_PENALTY", cfg.value.consistency_penalty);
        cfg.value.min_odds = env_f64("MIN_ODDS_VALUE", cfg.value.min_odds);

        cfg.select.value_threshold = env_f64("VALUE_THRESHOLD", cfg.select.value_threshold);
        cfg.select.min_bet_value = env_f64("MIN_VALUE_FOR_BET", cfg.select.min_bet_value);
        cfg.select.max_bets = env_usize("MAX_DAILY_BETS", cfg.select.max_bets);

        if let Ok(path) = env::var("TEAM_ADJUSTMENTS") {
            match load_adjustments(path.trim()) {
                Ok(adjustments) => cfg.predict.adjustments = adjustments,
                Err(err) => log::error!("ignoring TEAM_ADJUSTMENTS: {err:#}"),
            }
        }

        cfg
    }
}

fn load_adjustments(path: &str) -> anyhow::Result<TeamAdjustments> {
    use anyhow::Context;
    let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let adjustments: TeamAdjustments =
        serde_json::from_str(&raw).context("invalid adjustments json")?;
    log::info!(
        "loaded {} team and {} pair adjustment rows",
        adjustments.teams.len(),
        adjustments.pairs.len()
    );
    Ok(adjustments)
}

pub(crate) fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
