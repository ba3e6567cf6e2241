use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::predict::Prediction;

/// Market prices keyed by outcome code: "1" home, "X" draw, "2" away.
pub type OddsMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "1")]
    Home,
    #[serde(rename = "X")]
    Draw,
    #[serde(rename = "2")]
    Away,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn code(self) -> &'static str {
        match self {
            Outcome::Home => "1",
            Outcome::Draw => "X",
            Outcome::Away => "2",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Home => "home win",
            Outcome::Draw => "draw",
            Outcome::Away => "away win",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValueConfig {
    /// Hard cap on raw value; extreme odds against a confident model are
    /// treated as model error, not free money.
    pub value_ceiling: f64,
    /// Multiplier applied to outcomes backed by neither signal.
    pub consistency_penalty: f64,
    /// Expected-goal differential beyond which opposing outcomes get dampened.
    pub blowout_goal_diff: f64,
    /// Per-goal scale-down rate for the dampener.
    pub blowout_scale: f64,
    /// Minimum retained fraction under the dampener.
    pub blowout_floor: f64,
    /// House floor for a quotable decimal price; lower prices only warn.
    pub min_odds: f64,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            value_ceiling: 1.0,
            consistency_penalty: 0.7,
            blowout_goal_diff: 1.0,
            blowout_scale: 0.2,
            blowout_floor: 0.2,
            min_odds: 1.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutcomeValue {
    pub odds: f64,
    /// Expected return per unit staked, after ceiling/penalties, 3 decimals.
    pub value: f64,
    /// Whether at least one of the two signals (xG favorite, probability
    /// favorite) backs this outcome.
    pub consistent: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValueAssessment {
    pub home: OutcomeValue,
    pub draw: OutcomeValue,
    pub away: OutcomeValue,
}

impl ValueAssessment {
    pub fn outcome(&self, outcome: Outcome) -> &OutcomeValue {
        match outcome {
            Outcome::Home => &self.home,
            Outcome::Draw => &self.draw,
            Outcome::Away => &self.away,
        }
    }
}

/// Score bookmaker prices against the model's own probabilities.
///
/// Fails when any of the three outcome prices is missing or below 1.0; the
/// caller isolates that failure to the one match (other matches in a batch
/// proceed).
pub fn assess_value(
    prediction: &Prediction,
    odds: &OddsMap,
    cfg: &ValueConfig,
) -> Result<ValueAssessment> {
    let price_home = outcome_price(odds, Outcome::Home, cfg)?;
    let price_draw = outcome_price(odds, Outcome::Draw, cfg)?;
    let price_away = outcome_price(odds, Outcome::Away, cfg)?;

    let mut home_value = prediction.home_win_prob * price_home - 1.0;
    let mut draw_value = prediction.draw_prob * price_draw - 1.0;
    let mut away_value = prediction.away_win_prob * price_away - 1.0;

    home_value = home_value.min(cfg.value_ceiling);
    draw_value = draw_value.min(cfg.value_ceiling);
    away_value = away_value.min(cfg.value_ceiling);

    let xg_favorite = xg_favorite(prediction);
    let prob_favorite = probability_favorite(prediction);

    // Inclusive-or on purpose: one supporting signal is enough.
    let consistent = |outcome: Outcome| xg_favorite == outcome || prob_favorite == outcome;
    let home_consistent = consistent(Outcome::Home);
    let draw_consistent = consistent(Outcome::Draw);
    let away_consistent = consistent(Outcome::Away);

    if !home_consistent {
        home_value *= cfg.consistency_penalty;
    }
    if !draw_consistent {
        draw_value *= cfg.consistency_penalty;
    }
    if !away_consistent {
        away_value *= cfg.consistency_penalty;
    }

    // A large expected blowout should not make the upset look attractive
    // purely from odds noise.
    let goal_diff = (prediction.expected_home_goals - prediction.expected_away_goals).abs();
    if goal_diff > cfg.blowout_goal_diff {
        let retained = (1.0 - goal_diff * cfg.blowout_scale).max(cfg.blowout_floor);
        if prediction.expected_home_goals > prediction.expected_away_goals {
            away_value *= retained;
        } else {
            home_value *= retained;
        }
    }

    Ok(ValueAssessment {
        home: OutcomeValue {
            odds: price_home,
            value: round3(home_value),
            consistent: home_consistent,
        },
        draw: OutcomeValue {
            odds: price_draw,
            value: round3(draw_value),
            consistent: draw_consistent,
        },
        away: OutcomeValue {
            odds: price_away,
            value: round3(away_value),
            consistent: away_consistent,
        },
    })
}

/// Favorite implied by the expected-goal comparison.
pub fn xg_favorite(p: &Prediction) -> Outcome {
    if p.expected_home_goals > p.expected_away_goals {
        Outcome::Home
    } else if p.expected_home_goals == p.expected_away_goals {
        Outcome::Draw
    } else {
        Outcome::Away
    }
}

/// Favorite implied by the probability triple.
pub fn probability_favorite(p: &Prediction) -> Outcome {
    if p.home_win_prob > p.draw_prob && p.home_win_prob > p.away_win_prob {
        Outcome::Home
    } else if p.draw_prob > p.home_win_prob && p.draw_prob > p.away_win_prob {
        Outcome::Draw
    } else {
        Outcome::Away
    }
}

fn outcome_price(odds: &OddsMap, outcome: Outcome, cfg: &ValueConfig) -> Result<f64> {
    let price = *odds
        .get(outcome.code())
        .with_context(|| format!("odds quote missing outcome \"{}\"", outcome.code()))?;
    if price < 1.0 {
        bail!("decimal odds {price:.2} for \"{}\" below 1.0", outcome.code());
    }
    if price < cfg.min_odds {
        log::warn!(
            "odds {price:.2} for \"{}\" below house minimum {:.2}",
            outcome.code(),
            cfg.min_odds
        );
    }
    Ok(price)
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
