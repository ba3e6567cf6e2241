use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ratings::TeamProfile;
use crate::value::{Outcome, round3};

#[derive(Debug, Clone)]
pub struct PredictConfig {
    /// League-average expected goals per side.
    pub base_home_goals: f64,
    pub base_away_goals: f64,
    pub home_advantage: f64,
    pub rating_baseline: f64,
    /// Weight of the rating differential nudged onto the home xG.
    pub rating_diff_weight: f64,
    pub form_floor: f64,
    pub form_ceiling: f64,
    pub home_strength_floor: f64,
    pub away_strength_floor: f64,
    pub home_attack_floor: f64,
    pub home_defense_floor: f64,
    pub away_attack_floor: f64,
    pub away_defense_floor: f64,
    pub xg_home_min: f64,
    pub xg_home_max: f64,
    pub xg_away_min: f64,
    pub xg_away_max: f64,
    /// Scoreline grid truncation; mass beyond this many goals is negligible.
    pub max_goals: u32,
    /// Bounded probability shift when reconciling toward the xG favorite.
    pub side_shift_cap: f64,
    pub draw_shift_cap: f64,
    pub adjustments: TeamAdjustments,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            base_home_goals: 1.6,
            base_away_goals: 1.3,
            home_advantage: 1.1,
            rating_baseline: 1500.0,
            rating_diff_weight: 0.5,
            form_floor: 0.3,
            form_ceiling: 0.8,
            home_strength_floor: 0.7,
            away_strength_floor: 0.6,
            home_attack_floor: 0.8,
            home_defense_floor: 0.8,
            away_attack_floor: 0.7,
            away_defense_floor: 0.7,
            xg_home_min: 0.5,
            xg_home_max: 4.0,
            xg_away_min: 0.4,
            xg_away_max: 3.5,
            max_goals: 10,
            side_shift_cap: 0.15,
            draw_shift_cap: 0.10,
            adjustments: TeamAdjustments::default(),
        }
    }
}

/// Per-team multiplier overrides, injected as data instead of being wired
/// into control flow by name. Empty by default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamAdjustments {
    #[serde(default)]
    pub teams: HashMap<u32, TeamMultipliers>,
    #[serde(default)]
    pub pairs: Vec<PairMultipliers>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TeamMultipliers {
    #[serde(default = "one")]
    pub home_attack: f64,
    #[serde(default = "one")]
    pub home_defense: f64,
    #[serde(default = "one")]
    pub away_attack: f64,
    #[serde(default = "one")]
    pub away_defense: f64,
}

/// Override for one specific pairing, applied on top of the per-team rows.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PairMultipliers {
    pub home_id: u32,
    pub away_id: u32,
    #[serde(default = "one")]
    pub home_attack: f64,
    #[serde(default = "one")]
    pub away_attack: f64,
}

fn one() -> f64 {
    1.0
}

impl TeamAdjustments {
    fn team(&self, id: u32) -> Option<&TeamMultipliers> {
        self.teams.get(&id)
    }

    fn pair(&self, home_id: u32, away_id: u32) -> Option<&PairMultipliers> {
        self.pairs
            .iter()
            .find(|p| p.home_id == home_id && p.away_id == away_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub home_win_prob: f64,
    pub draw_prob: f64,
    pub away_win_prob: f64,
    pub expected_home_goals: f64,
    pub expected_away_goals: f64,
}

impl Prediction {
    /// Fixed fallback when either team has no profile. Never fabricated from
    /// a synthetic profile; callers see a deliberately neutral matchup.
    pub fn neutral() -> Self {
        Self {
            home_win_prob: 0.33,
            draw_prob: 0.34,
            away_win_prob: 0.33,
            expected_home_goals: 1.5,
            expected_away_goals: 1.2,
        }
    }
}

/// Bounded multiplicative factors derived from one side's profile.
#[derive(Debug, Clone, Copy)]
struct SideFactors {
    rating: f64,
    form: f64,
    venue_strength: f64,
    attack: f64,
    defense: f64,
}

/// Forecast one matchup from the current profile pool.
///
/// Pure: no hidden state or randomness, so repeated calls with an unchanged
/// pool are identical and fan-out over many fixtures is safe.
pub fn predict_match(
    profiles: &HashMap<u32, TeamProfile>,
    home_id: u32,
    away_id: u32,
    cfg: &PredictConfig,
) -> Prediction {
    let (Some(home), Some(away)) = (profiles.get(&home_id), profiles.get(&away_id)) else {
        log::debug!("no profile for matchup {home_id} vs {away_id}, using neutral prediction");
        return Prediction::neutral();
    };

    let home_factors = side_factors(home, cfg, true);
    let away_factors = side_factors(away, cfg, false);
    log::debug!(
        "factors {home_id}: rating {:.3}, form {:.2}, venue {:.2}, attack {:.2}, defense {:.2}",
        home_factors.rating,
        home_factors.form,
        home_factors.venue_strength,
        home_factors.attack,
        home_factors.defense
    );
    log::debug!(
        "factors {away_id}: rating {:.3}, form {:.2}, venue {:.2}, attack {:.2}, defense {:.2}",
        away_factors.rating,
        away_factors.form,
        away_factors.venue_strength,
        away_factors.attack,
        away_factors.defense
    );

    let (home_attack, home_defense, away_attack, away_defense) =
        apply_adjustments(&cfg.adjustments, home_id, away_id, &home_factors, &away_factors);

    // A strong opposing defense (ratio above 1) depresses the attacking
    // side's rate through the (2 - defense) term; a weak one inflates it.
    let mut xg_home = cfg.base_home_goals
        * home_attack
        * (2.0 - away_defense)
        * home_factors.form
        * cfg.home_advantage;
    let mut xg_away = cfg.base_away_goals * away_attack * (2.0 - home_defense) * away_factors.form;

    // Home differential matters more for the home goal estimate.
    let rating_diff = (home_factors.rating - away_factors.rating) * cfg.rating_diff_weight;
    xg_home += rating_diff;
    xg_away -= rating_diff * 0.5;

    let xg_home = round2(xg_home.clamp(cfg.xg_home_min, cfg.xg_home_max));
    let xg_away = round2(xg_away.clamp(cfg.xg_away_min, cfg.xg_away_max));

    let (p_home, p_draw, p_away) = outcome_probs_poisson(xg_home, xg_away, cfg.max_goals);
    let (p_home, p_draw, p_away) = normalize3(round3(p_home), round3(p_draw), round3(p_away));

    let prediction = Prediction {
        home_win_prob: p_home,
        draw_prob: p_draw,
        away_win_prob: p_away,
        expected_home_goals: xg_home,
        expected_away_goals: xg_away,
    };
    reconcile(prediction, cfg)
}

fn side_factors(profile: &TeamProfile, cfg: &PredictConfig, is_home: bool) -> SideFactors {
    let indicator = |v: f64, floor: f64| (v / 100.0).max(floor);
    if is_home {
        SideFactors {
            rating: profile.rating / cfg.rating_baseline,
            form: (profile.current_form / 100.0).clamp(cfg.form_floor, cfg.form_ceiling),
            venue_strength: indicator(profile.home_strength, cfg.home_strength_floor),
            attack: indicator(profile.attack, cfg.home_attack_floor),
            defense: indicator(profile.defense, cfg.home_defense_floor),
        }
    } else {
        SideFactors {
            rating: profile.rating / cfg.rating_baseline,
            form: (profile.current_form / 100.0).clamp(cfg.form_floor, cfg.form_ceiling),
            venue_strength: indicator(profile.away_strength, cfg.away_strength_floor),
            attack: indicator(profile.attack, cfg.away_attack_floor),
            defense: indicator(profile.defense, cfg.away_defense_floor),
        }
    }
}

fn apply_adjustments(
    adjustments: &TeamAdjustments,
    home_id: u32,
    away_id: u32,
    home: &SideFactors,
    away: &SideFactors,
) -> (f64, f64, f64, f64) {
    let mut home_attack = home.attack;
    let mut home_defense = home.defense;
    let mut away_attack = away.attack;
    let mut away_defense = away.defense;

    if let Some(m) = adjustments.team(home_id) {
        home_attack *= m.home_attack;
        home_defense *= m.home_defense;
    }
    if let Some(m) = adjustments.team(away_id) {
        away_attack *= m.away_attack;
        away_defense *= m.away_defense;
    }
    if let Some(p) = adjustments.pair(home_id, away_id) {
        home_attack *= p.home_attack;
        away_attack *= p.away_attack;
    }

    (home_attack, home_defense, away_attack, away_defense)
}

/// Sum a truncated independent-Poisson scoreline grid into outcome buckets.
fn outcome_probs_poisson(xg_home: f64, xg_away: f64, max_goals: u32) -> (f64, f64, f64) {
    let pmf_home = poisson_pmf(xg_home, max_goals);
    let pmf_away = poisson_pmf(xg_away, max_goals);

    let mut p_home = 0.0;
    let mut p_draw = 0.0;
    let mut p_away = 0.0;

    for (h, ph) in pmf_home.iter().enumerate() {
        for (a, pa) in pmf_away.iter().enumerate() {
            let p = ph * pa;
            match h.cmp(&a) {
                std::cmp::Ordering::Greater => p_home += p,
                std::cmp::Ordering::Equal => p_draw += p,
                std::cmp::Ordering::Less => p_away += p,
            }
        }
    }

    (p_home, p_draw, p_away)
}

/// PMF over 0..max_goals goals (exclusive upper bound), computed iteratively.
/// The truncated tail is left out; callers renormalize the outcome triple.
fn poisson_pmf(lambda: f64, max_goals: u32) -> Vec<f64> {
    let n = max_goals.max(1) as usize;
    let lambda = lambda.max(0.0);
    let mut out = vec![0.0; n];
    out[0] = (-lambda).exp();
    for k in 1..n {
        out[k] = out[k - 1] * lambda / k as f64;
    }
    out
}

fn normalize3(a: f64, b: f64, c: f64) -> (f64, f64, f64) {
    let sum = a + b + c;
    if sum > 0.0 {
        (a / sum, b / sum, c / sum)
    } else {
        (a, b, c)
    }
}

/// Reconcile the probability triple with the expected-goal comparison.
///
/// At extreme xG ratios the goal-margin favorite and the Poisson-derived
/// probability favorite can diverge; downstream value judgments assume they
/// agree, so probability mass is shifted toward the xG favorite by a bounded
/// amount drawn proportionally from the other two outcomes.
fn reconcile(p: Prediction, cfg: &PredictConfig) -> Prediction {
    let xg_favorite = crate::value::xg_favorite(&p);
    let prob_favorite = prob_favorite_for_reconcile(&p);
    if xg_favorite == prob_favorite {
        return p;
    }

    log::warn!(
        "prediction disagreement: xG favors {}, probabilities favor {}",
        xg_favorite.label(),
        prob_favorite.label()
    );

    let mut home = p.home_win_prob;
    let mut draw = p.draw_prob;
    let mut away = p.away_win_prob;

    match xg_favorite {
        Outcome::Home => {
            let shift = (draw / 2.0 + away / 3.0).min(cfg.side_shift_cap);
            home += shift;
            draw -= shift / 2.0;
            away -= shift / 2.0;
        }
        Outcome::Away => {
            let shift = (draw / 2.0 + home / 3.0).min(cfg.side_shift_cap);
            away += shift;
            draw -= shift / 2.0;
            home -= shift / 2.0;
        }
        Outcome::Draw => {
            let shift = ((home + away) / 3.0).min(cfg.draw_shift_cap);
            draw += shift;
            home -= shift / 2.0;
            away -= shift / 2.0;
        }
    }

    let home = round3(home.clamp(0.01, 0.99));
    let draw = round3(draw.clamp(0.01, 0.99));
    let away = round3(away.clamp(0.01, 0.99));
    let (home, draw, away) = normalize3(home, draw, away);

    Prediction {
        home_win_prob: home,
        draw_prob: draw,
        away_win_prob: away,
        ..p
    }
}

/// Ties fall to draw here (unlike the value engine's ranking, which breaks
/// ties away); the reconciliation only needs a stable notion of "leader".
fn prob_favorite_for_reconcile(p: &Prediction) -> Outcome {
    if p.home_win_prob > p.draw_prob && p.home_win_prob > p.away_win_prob {
        Outcome::Home
    } else if p.away_win_prob > p.draw_prob && p.away_win_prob > p.home_win_prob {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
