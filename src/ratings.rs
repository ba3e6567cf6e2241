use std::collections::{HashMap, VecDeque};

use crate::dataset::MatchRecord;

#[derive(Debug, Clone, Copy)]
pub struct RatingConfig {
    pub initial_rating: f64,
    pub initial_indicator: f64,
    pub k_base: f64,
    pub k_margin_scale: f64,
    pub attack_smoothing: f64,
    pub attack_gain: f64,
    pub defense_smoothing: f64,
    pub defense_gain: f64,
    pub strength_smoothing: f64,
    pub strength_gain: f64,
    pub form_window: usize,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1500.0,
            initial_indicator: 100.0,
            k_base: 32.0,
            k_margin_scale: 0.5,
            attack_smoothing: 0.7,
            attack_gain: 30.0,
            defense_smoothing: 0.7,
            defense_gain: 30.0,
            strength_smoothing: 0.8,
            strength_gain: 20.0,
            form_window: 5,
        }
    }
}

/// Strength profile for one team, rebuilt from scratch on every ratings pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TeamProfile {
    pub name: String,
    pub rating: f64,
    pub attack: f64,
    pub defense: f64,
    pub home_strength: f64,
    pub away_strength: f64,
    /// Last results as 1.0 / 0.5 / 0.0, oldest first, capped at `form_window`.
    pub recent_form: VecDeque<f64>,
    /// 0-100 min-max rescaling of `rating` across the pool; 50 when degenerate.
    pub normalized_rating: f64,
    /// 100 * mean of `recent_form`; 50 when no results yet.
    pub current_form: f64,
}

impl TeamProfile {
    fn new(name: String, cfg: &RatingConfig) -> Self {
        Self {
            name,
            rating: cfg.initial_rating,
            attack: cfg.initial_indicator,
            defense: cfg.initial_indicator,
            home_strength: cfg.initial_indicator,
            away_strength: cfg.initial_indicator,
            recent_form: VecDeque::new(),
            normalized_rating: 50.0,
            current_form: 50.0,
        }
    }
}

/// Fold a chronological match history into per-team profiles.
///
/// Updates are sequential and path-dependent, so the caller must pass matches
/// already sorted ascending by kickoff (`dataset::load_past_matches` does).
pub fn compute_ratings(matches: &[MatchRecord], cfg: &RatingConfig) -> HashMap<u32, TeamProfile> {
    let mut profiles: HashMap<u32, TeamProfile> = HashMap::new();

    for m in matches {
        let (Some(home_id), Some(away_id)) = (m.home_id, m.away_id) else {
            // No partial updates: a record without both team ids is dropped whole.
            log::debug!("skipping match {} with missing team id", m.id);
            continue;
        };

        profiles
            .entry(home_id)
            .or_insert_with(|| TeamProfile::new(m.home_name.clone(), cfg));
        profiles
            .entry(away_id)
            .or_insert_with(|| TeamProfile::new(m.away_name.clone(), cfg));

        let r_home = profiles[&home_id].rating;
        let r_away = profiles[&away_id].rating;

        let expected_home = elo_expectation(r_home, r_away);
        let expected_away = 1.0 - expected_home;

        let (actual_home, actual_away) = match m.home_goals.cmp(&m.away_goals) {
            std::cmp::Ordering::Greater => (1.0, 0.0),
            std::cmp::Ordering::Equal => (0.5, 0.5),
            std::cmp::Ordering::Less => (0.0, 1.0),
        };

        // Blowouts move ratings more.
        let margin = (m.home_goals as f64 - m.away_goals as f64).abs();
        let k = cfg.k_base * (1.0 + cfg.k_margin_scale * margin);

        if let Some(home) = profiles.get_mut(&home_id) {
            home.rating += k * (actual_home - expected_home);
            if m.home_goals > 0 {
                home.attack =
                    home.attack * cfg.attack_smoothing + cfg.attack_gain * m.home_goals as f64;
            }
            if m.away_goals == 0 {
                home.defense = home.defense * cfg.defense_smoothing + cfg.defense_gain;
            }
            if actual_home > 0.5 {
                home.home_strength =
                    home.home_strength * cfg.strength_smoothing + cfg.strength_gain;
            }
            push_form(&mut home.recent_form, actual_home, cfg.form_window);
        }

        if let Some(away) = profiles.get_mut(&away_id) {
            away.rating += k * (actual_away - expected_away);
            if m.away_goals > 0 {
                away.attack =
                    away.attack * cfg.attack_smoothing + cfg.attack_gain * m.away_goals as f64;
            }
            if m.home_goals == 0 {
                away.defense = away.defense * cfg.defense_smoothing + cfg.defense_gain;
            }
            if actual_away > 0.5 {
                away.away_strength =
                    away.away_strength * cfg.strength_smoothing + cfg.strength_gain;
            }
            push_form(&mut away.recent_form, actual_away, cfg.form_window);
        }
    }

    finalize_pool(&mut profiles);
    log::info!("computed ratings for {} teams", profiles.len());
    profiles
}

pub fn elo_expectation(r_home: f64, r_away: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((r_away - r_home) / 400.0))
}

fn push_form(form: &mut VecDeque<f64>, score: f64, window: usize) {
    form.push_back(score);
    while form.len() > window {
        form.pop_front();
    }
}

/// Min-max normalize ratings across the pool and derive the form percentage.
fn finalize_pool(profiles: &mut HashMap<u32, TeamProfile>) {
    if profiles.is_empty() {
        return;
    }

    let min = profiles
        .values()
        .map(|p| p.rating)
        .fold(f64::INFINITY, f64::min);
    let max = profiles
        .values()
        .map(|p| p.rating)
        .fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    for profile in profiles.values_mut() {
        profile.normalized_rating = if range > 0.0 {
            100.0 * (profile.rating - min) / range
        } else {
            50.0
        };
        profile.current_form = if profile.recent_form.is_empty() {
            50.0
        } else {
            100.0 * profile.recent_form.iter().sum::<f64>() / profile.recent_form.len() as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: u32, home_id: Option<u32>, away_id: Option<u32>, hg: u8, ag: u8) -> MatchRecord {
        MatchRecord {
            id,
            kickoff: NaiveDate::from_ymd_opt(2024, 8, 1)
                .unwrap()
                .and_hms_opt(15, 30, 0)
                .unwrap()
                + chrono::Duration::days(id as i64),
            home_id,
            away_id,
            home_name: format!("H{}", home_id.unwrap_or(0)),
            away_name: format!("A{}", away_id.unwrap_or(0)),
            home_goals: hg,
            away_goals: ag,
        }
    }

    #[test]
    fn elo_expectations_sum_to_one() {
        for (rh, ra) in [(1500.0, 1500.0), (1700.0, 1450.0), (1300.0, 1900.0)] {
            let e_home = elo_expectation(rh, ra);
            let e_away = 1.0 - e_home;
            assert!((e_home + e_away - 1.0).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&e_home));
        }
    }

    #[test]
    fn winner_overtakes_equal_rated_drawer() {
        let cfg = RatingConfig::default();
        // Teams 1 and 3 both start at 1500; 1 wins its match, 3 draws its own.
        let matches = vec![record(1, Some(1), Some(2), 2, 0), record(2, Some(3), Some(4), 1, 1)];
        let profiles = compute_ratings(&matches, &cfg);
        assert!(profiles[&1].rating > profiles[&3].rating);
        assert!(profiles[&1].rating > cfg.initial_rating);
        assert!((profiles[&3].rating - cfg.initial_rating).abs() < 1e-9);
    }

    #[test]
    fn larger_margin_moves_rating_more() {
        let cfg = RatingConfig::default();
        let narrow = compute_ratings(&[record(1, Some(1), Some(2), 1, 0)], &cfg);
        let blowout = compute_ratings(&[record(1, Some(1), Some(2), 4, 0)], &cfg);
        assert!(blowout[&1].rating > narrow[&1].rating);
    }

    #[test]
    fn form_is_fifo_and_bounded() {
        let cfg = RatingConfig::default();
        // Team 1 plays seven home matches: W W W D L L L in order.
        let results = [(2u8, 0u8), (1, 0), (3, 1), (1, 1), (0, 1), (0, 2), (1, 2)];
        let matches: Vec<MatchRecord> = results
            .iter()
            .enumerate()
            .map(|(i, &(hg, ag))| record(i as u32 + 1, Some(1), Some(2), hg, ag))
            .collect();
        let profiles = compute_ratings(&matches, &cfg);
        let form: Vec<f64> = profiles[&1].recent_form.iter().copied().collect();
        assert_eq!(form, vec![1.0, 0.5, 0.0, 0.0, 0.0]);
        // 1 + 0.5 out of 5 results.
        assert!((profiles[&1].current_form - 30.0).abs() < 1e-9);
    }

    #[test]
    fn attack_and_defense_update_only_on_goals_and_clean_sheets() {
        let cfg = RatingConfig::default();
        let profiles = compute_ratings(&[record(1, Some(1), Some(2), 0, 2)], &cfg);
        // Home side scored nothing: attack untouched. It conceded: defense untouched.
        assert!((profiles[&1].attack - cfg.initial_indicator).abs() < 1e-9);
        assert!((profiles[&1].defense - cfg.initial_indicator).abs() < 1e-9);
        // Away side scored twice and kept a clean sheet.
        assert!((profiles[&2].attack - (100.0 * 0.7 + 30.0 * 2.0)).abs() < 1e-9);
        assert!((profiles[&2].defense - (100.0 * 0.7 + 30.0)).abs() < 1e-9);
        // Away win updates away strength only.
        assert!((profiles[&2].away_strength - (100.0 * 0.8 + 20.0)).abs() < 1e-9);
        assert!((profiles[&2].home_strength - cfg.initial_indicator).abs() < 1e-9);
    }

    #[test]
    fn missing_team_id_skips_whole_record() {
        let cfg = RatingConfig::default();
        let matches = vec![record(1, Some(1), None, 3, 0), record(2, Some(1), Some(2), 1, 0)];
        let profiles = compute_ratings(&matches, &cfg);
        // Only the second match counted: one win in form, one attack update.
        assert_eq!(profiles[&1].recent_form.len(), 1);
        assert!((profiles[&1].attack - (100.0 * 0.7 + 30.0)).abs() < 1e-9);
    }

    #[test]
    fn normalization_maps_mid_rating_to_fifty() {
        let mut profiles: HashMap<u32, TeamProfile> = HashMap::new();
        let cfg = RatingConfig::default();
        for (id, rating) in [(1u32, 1500.0), (2, 1600.0), (3, 1700.0)] {
            let mut p = TeamProfile::new(format!("T{id}"), &cfg);
            p.rating = rating;
            profiles.insert(id, p);
        }
        finalize_pool(&mut profiles);
        assert!((profiles[&1].normalized_rating - 0.0).abs() < 1e-9);
        assert!((profiles[&2].normalized_rating - 50.0).abs() < 1e-9);
        assert!((profiles[&3].normalized_rating - 100.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_pool_normalizes_to_fifty() {
        let mut profiles: HashMap<u32, TeamProfile> = HashMap::new();
        let cfg = RatingConfig::default();
        for id in 1u32..=4 {
            profiles.insert(id, TeamProfile::new(format!("T{id}"), &cfg));
        }
        finalize_pool(&mut profiles);
        for p in profiles.values() {
            assert!((p.normalized_rating - 50.0).abs() < 1e-9);
            assert!((p.current_form - 50.0).abs() < 1e-9);
        }
    }
}
