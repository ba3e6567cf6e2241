use serde::{Deserialize, Serialize};

use crate::analysis::MatchAnalysis;
use crate::value::Outcome;

#[derive(Debug, Clone, Copy)]
pub struct SelectConfig {
    /// Value above which an outcome is flagged in the per-match analysis.
    pub value_threshold: f64,
    /// Floor applied again at selection time.
    pub min_bet_value: f64,
    pub max_bets: usize,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            value_threshold: 0.15,
            min_bet_value: 0.10,
            max_bets: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetCandidate {
    pub match_id: u32,
    pub kickoff: String,
    pub home_name: String,
    pub away_name: String,
    pub outcome: Outcome,
    pub odds: f64,
    pub value: f64,
    pub consistent: bool,
    /// The outcome points the other way from the expected-goal margin.
    pub contradicts_goals: bool,
}

/// Rank value-flagged outcomes across a batch of analyzed matches.
///
/// Consistent, non-contradictory candidates are preferred; only when none of
/// them clears the floor does the ranking fall back to best-by-value over
/// everything. Sort is stable, so ties keep the batch order.
pub fn suggest_bets(analyses: &[MatchAnalysis], cfg: &SelectConfig) -> Vec<BetCandidate> {
    let mut all: Vec<BetCandidate> = Vec::new();

    for analysis in analyses {
        let Some(assessment) = &analysis.assessment else {
            continue;
        };
        for flagged in &analysis.valuable {
            if flagged.value < cfg.min_bet_value {
                continue;
            }
            let entry = assessment.outcome(flagged.outcome);
            all.push(BetCandidate {
                match_id: analysis.match_id,
                kickoff: analysis.kickoff.clone(),
                home_name: analysis.home_name.clone(),
                away_name: analysis.away_name.clone(),
                outcome: flagged.outcome,
                odds: flagged.odds,
                value: flagged.value,
                consistent: entry.consistent,
                contradicts_goals: contradicts_goals(
                    flagged.outcome,
                    analysis.prediction.expected_home_goals,
                    analysis.prediction.expected_away_goals,
                ),
            });
        }
    }

    let mut preferred: Vec<BetCandidate> = all
        .iter()
        .filter(|b| b.consistent && !b.contradicts_goals)
        .cloned()
        .collect();

    let pool = if preferred.is_empty() && !all.is_empty() {
        log::warn!("no consistent candidates above threshold, falling back to best-by-value");
        &mut all
    } else {
        &mut preferred
    };

    pool.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
    pool.truncate(cfg.max_bets);
    std::mem::take(pool)
}

fn contradicts_goals(outcome: Outcome, xg_home: f64, xg_away: f64) -> bool {
    match outcome {
        Outcome::Home => xg_home <= xg_away,
        Outcome::Away => xg_away <= xg_home,
        Outcome::Draw => false,
    }
}
