use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dataset::UpcomingMatch;
use crate::predict::{Prediction, predict_match};
use crate::ratings::TeamProfile;
use crate::value::{OddsMap, Outcome, ValueAssessment, assess_value};

/// One outcome whose value cleared the analysis threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlaggedOutcome {
    pub outcome: Outcome,
    pub odds: f64,
    pub value: f64,
}

/// Full per-fixture result. `skipped` carries the reason when the row could
/// not be priced (missing team id, no odds, or a failed value computation);
/// such rows keep the neutral prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchAnalysis {
    pub match_id: u32,
    pub kickoff: String,
    pub home_name: String,
    pub away_name: String,
    pub prediction: Prediction,
    pub odds: Option<OddsMap>,
    pub assessment: Option<ValueAssessment>,
    pub valuable: Vec<FlaggedOutcome>,
    pub skipped: Option<String>,
}

/// Analyze a batch of fixtures against an already-built rating pool.
///
/// Every fixture yields a row: per-match failures are recorded on that row
/// and never abort the rest of the batch. With the pool fixed, each row is a
/// pure function of its fixture, so the fan-out runs in parallel while
/// preserving input order.
pub fn analyze_matches(
    profiles: &HashMap<u32, TeamProfile>,
    fixtures: &[(UpcomingMatch, Option<OddsMap>)],
    cfg: &EngineConfig,
) -> Vec<MatchAnalysis> {
    let rows: Vec<MatchAnalysis> = fixtures
        .par_iter()
        .map(|(fixture, odds)| analyze_one(profiles, fixture, odds.as_ref(), cfg))
        .collect();

    let skipped = rows.iter().filter(|r| r.skipped.is_some()).count();
    if skipped > 0 {
        log::warn!("{skipped} of {} fixtures skipped value assessment", rows.len());
    }
    rows
}

fn analyze_one(
    profiles: &HashMap<u32, TeamProfile>,
    fixture: &UpcomingMatch,
    odds: Option<&OddsMap>,
    cfg: &EngineConfig,
) -> MatchAnalysis {
    let mut row = MatchAnalysis {
        match_id: fixture.id,
        kickoff: fixture.kickoff_raw.clone(),
        home_name: fixture.home_name.clone(),
        away_name: fixture.away_name.clone(),
        prediction: Prediction::neutral(),
        odds: odds.cloned(),
        assessment: None,
        valuable: Vec::new(),
        skipped: None,
    };

    let (Some(home_id), Some(away_id)) = (fixture.home_id, fixture.away_id) else {
        log::warn!("fixture {} is missing a team id", fixture.id);
        row.skipped = Some("fixture is missing a team id".to_string());
        return row;
    };
    row.prediction = predict_match(profiles, home_id, away_id, &cfg.predict);

    let Some(odds) = odds else {
        row.skipped = Some("no odds source produced a quote".to_string());
        return row;
    };

    match assess_value(&row.prediction, odds, &cfg.value) {
        Ok(assessment) => {
            row.valuable = Outcome::ALL
                .iter()
                .filter_map(|&outcome| {
                    let entry = assessment.outcome(outcome);
                    (entry.value > cfg.select.value_threshold).then_some(FlaggedOutcome {
                        outcome,
                        odds: entry.odds,
                        value: entry.value,
                    })
                })
                .collect();
            row.assessment = Some(assessment);
        }
        Err(err) => {
            log::warn!("fixture {}: value assessment failed: {err:#}", fixture.id);
            row.skipped = Some(format!("{err:#}"));
        }
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::OddsMap;

    fn fixture(id: u32, home_id: Option<u32>, away_id: Option<u32>) -> UpcomingMatch {
        UpcomingMatch {
            id,
            kickoff: None,
            kickoff_raw: "2025-03-01T15:30:00".to_string(),
            home_id,
            away_id,
            home_name: "Home".to_string(),
            away_name: "Away".to_string(),
        }
    }

    fn full_odds() -> OddsMap {
        OddsMap::from([
            ("1".to_string(), 2.1),
            ("X".to_string(), 3.4),
            ("2".to_string(), 3.6),
        ])
    }

    #[test]
    fn failures_stay_isolated_per_match() {
        let profiles = HashMap::new();
        let cfg = EngineConfig::default();
        let mut bad_odds = full_odds();
        bad_odds.remove("X");

        let fixtures = vec![
            (fixture(1, Some(1), Some(2)), Some(full_odds())),
            (fixture(2, Some(3), Some(4)), Some(bad_odds)),
            (fixture(3, Some(5), Some(6)), None),
        ];
        let rows = analyze_matches(&profiles, &fixtures, &cfg);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].skipped.is_none());
        assert!(rows[0].assessment.is_some());
        assert!(rows[1].skipped.as_deref().unwrap().contains("X"));
        assert!(rows[2].skipped.as_deref().unwrap().contains("no odds"));
        // Predictions are present on every row regardless.
        assert_eq!(rows[1].prediction, Prediction::neutral());
    }

    #[test]
    fn missing_team_id_skips_pricing_but_keeps_the_row() {
        let profiles = HashMap::new();
        let cfg = EngineConfig::default();
        let fixtures = vec![
            (fixture(1, Some(1), None), Some(full_odds())),
            (fixture(2, None, Some(2)), Some(full_odds())),
        ];
        let rows = analyze_matches(&profiles, &fixtures, &cfg);
        for row in &rows {
            assert!(row.skipped.as_deref().unwrap().contains("team id"));
            assert!(row.assessment.is_none());
            assert!(row.valuable.is_empty());
            assert_eq!(row.prediction, Prediction::neutral());
        }
    }

    #[test]
    fn rows_keep_fixture_order() {
        let profiles = HashMap::new();
        let cfg = EngineConfig::default();
        let fixtures: Vec<(UpcomingMatch, Option<OddsMap>)> = (1..=20)
            .map(|id| (fixture(id, Some(id), Some(id + 100)), Some(full_odds())))
            .collect();
        let rows = analyze_matches(&profiles, &fixtures, &cfg);
        let ids: Vec<u32> = rows.iter().map(|r| r.match_id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<u32>>());
    }

    #[test]
    fn neutral_prediction_with_generous_odds_flags_value() {
        let profiles = HashMap::new();
        let cfg = EngineConfig::default();
        // 0.34 draw probability at 4.5 gives value 0.53 before discounts.
        let odds = OddsMap::from([
            ("1".to_string(), 3.1),
            ("X".to_string(), 4.5),
            ("2".to_string(), 3.1),
        ]);
        let rows = analyze_matches(&profiles, &[(fixture(1, Some(1), Some(2)), Some(odds))], &cfg);
        assert!(rows[0].valuable.iter().any(|f| f.outcome == Outcome::Draw));
    }
}
