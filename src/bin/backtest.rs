use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use buli_edge::config::EngineConfig;
use buli_edge::dataset::parse_past_matches_json;
use buli_edge::metrics::{classify_outcome, evaluate_predictions};
use buli_edge::predict::predict_match;
use buli_edge::ratings::compute_ratings;
use buli_edge::value::Outcome;

/// Chronological holdout replay: ratings from the head of the history, model
/// scored on the tail. Meant for quick tuning iterations; no network calls.
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/matches/past_matches.json"));
    let holdout: usize = args
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or(50);

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let matches = parse_past_matches_json(&raw)?;
    anyhow::ensure!(
        matches.len() > holdout,
        "need more than {holdout} matches, got {}",
        matches.len()
    );

    let split = matches.len() - holdout;
    let (train, test) = matches.split_at(split);

    let cfg = EngineConfig::from_env();
    let profiles = compute_ratings(train, &cfg.rating);

    let mut predictions = Vec::new();
    let mut outcomes: Vec<Outcome> = Vec::new();
    let mut skipped = 0usize;
    for m in test {
        let (Some(home_id), Some(away_id)) = (m.home_id, m.away_id) else {
            skipped += 1;
            continue;
        };
        predictions.push(predict_match(&profiles, home_id, away_id, &cfg.predict));
        outcomes.push(classify_outcome(m.home_goals, m.away_goals));
    }

    let metrics = evaluate_predictions(&predictions, &outcomes);
    println!("Train matches: {}", train.len());
    println!("Holdout matches: {} ({} skipped)", metrics.samples, skipped);
    println!("Brier score: {:.4}", metrics.brier);
    println!("Log loss:    {:.4}", metrics.log_loss);
    println!("Accuracy:    {:.1}%", metrics.accuracy * 100.0);

    Ok(())
}
