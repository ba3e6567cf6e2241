use std::path::PathBuf;

use anyhow::{Context, Result};

use buli_edge::analysis::analyze_matches;
use buli_edge::config::EngineConfig;
use buli_edge::dataset::{self, UpcomingMatch};
use buli_edge::export;
use buli_edge::odds::{
    OddsApiConfig, OddsProvider, StoredOddsProvider, SyntheticOddsProvider, TheOddsApiProvider,
    resolve_odds,
};
use buli_edge::ratings::compute_ratings;
use buli_edge::select::suggest_bets;
use buli_edge::value::OddsMap;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    let matches_dir = data_dir.join("matches");
    let odds_dir = data_dir.join("odds");

    let cfg = EngineConfig::from_env();

    let history = dataset::load_past_matches(&matches_dir)
        .context("loading historical matches")?;
    let profiles = compute_ratings(&history, &cfg.rating);
    println!(
        "Ratings built from {} matches across {} teams",
        history.len(),
        profiles.len()
    );

    let upcoming = dataset::load_upcoming_matches(&matches_dir)
        .context("loading upcoming fixtures")?;
    if upcoming.is_empty() {
        println!("No upcoming fixtures to analyze.");
        return Ok(());
    }

    // Providers in priority order: live market, previously collected quotes,
    // model-derived fallback.
    let providers: Vec<Box<dyn OddsProvider + '_>> = vec![
        Box::new(TheOddsApiProvider::new(OddsApiConfig::from_env())),
        Box::new(StoredOddsProvider::new(odds_dir)),
        Box::new(SyntheticOddsProvider::from_env(&profiles, &cfg.predict)),
    ];
    let fixtures: Vec<(UpcomingMatch, Option<OddsMap>)> = upcoming
        .into_iter()
        .map(|fixture| {
            let odds = resolve_odds(&providers, &fixture);
            (fixture, odds)
        })
        .collect();

    let analyses = analyze_matches(&profiles, &fixtures, &cfg);
    for row in &analyses {
        let p = &row.prediction;
        println!(
            "\n{}  {} vs {}",
            row.kickoff, row.home_name, row.away_name
        );
        println!(
            "  1 {:.1}%  X {:.1}%  2 {:.1}%   xG {:.2} : {:.2}",
            p.home_win_prob * 100.0,
            p.draw_prob * 100.0,
            p.away_win_prob * 100.0,
            p.expected_home_goals,
            p.expected_away_goals
        );
        match (&row.assessment, &row.skipped) {
            (Some(a), _) => println!(
                "  value  1 {:+.3}{}  X {:+.3}{}  2 {:+.3}{}",
                a.home.value,
                consistency_mark(a.home.consistent),
                a.draw.value,
                consistency_mark(a.draw.consistent),
                a.away.value,
                consistency_mark(a.away.consistent)
            ),
            (None, Some(reason)) => println!("  skipped: {reason}"),
            (None, None) => {}
        }
    }

    let bets = suggest_bets(&analyses, &cfg.select);
    if bets.is_empty() {
        println!("\nNo value bets above threshold.");
    } else {
        println!("\nSuggested bets:");
        for bet in &bets {
            println!(
                "  {} vs {}: {} @ {:.2}, value {:+.1}%{}",
                bet.home_name,
                bet.away_name,
                bet.outcome.label(),
                bet.odds,
                bet.value * 100.0,
                consistency_mark(bet.consistent)
            );
        }
    }

    let predictions_dir = data_dir.join("predictions");
    export::save_predictions(&predictions_dir, &analyses)?;
    if !bets.is_empty() {
        export::save_suggestions(&predictions_dir, &bets)?;
    }

    Ok(())
}

fn consistency_mark(consistent: bool) -> &'static str {
    if consistent { " ✓" } else { " ✗" }
}
