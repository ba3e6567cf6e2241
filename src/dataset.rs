use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde_json::Value;

/// One finished historical match, immutable once read.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub id: u32,
    pub kickoff: NaiveDateTime,
    pub home_id: Option<u32>,
    pub away_id: Option<u32>,
    pub home_name: String,
    pub away_name: String,
    pub home_goals: u8,
    pub away_goals: u8,
}

/// A fixture still to be played; carries no result yet.
#[derive(Debug, Clone)]
pub struct UpcomingMatch {
    pub id: u32,
    pub kickoff: Option<NaiveDateTime>,
    pub kickoff_raw: String,
    pub home_id: Option<u32>,
    pub away_id: Option<u32>,
    pub home_name: String,
    pub away_name: String,
}

/// Final result rows carry this type id in OpenLigaDB payloads.
const FINAL_RESULT_TYPE: u64 = 2;

pub fn load_past_matches(matches_dir: &Path) -> Result<Vec<MatchRecord>> {
    let path = latest_snapshot(matches_dir, "past_matches_")
        .context("no past_matches_*.json snapshot found")?;
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let records = parse_past_matches_json(&raw)?;
    log::info!("loaded {} finished matches from {}", records.len(), path.display());
    Ok(records)
}

pub fn load_upcoming_matches(matches_dir: &Path) -> Result<Vec<UpcomingMatch>> {
    let path = latest_snapshot(matches_dir, "future_matches_")
        .context("no future_matches_*.json snapshot found")?;
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let fixtures = parse_upcoming_matches_json(&raw)?;
    log::info!("loaded {} upcoming fixtures from {}", fixtures.len(), path.display());
    Ok(fixtures)
}

/// Parse an OpenLigaDB match dump into chronological records.
///
/// Rows without a final result (resultTypeID 2) are not finished matches and
/// are dropped; rows with malformed shapes are skipped rather than failing
/// the whole file.
pub fn parse_past_matches_json(raw: &str) -> Result<Vec<MatchRecord>> {
    let v: Value = serde_json::from_str(raw.trim()).context("invalid match json")?;
    let arr = v.as_array().context("expected a json array of matches")?;

    let mut out: Vec<MatchRecord> = arr.iter().filter_map(parse_match_record).collect();
    // Rating updates are path-dependent; ascending kickoff order is the contract.
    out.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then(a.id.cmp(&b.id)));
    Ok(out)
}

pub fn parse_upcoming_matches_json(raw: &str) -> Result<Vec<UpcomingMatch>> {
    let v: Value = serde_json::from_str(raw.trim()).context("invalid match json")?;
    let arr = v.as_array().context("expected a json array of matches")?;

    let mut out: Vec<UpcomingMatch> = arr.iter().filter_map(parse_upcoming_match).collect();
    out.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then(a.id.cmp(&b.id)));
    Ok(out)
}

fn parse_match_record(v: &Value) -> Option<MatchRecord> {
    let id = v.get("matchID")?.as_u64()? as u32;
    let raw_time = v.get("matchDateTime").and_then(|x| x.as_str())?;
    let kickoff = parse_kickoff(raw_time)?;

    let home = v.get("team1");
    let away = v.get("team2");
    let home_id = team_id(home);
    let away_id = team_id(away);

    let results = v.get("matchResults").and_then(|x| x.as_array())?;
    let final_result = results.iter().find(|r| {
        r.get("resultTypeID").and_then(|x| x.as_u64()) == Some(FINAL_RESULT_TYPE)
    })?;
    let home_goals = final_result.get("pointsTeam1")?.as_u64()? as u8;
    let away_goals = final_result.get("pointsTeam2")?.as_u64()? as u8;

    Some(MatchRecord {
        id,
        kickoff,
        home_id,
        away_id,
        home_name: team_name(home),
        away_name: team_name(away),
        home_goals,
        away_goals,
    })
}

fn parse_upcoming_match(v: &Value) -> Option<UpcomingMatch> {
    let id = v.get("matchID")?.as_u64()? as u32;
    let kickoff_raw = v
        .get("matchDateTime")
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string();

    let home = v.get("team1");
    let away = v.get("team2");

    Some(UpcomingMatch {
        id,
        kickoff: parse_kickoff(&kickoff_raw),
        kickoff_raw,
        home_id: team_id(home),
        away_id: team_id(away),
        home_name: team_name(home),
        away_name: team_name(away),
    })
}

fn team_id(team: Option<&Value>) -> Option<u32> {
    team?.get("teamId")?.as_u64().map(|id| id as u32)
}

fn team_name(team: Option<&Value>) -> String {
    team.and_then(|t| t.get("teamName"))
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string()
}

/// OpenLigaDB emits local naive timestamps; The Odds API emits RFC 3339.
/// Accept both so one helper covers every kickoff field we see.
pub fn parse_kickoff(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok()
}

/// Latest timestamped snapshot for a prefix, e.g. `past_matches_20250301_1200.json`.
/// File names embed the timestamp, so the lexicographic max is the newest.
fn latest_snapshot(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".json"))
        })
        .max()
}
