use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::analysis::MatchAnalysis;
use crate::select::BetCandidate;

/// Write the analyzed batch to a timestamped snapshot. Atomic tmp+rename so
/// readers never observe a half-written file.
pub fn save_predictions(dir: &Path, analyses: &[MatchAnalysis]) -> Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("predictions_{stamp}.json"));
    write_json(&path, analyses)?;
    log::info!("saved {} predictions to {}", analyses.len(), path.display());
    Ok(path)
}

pub fn save_suggestions(dir: &Path, bets: &[BetCandidate]) -> Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("suggested_bets_{stamp}.json"));
    write_json(&path, bets)?;
    log::info!("saved {} suggested bets to {}", bets.len(), path.display());
    Ok(path)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("serialize export")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swapping {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("buli_edge_{tag}_{}", std::process::id()))
    }

    #[test]
    fn snapshots_land_as_valid_json_with_no_tmp_leftover() {
        let dir = scratch_dir("predictions");
        let analyses: Vec<MatchAnalysis> = Vec::new();
        let path = save_predictions(&dir, &analyses).unwrap();
        assert!(path.exists());
        let raw = fs::read_to_string(&path).unwrap();
        let parsed: Vec<MatchAnalysis> = serde_json::from_str(&raw).unwrap();
        assert!(parsed.is_empty());
        assert!(!path.with_extension("json.tmp").exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn suggestion_snapshots_round_trip() {
        let dir = scratch_dir("suggestions");
        let bets: Vec<BetCandidate> = Vec::new();
        let path = save_suggestions(&dir, &bets).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.trim(), "[]");
        fs::remove_dir_all(&dir).ok();
    }
}
