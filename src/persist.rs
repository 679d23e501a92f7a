use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::http_cache::app_cache_dir;
use crate::state::GameReport;

const CACHE_FILE: &str = "reports.json";
const CACHE_VERSION: u32 = 1;

const REPORT_TTL_SECS: u64 = 60 * 60 * 24 * 30;
// Providers keep correcting play data shortly after the final whistle; hold
// off before trusting a "final" payload enough to cache it.
const COMPLETION_DELAY_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    version: u32,
    games: HashMap<String, CachedReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedReport {
    report: GameReport,
    cached_at: u64,
}

/// A previously analyzed final game, if present and still fresh.
pub fn load_report(game_id: &str) -> Option<GameReport> {
    let path = cache_file_path()?;
    let cache = load_cache_file(&path)?;
    if cache.version != CACHE_VERSION {
        return None;
    }
    let cached = cache.games.get(game_id)?;
    let age = now_secs().saturating_sub(cached.cached_at);
    if age > REPORT_TTL_SECS {
        return None;
    }
    // Only cache-worthy entries were written, but stay defensive about
    // hand-edited cache files.
    if cached.report.status != "final" {
        return None;
    }
    Some(cached.report.clone())
}

/// Persist a final-game report. Live and pregame reports are never written;
/// recently completed games wait out the completion delay so late provider
/// corrections land before the report freezes.
pub fn save_report(report: &GameReport) {
    if report.status != "final" {
        return;
    }
    let Some(path) = cache_file_path() else {
        return;
    };
    let Some(dir) = path.parent() else {
        return;
    };
    let _ = fs::create_dir_all(dir);

    let mut cache = load_cache_file(&path).unwrap_or_default();
    cache.version = CACHE_VERSION;

    let now = now_secs();
    if let Some(existing) = cache.games.get(&report.game_id) {
        // Refresh the payload but keep the original completion clock running.
        let entry = CachedReport {
            report: report.clone(),
            cached_at: existing.cached_at,
        };
        cache.games.insert(report.game_id.clone(), entry);
    } else {
        cache.games.insert(
            report.game_id.clone(),
            CachedReport {
                report: report.clone(),
                cached_at: now,
            },
        );
    }

    // Drop entries past their TTL while the file is open anyway.
    cache
        .games
        .retain(|_, cached| now.saturating_sub(cached.cached_at) <= REPORT_TTL_SECS);

    if let Ok(json) = serde_json::to_string(&cache) {
        let tmp = path.with_extension("json.tmp");
        if fs::write(&tmp, json).is_ok() {
            let _ = fs::rename(&tmp, &path);
        }
    }
}

/// Whether a cached report is old enough to be trusted as settled.
pub fn is_settled(game_id: &str) -> bool {
    let Some(path) = cache_file_path() else {
        return false;
    };
    let Some(cache) = load_cache_file(&path) else {
        return false;
    };
    cache
        .games
        .get(game_id)
        .is_some_and(|cached| now_secs().saturating_sub(cached.cached_at) >= COMPLETION_DELAY_SECS)
}

fn load_cache_file(path: &Path) -> Option<CacheFile> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str::<CacheFile>(&raw).ok()
}

fn cache_file_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
