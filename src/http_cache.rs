use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "gridiron_terminal";
const CACHE_FILE: &str = "http_cache.json";

static CACHE: Mutex<Option<HttpCacheFile>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HttpCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    fetched_at: u64,
    ttl_secs: u64,
}

/// Fetch a JSON body through the on-disk cache.
///
/// Entries are keyed by a logical `key` rather than the URL because the ESPN
/// CDN endpoints carry a cache-buster query parameter; freshness is plain TTL
/// (the endpoints send no usable validators). A request failure falls back to
/// a stale cached body when one exists.
pub fn fetch_json_cached(client: &Client, key: &str, url: &str, ttl_secs: u64) -> Result<String> {
    let cached_entry = {
        let mut guard = CACHE.lock().expect("http cache lock poisoned");
        let cache = guard.get_or_insert_with(load_cache_file);
        cache.entries.get(key).cloned()
    };

    let no_cache = std::env::var("NO_CACHE").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if !no_cache {
        if let Some(entry) = cached_entry.as_ref() {
            if entry_age_secs(entry) <= entry.ttl_secs {
                return Ok(entry.body.clone());
            }
        }
    }

    let response = match client.get(url).send() {
        Ok(resp) => resp,
        Err(err) => {
            if let Some(entry) = cached_entry {
                eprintln!("[WARN] Request failed, serving stale cache for {key}: {err}");
                return Ok(entry.body);
            }
            return Err(err).context("request failed");
        }
    };

    let status = response.status();
    let body = response.text().context("failed reading body")?;
    if !status.is_success() {
        if let Some(entry) = cached_entry {
            eprintln!("[WARN] HTTP {status}, serving stale cache for {key}");
            return Ok(entry.body);
        }
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }

    refresh_cache_entry(
        key,
        CacheEntry {
            body: body.clone(),
            fetched_at: system_time_to_secs(SystemTime::now()).unwrap_or_default(),
            ttl_secs,
        },
    );
    Ok(body)
}

fn entry_age_secs(entry: &CacheEntry) -> u64 {
    system_time_to_secs(SystemTime::now())
        .unwrap_or_default()
        .saturating_sub(entry.fetched_at)
}

fn refresh_cache_entry(key: &str, entry: CacheEntry) {
    let mut guard = CACHE.lock().expect("http cache lock poisoned");
    let cache = guard.get_or_insert_with(load_cache_file);
    cache.version = CACHE_VERSION;
    cache.entries.insert(key.to_string(), entry);
    let _ = save_cache_file(cache);
}

fn load_cache_file() -> HttpCacheFile {
    let Some(path) = cache_path() else {
        return HttpCacheFile::default();
    };
    let raw = fs::read_to_string(path).ok();
    let Some(raw) = raw else {
        return HttpCacheFile::default();
    };
    let cache = serde_json::from_str::<HttpCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return HttpCacheFile::default();
    }
    cache
}

fn save_cache_file(cache: &HttpCacheFile) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).ok();
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, &path).context("swap http cache")?;
    Ok(())
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}
