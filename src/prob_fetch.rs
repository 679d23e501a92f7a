use std::collections::HashMap;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde_json::Value;

use crate::http_cache::fetch_json_cached;
use crate::http_client::http_client;
use crate::state::ProbSample;
use crate::win_prob::sanitize_prob;

const PROBABILITIES_URL_BASE: &str =
    "https://sports.core.api.espn.com/v2/sports/football/leagues/nfl/events";
const SUMMARY_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/football/nfl/summary";

const DEFAULT_PROB_TTL_SECS: u64 = 60;

/// Pull the v2 probabilities feed and map play id -> end-of-play sample.
/// The feed is paginated; page 1 reveals the page count and the remaining
/// pages are fetched in parallel.
pub fn fetch_play_probabilities(game_id: &str) -> Result<HashMap<String, ProbSample>> {
    let client = http_client()?;
    let ttl = prob_ttl();
    let base = format!(
        "{PROBABILITIES_URL_BASE}/{game_id}/competitions/{game_id}/probabilities"
    );

    let first = fetch_json_cached(client, &format!("prob:{game_id}:1"), &format!("{base}?page=1"), ttl)
        .with_context(|| format!("failed to fetch probabilities for game {game_id}"))?;
    let (mut samples, page_count) = parse_probabilities_page(&first)?;

    if page_count > 1 {
        let pages: Vec<u64> = (2..=page_count).collect();
        let fetched: Vec<Vec<(String, ProbSample)>> = pages
            .par_iter()
            .filter_map(|page| {
                let body = fetch_json_cached(
                    client,
                    &format!("prob:{game_id}:{page}"),
                    &format!("{base}?page={page}"),
                    ttl,
                )
                .ok()?;
                parse_probabilities_page(&body).ok().map(|(items, _)| items)
            })
            .collect();
        for items in fetched {
            samples.extend(items);
        }
    }

    Ok(samples.into_iter().collect())
}

/// One page of the probabilities feed: (play_id, sample) pairs plus the
/// feed's total page count.
pub fn parse_probabilities_page(raw: &str) -> Result<(Vec<(String, ProbSample)>, u64)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok((Vec::new(), 1));
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid probabilities json")?;

    let page_count = root
        .get("pageCount")
        .and_then(Value::as_u64)
        .unwrap_or(1)
        .max(1);

    let mut samples = Vec::new();
    let Some(items) = root.get("items").and_then(Value::as_array) else {
        return Ok((samples, page_count));
    };
    for item in items {
        let play_id = item
            .get("play")
            .and_then(|p| p.get("$ref"))
            .and_then(Value::as_str)
            .and_then(play_id_from_ref)
            .or_else(|| {
                item.get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        let Some(play_id) = play_id else {
            continue;
        };
        let home_wp = item
            .get("homeWinPercentage")
            .and_then(Value::as_f64)
            .map(|v| sanitize_prob(v, 0.5));
        let Some(home_wp) = home_wp else {
            continue;
        };
        let away_wp = item
            .get("awayWinPercentage")
            .and_then(Value::as_f64)
            .map(|v| sanitize_prob(v, 1.0 - home_wp))
            .unwrap_or(1.0 - home_wp);
        let tie = item
            .get("tiePercentage")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        samples.push((
            play_id,
            ProbSample {
                home_wp,
                away_wp,
                tie,
            },
        ));
    }
    Ok((samples, page_count))
}

/// Pre-game win probabilities from the summary payload's winprobability
/// array. Degrades to a 50/50 seed; a missing pregame reading is a
/// data-quality issue, not an error.
pub fn fetch_pregame_probabilities(game_id: &str) -> (f64, f64) {
    let result = (|| -> Result<Option<(f64, f64)>> {
        let client = http_client()?;
        let url = format!("{SUMMARY_URL}?event={game_id}");
        let body = fetch_json_cached(client, &format!("summary:{game_id}"), &url, prob_ttl())?;
        Ok(parse_pregame_json(&body))
    })();

    match result {
        Ok(Some(pair)) => pair,
        Ok(None) => (0.5, 0.5),
        Err(err) => {
            eprintln!("[WARN] Pregame WP fetch failed for {game_id}: {err}");
            (0.5, 0.5)
        }
    }
}

pub fn parse_pregame_json(raw: &str) -> Option<(f64, f64)> {
    let root: Value = serde_json::from_str(raw.trim()).ok()?;
    let first = root.get("winprobability")?.as_array()?.first()?;
    let home_wp = sanitize_prob(first.get("homeWinPercentage")?.as_f64()?, 0.5);
    Some((home_wp, sanitize_prob(1.0 - home_wp, 0.5)))
}

// Play references look like ".../plays/4016368821?lang=en"; the id is the
// last path segment.
fn play_id_from_ref(play_ref: &str) -> Option<String> {
    let path = play_ref.split(['?', '#']).next()?;
    let id = path.trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() || id.contains(':') {
        None
    } else {
        Some(id.to_string())
    }
}

fn prob_ttl() -> u64 {
    std::env::var("PROB_CACHE_TTL_SECS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(DEFAULT_PROB_TTL_SECS)
        .clamp(5, 24 * 60 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_with_refs_and_page_count() {
        let raw = r#"{
            "pageCount": 3,
            "items": [
                {"play": {"$ref": "http://core.espn.com/v2/plays/101?lang=en"},
                 "homeWinPercentage": 0.61, "awayWinPercentage": 0.39, "tiePercentage": 0.0},
                {"id": "102", "homeWinPercentage": 0.58},
                {"homeWinPercentage": 0.5}
            ]
        }"#;
        let (samples, pages) = parse_probabilities_page(raw).expect("page should parse");
        assert_eq!(pages, 3);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].0, "101");
        assert!((samples[0].1.home_wp - 0.61).abs() < 1e-9);
        // Missing away percentage is derived from the home side.
        assert!((samples[1].1.away_wp - 0.42).abs() < 1e-9);
    }

    #[test]
    fn empty_feed_parses_to_nothing() {
        let (samples, pages) = parse_probabilities_page("null").expect("null should parse");
        assert!(samples.is_empty());
        assert_eq!(pages, 1);
    }

    #[test]
    fn pregame_comes_from_the_first_entry() {
        let raw = r#"{"winprobability": [
            {"homeWinPercentage": 0.55, "playId": "1"},
            {"homeWinPercentage": 0.70, "playId": "2"}
        ]}"#;
        let (home, away) = parse_pregame_json(raw).expect("pregame should parse");
        assert!((home - 0.55).abs() < 1e-9);
        assert!((away - 0.45).abs() < 1e-9);
        assert_eq!(parse_pregame_json("{}"), None);
    }

    #[test]
    fn play_ref_extraction() {
        assert_eq!(
            play_id_from_ref("https://x/v2/plays/4016368821?lang=en").as_deref(),
            Some("4016368821")
        );
        assert_eq!(
            play_id_from_ref("https://x/v2/plays/4016368821/").as_deref(),
            Some("4016368821")
        );
    }
}
