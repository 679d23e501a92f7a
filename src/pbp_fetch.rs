use anyhow::{Context, Result};
use serde_json::Value;

use crate::http_cache::fetch_json_cached;
use crate::http_client::http_client;
use crate::state::{
    DriveRecord, GameData, GameStatus, HomeAway, PenaltyInfo, PlayRecord, ScoringPlay, TeamMeta,
};

const PBP_URL_BASE: &str = "https://cdn.espn.com/core/nfl/playbyplay";

// Live payloads go stale quickly; completed-game reports are cached at the
// persist layer, so the raw cache only needs to smooth out repeat runs.
const DEFAULT_PBP_TTL_SECS: u64 = 60;

pub fn fetch_game_data(game_id: &str) -> Result<GameData> {
    let client = http_client()?;
    let ttl = std::env::var("PBP_CACHE_TTL_SECS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(DEFAULT_PBP_TTL_SECS)
        .clamp(5, 24 * 60 * 60);

    // ESPN's CDN serves stale payloads without a cache buster.
    let cache_buster = chrono::Utc::now().timestamp();
    let url = format!("{PBP_URL_BASE}?xhr=1&gameId={game_id}&cb={cache_buster}");
    let key = format!("pbp:{game_id}");

    let body = fetch_json_cached(client, &key, &url, ttl)
        .with_context(|| format!("failed to fetch play-by-play for game {game_id}"))?;
    parse_game_data_json(game_id, &body)
}

pub fn parse_game_data_json(game_id: &str, raw: &str) -> Result<GameData> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        anyhow::bail!("empty play-by-play payload for game {game_id}");
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid play-by-play json")?;
    let package = root.get("gamepackageJSON").unwrap_or(&root);

    let teams = parse_teams(package);
    let status = parse_status(package);
    let drives = package
        .get("drives")
        .and_then(|d| d.get("previous"))
        .and_then(Value::as_array)
        .map(|drives| drives.iter().map(parse_drive).collect())
        .unwrap_or_default();
    let scoring_plays = package
        .get("scoringPlays")
        .and_then(Value::as_array)
        .map(|plays| plays.iter().map(parse_scoring_play).collect())
        .unwrap_or_default();

    Ok(GameData {
        game_id: game_id.to_string(),
        teams,
        status,
        drives,
        scoring_plays,
    })
}

fn parse_teams(package: &Value) -> Vec<TeamMeta> {
    let mut teams = Vec::new();
    let boxscore_teams = package
        .get("boxscore")
        .and_then(|b| b.get("teams"))
        .and_then(Value::as_array);

    if let Some(entries) = boxscore_teams {
        for entry in entries {
            let team = entry.get("team").unwrap_or(&Value::Null);
            let Some(id) = id_string(team.get("id")) else {
                continue;
            };
            let Some(abbr) = string_at(team, "abbreviation") else {
                continue;
            };
            let display_name = string_at(team, "displayName").unwrap_or_else(|| abbr.clone());
            let (penalty_count, penalty_yards) = parse_penalty_totals(entry);
            teams.push(TeamMeta {
                id,
                abbr,
                display_name,
                home_away: None,
                score: 0,
                penalty_count,
                penalty_yards,
            });
        }
    }

    // The header carries side, score and display names for the same teams.
    if let Some(competitors) = header_competitors(package) {
        for comp in competitors {
            let Some(id) = id_string(comp.get("id")) else {
                continue;
            };
            let side = string_at(comp, "homeAway").and_then(|s| HomeAway::parse(&s));
            let score = int_like(comp.get("score")).unwrap_or(0);
            let name = comp
                .get("team")
                .and_then(|t| t.get("displayName"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let abbr = comp
                .get("team")
                .and_then(|t| t.get("abbreviation"))
                .and_then(Value::as_str)
                .map(str::to_string);

            if let Some(team) = teams.iter_mut().find(|t| t.id == id) {
                team.home_away = side;
                team.score = score;
                if let Some(name) = name {
                    team.display_name = name;
                }
            } else if let Some(abbr) = abbr {
                teams.push(TeamMeta {
                    id,
                    abbr: abbr.clone(),
                    display_name: name.unwrap_or(abbr),
                    home_away: side,
                    score,
                    penalty_count: 0,
                    penalty_yards: 0,
                });
            }
        }
    }

    teams
}

// Boxscore penalties arrive as a "C-Y" display value (count-yards).
fn parse_penalty_totals(team_entry: &Value) -> (i64, i64) {
    let Some(stats) = team_entry.get("statistics").and_then(Value::as_array) else {
        return (0, 0);
    };
    for stat in stats {
        if string_at(stat, "name").as_deref() != Some("totalPenaltiesYards") {
            continue;
        }
        let Some(display) = string_at(stat, "displayValue") else {
            break;
        };
        let parts: Vec<&str> = display.split('-').collect();
        if let [count, yards] = parts.as_slice() {
            if let (Ok(count), Ok(yards)) = (count.trim().parse(), yards.trim().parse()) {
                return (count, yards);
            }
        }
        break;
    }
    (0, 0)
}

fn header_competitors(package: &Value) -> Option<&Vec<Value>> {
    package
        .get("header")?
        .get("competitions")?
        .as_array()?
        .first()?
        .get("competitors")?
        .as_array()
}

fn parse_status(package: &Value) -> GameStatus {
    let Some(comp) = package
        .get("header")
        .and_then(|h| h.get("competitions"))
        .and_then(Value::as_array)
        .and_then(|c| c.first())
    else {
        return GameStatus::Final;
    };
    let status = comp.get("status").unwrap_or(&Value::Null);
    let completed = status
        .get("type")
        .and_then(|t| t.get("completed"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if completed {
        return GameStatus::Final;
    }
    let period = int_like(status.get("period")).unwrap_or(0);
    if period > 0 {
        GameStatus::InProgress {
            quarter: period,
            clock: string_at(status, "displayClock").unwrap_or_default(),
        }
    } else {
        GameStatus::Pregame
    }
}

fn parse_drive(drive: &Value) -> DriveRecord {
    let start = drive.get("start").unwrap_or(&Value::Null);
    DriveRecord {
        team_id: drive.get("team").and_then(|t| id_string(t.get("id"))),
        start_yards_to_endzone: int_like(start.get("yardsToEndzone")),
        start_text: string_at(start, "text").or_else(|| string_at(start, "yardLine")),
        plays: drive
            .get("plays")
            .and_then(Value::as_array)
            .map(|plays| plays.iter().map(parse_play).collect())
            .unwrap_or_default(),
    }
}

fn parse_play(play: &Value) -> PlayRecord {
    let start = play.get("start").unwrap_or(&Value::Null);
    let end = play.get("end").unwrap_or(&Value::Null);

    let mut stat_types = Vec::new();
    if let Some(stats) = play.get("statistics").and_then(Value::as_array) {
        for stat in stats {
            let stat_type = stat.get("type").unwrap_or(&Value::Null);
            for key in ["abbreviation", "text"] {
                if let Some(value) = string_at(stat_type, key) {
                    stat_types.push(value.to_lowercase());
                }
            }
        }
    }

    let penalty = play.get("penalty").filter(|p| !p.is_null()).map(|p| PenaltyInfo {
        team_id: p.get("team").and_then(|t| id_string(t.get("id"))),
        yards: int_like(p.get("yards")),
        type_slug: p
            .get("type")
            .and_then(|t| t.get("slug"))
            .and_then(Value::as_str)
            .map(str::to_string),
        status_slug: p
            .get("status")
            .and_then(|s| s.get("slug"))
            .and_then(Value::as_str)
            .map(str::to_string),
    });

    PlayRecord {
        id: id_string(play.get("id")),
        text: string_at(play, "text").unwrap_or_default(),
        type_text: play
            .get("type")
            .and_then(|t| t.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        quarter: play
            .get("period")
            .and_then(|p| int_like(p.get("number"))),
        clock: play
            .get("clock")
            .and_then(|c| c.get("displayValue"))
            .and_then(Value::as_str)
            .map(str::to_string),
        stat_yardage: int_like(play.get("statYardage")),
        start_down: int_like(start.get("down")),
        start_distance: int_like(start.get("distance")),
        start_yards_to_endzone: int_like(start.get("yardsToEndzone")),
        start_team_id: start.get("team").and_then(|t| id_string(t.get("id"))),
        start_possession_text: string_at(start, "possessionText"),
        end_team_id: end.get("team").and_then(|t| id_string(t.get("id"))),
        end_possession_text: string_at(end, "possessionText"),
        end_down_distance_text: string_at(end, "downDistanceText"),
        team_abbr: play
            .get("team")
            .and_then(|t| t.get("abbreviation"))
            .and_then(Value::as_str)
            .map(str::to_string),
        scoring_play: play
            .get("scoringPlay")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        score_value: int_like(play.get("scoreValue")).unwrap_or(0),
        has_penalty: play
            .get("hasPenalty")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        penalty,
        stat_types,
    }
}

fn parse_scoring_play(sp: &Value) -> ScoringPlay {
    ScoringPlay {
        play_id: id_string(sp.get("id")),
        team_id: sp.get("team").and_then(|t| id_string(t.get("id"))),
        home_score: int_like(sp.get("homeScore")).unwrap_or(0),
        away_score: int_like(sp.get("awayScore")).unwrap_or(0),
        text: string_at(sp, "text").unwrap_or_default(),
        type_text: sp
            .get("type")
            .and_then(|t| t.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        scoring_type: sp
            .get("scoringType")
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        quarter: sp.get("period").and_then(|p| int_like(p.get("number"))),
        clock: sp
            .get("clock")
            .and_then(|c| c.get("displayValue"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

// ESPN mixes numeric and string ids across endpoints; normalize to strings.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_like(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    let s = value.get(key)?.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_an_error() {
        assert!(parse_game_data_json("401", "").is_err());
        assert!(parse_game_data_json("401", "null").is_err());
        assert!(parse_game_data_json("401", "not json").is_err());
    }

    #[test]
    fn parses_minimal_package() {
        let raw = r#"{
            "gamepackageJSON": {
                "boxscore": {"teams": [
                    {"team": {"id": 1, "abbreviation": "SEA", "displayName": "Seattle"},
                     "statistics": [{"name": "totalPenaltiesYards", "displayValue": "5-39"}]},
                    {"team": {"id": "2", "abbreviation": "DAL"}}
                ]},
                "header": {"competitions": [{
                    "status": {"type": {"completed": true}},
                    "competitors": [
                        {"id": "1", "homeAway": "home", "score": "24"},
                        {"id": "2", "homeAway": "away", "score": "17"}
                    ]
                }]},
                "drives": {"previous": [{
                    "team": {"id": "1"},
                    "start": {"yardsToEndzone": 75, "text": "SEA 25"},
                    "plays": [{
                        "id": 4016368821,
                        "text": "G.Smith pass short left to D.Metcalf for 9 yards",
                        "type": {"text": "Pass Reception"},
                        "period": {"number": 1},
                        "clock": {"displayValue": "14:21"},
                        "statYardage": 9,
                        "scoringPlay": false,
                        "start": {"down": 1, "distance": 10, "yardsToEndzone": 75,
                                  "team": {"id": "1"}, "possessionText": "SEA 25"},
                        "end": {"team": {"id": "1"}, "possessionText": "SEA 34"},
                        "statistics": [{"type": {"abbreviation": "PASS", "text": "Passing"}}]
                    }]
                }]},
                "scoringPlays": [{
                    "id": "401999",
                    "team": {"id": "1"},
                    "homeScore": 7, "awayScore": 0,
                    "text": "TD pass",
                    "type": {"text": "Passing Touchdown"},
                    "period": {"number": 2},
                    "clock": {"displayValue": "3:10"}
                }]
            }
        }"#;
        let game = parse_game_data_json("401", raw).expect("payload should parse");

        assert_eq!(game.teams.len(), 2);
        assert_eq!(game.teams[0].abbr, "SEA");
        assert_eq!(game.teams[0].penalty_yards, 39);
        assert_eq!(game.teams[0].penalty_count, 5);
        assert_eq!(game.teams[0].score, 24);
        assert_eq!(game.teams[0].home_away, Some(HomeAway::Home));
        assert!(game.status.is_final());
        assert_eq!(game.label(), "DAL_at_SEA_401");

        assert_eq!(game.drives.len(), 1);
        let play = &game.drives[0].plays[0];
        assert_eq!(play.id.as_deref(), Some("4016368821"));
        assert_eq!(play.stat_yardage, Some(9));
        assert_eq!(play.start_down, Some(1));
        assert_eq!(play.stat_types, vec!["pass", "passing"]);
        assert_eq!(play.start_possession_text.as_deref(), Some("SEA 25"));

        assert_eq!(game.scoring_plays.len(), 1);
        assert_eq!(game.scoring_plays[0].home_score, 7);
    }

    #[test]
    fn in_progress_status_keeps_quarter_and_clock() {
        let raw = r#"{
            "gamepackageJSON": {
                "boxscore": {"teams": []},
                "header": {"competitions": [{
                    "status": {"type": {"completed": false}, "period": 3, "displayClock": "8:42"},
                    "competitors": []
                }]},
                "drives": {"previous": []}
            }
        }"#;
        let game = parse_game_data_json("401", raw).expect("payload should parse");
        assert_eq!(
            game.status,
            GameStatus::InProgress {
                quarter: 3,
                clock: "8:42".to_string()
            }
        );
        assert_eq!(game.status.label(), "Q3 8:42");
    }
}
