use std::collections::HashMap;

use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::classify::{
    self, classify_offense_play, classify_total_offense_play, credited_yards_before_fumble,
    enforced_at_yards_to_endzone, final_play_text, is_clock_noise, is_declined_only_penalty,
    is_explosive, is_nullified_play, play_success, yardline_to_coord,
};
use crate::state::{
    AdvancedRow, DEFAULT_WP_THRESHOLD, Diagnostics, DriveRecord, GameData, GameStats, PlayDetail,
    PlayRecord, StatsView, SummaryRow, TeamDetails, WpSnapshot, YardsCorrection,
};
use crate::win_prob::{WpIndex, is_competitive};

static END_POS_FROM_DOWN_DIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bat\s+([A-Z]{2,3}\s+\d+)\b").expect("valid regex"));

#[derive(Debug, Clone, Copy)]
pub struct StatsOptions {
    pub wp_threshold: f64,
    pub expanded: bool,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            wp_threshold: DEFAULT_WP_THRESHOLD,
            expanded: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TeamTotals {
    plays: i64,
    offensive_yards: i64,
    total_yards: i64,
    successful_plays: i64,
    explosive_plays: i64,
    turnovers: i64,
    drives_inside_40: i64,
    points_inside_40: i64,
    start_field_pos_sum: i64,
    drives_count: i64,
    drive_points: i64,
    punt_net_sum: i64,
    punt_plays: i64,
    kick_net_sum: i64,
    kick_plays: i64,
    non_offensive_points: i64,
}

#[derive(Debug, Default)]
struct ViewAcc {
    totals: HashMap<String, TeamTotals>,
    details: HashMap<String, TeamDetails>,
}

impl ViewAcc {
    fn new(game: &GameData) -> Self {
        let mut acc = Self::default();
        for team in &game.teams {
            acc.totals.insert(team.id.clone(), TeamTotals::default());
            acc.details.insert(team.id.clone(), TeamDetails::default());
        }
        acc
    }
}

// Per-drive running state, tracked separately for the competitive and full
// views because the competitive view stops moving once the gate locks.
#[derive(Debug, Default)]
struct DriveState {
    started: bool,
    points: i64,
    crossed_40: bool,
    has_offensive_play: bool,
    current_yte_est: Option<i64>,
    last_play: Option<PlayDetail>,
}

#[derive(Debug, Default)]
struct DriveStartInfo {
    start_yte: Option<i64>,
    pos_text: Option<String>,
    quarter: Option<i64>,
    clock: Option<String>,
    cause_text: String,
    cause_type: String,
    cause_yards: Option<i64>,
}

#[derive(Debug, Clone)]
struct ScoringEntry {
    team_id: Option<String>,
    points: i64,
}

#[derive(Debug, Clone)]
struct NonOffensiveScore {
    team_id: String,
    points: i64,
    play_type: String,
    text: String,
    quarter: Option<i64>,
    clock: Option<String>,
}

// Everything derived from one play, computed once and applied to both views.
#[derive(Debug, Default)]
struct PlayFacts {
    team_id: String,
    text: String,
    play_type: String,
    quarter: Option<i64>,
    clock: Option<String>,
    end_pos: Option<String>,
    probability: Option<WpSnapshot>,
    clock_noise: bool,
    nullified: bool,
    turnover_events: Vec<(String, &'static str)>,
    stat_yardage: Option<i64>,
    is_offense: bool,
    is_run: bool,
    is_pass: bool,
    offense_yards: i64,
    success: bool,
    explosive: bool,
    total_offense: bool,
    total_offense_yards: i64,
    correction: Option<YardsCorrection>,
    punt_net: Option<i64>,
    kick_net: Option<i64>,
    drive_scoring_points: i64,
    scoring_play: bool,
    field_goal_play: bool,
    start_yte: Option<i64>,
    non_offensive: Option<NonOffensiveScore>,
    penalty_detail: Option<(String, PlayDetail)>,
    meaningful: bool,
}

struct WalkCtx<'a> {
    game: &'a GameData,
    scoring: HashMap<String, ScoringEntry>,
    non_offensive: HashMap<String, NonOffensiveScore>,
}

/// Single ordered fold over drives and plays. The full-game accumulator is
/// updated for every play; the competitive accumulator only while the gate is
/// still `Active`. The gate locks the first time either team's start-of-play
/// win probability reaches `wp_threshold` and never reopens.
pub fn process_game_stats(
    game: &GameData,
    wp: &WpIndex,
    options: &StatsOptions,
) -> Result<GameStats> {
    if game.teams.is_empty() {
        bail!(
            "game {} carries no team metadata; play-by-play payload is unusable",
            game.game_id
        );
    }

    let scoring = build_scoring_map(game);
    let non_offensive = build_non_offensive_map(game, &scoring);
    let ctx = WalkCtx {
        game,
        scoring,
        non_offensive,
    };

    let mut diagnostics = Diagnostics::default();
    let mut full = ViewAcc::new(game);
    let mut competitive = ViewAcc::new(game);
    let mut locked_at: Option<String> = None;

    for (drive_index, drive) in game.drives.iter().enumerate() {
        let Some(team_id) = drive.team_id.clone() else {
            diagnostics.unknown_drive_teams += 1;
            continue;
        };
        if !full.totals.contains_key(&team_id) {
            diagnostics.unknown_drive_teams += 1;
            continue;
        }

        let mut start_info = drive_start_info(game, drive_index, drive);
        let mut full_drive = DriveState {
            current_yte_est: drive.start_yards_to_endzone,
            ..DriveState::default()
        };
        let mut comp_drive = DriveState {
            current_yte_est: drive.start_yards_to_endzone,
            ..DriveState::default()
        };
        let mut first_play_seen = false;

        for play in &drive.plays {
            if play.text.is_empty() && play.type_text.is_empty() && play.id.is_none() {
                diagnostics.skipped_plays += 1;
                continue;
            }

            let start_wp = wp.start_wp(play.id.as_deref());
            if locked_at.is_none() && !is_competitive(start_wp, options.wp_threshold) {
                locked_at = Some(play.id.clone().unwrap_or_default());
            }
            let play_competitive = locked_at.is_none();

            let probability = wp.snapshot(play.id.as_deref());
            if probability.is_none() && play.id.is_some() && wp.has_samples() {
                diagnostics.missing_wp_samples += 1;
            }

            let facts = compute_play_facts(&ctx, &team_id, play, probability);

            if !first_play_seen {
                first_play_seen = true;
                if let Some(yte) = facts.start_yte {
                    start_info.start_yte = Some(yte);
                }
                full_drive.started = true;
                comp_drive.started = play_competitive;
                note_drive_start(&mut full, &full_drive, &team_id, &start_info);
                note_drive_start(&mut competitive, &comp_drive, &team_id, &start_info);
            }

            // Penalty play lists are kept for both views regardless of the
            // gate, matching the numeric penalty totals which come from the
            // boxscore and are not WP-filtered.
            if options.expanded {
                if let Some((commit_team, detail)) = &facts.penalty_detail {
                    push_penalty_detail(&mut full, commit_team, &team_id, detail);
                    push_penalty_detail(&mut competitive, commit_team, &team_id, detail);
                }
            }

            if facts.clock_noise || facts.nullified {
                continue;
            }

            apply_play(&mut full, &mut full_drive, &facts, options.expanded);
            if play_competitive {
                apply_play(&mut competitive, &mut comp_drive, &facts, options.expanded);
            }
        }

        finish_drive(&mut full, &full_drive, &team_id, &start_info, options.expanded);
        finish_drive(
            &mut competitive,
            &comp_drive,
            &team_id,
            &start_info,
            options.expanded,
        );
    }

    Ok(GameStats {
        competitive: build_view(game, competitive, options.expanded),
        full: build_view(game, full, options.expanded),
        wp_locked_at: locked_at,
        diagnostics,
    })
}

fn build_scoring_map(game: &GameData) -> HashMap<String, ScoringEntry> {
    let mut map = HashMap::new();
    let mut prev_home = 0;
    let mut prev_away = 0;
    for sp in &game.scoring_plays {
        let dh = sp.home_score - prev_home;
        let da = sp.away_score - prev_away;
        prev_home = sp.home_score;
        prev_away = sp.away_score;
        let points = if dh > 0 { dh } else { da };
        if let Some(pid) = &sp.play_id {
            map.insert(
                pid.clone(),
                ScoringEntry {
                    team_id: sp.team_id.clone(),
                    points,
                },
            );
        }
    }
    map
}

fn build_non_offensive_map(
    game: &GameData,
    scoring: &HashMap<String, ScoringEntry>,
) -> HashMap<String, NonOffensiveScore> {
    let mut play_to_drive_team: HashMap<&str, &str> = HashMap::new();
    for drive in &game.drives {
        let Some(team_id) = drive.team_id.as_deref() else {
            continue;
        };
        for play in &drive.plays {
            if let Some(pid) = play.id.as_deref() {
                play_to_drive_team.insert(pid, team_id);
            }
        }
    }

    let mut map = HashMap::new();
    for sp in &game.scoring_plays {
        let Some(scoring_team_id) = sp.team_id.as_deref() else {
            continue;
        };
        if !game.teams.iter().any(|t| t.id == scoring_team_id) {
            continue;
        }
        let play_id = sp.play_id.as_deref();
        let drive_offense = play_id.and_then(|pid| play_to_drive_team.get(pid).copied());

        let text_lower = sp.text.to_lowercase();
        let type_lower = sp.type_text.to_lowercase();
        let scoring_type_lower = sp.scoring_type.to_lowercase();

        let mut points = play_id
            .and_then(|pid| scoring.get(pid))
            .map(|e| e.points)
            .unwrap_or(0);
        let is_safety = type_lower.contains("safety")
            || scoring_type_lower.contains("safety")
            || text_lower.contains("safety");
        let has_touchdown = text_lower.contains("touchdown")
            || type_lower.contains("touchdown")
            || scoring_type_lower.contains("touchdown");
        let is_kick_return_td =
            (text_lower.contains("kickoff") || type_lower.contains("kickoff")) && has_touchdown;
        let is_punt_return_td = (text_lower.contains("punt") || type_lower.contains("punt"))
            && has_touchdown
            && (text_lower.contains("return") || type_lower.contains("return"));

        let is_non_offensive = if is_safety {
            points = 2;
            true
        } else if is_kick_return_td || is_punt_return_td {
            true
        } else {
            drive_offense.is_some_and(|offense| offense != scoring_team_id)
        };

        if is_non_offensive {
            if let Some(pid) = play_id {
                map.insert(
                    pid.to_string(),
                    NonOffensiveScore {
                        team_id: scoring_team_id.to_string(),
                        points,
                        play_type: sp.type_text.clone(),
                        text: sp.text.clone(),
                        quarter: sp.quarter,
                        clock: sp.clock.clone(),
                    },
                );
            }
        }
    }
    map
}

fn drive_start_info(game: &GameData, drive_index: usize, drive: &DriveRecord) -> DriveStartInfo {
    let first_play = drive.plays.first();
    let mut info = DriveStartInfo {
        start_yte: drive.start_yards_to_endzone,
        pos_text: drive
            .start_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        quarter: first_play.and_then(|p| p.quarter),
        clock: first_play.and_then(|p| p.clock.clone()),
        cause_text: "Start of game".to_string(),
        cause_type: "Drive Start".to_string(),
        cause_yards: None,
    };

    let cause = first_play
        .filter(|p| is_kick_or_punt_start(p))
        .or_else(|| {
            if drive_index == 0 {
                return None;
            }
            game.drives[drive_index - 1]
                .plays
                .iter()
                .rev()
                .find(|p| !is_drive_boundary_noise(p))
        });
    if let Some(cause) = cause {
        info.cause_text = cause.text.clone();
        info.cause_type = cause.type_text.clone();
        info.cause_yards = cause.stat_yardage;
    }
    info
}

fn is_drive_boundary_noise(play: &PlayRecord) -> bool {
    let type_lower = play.type_text.to_lowercase();
    let text_lower = play.text.to_lowercase();
    type_lower.contains("timeout") || type_lower.contains("end of") || text_lower.contains("end of")
}

fn is_kick_or_punt_start(play: &PlayRecord) -> bool {
    let type_lower = play.type_text.to_lowercase();
    let text_lower = play.text.to_lowercase();
    type_lower.contains("kickoff")
        || text_lower.contains("kickoff")
        || type_lower.contains("punt")
        || text_lower.contains("onside")
}

fn compute_play_facts(
    ctx: &WalkCtx,
    team_id: &str,
    play: &PlayRecord,
    probability: Option<WpSnapshot>,
) -> PlayFacts {
    let game = ctx.game;
    let text_lower = play.text.to_lowercase();
    let type_lower = play.type_text.to_lowercase();
    let event_text = final_play_text(&play.text).to_string();
    let event_text_lower = event_text.to_lowercase();
    let has_replay_reversal = event_text != play.text;

    let start_team_id = play
        .start_team_id
        .clone()
        .unwrap_or_else(|| team_id.to_string());
    let offense_abbrev = play
        .team_abbr
        .clone()
        .or_else(|| game.abbr_for(team_id).map(str::to_string))
        .unwrap_or_default()
        .to_lowercase();
    let opponent_id = game.opponent_of(&start_team_id).map(str::to_string);

    let mut facts = PlayFacts {
        team_id: team_id.to_string(),
        text: play.text.clone(),
        play_type: if play.type_text.is_empty() {
            "Unknown".to_string()
        } else {
            play.type_text.clone()
        },
        quarter: play.quarter,
        clock: play.clock.clone(),
        end_pos: end_pos_text(play),
        probability,
        clock_noise: is_clock_noise(&type_lower),
        nullified: is_nullified_play(&text_lower),
        stat_yardage: play.stat_yardage,
        scoring_play: play.scoring_play,
        field_goal_play: type_lower.contains("field goal"),
        start_yte: play.start_yards_to_endzone,
        ..PlayFacts::default()
    };

    // Expanded penalty list entry, attributed to the committing team.
    let has_penalty_flag =
        play.penalty.is_some() || play.has_penalty || text_lower.contains("penalty");
    if has_penalty_flag && !is_declined_only_penalty(&text_lower, play.penalty.as_ref()) {
        let mut commit_team = play
            .penalty
            .as_ref()
            .and_then(|p| p.team_id.clone());
        if commit_team.is_none() {
            commit_team = game
                .teams
                .iter()
                .find(|t| text_lower.contains(&format!("penalty on {}", t.abbr.to_lowercase())))
                .map(|t| t.id.clone());
        }
        if commit_team.is_none() {
            commit_team = if text_lower.contains("on defense") && opponent_id.is_some() {
                opponent_id.clone()
            } else {
                Some(team_id.to_string())
            };
        }
        let yards_pen = play.penalty.as_ref().and_then(|p| p.yards).map(|y| -y.abs());
        facts.penalty_detail = Some((
            commit_team.unwrap_or_else(|| team_id.to_string()),
            PlayDetail {
                play_type: facts.play_type.clone(),
                text: play.text.clone(),
                yards: yards_pen,
                quarter: play.quarter,
                clock: play.clock.clone(),
                end_pos: facts.end_pos.clone(),
                probability,
                ..PlayDetail::default()
            },
        ));
    }

    if facts.clock_noise || facts.nullified {
        return facts;
    }

    // Turnover attribution threads possession through the play text.
    let turnovers = analyze_turnovers(
        ctx,
        team_id,
        play,
        &event_text_lower,
        &type_lower,
        has_replay_reversal,
        &start_team_id,
        opponent_id.as_deref(),
        &offense_abbrev,
    );
    facts.turnover_events = turnovers.events;
    let turnover_on_play = !facts.turnover_events.is_empty();

    // Offensive efficiency stats.
    let (is_offense, is_run, is_pass) = classify_offense_play(play);
    facts.is_offense = is_offense;
    facts.is_run = is_run;
    facts.is_pass = is_pass;

    let is_intentional_grounding = play
        .penalty
        .as_ref()
        .is_some_and(|p| {
            p.status_slug.as_deref() == Some("accepted")
                && p.type_slug.as_deref() == Some("intentional-grounding")
        })
        || text_lower.contains("intentional grounding");

    if is_offense {
        let mut yards = play.stat_yardage.unwrap_or(0);
        if is_intentional_grounding {
            yards = 0;
        }
        if turnover_on_play {
            yards = 0;
            if turnovers.fumble_phrase && !turnovers.interception {
                if let Some(credited) = credited_yards_before_fumble(&event_text) {
                    yards = credited;
                }
            }
        } else if turnovers.fumble_phrase {
            if let Some(credited) = credited_yards_before_fumble(&event_text) {
                yards = credited;
            }
        }
        facts.offense_yards = yards;

        let down = play.start_down.unwrap_or(1);
        let dist = play.start_distance.unwrap_or(10);
        let touchdown = play.scoring_play && play.score_value >= 6;
        if is_run || is_pass {
            facts.success = play_success(down, dist, yards, touchdown);
            facts.explosive = is_explosive(is_run, is_pass, yards);
        }
    }

    // ESPN-style total offense, with enforcement-spot corrections.
    let (is_total_offense, _, _) = classify_total_offense_play(play);
    facts.total_offense = is_total_offense;
    if is_total_offense {
        let mut total_yards = play.stat_yardage.unwrap_or(0);
        if is_intentional_grounding {
            total_yards = 0;
        }
        if !turnovers.two_point_attempt {
            if turnovers.interception {
                total_yards = 0;
            } else if turnovers.fumble_phrase {
                if let Some(credited) = credited_yards_before_fumble(&event_text) {
                    total_yards = credited;
                }
            }
        }

        let penalty_accepted = play
            .penalty
            .as_ref()
            .is_some_and(|p| p.status_slug.as_deref() == Some("accepted"));
        let same_possession = match (play.start_team_id.as_deref(), play.end_team_id.as_deref()) {
            (Some(start), Some(end)) => start == end,
            _ => true,
        };
        if penalty_accepted
            && !event_text_lower.contains("no play")
            && !turnovers.interception
            && !turnovers.fumble_phrase
            && same_possession
        {
            if let Some(start_yte) = play.start_yards_to_endzone {
                if let Some(enforced_yte) = enforced_at_yards_to_endzone(&event_text, &offense_abbrev)
                {
                    let credited = start_yte - enforced_yte;
                    if credited != total_yards {
                        facts.correction = Some(YardsCorrection {
                            play_type: facts.play_type.clone(),
                            text: play.text.clone(),
                            quarter: play.quarter,
                            clock: play.clock.clone(),
                            stat_yardage: total_yards,
                            start_yards_to_endzone: start_yte,
                            penalty_yards: play.penalty.as_ref().and_then(|p| p.yards),
                            enforced_at_yards_to_endzone: enforced_yte,
                            corrected_yards: credited,
                        });
                        total_yards = credited;
                    }
                }
            }
        }
        facts.total_offense_yards = total_yards;
    }

    // Special teams nets from field-position coordinates when both ends are
    // known; the provider's yardage field is sometimes return-yards-only.
    let team_abbr = game.abbr_for(team_id).unwrap_or_default();
    let start_coord = play
        .start_possession_text
        .as_deref()
        .and_then(|pos| yardline_to_coord(pos, team_abbr));
    let end_coord = play
        .end_possession_text
        .as_deref()
        .and_then(|pos| yardline_to_coord(pos, team_abbr));

    if type_lower.contains("punt") && !type_lower.contains("return") {
        let mut end_coord_calc = end_coord;
        // A punt returned for a touchdown often has no end position; the ball
        // ended at the kicking team's goal line.
        if end_coord_calc.is_none() && start_coord.is_some() {
            let scored_against_kicking = play.scoring_play
                && (play
                    .id
                    .as_deref()
                    .and_then(|pid| ctx.scoring.get(pid))
                    .is_some_and(|e| e.team_id.as_deref().is_some_and(|t| t != team_id))
                    || text_lower.contains("touchdown"));
            if scored_against_kicking {
                end_coord_calc = Some(0);
            }
        }
        facts.punt_net = match (start_coord, end_coord_calc) {
            (Some(start), Some(end)) => Some(end - start),
            _ => Some(play.stat_yardage.unwrap_or(0)),
        };
    }
    if type_lower.contains("kickoff") && !type_lower.contains("return") {
        facts.kick_net = match (start_coord, end_coord) {
            (Some(start), Some(end)) => Some(end - start),
            _ => Some(play.stat_yardage.unwrap_or(0)),
        };
    }

    // Points credited to the drive, resolved through the scoring map.
    if play.scoring_play {
        facts.drive_scoring_points = match play.id.as_deref().and_then(|pid| ctx.scoring.get(pid)) {
            Some(entry) => {
                if entry.team_id.as_deref() == Some(team_id) {
                    entry.points
                } else {
                    0
                }
            }
            None => play.score_value,
        };
    }

    facts.non_offensive = play
        .id
        .as_deref()
        .and_then(|pid| ctx.non_offensive.get(pid))
        .cloned();

    // Spikes and kneels carry no stat weight but still belong in the full
    // play dump; total-offense classification covers them.
    facts.meaningful = (facts.is_offense && (facts.is_run || facts.is_pass))
        || facts.total_offense
        || play.scoring_play
        || turnover_on_play
        || has_penalty_flag;

    facts
}

#[derive(Debug, Default)]
struct TurnoverFacts {
    events: Vec<(String, &'static str)>,
    interception: bool,
    fumble_phrase: bool,
    two_point_attempt: bool,
}

#[allow(clippy::too_many_arguments)]
fn analyze_turnovers(
    ctx: &WalkCtx,
    team_id: &str,
    play: &PlayRecord,
    event_text_lower: &str,
    type_lower: &str,
    has_replay_reversal: bool,
    start_team_id: &str,
    opponent_id: Option<&str>,
    offense_abbrev: &str,
) -> TurnoverFacts {
    let mut out = TurnoverFacts::default();

    // Interceptions on two-point tries are not possession changes; official
    // stats do not count them as turnovers.
    out.two_point_attempt = event_text_lower.contains("two-point")
        || event_text_lower.contains("2-point")
        || event_text_lower.contains("conversion attempt");
    if out.two_point_attempt {
        return out;
    }

    let game = ctx.game;
    let muffed_punt = event_text_lower.contains("muffed punt") || type_lower.contains("muff");
    let muffed_kick = muffed_punt
        || event_text_lower.contains("muffed kick")
        || event_text_lower.contains("muffed kickoff");

    out.interception =
        type_lower.contains("interception") || event_text_lower.contains("intercept");
    if has_replay_reversal && !event_text_lower.contains("intercept") {
        out.interception = false;
    }
    out.fumble_phrase = event_text_lower.contains("fumble");
    let is_fumble_recovery_own = type_lower.contains("fumble recovery (own)");
    let is_fumble_recovery_opp = type_lower.contains("fumble recovery (opponent)")
        || type_lower.contains("sack opp fumble recovery");
    let is_touchback = event_text_lower.contains("touchback");

    let mut current_possessor = start_team_id.to_string();
    let mut current_off_abbr = offense_abbrev.to_string();
    let abbr_of = |id: &str| game.abbr_for(id).map(|a| a.to_lowercase());

    // Once a punt is kicked, the receiving team owns the possession context
    // for any fumble/recovery later in the same play text.
    let punt_in_air = event_text_lower.contains("punts");
    if let Some(opp) = opponent_id {
        if punt_in_air && (out.fumble_phrase || muffed_kick) {
            current_possessor = opp.to_string();
            current_off_abbr = abbr_of(opp).unwrap_or(current_off_abbr);
        }
    }

    // Onside kicks: the drive belongs to the receiving team, so a kicking-team
    // recovery charges the receiving team with the turnover.
    let onside_kick = event_text_lower.contains("onside") && event_text_lower.contains("kick");
    let mut kicking_team_recovered_onside = false;
    if onside_kick {
        let explicit_start = play.start_team_id.as_deref();
        kicking_team_recovered_onside = play
            .end_team_id
            .as_deref()
            .is_some_and(|end| end != team_id)
            && event_text_lower.contains("recovered")
            && (explicit_start.is_none() || play.end_team_id.as_deref() == explicit_start);
        if kicking_team_recovered_onside {
            out.events.push((team_id.to_string(), "onside_kick_lost"));
        }
    }

    if let Some(opp) = opponent_id {
        if muffed_kick {
            current_possessor = opp.to_string();
            current_off_abbr = abbr_of(opp).unwrap_or(current_off_abbr);
        }
    }

    // Kickoff-return fumbles belong to the receiving team even though the
    // play's start team is the kicking team.
    let kickoff_play = type_lower.contains("kickoff") || event_text_lower.contains("kickoff");
    if let Some(opp) = opponent_id {
        if kickoff_play && out.fumble_phrase && !onside_kick && !muffed_kick {
            current_possessor = opp.to_string();
            current_off_abbr = abbr_of(opp).unwrap_or(current_off_abbr);
        }
    }

    if out.interception {
        out.events.push((current_possessor.clone(), "interception"));
        if let Some(opp) = opponent_id {
            current_possessor = opp.to_string();
            current_off_abbr = abbr_of(opp).unwrap_or(current_off_abbr);
        }
    }

    let mut fumble_turnover = false;
    if out.fumble_phrase {
        let recovered_team_id: Option<String> = if is_fumble_recovery_own {
            Some(current_possessor.clone())
        } else if is_fumble_recovery_opp && opponent_id.is_some() {
            opponent_id.map(str::to_string)
        } else if let Some(abbr) = classify::recovered_by_abbr(event_text_lower) {
            game.id_for_abbr(&abbr)
                .map(str::to_string)
                .or_else(|| play.end_team_id.clone())
        } else if event_text_lower.contains("and recovers")
            || event_text_lower.contains("recovers at")
        {
            Some(current_possessor.clone())
        } else {
            play.end_team_id.clone()
        };

        if let Some(recovered) = recovered_team_id {
            fumble_turnover = recovered != current_possessor;
        } else if event_text_lower.contains("recovered by") {
            // End team missing: treat as a turnover unless it explicitly
            // reads as an own-team recovery.
            fumble_turnover = !(!current_off_abbr.is_empty()
                && event_text_lower.contains(&format!("recovered by {current_off_abbr}")));
        }

        if is_touchback {
            fumble_turnover = true;
        }
    }
    if fumble_turnover && !muffed_kick {
        out.events.push((current_possessor.clone(), "fumble"));
    }

    if muffed_kick && !kicking_team_recovered_onside {
        out.events.push((current_possessor, "muffed_kick"));
    }

    out
}

fn end_pos_text(play: &PlayRecord) -> Option<String> {
    if let Some(pos) = play
        .end_possession_text
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Some(pos.to_string());
    }
    let down_dist = play.end_down_distance_text.as_deref()?;
    END_POS_FROM_DOWN_DIST_RE
        .captures(down_dist)
        .map(|caps| caps[1].to_string())
}

fn note_drive_start(acc: &mut ViewAcc, drive: &DriveState, team_id: &str, info: &DriveStartInfo) {
    if !drive.started {
        return;
    }
    let Some(yte) = info.start_yte else {
        return;
    };
    if let Some(totals) = acc.totals.get_mut(team_id) {
        totals.start_field_pos_sum += 100 - yte;
        totals.drives_count += 1;
    }
}

fn push_penalty_detail(acc: &mut ViewAcc, commit_team: &str, fallback_team: &str, detail: &PlayDetail) {
    let team = if acc.details.contains_key(commit_team) {
        commit_team
    } else {
        fallback_team
    };
    if let Some(details) = acc.details.get_mut(team) {
        details.penalty_plays.push(detail.clone());
    }
}

fn apply_play(acc: &mut ViewAcc, drive: &mut DriveState, facts: &PlayFacts, expanded: bool) {
    let team_id = facts.team_id.as_str();

    for (event_team, reason) in &facts.turnover_events {
        let Some(totals) = acc.totals.get_mut(event_team) else {
            continue;
        };
        totals.turnovers += 1;
        if expanded {
            if let Some(details) = acc.details.get_mut(event_team) {
                details.turnovers.push(PlayDetail {
                    play_type: facts.play_type.clone(),
                    text: facts.text.clone(),
                    yards: Some(facts.stat_yardage.unwrap_or(0)),
                    quarter: facts.quarter,
                    clock: facts.clock.clone(),
                    end_pos: facts.end_pos.clone(),
                    reason: Some((*reason).to_string()),
                    probability: facts.probability,
                    ..PlayDetail::default()
                });
            }
        }
    }

    if drive.started {
        if facts.is_offense {
            drive.has_offensive_play = true;
        }
        if facts.scoring_play && facts.field_goal_play {
            drive.has_offensive_play = true;
        }
        if facts.is_offense && !drive.crossed_40 {
            if let Some(start_yte) = facts.start_yte {
                drive.current_yte_est = Some(start_yte);
            }
            if let Some(yte) = facts.start_yte.or(drive.current_yte_est) {
                if yte <= 40 {
                    drive.crossed_40 = true;
                } else if let Some(gained) = facts.stat_yardage {
                    if yte - gained <= 40 {
                        drive.crossed_40 = true;
                    }
                    drive.current_yte_est = Some(yte - gained);
                }
            }
        }
        drive.points += facts.drive_scoring_points;
        drive.last_play = Some(PlayDetail {
            play_type: facts.play_type.clone(),
            text: facts.text.clone(),
            yards: facts.stat_yardage,
            quarter: facts.quarter,
            clock: facts.clock.clone(),
            probability: facts.probability,
            ..PlayDetail::default()
        });
    }

    if let Some(non_off) = &facts.non_offensive {
        if let Some(totals) = acc.totals.get_mut(&non_off.team_id) {
            totals.non_offensive_points += non_off.points;
            if expanded {
                if let Some(details) = acc.details.get_mut(&non_off.team_id) {
                    details.non_offensive_scores.push(PlayDetail {
                        play_type: non_off.play_type.clone(),
                        text: non_off.text.clone(),
                        points: Some(non_off.points),
                        quarter: non_off.quarter,
                        clock: non_off.clock.clone(),
                        ..PlayDetail::default()
                    });
                    details.non_offensive_points.push(PlayDetail {
                        play_type: non_off.play_type.clone(),
                        text: non_off.text.clone(),
                        points: Some(non_off.points),
                        quarter: facts.quarter,
                        clock: facts.clock.clone(),
                        end_pos: facts.end_pos.clone(),
                        probability: facts.probability,
                        ..PlayDetail::default()
                    });
                }
            }
        }
    }

    if let Some(totals) = acc.totals.get_mut(team_id) {
        if facts.is_offense {
            totals.plays += 1;
            totals.offensive_yards += facts.offense_yards;
            if facts.success {
                totals.successful_plays += 1;
            }
            if facts.explosive {
                totals.explosive_plays += 1;
            }
        }
        if facts.total_offense {
            totals.total_yards += facts.total_offense_yards;
        }
        if let Some(net) = facts.punt_net {
            totals.punt_net_sum += net;
            totals.punt_plays += 1;
        }
        if let Some(net) = facts.kick_net {
            totals.kick_net_sum += net;
            totals.kick_plays += 1;
        }
    }

    if expanded {
        if let Some(details) = acc.details.get_mut(team_id) {
            if facts.is_offense && facts.explosive {
                details.explosive_plays.push(PlayDetail {
                    play_type: if facts.is_run { "Run" } else { "Pass" }.to_string(),
                    text: facts.text.clone(),
                    yards: Some(facts.offense_yards),
                    quarter: facts.quarter,
                    clock: facts.clock.clone(),
                    end_pos: facts.end_pos.clone(),
                    probability: facts.probability,
                    ..PlayDetail::default()
                });
            }
            if facts.total_offense {
                if let Some(corr) = &facts.correction {
                    details.total_yards_corrections.push(corr.clone());
                }
            }
            if facts.meaningful {
                let mut entry = PlayDetail {
                    play_type: facts.play_type.clone(),
                    text: facts.text.clone(),
                    yards: Some(facts.stat_yardage.unwrap_or(0)),
                    quarter: facts.quarter,
                    clock: facts.clock.clone(),
                    end_pos: facts.end_pos.clone(),
                    probability: facts.probability,
                    ..PlayDetail::default()
                };
                if facts.scoring_play && facts.drive_scoring_points > 0 {
                    entry.points = Some(facts.drive_scoring_points);
                }
                details.all_plays.push(entry);
            }
        }
    }
}

fn finish_drive(
    acc: &mut ViewAcc,
    drive: &DriveState,
    team_id: &str,
    info: &DriveStartInfo,
    expanded: bool,
) {
    if !drive.started {
        return;
    }
    let mut crossed = drive.crossed_40;
    if drive.has_offensive_play && info.start_yte.is_some_and(|yte| yte <= 40) {
        crossed = true;
    }

    if let Some(totals) = acc.totals.get_mut(team_id) {
        if crossed && drive.has_offensive_play {
            totals.drives_inside_40 += 1;
            totals.points_inside_40 += drive.points;
        }
        totals.drive_points += drive.points;
    }

    if !expanded {
        return;
    }
    let Some(details) = acc.details.get_mut(team_id) else {
        return;
    };
    if crossed && drive.has_offensive_play {
        if let Some(last) = &drive.last_play {
            let mut entry = last.clone();
            entry.points = Some(drive.points);
            details.points_per_trip.push(entry);
        }
    }
    if let Some(yte) = info.start_yte {
        let start_pos = info
            .pos_text
            .clone()
            .unwrap_or_else(|| format!("Own {}", 100 - yte));
        details.drive_starts.push(PlayDetail {
            play_type: info.cause_type.clone(),
            text: info.cause_text.clone(),
            yards: info.cause_yards,
            quarter: info.quarter,
            clock: info.clock.clone(),
            start_pos: Some(start_pos.clone()),
            end_pos: Some(start_pos),
            ..PlayDetail::default()
        });
    }
}

fn build_view(game: &GameData, acc: ViewAcc, expanded: bool) -> StatsView {
    let ids: Vec<&str> = game.teams.iter().map(|t| t.id.as_str()).collect();
    let mut turnover_margin: HashMap<&str, i64> = HashMap::new();
    if let [a, b] = ids.as_slice() {
        let ta = acc.totals.get(*a).map_or(0, |t| t.turnovers);
        let tb = acc.totals.get(*b).map_or(0, |t| t.turnovers);
        turnover_margin.insert(*a, tb - ta);
        turnover_margin.insert(*b, ta - tb);
    }

    let mut summary = Vec::new();
    let mut advanced = Vec::new();
    for team in &game.teams {
        let totals = acc.totals.get(&team.id).cloned().unwrap_or_default();
        let plays = totals.plays.max(1) as f64;
        let drives_in_40 = totals.drives_inside_40.max(1) as f64;
        let drives_total = totals.drives_count.max(1) as f64;

        summary.push(SummaryRow {
            team: team.abbr.clone(),
            score: team.score,
            total_yards: totals.total_yards,
            drives: totals.drives_count,
        });
        advanced.push(AdvancedRow {
            team: team.abbr.clone(),
            score: team.score,
            turnovers: totals.turnovers,
            total_yards: totals.total_yards,
            yards_per_play: round_to(totals.offensive_yards as f64 / plays, 2),
            success_rate: round_to(totals.successful_plays as f64 / plays, 3),
            explosive_plays: totals.explosive_plays,
            explosive_play_rate: round_to(totals.explosive_plays as f64 / plays, 3),
            points_per_trip: round_to(totals.points_inside_40 as f64 / drives_in_40, 2),
            avg_start_field_pos: format_field_pos(totals.start_field_pos_sum / totals.drives_count.max(1)),
            drives: totals.drives_count,
            turnover_margin: turnover_margin.get(team.id.as_str()).copied().unwrap_or(0),
            points_per_drive: round_to(totals.drive_points as f64 / drives_total, 2),
            net_punting: if totals.punt_plays > 0 {
                round_to(totals.punt_net_sum as f64 / totals.punt_plays as f64, 1)
            } else {
                0.0
            },
            net_kickoff: if totals.kick_plays > 0 {
                round_to(totals.kick_net_sum as f64 / totals.kick_plays as f64, 1)
            } else {
                0.0
            },
            penalty_yards: team.penalty_yards,
            non_offensive_points: totals.non_offensive_points,
        });
    }

    StatsView {
        summary,
        advanced,
        details: if expanded { acc.details } else { HashMap::new() },
    }
}

/// Average start coordinate in the conventional "Own/Opp N" form: coordinates
/// run 0-100 from the offense's own goal line.
pub fn format_field_pos(coord: i64) -> String {
    let coord = coord.clamp(0, 100);
    if coord == 50 {
        "50".to_string()
    } else if coord < 50 {
        format!("Own {coord}")
    } else {
        format!("Opp {}", 100 - coord)
    }
}

fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GameStatus, HomeAway, ScoringPlay, TeamMeta};

    fn team(id: &str, abbr: &str, side: HomeAway) -> TeamMeta {
        TeamMeta {
            id: id.to_string(),
            abbr: abbr.to_string(),
            display_name: abbr.to_string(),
            home_away: Some(side),
            score: 0,
            penalty_count: 0,
            penalty_yards: 0,
        }
    }

    fn two_team_game(drives: Vec<DriveRecord>) -> GameData {
        GameData {
            game_id: "401".to_string(),
            teams: vec![
                team("1", "SEA", HomeAway::Home),
                team("2", "DAL", HomeAway::Away),
            ],
            status: GameStatus::Final,
            drives,
            scoring_plays: Vec::new(),
        }
    }

    fn play(id: &str, text: &str, type_text: &str) -> PlayRecord {
        PlayRecord {
            id: Some(id.to_string()),
            text: text.to_string(),
            type_text: type_text.to_string(),
            ..PlayRecord::default()
        }
    }

    fn drive(team_id: &str, start_yte: i64, plays: Vec<PlayRecord>) -> DriveRecord {
        DriveRecord {
            team_id: Some(team_id.to_string()),
            start_yards_to_endzone: Some(start_yte),
            start_text: None,
            plays,
        }
    }

    fn run_stats(game: &GameData) -> GameStats {
        let wp = WpIndex::build(game, &HashMap::new(), None);
        process_game_stats(game, &wp, &StatsOptions::default()).expect("stats should build")
    }

    #[test]
    fn no_teams_is_a_contract_violation() {
        let game = GameData {
            game_id: "401".to_string(),
            teams: Vec::new(),
            status: GameStatus::Final,
            drives: Vec::new(),
            scoring_plays: Vec::new(),
        };
        let wp = WpIndex::build(&game, &HashMap::new(), None);
        assert!(process_game_stats(&game, &wp, &StatsOptions::default()).is_err());
    }

    #[test]
    fn interception_charged_to_the_throwing_team() {
        let mut pick = play(
            "1",
            "G.Smith pass deep right INTERCEPTED by T.Diggs at DAL 30",
            "Pass Interception Return",
        );
        pick.start_team_id = Some("1".to_string());
        pick.end_team_id = Some("2".to_string());
        let game = two_team_game(vec![drive("1", 75, vec![pick])]);

        let stats = run_stats(&game);
        let row = &stats.full.advanced[0];
        assert_eq!(row.team, "SEA");
        assert_eq!(row.turnovers, 1);
        assert_eq!(stats.full.advanced[1].turnovers, 0);
        assert_eq!(row.turnover_margin, -1);
        assert_eq!(stats.full.advanced[1].turnover_margin, 1);

        let details = stats.full.details.get("1").unwrap();
        assert_eq!(details.turnovers.len(), 1);
        assert_eq!(details.turnovers[0].reason.as_deref(), Some("interception"));
    }

    #[test]
    fn own_fumble_recovery_is_not_a_turnover() {
        let mut fumble = play(
            "1",
            "K.Walker III left end to SEA 32 for 7 yards, FUMBLES, recovered by SEA at the SEA 30",
            "Fumble Recovery (Own)",
        );
        fumble.start_team_id = Some("1".to_string());
        fumble.end_team_id = Some("1".to_string());
        fumble.stat_yardage = Some(5);
        let game = two_team_game(vec![drive("1", 75, vec![fumble])]);

        let stats = run_stats(&game);
        assert_eq!(stats.full.advanced[0].turnovers, 0);
        assert_eq!(stats.full.advanced[1].turnovers, 0);
    }

    #[test]
    fn lost_fumble_credits_pre_fumble_yards() {
        let mut fumble = play(
            "1",
            "K.Walker III left end to DAL 45 for 12 yards, FUMBLES, recovered by DAL at the DAL 44",
            "Fumble Recovery (Opponent)",
        );
        fumble.start_team_id = Some("1".to_string());
        fumble.end_team_id = Some("2".to_string());
        fumble.stat_yardage = Some(-3);
        fumble.start_down = Some(1);
        fumble.start_distance = Some(10);
        let game = two_team_game(vec![drive("1", 75, vec![fumble])]);

        let stats = run_stats(&game);
        let row = &stats.full.advanced[0];
        assert_eq!(row.turnovers, 1);
        // Pre-fumble gain, not the provider's net yardage.
        assert_eq!(stats.full.details.get("1").unwrap().turnovers.len(), 1);
        assert_eq!(row.yards_per_play, 12.0);
    }

    #[test]
    fn dead_plays_accumulate_nothing() {
        let plays = vec![
            {
                let mut p = play(
                    "1",
                    "PENALTY on SEA-C.Cross, False Start, 5 yards, enforced at SEA 25 - No Play.",
                    "Penalty",
                );
                p.penalty = Some(crate::state::PenaltyInfo {
                    team_id: Some("1".to_string()),
                    yards: Some(5),
                    type_slug: Some("false-start".to_string()),
                    status_slug: Some("accepted".to_string()),
                });
                p
            },
            play("2", "G.Smith kneels to SEA 24 for -1 yards.", "Rush"),
            play("3", "G.Smith spiked the ball to stop the clock.", "Pass"),
        ];
        let game = two_team_game(vec![drive("1", 75, plays)]);

        let stats = run_stats(&game);
        let totals = &stats.full.advanced[0];
        assert_eq!(totals.success_rate, 0.0);
        assert_eq!(totals.yards_per_play, 0.0);
        assert_eq!(totals.explosive_plays, 0);
        // The nullified penalty still shows up in the penalty play list, and
        // the clock plays in the full play dump.
        let details = stats.full.details.get("1").unwrap();
        assert_eq!(details.penalty_plays.len(), 1);
        assert_eq!(details.all_plays.len(), 2);
    }

    #[test]
    fn trips_inside_40_credit_drive_points() {
        let mut long_gain = play("1", "G.Smith pass deep to DK.Metcalf for 40 yards", "Pass Reception");
        long_gain.stat_yardage = Some(40);
        long_gain.start_yards_to_endzone = Some(75);
        long_gain.start_down = Some(1);
        long_gain.start_distance = Some(10);

        let mut td = play("2", "K.Walker III up the middle for 35 yards, TOUCHDOWN.", "Rushing Touchdown");
        td.stat_yardage = Some(35);
        td.start_yards_to_endzone = Some(35);
        td.scoring_play = true;
        td.score_value = 6;

        let mut game = two_team_game(vec![drive("1", 75, vec![long_gain, td])]);
        game.scoring_plays = vec![ScoringPlay {
            play_id: Some("2".to_string()),
            team_id: Some("1".to_string()),
            home_score: 6,
            away_score: 0,
            text: "K.Walker III up the middle for 35 yards, TOUCHDOWN.".to_string(),
            type_text: "Rushing Touchdown".to_string(),
            scoring_type: "touchdown".to_string(),
            quarter: Some(1),
            clock: Some("10:00".to_string()),
        }];

        let stats = run_stats(&game);
        let row = &stats.full.advanced[0];
        assert_eq!(row.points_per_trip, 6.0);
        assert_eq!(row.points_per_drive, 6.0);
        assert_eq!(row.explosive_plays, 2);
        let ppt = &stats.full.details.get("1").unwrap().points_per_trip;
        assert_eq!(ppt.len(), 1);
        assert_eq!(ppt[0].points, Some(6));
    }

    #[test]
    fn field_pos_formatting() {
        assert_eq!(format_field_pos(25), "Own 25");
        assert_eq!(format_field_pos(50), "50");
        assert_eq!(format_field_pos(60), "Opp 40");
    }

    #[test]
    fn unknown_drive_team_increments_diagnostics() {
        let mut drives = vec![drive("1", 75, vec![play("1", "G.Smith pass complete for 5 yards", "Pass")])];
        drives.push(DriveRecord {
            team_id: None,
            start_yards_to_endzone: Some(70),
            start_text: None,
            plays: vec![play("2", "rush for 3 yards", "Rush")],
        });
        let game = two_team_game(drives);
        let stats = run_stats(&game);
        assert_eq!(stats.diagnostics.unknown_drive_teams, 1);
        assert!(!stats.diagnostics.is_clean());
    }
}
