use once_cell::sync::Lazy;
use regex::Regex;

use crate::state::PlayRecord;

// ESPN replay notes are inconsistent about punctuation/spacing:
// e.g. "play was REVERSED.(Shotgun) ..." or "play was REVERSED (Shotgun) ...".
static REPLAY_DECISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:reversed|overturned)\b[.:]?\s*").expect("valid regex"));
static YARDS_FOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfor (-?\d+) yards\b").expect("valid regex"));
static YARDS_LOSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfor loss of (\d+) yards\b").expect("valid regex"));
static RECOVERED_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brecovered by\s+([a-z]{2,4})\b").expect("valid regex"));
static ENFORCED_AT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\benforced at(?: the)?\s+([A-Za-z]{2,3})\s+(\d{1,2})\b").expect("valid regex")
});

const RUSH_PATTERNS: [&str; 10] = [
    "up the middle",
    "left end",
    "right end",
    "left tackle",
    "right tackle",
    "left guard",
    "right guard",
    "middle for",
    "around left",
    "around right",
];

const SPECIAL_TEAMS_KEYWORDS: [&str; 7] = [
    "punt",
    "kickoff",
    "field goal",
    "extra point",
    "xp",
    "fg",
    "onside",
];

/// Closed taxonomy for one snap. `Unclassified` is the neutral fallback for
/// descriptions no rule matches; it still credits the offense with the snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayCategory {
    Run,
    PassDropback,
    SpecialTeams,
    PenaltyNoPlay,
    SpikeKneel,
    TurnoverInterception,
    TurnoverFumble,
    ScoringNonOffensive,
    Unclassified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayClassification {
    pub category: PlayCategory,
    pub offense_credit: bool,
    pub is_run: bool,
    pub is_pass: bool,
}

/// ESPN play text can contain an original ruling plus a replay-updated
/// re-statement after "REVERSED."/"OVERTURNED.". Event detection must use the
/// final re-stated portion when present.
pub fn final_play_text(text: &str) -> &str {
    let Some(last) = REPLAY_DECISION_RE.find_iter(text).last() else {
        return text;
    };
    let candidate = text[last.end()..].trim_start();
    if candidate.is_empty() { text } else { candidate }
}

/// For fumble plays, `statYardage` can reflect the net outcome including the
/// recovery, while official offense yards stop at the fumble. Uses the last
/// "for X yards" mention before the first "fumble" in the final play text.
pub fn credited_yards_before_fumble(event_text: &str) -> Option<i64> {
    let lower = event_text.to_lowercase();
    let fumble_at = lower.find("fumble")?;
    let prefix = &lower[..fumble_at];

    if let Some(caps) = YARDS_FOR_RE.captures_iter(prefix).last() {
        return caps[1].parse::<i64>().ok();
    }
    if prefix.contains("for no gain") || prefix.contains("for no loss") {
        return Some(0);
    }
    if let Some(caps) = YARDS_LOSS_RE.captures(prefix) {
        return caps[1].parse::<i64>().ok().map(|y| -y);
    }
    None
}

/// Parse "enforced at XXX NN" and convert to yards-to-endzone relative to the
/// offense, so accepted-penalty plays can be credited from the enforcement
/// spot instead of the provider's yardage field.
pub fn enforced_at_yards_to_endzone(event_text: &str, offense_abbrev: &str) -> Option<i64> {
    if event_text.is_empty() || offense_abbrev.is_empty() {
        return None;
    }
    let caps = ENFORCED_AT_RE.captures(event_text)?;
    let side = caps[1].to_uppercase();
    let yard: i64 = caps[2].parse().ok()?;
    if !(0..=50).contains(&yard) {
        return None;
    }
    if yard == 50 {
        return Some(50);
    }
    if side == offense_abbrev.to_uppercase() {
        Some(100 - yard)
    } else {
        Some(yard)
    }
}

/// The team abbreviation named after "recovered by", canonicalized (ESPN play
/// text can use older abbreviations than the team metadata, e.g. WAS vs WSH).
pub fn recovered_by_abbr(event_text_lower: &str) -> Option<String> {
    let caps = RECOVERED_BY_RE.captures(event_text_lower)?;
    Some(canonical_abbr(&caps[1]))
}

pub fn canonical_abbr(abbr: &str) -> String {
    let lower = abbr.trim().to_lowercase();
    match lower.as_str() {
        "was" => "wsh".to_string(),
        _ => lower,
    }
}

/// Convert a possession text like "SEA 24" into a 0-100 coordinate from the
/// perspective of `team_abbr`'s own goal line.
pub fn yardline_to_coord(pos_text: &str, team_abbr: &str) -> Option<i64> {
    if pos_text.trim().is_empty() || team_abbr.trim().is_empty() {
        return None;
    }
    let parts: Vec<&str> = pos_text.split_whitespace().collect();
    let [side, yard_str] = parts.as_slice() else {
        return None;
    };
    let yard: i64 = yard_str.parse().ok()?;
    if side.to_uppercase() == team_abbr.trim().to_uppercase() {
        Some(yard)
    } else {
        Some(100 - yard)
    }
}

/// Standard analytics success definition: 40% of the distance on 1st down,
/// 60% on 2nd, the full line on 3rd and 4th.
pub fn calculate_success(down: i64, distance: i64, yards_gained: i64) -> bool {
    let gained = yards_gained as f64;
    match down {
        1 => gained >= 0.4 * distance as f64,
        2 => gained >= 0.6 * distance as f64,
        3 | 4 => yards_gained >= distance,
        _ => false,
    }
}

/// A touchdown is a success regardless of down and distance.
pub fn play_success(down: i64, distance: i64, yards_gained: i64, touchdown: bool) -> bool {
    touchdown || calculate_success(down, distance, yards_gained)
}

/// Explosive: a run of 10+ yards or a pass/dropback of 20+ yards.
pub fn is_explosive(is_run: bool, is_pass: bool, yards: i64) -> bool {
    (is_run && yards >= 10) || (is_pass && yards >= 20)
}

/// Check the play's attached statistics for type text/abbreviation hits.
pub fn any_stat_contains(play: &PlayRecord, needles: &[&str]) -> bool {
    play.stat_types
        .iter()
        .any(|stat| needles.iter().any(|n| stat.contains(n)))
}

pub fn is_nullified_play(text_lower: &str) -> bool {
    text_lower.contains("nullified") || text_lower.contains("no play")
}

/// Penalty plays that wiped out the snap. Declined and offsetting penalties
/// leave the play standing.
pub fn is_penalty_play(play: &PlayRecord, text_lower: &str, type_lower: &str) -> bool {
    if text_lower.contains("declined") || text_lower.contains("offsetting") {
        return false;
    }
    if play.penalty.is_some() && text_lower.contains("no play") {
        return true;
    }
    if play.has_penalty && text_lower.contains("no play") {
        return true;
    }
    text_lower.contains("no play")
        && (text_lower.contains("penalty") || type_lower.contains("penalty"))
}

/// True when the only penalty on the play was declined, so it should not show
/// up in penalty play lists. ESPN embeds "declined" even when a second,
/// accepted penalty is also present; structured status wins when available.
pub fn is_declined_only_penalty(text_lower: &str, penalty: Option<&crate::state::PenaltyInfo>) -> bool {
    let status_slug = penalty.and_then(|p| p.status_slug.as_deref());
    if !text_lower.contains("declined") {
        return status_slug == Some("declined");
    }
    if let Some(slug) = status_slug {
        if slug != "declined" {
            return false;
        }
    }
    if text_lower.contains("enforced")
        || text_lower.contains("accepted")
        || text_lower.contains("no play")
    {
        return false;
    }
    true
}

pub fn is_spike_or_kneel(text_lower: &str, type_lower: &str) -> bool {
    if text_lower.contains("spike") || type_lower.contains("spike") {
        return true;
    }
    text_lower.contains("kneel") || type_lower.contains("kneel")
}

/// Punts, kickoffs, FGs, XPs. Touchdown text exempts a play so offensive and
/// return touchdowns are never filtered here.
pub fn is_special_teams_play(text_lower: &str, type_lower: &str) -> bool {
    if text_lower.contains("touchdown") || type_lower.contains("touchdown") {
        return false;
    }
    SPECIAL_TEAMS_KEYWORDS
        .iter()
        .any(|k| text_lower.contains(k) || type_lower.contains(k))
}

fn is_kick_return(text_lower: &str, type_lower: &str) -> bool {
    let kick = text_lower.contains("kickoff") || type_lower.contains("kickoff");
    let punt = text_lower.contains("punt") || type_lower.contains("punt");
    (kick || punt) && type_lower.contains("return")
}

fn pass_and_rush_hints(play: &PlayRecord, text_lower: &str, type_lower: &str) -> (bool, bool) {
    let pass_hint = any_stat_contains(play, &["pass", "sack"])
        || type_lower.contains("pass")
        || type_lower.contains("sack")
        || type_lower.contains("scramble")
        || text_lower.contains("pass")
        || text_lower.contains("sack")
        || text_lower.contains("scramble");

    let mut rush_hint = any_stat_contains(play, &["rush"])
        || type_lower.contains("rush")
        || text_lower.contains("run")
        || RUSH_PATTERNS.iter().any(|p| text_lower.contains(p));

    // Scrambles are dropbacks, not runs.
    if pass_hint
        && rush_hint
        && (text_lower.contains("scramble") || type_lower.contains("scramble"))
    {
        rush_hint = false;
    }

    (pass_hint, rush_hint)
}

/// Decide whether a play counts toward offensive success rate / yards-per-play
/// / explosives. Returns (offense_credit, is_run, is_pass); sacks and
/// scrambles land in the pass bucket.
pub fn classify_offense_play(play: &PlayRecord) -> (bool, bool, bool) {
    let text_lower = play.text.to_lowercase();
    let type_lower = play.type_text.to_lowercase();

    if is_nullified_play(&text_lower)
        || is_penalty_play(play, &text_lower, &type_lower)
        || is_spike_or_kneel(&text_lower, &type_lower)
        || is_special_teams_play(&text_lower, &type_lower)
        || is_kick_return(&text_lower, &type_lower)
    {
        return (false, false, false);
    }

    let (pass_hint, rush_hint) = pass_and_rush_hints(play, &text_lower, &type_lower);
    (true, rush_hint, pass_hint)
}

/// ESPN-style total offense classification: like `classify_offense_play` but
/// spikes/kneels count, and aborted snaps count as rush attempts.
pub fn classify_total_offense_play(play: &PlayRecord) -> (bool, bool, bool) {
    let text_lower = play.text.to_lowercase();
    let type_lower = play.type_text.to_lowercase();

    if is_nullified_play(&text_lower)
        || is_penalty_play(play, &text_lower, &type_lower)
        || is_special_teams_play(&text_lower, &type_lower)
        || is_kick_return(&text_lower, &type_lower)
    {
        return (false, false, false);
    }

    if is_spike_or_kneel(&text_lower, &type_lower) {
        let kneel = text_lower.contains("kneel") || type_lower.contains("kneel");
        let spike = text_lower.contains("spike") || type_lower.contains("spike");
        return (true, kneel, spike);
    }

    let (pass_hint, mut rush_hint) = pass_and_rush_hints(play, &text_lower, &type_lower);
    if text_lower.contains("aborted") && text_lower.contains("fumble") {
        rush_hint = true;
    }
    (true, rush_hint, pass_hint)
}

/// Map one play into the closed category taxonomy. Never fails: descriptions
/// that match no rule fall back to `Unclassified` with offense credit.
pub fn classify_play(play: &PlayRecord) -> PlayClassification {
    let text_lower = play.text.to_lowercase();
    let type_lower = play.type_text.to_lowercase();

    if is_nullified_play(&text_lower) || is_penalty_play(play, &text_lower, &type_lower) {
        return PlayClassification {
            category: PlayCategory::PenaltyNoPlay,
            offense_credit: false,
            is_run: false,
            is_pass: false,
        };
    }
    if is_spike_or_kneel(&text_lower, &type_lower) {
        return PlayClassification {
            category: PlayCategory::SpikeKneel,
            offense_credit: false,
            is_run: false,
            is_pass: false,
        };
    }
    // Possession-change markers, judged from the play record alone: the text
    // signals plus the start/end team ids. Own-team recoveries never count.
    let interception =
        type_lower.contains("interception") || text_lower.contains("intercept");
    let possession_flipped = match (play.start_team_id.as_deref(), play.end_team_id.as_deref()) {
        (Some(start), Some(end)) => start != end,
        _ => recovered_by_abbr(&text_lower).is_some_and(|recovered| {
            play.team_abbr
                .as_deref()
                .is_some_and(|own| canonical_abbr(own) != recovered)
        }),
    };
    let fumble_lost = text_lower.contains("fumble") && possession_flipped;
    let touchdown = text_lower.contains("touchdown") || type_lower.contains("touchdown");

    if touchdown && (interception || fumble_lost || is_kick_return(&text_lower, &type_lower)) {
        return PlayClassification {
            category: PlayCategory::ScoringNonOffensive,
            offense_credit: false,
            is_run: false,
            is_pass: false,
        };
    }
    if interception {
        // A pick is still an offensive dropback for snap-count purposes.
        return PlayClassification {
            category: PlayCategory::TurnoverInterception,
            offense_credit: true,
            is_run: false,
            is_pass: true,
        };
    }
    if fumble_lost && !is_special_teams_play(&text_lower, &type_lower) {
        let (pass_hint, _) = pass_and_rush_hints(play, &text_lower, &type_lower);
        return PlayClassification {
            category: PlayCategory::TurnoverFumble,
            offense_credit: true,
            is_run: !pass_hint,
            is_pass: pass_hint,
        };
    }

    if is_special_teams_play(&text_lower, &type_lower) || is_kick_return(&text_lower, &type_lower) {
        return PlayClassification {
            category: PlayCategory::SpecialTeams,
            offense_credit: false,
            is_run: false,
            is_pass: false,
        };
    }

    let (pass_hint, rush_hint) = pass_and_rush_hints(play, &text_lower, &type_lower);
    // Dropback unification: sacks and scrambles are pass plays even when the
    // provider tags them as rushes.
    let dropback = text_lower.contains("sack")
        || type_lower.contains("sack")
        || text_lower.contains("scramble")
        || type_lower.contains("scramble");

    if dropback || (pass_hint && !rush_hint) {
        PlayClassification {
            category: PlayCategory::PassDropback,
            offense_credit: true,
            is_run: false,
            is_pass: true,
        }
    } else if rush_hint {
        PlayClassification {
            category: PlayCategory::Run,
            offense_credit: true,
            is_run: true,
            is_pass: pass_hint,
        }
    } else if pass_hint {
        PlayClassification {
            category: PlayCategory::PassDropback,
            offense_credit: true,
            is_run: false,
            is_pass: true,
        }
    } else {
        PlayClassification {
            category: PlayCategory::Unclassified,
            offense_credit: true,
            is_run: false,
            is_pass: false,
        }
    }
}

/// Timeouts and period boundaries; these never enter classification.
pub fn is_clock_noise(type_lower: &str) -> bool {
    type_lower.contains("timeout") || type_lower.contains("end of")
}
