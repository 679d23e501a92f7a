use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WP_THRESHOLD: f64 = 0.975;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeAway {
    Home,
    Away,
}

impl HomeAway {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "home" => Some(HomeAway::Home),
            "away" => Some(HomeAway::Away),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMeta {
    pub id: String,
    pub abbr: String,
    pub display_name: String,
    pub home_away: Option<HomeAway>,
    pub score: i64,
    pub penalty_count: i64,
    pub penalty_yards: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Pregame,
    InProgress { quarter: i64, clock: String },
    Final,
}

impl GameStatus {
    pub fn label(&self) -> String {
        match self {
            GameStatus::Pregame => "pregame".to_string(),
            GameStatus::InProgress { quarter, clock } => {
                if *quarter <= 4 {
                    format!("Q{quarter} {clock}").trim().to_string()
                } else if clock.is_empty() {
                    "OT".to_string()
                } else {
                    format!("OT {clock}")
                }
            }
            GameStatus::Final => "final".to_string(),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, GameStatus::Final)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PenaltyInfo {
    pub team_id: Option<String>,
    pub yards: Option<i64>,
    pub type_slug: Option<String>,
    pub status_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayRecord {
    pub id: Option<String>,
    pub text: String,
    pub type_text: String,
    pub quarter: Option<i64>,
    pub clock: Option<String>,
    pub stat_yardage: Option<i64>,
    pub start_down: Option<i64>,
    pub start_distance: Option<i64>,
    pub start_yards_to_endzone: Option<i64>,
    pub start_team_id: Option<String>,
    pub start_possession_text: Option<String>,
    pub end_team_id: Option<String>,
    pub end_possession_text: Option<String>,
    pub end_down_distance_text: Option<String>,
    pub team_abbr: Option<String>,
    pub scoring_play: bool,
    pub score_value: i64,
    pub has_penalty: bool,
    pub penalty: Option<PenaltyInfo>,
    // Lowercased statistics type text/abbreviation values attached to the play.
    pub stat_types: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveRecord {
    pub team_id: Option<String>,
    pub start_yards_to_endzone: Option<i64>,
    pub start_text: Option<String>,
    pub plays: Vec<PlayRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringPlay {
    pub play_id: Option<String>,
    pub team_id: Option<String>,
    pub home_score: i64,
    pub away_score: i64,
    pub text: String,
    pub type_text: String,
    pub scoring_type: String,
    pub quarter: Option<i64>,
    pub clock: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub game_id: String,
    pub teams: Vec<TeamMeta>,
    pub status: GameStatus,
    pub drives: Vec<DriveRecord>,
    pub scoring_plays: Vec<ScoringPlay>,
}

impl GameData {
    pub fn abbr_for(&self, team_id: &str) -> Option<&str> {
        self.teams
            .iter()
            .find(|t| t.id == team_id)
            .map(|t| t.abbr.as_str())
    }

    pub fn id_for_abbr(&self, abbr: &str) -> Option<&str> {
        let want = abbr.trim().to_lowercase();
        self.teams
            .iter()
            .find(|t| t.abbr.to_lowercase() == want)
            .map(|t| t.id.as_str())
    }

    /// The other team in a two-team game; None when `team_id` is unknown or
    /// the team metadata is unusual.
    pub fn opponent_of(&self, team_id: &str) -> Option<&str> {
        if self.teams.len() != 2 || !self.teams.iter().any(|t| t.id == team_id) {
            return None;
        }
        self.teams
            .iter()
            .find(|t| t.id != team_id)
            .map(|t| t.id.as_str())
    }

    pub fn home_team(&self) -> Option<&TeamMeta> {
        self.teams
            .iter()
            .find(|t| t.home_away == Some(HomeAway::Home))
    }

    pub fn away_team(&self) -> Option<&TeamMeta> {
        self.teams
            .iter()
            .find(|t| t.home_away == Some(HomeAway::Away))
    }

    pub fn label(&self) -> String {
        match (self.away_team(), self.home_team()) {
            (Some(away), Some(home)) => {
                format!("{}_at_{}_{}", away.abbr, home.abbr, self.game_id)
            }
            _ => format!("game_{}", self.game_id),
        }
    }

    pub fn play_count(&self) -> usize {
        self.drives.iter().map(|d| d.plays.len()).sum()
    }
}

/// One end-of-play reading from the probabilities feed, clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbSample {
    pub home_wp: f64,
    pub away_wp: f64,
    pub tie: f64,
}

/// Win probability at the end of a play plus the change from the last known
/// sample (pregame-seeded). Deltas are in probability units, not percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WpSnapshot {
    pub home_wp: f64,
    pub away_wp: f64,
    pub tie: f64,
    pub home_delta: f64,
    pub away_delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    pub team: String,
    pub score: i64,
    pub total_yards: i64,
    pub drives: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedRow {
    pub team: String,
    pub score: i64,
    pub turnovers: i64,
    pub total_yards: i64,
    pub yards_per_play: f64,
    // Fractions in 0..1; renderers multiply by 100 themselves.
    pub success_rate: f64,
    pub explosive_plays: i64,
    pub explosive_play_rate: f64,
    pub points_per_trip: f64,
    pub avg_start_field_pos: String,
    pub drives: i64,
    pub turnover_margin: i64,
    pub points_per_drive: f64,
    pub net_punting: f64,
    pub net_kickoff: f64,
    pub penalty_yards: i64,
    pub non_offensive_points: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayDetail {
    pub play_type: String,
    pub text: String,
    pub yards: Option<i64>,
    pub quarter: Option<i64>,
    pub clock: Option<String>,
    pub start_pos: Option<String>,
    pub end_pos: Option<String>,
    pub points: Option<i64>,
    pub reason: Option<String>,
    pub probability: Option<WpSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YardsCorrection {
    pub play_type: String,
    pub text: String,
    pub quarter: Option<i64>,
    pub clock: Option<String>,
    pub stat_yardage: i64,
    pub start_yards_to_endzone: i64,
    pub penalty_yards: Option<i64>,
    pub enforced_at_yards_to_endzone: i64,
    pub corrected_yards: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamDetails {
    pub all_plays: Vec<PlayDetail>,
    pub turnovers: Vec<PlayDetail>,
    pub explosive_plays: Vec<PlayDetail>,
    pub non_offensive_scores: Vec<PlayDetail>,
    pub points_per_trip: Vec<PlayDetail>,
    pub drive_starts: Vec<PlayDetail>,
    pub penalty_plays: Vec<PlayDetail>,
    pub non_offensive_points: Vec<PlayDetail>,
    pub total_yards_corrections: Vec<YardsCorrection>,
}

/// Counters for data-quality issues swallowed during a run. These surface in
/// the report so a bad feed is visible without failing the analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub skipped_plays: u32,
    pub unknown_drive_teams: u32,
    pub missing_wp_samples: u32,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        *self == Diagnostics::default()
    }
}

/// Numeric tables plus expanded play lists for one view of the game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsView {
    pub summary: Vec<SummaryRow>,
    pub advanced: Vec<AdvancedRow>,
    pub details: HashMap<String, TeamDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStats {
    pub competitive: StatsView,
    pub full: StatsView,
    /// Play id of the snap that tripped the competitive gate, if any.
    pub wp_locked_at: Option<String>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameReport {
    pub game_id: String,
    pub label: String,
    pub status: String,
    pub game_clock: Option<String>,
    pub wp_threshold: f64,
    pub team_meta: Vec<TeamMeta>,
    pub stats: GameStats,
    pub analysis: String,
}
