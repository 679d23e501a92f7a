use std::collections::HashMap;

use rand::Rng;

use crate::state::{
    DriveRecord, GameData, GameStatus, HomeAway, PlayRecord, ProbSample, ScoringPlay, TeamMeta,
};

pub const FAKE_GAME_ID: &str = "demo";
pub const FAKE_HOME_ABBR: &str = "HAW";
pub const FAKE_AWAY_ABBR: &str = "BLZ";

const HOME_ID: &str = "10";
const AWAY_ID: &str = "20";

pub struct FakeGame {
    pub game: GameData,
    pub samples: HashMap<String, ProbSample>,
    pub pregame: (f64, f64),
}

/// A scripted two-team game for offline runs, benches and demos: touchdowns,
/// a lost fumble, an interception, a pick-six, and a garbage-time drive that
/// starts after the win probability has crossed the competitive threshold.
pub fn demo_game() -> FakeGame {
    let mut rng = rand::thread_rng();

    let teams = vec![
        TeamMeta {
            id: HOME_ID.to_string(),
            abbr: FAKE_HOME_ABBR.to_string(),
            display_name: "Harbor Hawks".to_string(),
            home_away: Some(HomeAway::Home),
            score: 17,
            penalty_count: 2,
            penalty_yards: 15,
        },
        TeamMeta {
            id: AWAY_ID.to_string(),
            abbr: FAKE_AWAY_ABBR.to_string(),
            display_name: "Boreal Blizzard".to_string(),
            home_away: Some(HomeAway::Away),
            score: 7,
            penalty_count: 3,
            penalty_yards: 25,
        },
    ];

    let mut builder = ScriptBuilder::default();

    // Drive 1 (HAW): touchback, a dropback sack, an explosive pass, punt.
    builder.drive(HOME_ID, 75, |d| {
        d.kick("B.Vale kicks 65 yards from BLZ 35 to the end zone, Touchback.", "Kickoff", 0.56);
        d.snap("K.Marsh right guard to HAW 29 for 4 yards (T.Okafor).", "Rush", 4, 1, 10, 75, 0.57);
        d.snap(
            "(Shotgun) D.Reeves pass deep left to C.Abara to BLZ 46 for 21 yards (M.Frost).",
            "Pass Reception",
            21,
            2,
            6,
            71,
            0.60,
        );
        d.snap("D.Reeves sacked at HAW 47 for -7 yards (V.Hale).", "Sack", -7, 1, 10, 46, 0.57);
        d.snap(
            "(Shotgun) D.Reeves pass short middle to K.Marsh to BLZ 44 for 9 yards.",
            "Pass Reception",
            9,
            2,
            17,
            53,
            0.575,
        );
        d.kick("A.Veik punts 36 yards to BLZ 8, fair catch by N.Quist.", "Punt", 0.565);
    });

    // Drive 2 (BLZ): three plays and a pick.
    builder.drive(AWAY_ID, 92, |d| {
        d.snap("J.Rynne left tackle to BLZ 11 for 3 yards (P.Osei).", "Rush", 3, 1, 10, 92, 0.575);
        d.snap(
            "(No Huddle, Shotgun) M.Calder pass incomplete short right to N.Quist.",
            "Pass Incompletion",
            0,
            2,
            7,
            89,
            0.59,
        );
        d.turnover_snap(
            "M.Calder pass deep middle INTERCEPTED by S.Ng at the BLZ 38. S.Ng to BLZ 33 for 5 yards.",
            "Pass Interception Return",
            0,
            3,
            7,
            89,
            AWAY_ID,
            HOME_ID,
            0.67,
        );
    });

    // Drive 3 (HAW): short field, touchdown.
    builder.drive(HOME_ID, 33, |d| {
        d.snap("K.Marsh up the middle to BLZ 21 for 12 yards (T.Okafor).", "Rush", 12, 1, 10, 33, 0.71);
        d.score_snap(
            "(Shotgun) D.Reeves pass short right to C.Abara for 21 yards, TOUCHDOWN.",
            "Passing Touchdown",
            21,
            2,
            9,
            21,
            6,
            0.78,
        );
        d.extra_point("L.Brandt extra point is GOOD, Center-H.Voss, Holder-A.Veik.", 1, 0.785);
    });

    // Drive 4 (BLZ): a penalty wipes a play, then a lost fumble.
    builder.drive(AWAY_ID, 70, |d| {
        d.penalty_snap(
            "PENALTY on BLZ-R.Stroud, False Start, 5 yards, enforced at BLZ 30 - No Play.",
            AWAY_ID,
            5,
            0.79,
        );
        d.snap("J.Rynne around right end to BLZ 34 for 9 yards.", "Rush", 9, 1, 15, 75, 0.775);
        d.turnover_snap(
            "J.Rynne up the middle to BLZ 37 for 3 yards, FUMBLES (S.Ng), recovered by HAW at the BLZ 35.",
            "Fumble Recovery (Opponent)",
            3,
            2,
            6,
            66,
            AWAY_ID,
            HOME_ID,
            0.85,
        );
    });

    // Drive 5 (HAW): stalls inside the 40, field goal.
    builder.drive(HOME_ID, 35, |d| {
        d.snap("K.Marsh left end to BLZ 31 for 4 yards.", "Rush", 4, 1, 10, 35, 0.855);
        d.snap(
            "(Shotgun) D.Reeves pass incomplete deep right to C.Abara, broken up by M.Frost.",
            "Pass Incompletion",
            0,
            2,
            6,
            31,
            0.845,
        );
        d.field_goal("L.Brandt 49 yard field goal is GOOD, Center-H.Voss.", 3, 0.89);
    });

    // Drive 6 (BLZ): pick-six the other way.
    builder.drive(AWAY_ID, 75, |d| {
        d.snap("M.Calder pass short left to D.Wren to BLZ 29 for 4 yards.", "Pass Reception", 4, 1, 10, 75, 0.885);
        d.pick_six(
            "M.Calder pass short middle INTERCEPTED by S.Ng at the BLZ 22. S.Ng for 22 yards, TOUCHDOWN.",
            "Interception Return Touchdown",
            2,
            8,
            71,
            6,
            0.972,
        );
        d.extra_point("L.Brandt extra point is GOOD, Center-H.Voss, Holder-A.Veik.", 1, 0.978);
    });

    // Drive 7 (BLZ): garbage-time touchdown after the gate has locked.
    builder.drive(AWAY_ID, 75, |d| {
        d.snap("(Shotgun) M.Calder pass deep left to N.Quist to HAW 30 for 45 yards.", "Pass Reception", 45, 1, 10, 75, 0.976);
        d.score_snap(
            "(Shotgun) M.Calder pass short right to D.Wren for 30 yards, TOUCHDOWN.",
            "Passing Touchdown",
            30,
            1,
            10,
            30,
            6,
            0.969,
        );
        d.extra_point("T.Lund extra point is GOOD, Center-E.Maki, Holder-O.Hart.", 1, 0.968);
    });

    // Drive 8 (HAW): kneel it out.
    builder.drive(HOME_ID, 60, |d| {
        d.dead_snap("D.Reeves kneels to HAW 39 for -1 yards.", "Rush", 0.985);
        d.dead_snap("D.Reeves kneels to HAW 38 for -1 yards.", "Rush", 0.99);
    });

    let (drives, mut samples, scoring_plays) = builder.finish();

    // Jitter the competitive stretch a touch so repeated demo runs are not
    // byte-identical; the post-lock tail stays above the threshold.
    for sample in samples.values_mut() {
        if sample.home_wp < 0.95 {
            let nudged = (sample.home_wp + rng.gen_range(-0.004..0.004)).clamp(0.01, 0.94);
            sample.home_wp = nudged;
            sample.away_wp = 1.0 - nudged;
        }
    }

    FakeGame {
        game: GameData {
            game_id: FAKE_GAME_ID.to_string(),
            teams,
            status: GameStatus::Final,
            drives,
            scoring_plays,
        },
        samples,
        pregame: (0.55, 0.45),
    }
}

#[derive(Default)]
struct ScriptBuilder {
    next_play_id: u32,
    home_score: i64,
    away_score: i64,
    drives: Vec<DriveRecord>,
    samples: HashMap<String, ProbSample>,
    scoring_plays: Vec<ScoringPlay>,
}

struct DriveScript<'a> {
    builder: &'a mut ScriptBuilder,
    team_id: String,
    plays: Vec<PlayRecord>,
}

impl ScriptBuilder {
    fn drive(&mut self, team_id: &str, start_yte: i64, script: impl FnOnce(&mut DriveScript)) {
        let mut drive = DriveScript {
            builder: self,
            team_id: team_id.to_string(),
            plays: Vec::new(),
        };
        script(&mut drive);
        let plays = drive.plays;
        let team_id = drive.team_id;
        self.drives.push(DriveRecord {
            team_id: Some(team_id),
            start_yards_to_endzone: Some(start_yte),
            start_text: Some(format!("Own {}", 100 - start_yte)),
            plays,
        });
    }

    fn finish(self) -> (Vec<DriveRecord>, HashMap<String, ProbSample>, Vec<ScoringPlay>) {
        (self.drives, self.samples, self.scoring_plays)
    }

    fn next_id(&mut self) -> String {
        self.next_play_id += 1;
        format!("demo-{}", self.next_play_id)
    }
}

impl DriveScript<'_> {
    fn base_play(&mut self, text: &str, type_text: &str, home_wp: f64) -> PlayRecord {
        let id = self.builder.next_id();
        self.builder.samples.insert(
            id.clone(),
            ProbSample {
                home_wp,
                away_wp: 1.0 - home_wp,
                tie: 0.0,
            },
        );
        PlayRecord {
            id: Some(id),
            text: text.to_string(),
            type_text: type_text.to_string(),
            quarter: Some(quarter_for(self.builder.drives.len())),
            clock: Some("7:30".to_string()),
            start_team_id: Some(self.team_id.clone()),
            end_team_id: Some(self.team_id.clone()),
            ..PlayRecord::default()
        }
    }

    fn kick(&mut self, text: &str, type_text: &str, home_wp: f64) {
        let play = self.base_play(text, type_text, home_wp);
        self.plays.push(play);
    }

    #[allow(clippy::too_many_arguments)]
    fn snap(
        &mut self,
        text: &str,
        type_text: &str,
        yards: i64,
        down: i64,
        dist: i64,
        yte: i64,
        home_wp: f64,
    ) {
        let mut play = self.base_play(text, type_text, home_wp);
        play.stat_yardage = Some(yards);
        play.start_down = Some(down);
        play.start_distance = Some(dist);
        play.start_yards_to_endzone = Some(yte);
        self.plays.push(play);
    }

    fn dead_snap(&mut self, text: &str, type_text: &str, home_wp: f64) {
        let play = self.base_play(text, type_text, home_wp);
        self.plays.push(play);
    }

    fn penalty_snap(&mut self, text: &str, commit_team: &str, yards: i64, home_wp: f64) {
        let mut play = self.base_play(text, "Penalty", home_wp);
        play.penalty = Some(crate::state::PenaltyInfo {
            team_id: Some(commit_team.to_string()),
            yards: Some(yards),
            type_slug: Some("false-start".to_string()),
            status_slug: Some("accepted".to_string()),
        });
        play.has_penalty = true;
        self.plays.push(play);
    }

    #[allow(clippy::too_many_arguments)]
    fn turnover_snap(
        &mut self,
        text: &str,
        type_text: &str,
        yards: i64,
        down: i64,
        dist: i64,
        yte: i64,
        start_team: &str,
        end_team: &str,
        home_wp: f64,
    ) {
        let mut play = self.base_play(text, type_text, home_wp);
        play.stat_yardage = Some(yards);
        play.start_down = Some(down);
        play.start_distance = Some(dist);
        play.start_yards_to_endzone = Some(yte);
        play.start_team_id = Some(start_team.to_string());
        play.end_team_id = Some(end_team.to_string());
        self.plays.push(play);
    }

    #[allow(clippy::too_many_arguments)]
    fn score_snap(
        &mut self,
        text: &str,
        type_text: &str,
        yards: i64,
        down: i64,
        dist: i64,
        yte: i64,
        points: i64,
        home_wp: f64,
    ) {
        let mut play = self.base_play(text, type_text, home_wp);
        play.stat_yardage = Some(yards);
        play.start_down = Some(down);
        play.start_distance = Some(dist);
        play.start_yards_to_endzone = Some(yte);
        play.scoring_play = true;
        play.score_value = points;
        let scoring_team = self.team_id.clone();
        self.push_scoring_play(&play, &scoring_team, points, text, type_text);
        self.plays.push(play);
    }

    fn pick_six(
        &mut self,
        text: &str,
        type_text: &str,
        down: i64,
        dist: i64,
        yte: i64,
        points: i64,
        home_wp: f64,
    ) {
        let mut play = self.base_play(text, type_text, home_wp);
        play.stat_yardage = Some(0);
        play.start_down = Some(down);
        play.start_distance = Some(dist);
        play.start_yards_to_endzone = Some(yte);
        play.scoring_play = true;
        play.score_value = points;
        play.end_team_id = Some(other_team(&self.team_id).to_string());
        let scoring_team = other_team(&self.team_id).to_string();
        self.push_scoring_play(&play, &scoring_team, points, text, type_text);
        self.plays.push(play);
    }

    fn extra_point(&mut self, text: &str, points: i64, home_wp: f64) {
        let mut play = self.base_play(text, "Extra Point", home_wp);
        play.scoring_play = true;
        play.score_value = points;
        // The try belongs to whichever side just scored, which is the last
        // scoring play's team.
        let scoring_team = self
            .builder
            .scoring_plays
            .last()
            .and_then(|sp| sp.team_id.clone())
            .unwrap_or_else(|| self.team_id.clone());
        self.push_scoring_play(&play, &scoring_team, points, text, "Extra Point");
        self.plays.push(play);
    }

    fn field_goal(&mut self, text: &str, points: i64, home_wp: f64) {
        let mut play = self.base_play(text, "Field Goal Good", home_wp);
        play.scoring_play = true;
        play.score_value = points;
        let scoring_team = self.team_id.clone();
        self.push_scoring_play(&play, &scoring_team, points, text, "Field Goal Good");
        self.plays.push(play);
    }

    fn push_scoring_play(
        &mut self,
        play: &PlayRecord,
        scoring_team: &str,
        points: i64,
        text: &str,
        type_text: &str,
    ) {
        if scoring_team == HOME_ID {
            self.builder.home_score += points;
        } else {
            self.builder.away_score += points;
        }
        self.builder.scoring_plays.push(ScoringPlay {
            play_id: play.id.clone(),
            team_id: Some(scoring_team.to_string()),
            home_score: self.builder.home_score,
            away_score: self.builder.away_score,
            text: text.to_string(),
            type_text: type_text.to_string(),
            scoring_type: if points >= 6 {
                "touchdown".to_string()
            } else if points == 3 {
                "field-goal".to_string()
            } else {
                "extra-point".to_string()
            },
            quarter: play.quarter,
            clock: play.clock.clone(),
        });
    }
}

fn other_team(team_id: &str) -> &'static str {
    if team_id == HOME_ID { AWAY_ID } else { HOME_ID }
}

fn quarter_for(drive_index: usize) -> i64 {
    ((drive_index / 2) as i64 + 1).min(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_game_is_internally_consistent() {
        let fake = demo_game();
        assert_eq!(fake.game.teams.len(), 2);
        assert!(fake.game.play_count() > 20);
        // Every play id is unique and has a WP sample.
        let mut seen = std::collections::HashSet::new();
        for drive in &fake.game.drives {
            for play in &drive.plays {
                let id = play.id.as_deref().expect("scripted plays carry ids");
                assert!(seen.insert(id.to_string()), "duplicate play id {id}");
                assert!(fake.samples.contains_key(id), "missing sample for {id}");
            }
        }
        // Scripted final score matches the scoring play ledger.
        let last = fake.game.scoring_plays.last().expect("has scoring plays");
        assert_eq!(last.home_score, 17);
        assert_eq!(last.away_score, 7);
    }

    #[test]
    fn demo_samples_stay_zero_sum() {
        let fake = demo_game();
        for sample in fake.samples.values() {
            assert!((sample.home_wp + sample.away_wp - 1.0).abs() < 1e-9);
        }
    }
}
