use std::collections::HashMap;

use gridiron_terminal::game_stats::{StatsOptions, process_game_stats};
use gridiron_terminal::state::{
    DriveRecord, GameData, GameStatus, HomeAway, PlayRecord, ProbSample, ScoringPlay, TeamMeta,
};
use gridiron_terminal::win_prob::WpIndex;

fn team(id: &str, abbr: &str, side: HomeAway, score: i64) -> TeamMeta {
    TeamMeta {
        id: id.to_string(),
        abbr: abbr.to_string(),
        display_name: abbr.to_string(),
        home_away: Some(side),
        score,
        penalty_count: 0,
        penalty_yards: 0,
    }
}

fn snap(id: &str, text: &str, type_text: &str, yards: i64, down: i64, dist: i64, yte: i64) -> PlayRecord {
    PlayRecord {
        id: Some(id.to_string()),
        text: text.to_string(),
        type_text: type_text.to_string(),
        quarter: Some(1),
        clock: Some("8:00".to_string()),
        stat_yardage: Some(yards),
        start_down: Some(down),
        start_distance: Some(dist),
        start_yards_to_endzone: Some(yte),
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

fn sample(home_wp: f64) -> ProbSample {
    ProbSample {
        home_wp,
        away_wp: 1.0 - home_wp,
        tie: 0.0,
    }
}

// The two-drive scenario: a punt drive from the 35 and a four-play touchdown
// drive that starts inside the 40, with a sparse WP feed ending at 0.80.
#[test]
fn two_drive_scenario_end_to_end() {
    let mut game = GameData {
        game_id: "9001".to_string(),
        teams: vec![
            team("1", "HAW", HomeAway::Home, 7),
            team("2", "BLZ", HomeAway::Away, 0),
        ],
        status: GameStatus::Final,
        drives: vec![
            drive(
                "1",
                65,
                vec![
                    snap("p1", "K.Marsh right guard to HAW 35 for no gain.", "Rush", 0, 1, 10, 65),
                    snap(
                        "p2",
                        "(Shotgun) D.Reeves pass incomplete short left to C.Abara.",
                        "Pass Incompletion",
                        0,
                        2,
                        10,
                        65,
                    ),
                    snap("p3", "A.Veik punts 40 yards to BLZ 25, fair catch by N.Quist.", "Punt", 40, 4, 10, 65),
                ],
            ),
            drive(
                "1",
                30,
                vec![
                    snap("p4", "K.Marsh left end to BLZ 22 for 8 yards.", "Rush", 8, 1, 10, 30),
                    snap(
                        "p5",
                        "(Shotgun) D.Reeves pass short middle to C.Abara to BLZ 10 for 12 yards.",
                        "Pass Reception",
                        12,
                        2,
                        2,
                        22,
                    ),
                    snap("p6", "K.Marsh up the middle to BLZ 6 for 4 yards.", "Rush", 4, 1, 10, 10),
                    {
                        let mut td = snap(
                            "p7",
                            "K.Marsh left guard for 6 yards, TOUCHDOWN.",
                            "Rushing Touchdown",
                            6,
                            2,
                            6,
                            6,
                        );
                        td.scoring_play = true;
                        td.score_value = 6;
                        td
                    },
                ],
            ),
        ],
        scoring_plays: vec![ScoringPlay {
            play_id: Some("p7".to_string()),
            team_id: Some("1".to_string()),
            home_score: 6,
            away_score: 0,
            text: "K.Marsh left guard for 6 yards, TOUCHDOWN.".to_string(),
            type_text: "Rushing Touchdown".to_string(),
            scoring_type: "touchdown".to_string(),
            quarter: Some(1),
            clock: Some("2:10".to_string()),
        }],
    };
    game.teams[0].score = 7;

    let mut samples = HashMap::new();
    samples.insert("p2".to_string(), sample(0.52));
    samples.insert("p7".to_string(), sample(0.80));

    let wp = WpIndex::build(&game, &samples, Some((0.55, 0.45)));
    let stats = process_game_stats(&game, &wp, &StatsOptions::default()).expect("stats build");

    // Two possessions for the scoring team, in both views.
    assert_eq!(stats.full.summary[0].drives, 2);
    assert_eq!(stats.competitive.summary[0].drives, 2);
    assert!(stats.wp_locked_at.is_none());

    // One trip inside the 40, worth the touchdown.
    let row = &stats.full.advanced[0];
    assert!((row.points_per_trip - 6.0).abs() < 1e-9);

    // Average start: coordinates 35 and 70 average to 52, past midfield.
    assert_eq!(row.avg_start_field_pos, "Opp 48");

    // The scoring play's delta is 0.80 minus the last known sample (p2's
    // 0.52), not anything derived from the sample-less plays in between.
    let snap7 = wp.snapshot(Some("p7")).expect("td snapshot");
    assert!((snap7.home_delta - 0.28).abs() < 1e-9);
    assert!((snap7.away_delta + 0.28).abs() < 1e-9);

    let details = stats.full.details.get("1").expect("details");
    let td_entry = details
        .all_plays
        .iter()
        .find(|p| p.text.contains("TOUCHDOWN"))
        .expect("td entry");
    let prob = td_entry.probability.expect("td probability");
    assert!((prob.home_delta - 0.28).abs() < 1e-9);
}

// Once either side's start-of-play WP reaches the threshold, the competitive
// aggregate freezes for the rest of the game, even if WP dips back under.
#[test]
fn competitive_gate_is_monotonic() {
    let game = GameData {
        game_id: "9002".to_string(),
        teams: vec![
            team("1", "HAW", HomeAway::Home, 0),
            team("2", "BLZ", HomeAway::Away, 0),
        ],
        status: GameStatus::Final,
        drives: vec![drive(
            "1",
            75,
            vec![
                snap("p1", "D.Reeves pass short left to C.Abara for 15 yards.", "Pass Reception", 15, 1, 10, 75),
                snap("p2", "D.Reeves pass short right to K.Marsh for 15 yards.", "Pass Reception", 15, 1, 10, 60),
                snap("p3", "D.Reeves pass short left to C.Abara for 15 yards.", "Pass Reception", 15, 1, 10, 45),
                snap("p4", "D.Reeves pass deep left to C.Abara for 25 yards.", "Pass Reception", 25, 1, 10, 30),
            ],
        )],
        scoring_plays: Vec::new(),
    };

    let mut samples = HashMap::new();
    samples.insert("p1".to_string(), sample(0.99));
    samples.insert("p2".to_string(), sample(0.60));
    samples.insert("p3".to_string(), sample(0.55));

    let wp = WpIndex::build(&game, &samples, Some((0.50, 0.50)));
    let stats = process_game_stats(&game, &wp, &StatsOptions::default()).expect("stats build");

    // p1 started at 50/50 and counts; p2 starts at 0.99 and locks the gate;
    // p3 and p4 start back under the threshold but the gate never reopens.
    assert_eq!(stats.wp_locked_at.as_deref(), Some("p2"));
    let comp = &stats.competitive.advanced[0];
    let full = &stats.full.advanced[0];
    assert_eq!(comp.total_yards, 15);
    assert_eq!(full.total_yards, 70);
    // The 25-yard explosive pass happened after the lock.
    assert_eq!(comp.explosive_plays, 0);
    assert_eq!(full.explosive_plays, 1);
}

// A missing WP feed and missing pregame seed degrade, never panic, and the
// WP-derived fields come back empty rather than absent.
#[test]
fn wp_absence_degrades_gracefully() {
    let game = GameData {
        game_id: "9003".to_string(),
        teams: vec![
            team("1", "HAW", HomeAway::Home, 0),
            team("2", "BLZ", HomeAway::Away, 0),
        ],
        status: GameStatus::Final,
        drives: vec![drive(
            "1",
            75,
            vec![snap("p1", "K.Marsh up the middle for 5 yards.", "Rush", 5, 1, 10, 75)],
        )],
        scoring_plays: Vec::new(),
    };

    let wp = WpIndex::build(&game, &HashMap::new(), None);
    let stats = process_game_stats(&game, &wp, &StatsOptions::default()).expect("stats build");

    assert!(stats.wp_locked_at.is_none());
    assert_eq!(stats.diagnostics.missing_wp_samples, 0);
    assert_eq!(stats.full.advanced.len(), 2);
    let details = stats.full.details.get("1").expect("details");
    assert_eq!(details.all_plays.len(), 1);
    assert!(details.all_plays[0].probability.is_none());
}

// Drives partition the play sequence: every play lands in exactly one drive
// and nothing is dropped on the way into the aggregates.
#[test]
fn drive_partition_covers_every_play() {
    let fake = gridiron_terminal::fake_feed::demo_game();
    let mut seen = std::collections::HashSet::new();
    let mut total = 0usize;
    for drive in &fake.game.drives {
        for play in &drive.plays {
            total += 1;
            let id = play.id.as_deref().expect("demo plays carry ids");
            assert!(seen.insert(id.to_string()), "play {id} appears twice");
        }
    }
    assert_eq!(total, fake.game.play_count());
    // Scripted ids are sequential, so the partition has no gaps either.
    for n in 1..=total {
        assert!(seen.contains(&format!("demo-{n}")), "missing demo-{n}");
    }
}
