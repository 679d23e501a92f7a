use std::collections::HashMap;

use anyhow::{Context, Result};

use gridiron_terminal::classify::{PlayCategory, classify_play};
use gridiron_terminal::fake_feed;
use gridiron_terminal::pbp_fetch;
use gridiron_terminal::prob_fetch;
use gridiron_terminal::win_prob::WpIndex;

// Dumps every play with its win probability and delta, for eyeballing gaps in
// the probabilities feed against the play-by-play.
fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let game_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GAME_ID").ok())
        .context("usage: dump_plays_wp <game-id>")?;

    let (game, samples, pregame) = if game_id == fake_feed::FAKE_GAME_ID {
        let fake = fake_feed::demo_game();
        (fake.game, fake.samples, Some(fake.pregame))
    } else {
        let game = pbp_fetch::fetch_game_data(&game_id)?;
        let samples = prob_fetch::fetch_play_probabilities(&game_id).unwrap_or_else(|err| {
            eprintln!("[WARN] Probabilities fetch failed: {err}");
            HashMap::new()
        });
        let pregame = prob_fetch::fetch_pregame_probabilities(&game_id);
        (game, samples, Some(pregame))
    };

    let home_abbr = game.home_team().map(|t| t.abbr.as_str()).unwrap_or("?");
    let away_abbr = game.away_team().map(|t| t.abbr.as_str()).unwrap_or("?");
    println!("{away_abbr} @ {home_abbr}");
    println!("Probabilities: {} plays have WP data", samples.len());

    let wp = WpIndex::build(&game, &samples, pregame);

    for drive in &game.drives {
        let drive_abbr = drive
            .team_id
            .as_deref()
            .and_then(|id| game.abbr_for(id))
            .unwrap_or("?");
        println!("\n--- DRIVE: {drive_abbr} ---");
        for play in &drive.plays {
            let quarter = play
                .quarter
                .map(|q| format!("Q{q}"))
                .unwrap_or_else(|| "Q?".to_string());
            let clock = play.clock.as_deref().unwrap_or("--:--");
            let wp_str = match wp.snapshot(play.id.as_deref()) {
                Some(snap) => format!(
                    "{away_abbr} {:5.1}% ({}) | {home_abbr} {:5.1}% ({})",
                    snap.away_wp * 100.0,
                    fmt_delta(snap.away_delta * 100.0),
                    snap.home_wp * 100.0,
                    fmt_delta(snap.home_delta * 100.0),
                ),
                None => "(no WP data)".to_string(),
            };
            let text: String = play.text.chars().take(70).collect();
            let category = category_label(classify_play(play).category);
            println!(
                "{quarter} {clock:>5} | {category:<12} | {wp_str} | {}: {text}",
                play.type_text
            );
        }
    }
    Ok(())
}

fn category_label(category: PlayCategory) -> &'static str {
    match category {
        PlayCategory::Run => "run",
        PlayCategory::PassDropback => "dropback",
        PlayCategory::SpecialTeams => "special",
        PlayCategory::PenaltyNoPlay => "no-play",
        PlayCategory::SpikeKneel => "spike/kneel",
        PlayCategory::TurnoverInterception => "interception",
        PlayCategory::TurnoverFumble => "fumble-lost",
        PlayCategory::ScoringNonOffensive => "def/st score",
        PlayCategory::Unclassified => "unclassified",
    }
}

fn fmt_delta(delta: f64) -> String {
    if delta.abs() < 0.05 {
        "  0.0".to_string()
    } else {
        format!("{delta:+5.1}")
    }
}
