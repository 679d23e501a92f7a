use std::collections::HashMap;

use anyhow::{Context, Result};

use gridiron_terminal::fake_feed;
use gridiron_terminal::game_stats::{StatsOptions, process_game_stats};
use gridiron_terminal::pbp_fetch;
use gridiron_terminal::prob_fetch;
use gridiron_terminal::state::GameData;
use gridiron_terminal::win_prob::WpIndex;

// Replays turnover attribution for one game and prints every detected event
// with its reason, so text-heuristic misses can be compared against what the
// box score claims.
fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let game_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GAME_ID").ok())
        .context("usage: audit_turnovers <game-id>")?;

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

    let wp = WpIndex::build(&game, &samples, pregame);
    let stats = process_game_stats(&game, &wp, &StatsOptions::default())?;

    println!("{}", game.label());
    print_events(&game, "full game", &stats.full.details);
    print_events(&game, "competitive", &stats.competitive.details);

    println!("\nTotals (full game):");
    for row in &stats.full.advanced {
        println!("  {:<4} {} turnovers (margin {:+})", row.team, row.turnovers, row.turnover_margin);
    }
    if let Some(play_id) = &stats.wp_locked_at {
        println!("Competitive window locked at play {play_id}");
    }
    Ok(())
}

fn print_events(
    game: &GameData,
    view_name: &str,
    details: &HashMap<String, gridiron_terminal::state::TeamDetails>,
) {
    println!("\nTurnover events ({view_name}):");
    let mut any = false;
    for team in &game.teams {
        let Some(team_details) = details.get(&team.id) else {
            continue;
        };
        for event in &team_details.turnovers {
            any = true;
            let quarter = event
                .quarter
                .map(|q| format!("Q{q}"))
                .unwrap_or_else(|| "Q?".to_string());
            let clock = event.clock.as_deref().unwrap_or("--:--");
            let reason = event.reason.as_deref().unwrap_or("unknown");
            let delta = event
                .probability
                .map(|p| format!(" wp {:+.1}%", p.home_delta * 100.0))
                .unwrap_or_default();
            println!(
                "  {:<4} {} {} [{}]{} {}",
                team.abbr,
                quarter,
                clock,
                reason,
                delta,
                truncate(&event.text, 90)
            );
        }
    }
    if !any {
        println!("  (none)");
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{cut}...")
    }
}
