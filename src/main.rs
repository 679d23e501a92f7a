use std::collections::HashMap;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result, bail};

use gridiron_terminal::fake_feed;
use gridiron_terminal::game_stats::{StatsOptions, process_game_stats};
use gridiron_terminal::pbp_fetch;
use gridiron_terminal::persist;
use gridiron_terminal::prob_fetch;
use gridiron_terminal::report_export::{
    self, build_report, render_advanced_table, render_play_lists, render_summary_table,
};
use gridiron_terminal::state::{DEFAULT_WP_THRESHOLD, GameReport, ProbSample};
use gridiron_terminal::win_prob::WpIndex;

struct Config {
    game_id: String,
    expanded: bool,
    show_full: bool,
    no_cache: bool,
    wp_threshold: f64,
    export_path: Option<PathBuf>,
    csv_dir: Option<PathBuf>,
}

fn main() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    match run() {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let config = parse_config()?;

    if !config.no_cache && config.game_id != fake_feed::FAKE_GAME_ID {
        if let Some(report) = persist::load_report(&config.game_id) {
            if persist::is_settled(&config.game_id) {
                eprintln!("[INFO] Serving cached final report for {}", config.game_id);
                print_report(&report, &config);
                return Ok(());
            }
        }
    }

    let report = analyze(&config)?;
    print_report(&report, &config);

    if let Some(path) = &config.export_path {
        let summary = report_export::export_workbook(path, &report)
            .with_context(|| format!("workbook export to {}", path.display()))?;
        eprintln!(
            "[INFO] Exported workbook: {} ({} advanced rows, {} play-list rows)",
            path.display(),
            summary.advanced_rows,
            summary.play_list_rows
        );
    }
    if let Some(dir) = &config.csv_dir {
        report_export::export_csv_tables(dir, &report)?;
        eprintln!("[INFO] Exported CSV tables to {}", dir.display());
    }

    persist::save_report(&report);
    Ok(())
}

fn analyze(config: &Config) -> Result<GameReport> {
    let (game, samples, pregame) = if config.game_id == fake_feed::FAKE_GAME_ID {
        let fake = fake_feed::demo_game();
        (fake.game, fake.samples, Some(fake.pregame))
    } else {
        // The probability feeds are independent of the play-by-play; fetch
        // them on a worker thread while the main thread downloads the plays.
        let game_id = config.game_id.clone();
        let prob_handle = thread::spawn(move || {
            let samples = prob_fetch::fetch_play_probabilities(&game_id).unwrap_or_else(|err| {
                eprintln!("[WARN] Probabilities fetch failed for {game_id}: {err}");
                HashMap::new()
            });
            let pregame = prob_fetch::fetch_pregame_probabilities(&game_id);
            (samples, pregame)
        });

        let game = pbp_fetch::fetch_game_data(&config.game_id)?;
        let (samples, pregame): (HashMap<String, ProbSample>, (f64, f64)) = prob_handle
            .join()
            .map_err(|_| anyhow::anyhow!("probability fetch thread panicked"))?;
        (game, samples, Some(pregame))
    };

    let wp = WpIndex::build(&game, &samples, pregame);
    if !wp.has_samples() {
        eprintln!("[WARN] No win-probability samples; WP-based fields will be empty");
    }

    let options = StatsOptions {
        wp_threshold: config.wp_threshold,
        expanded: config.expanded,
    };
    let stats = process_game_stats(&game, &wp, &options)?;
    Ok(build_report(&game, stats, config.wp_threshold))
}

fn print_report(report: &GameReport, config: &Config) {
    println!("{} [{}]", report.label, report.status);
    if let Some(clock) = &report.game_clock {
        println!("{clock}");
    }
    if !report.analysis.is_empty() {
        println!("{}", report.analysis);
    }
    println!(
        "\nCompetitive window (WP < {:.1}%)",
        report.wp_threshold * 100.0
    );
    println!("{}", render_summary_table(&report.stats.competitive.summary));
    println!("{}", render_advanced_table(&report.stats.competitive.advanced));

    if config.show_full {
        println!("Full game");
        println!("{}", render_summary_table(&report.stats.full.summary));
        println!("{}", render_advanced_table(&report.stats.full.advanced));
    }

    if config.expanded {
        let lists = render_play_lists(report, &report.stats.competitive);
        if !lists.is_empty() {
            println!("{lists}");
        }
    }

    if let Some(play_id) = &report.stats.wp_locked_at {
        eprintln!("[INFO] Competitive window locked at play {play_id}");
    }
    let diag = report.stats.diagnostics;
    if !diag.is_clean() {
        eprintln!(
            "[WARN] Data-quality counters: {} skipped plays, {} unknown drive teams, {} missing WP samples",
            diag.skipped_plays, diag.unknown_drive_teams, diag.missing_wp_samples
        );
    }
}

fn parse_config() -> Result<Config> {
    let mut game_id: Option<String> = None;
    let mut expanded = env_flag("EXPANDED", true);
    let mut show_full = env_flag("SHOW_FULL", true);

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--expanded" => expanded = true,
            "--summary-only" => expanded = false,
            "--full" => show_full = true,
            "--competitive-only" => show_full = false,
            _ if arg.starts_with("--") => bail!("unknown flag: {arg}"),
            _ => {
                if game_id.is_some() {
                    bail!("expected a single game id argument");
                }
                game_id = Some(arg);
            }
        }
    }

    let game_id = game_id
        .or_else(|| std::env::var("GAME_ID").ok())
        .filter(|id| !id.trim().is_empty())
        .context("usage: gridiron_terminal <game-id> (or GAME_ID env var; use 'demo' for the offline sample game)")?;

    let wp_threshold = std::env::var("WP_THRESHOLD")
        .ok()
        .and_then(|val| val.parse::<f64>().ok())
        .unwrap_or(DEFAULT_WP_THRESHOLD)
        .clamp(0.5, 1.0);

    Ok(Config {
        game_id: game_id.trim().to_string(),
        expanded,
        show_full,
        no_cache: env_flag("NO_CACHE", false),
        wp_threshold,
        export_path: env_path("EXPORT_PATH"),
        csv_dir: env_path("CSV_DIR"),
    })
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|val| val == "1" || val.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
        .map(PathBuf::from)
}
