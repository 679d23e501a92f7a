use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::state::{
    AdvancedRow, GameData, GameReport, GameStats, PlayDetail, StatsView, SummaryRow, TeamDetails,
};

pub const EXPANDED_CATEGORIES: [&str; 8] = [
    "Turnovers",
    "Explosive Plays",
    "Non-Offensive Scores",
    "Points Per Trip (Inside 40)",
    "Drive Starts",
    "Penalty Yards",
    "Non-Offensive Points",
    "All Plays",
];

pub struct ExportSummary {
    pub summary_rows: usize,
    pub advanced_rows: usize,
    pub play_list_rows: usize,
}

/// Assemble the final payload handed to renderers: metadata, both stat views,
/// and a short text blurb.
pub fn build_report(game: &GameData, stats: GameStats, wp_threshold: f64) -> GameReport {
    let status_label = game.status.label();
    let status = if game.status.is_final() {
        "final".to_string()
    } else if status_label.starts_with('Q') || status_label.starts_with("OT") {
        "in-progress".to_string()
    } else {
        "pregame".to_string()
    };
    let game_clock = (!game.status.is_final() && status == "in-progress").then_some(status_label);

    let analysis = build_analysis_text(game, &stats.competitive);
    GameReport {
        game_id: game.game_id.clone(),
        label: game.label(),
        status,
        game_clock,
        wp_threshold,
        team_meta: game.teams.clone(),
        stats,
        analysis,
    }
}

/// One-paragraph plain-text summary for the terminal header.
pub fn build_analysis_text(game: &GameData, view: &StatsView) -> String {
    let away = game.away_team();
    let home = game.home_team();
    let (Some(away), Some(home)) = (away, home) else {
        return String::new();
    };

    let mut parts = Vec::new();
    if away.score > home.score {
        parts.push(format!(
            "{} lead {} {}-{}.",
            away.abbr, home.abbr, away.score, home.score
        ));
    } else if home.score > away.score {
        parts.push(format!(
            "{} lead {} {}-{}.",
            home.abbr, away.abbr, home.score, away.score
        ));
    } else {
        parts.push(format!("All square at {}-{}.", away.score, home.score));
    }

    let row_for = |abbr: &str| view.advanced.iter().find(|r| r.team == abbr);
    if let (Some(away_row), Some(home_row)) = (row_for(&away.abbr), row_for(&home.abbr)) {
        parts.push(format!(
            "Explosive plays: {} {} vs {} {}.",
            away.abbr, away_row.explosive_plays, home.abbr, home_row.explosive_plays
        ));
        parts.push(format!(
            "Yards per play: {} {:.2} vs {} {:.2}.",
            away.abbr, away_row.yards_per_play, home.abbr, home_row.yards_per_play
        ));
    }

    parts.join(" ")
}

pub fn render_summary_table(rows: &[SummaryRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<6}{:>7}{:>13}{:>9}\n",
        "Team", "Score", "Total Yards", "Drives"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:<6}{:>7}{:>13}{:>9}\n",
            row.team, row.score, row.total_yards, row.drives
        ));
    }
    out
}

pub fn render_advanced_table(rows: &[AdvancedRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<6}{:>6}{:>4}{:>7}{:>7}{:>8}{:>6}{:>8}{:>7}{:>10}{:>8}{:>8}\n",
        "Team", "Score", "TO", "Yards", "Yds/P", "Succ%", "Expl", "Expl%", "PPT40", "AvgStart", "PenYds", "NonOff"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:<6}{:>6}{:>4}{:>7}{:>7.2}{:>8}{:>6}{:>8}{:>7.2}{:>10}{:>8}{:>8}\n",
            row.team,
            row.score,
            row.turnovers,
            row.total_yards,
            row.yards_per_play,
            format_rate(row.success_rate),
            row.explosive_plays,
            format_rate(row.explosive_play_rate),
            row.points_per_trip,
            row.avg_start_field_pos,
            row.penalty_yards,
            row.non_offensive_points
        ));
    }
    out
}

// Rates travel as 0..1 fractions; the percent conversion happens only here,
// at the rendering edge.
fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

pub fn render_play_lists(report: &GameReport, view: &StatsView) -> String {
    let mut out = String::new();
    for category in EXPANDED_CATEGORIES {
        for team in &report.team_meta {
            let Some(details) = view.details.get(&team.id) else {
                continue;
            };
            let plays = category_plays(details, category);
            if plays.is_empty() {
                continue;
            }
            out.push_str(&format!("\n{} - {}\n", category, team.abbr));
            for play in plays {
                out.push_str(&format!("  {}\n", format_play_line(play)));
            }
        }
    }
    out
}

fn format_play_line(play: &PlayDetail) -> String {
    let mut line = String::new();
    if let Some(quarter) = play.quarter {
        line.push_str(&format!("Q{quarter} "));
    }
    if let Some(clock) = &play.clock {
        line.push_str(&format!("{clock} "));
    }
    if let Some(yards) = play.yards {
        line.push_str(&format!("[{yards:+} yds] "));
    }
    if let Some(points) = play.points {
        line.push_str(&format!("[{points} pts] "));
    }
    if let Some(prob) = &play.probability {
        line.push_str(&format!("[WP {:+.1}%] ", prob.home_delta * 100.0));
    }
    if let Some(reason) = &play.reason {
        line.push_str(&format!("({reason}) "));
    }
    line.push_str(play.text.trim());
    line
}

fn category_plays<'a>(details: &'a TeamDetails, category: &str) -> &'a [PlayDetail] {
    match category {
        "Turnovers" => &details.turnovers,
        "Explosive Plays" => &details.explosive_plays,
        "Non-Offensive Scores" => &details.non_offensive_scores,
        "Points Per Trip (Inside 40)" => &details.points_per_trip,
        "Drive Starts" => &details.drive_starts,
        "Penalty Yards" => &details.penalty_plays,
        "Non-Offensive Points" => &details.non_offensive_points,
        "All Plays" => &details.all_plays,
        _ => &[],
    }
}

/// Write the full report as a workbook: numeric tables for both views plus a
/// flattened play-list sheet.
pub fn export_workbook(path: &Path, report: &GameReport) -> Result<ExportSummary> {
    let summary_rows = summary_sheet_rows(&report.stats.competitive.summary);
    let advanced_rows = advanced_sheet_rows(&report.stats.competitive.advanced);
    let summary_full_rows = summary_sheet_rows(&report.stats.full.summary);
    let advanced_full_rows = advanced_sheet_rows(&report.stats.full.advanced);
    let play_rows = play_list_rows(report);

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Advanced")?;
        write_rows(sheet, &advanced_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary Full Game")?;
        write_rows(sheet, &summary_full_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Advanced Full Game")?;
        write_rows(sheet, &advanced_full_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Play Lists")?;
        write_rows(sheet, &play_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportSummary {
        summary_rows: summary_rows.len().saturating_sub(1),
        advanced_rows: advanced_rows.len().saturating_sub(1),
        play_list_rows: play_rows.len().saturating_sub(1),
    })
}

/// CSV fallback: one file per table, named after the report label.
pub fn export_csv_tables(dir: &Path, report: &GameReport) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed creating export dir {}", dir.display()))?;
    let tables = [
        ("summary", summary_sheet_rows(&report.stats.competitive.summary)),
        ("advanced", advanced_sheet_rows(&report.stats.competitive.advanced)),
        ("summary_full", summary_sheet_rows(&report.stats.full.summary)),
        ("advanced_full", advanced_sheet_rows(&report.stats.full.advanced)),
    ];
    for (name, rows) in tables {
        let path = dir.join(format!("{}_{}.csv", report.label, name));
        let mut body = String::new();
        for row in rows {
            let line: Vec<String> = row.iter().map(|cell| csv_escape(cell)).collect();
            body.push_str(&line.join(","));
            body.push('\n');
        }
        fs::write(&path, body).with_context(|| format!("failed writing {}", path.display()))?;
    }
    Ok(())
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn summary_sheet_rows(rows: &[SummaryRow]) -> Vec<Vec<String>> {
    let mut out = vec![vec![
        "Team".to_string(),
        "Score".to_string(),
        "Total Yards".to_string(),
        "Drives".to_string(),
    ]];
    for row in rows {
        out.push(vec![
            row.team.clone(),
            row.score.to_string(),
            row.total_yards.to_string(),
            row.drives.to_string(),
        ]);
    }
    out
}

fn advanced_sheet_rows(rows: &[AdvancedRow]) -> Vec<Vec<String>> {
    let mut out = vec![vec![
        "Team".to_string(),
        "Score".to_string(),
        "Turnovers".to_string(),
        "Total Yards".to_string(),
        "Yards Per Play".to_string(),
        "Success Rate".to_string(),
        "Explosive Plays".to_string(),
        "Explosive Play Rate".to_string(),
        "Points Per Trip (Inside 40)".to_string(),
        "Ave Start Field Pos".to_string(),
        "Drives".to_string(),
        "Turnover Margin".to_string(),
        "Points Per Drive".to_string(),
        "Net Punting".to_string(),
        "Net Kickoff".to_string(),
        "Penalty Yards".to_string(),
        "Non-Offensive Points".to_string(),
    ]];
    for row in rows {
        out.push(vec![
            row.team.clone(),
            row.score.to_string(),
            row.turnovers.to_string(),
            row.total_yards.to_string(),
            format!("{:.2}", row.yards_per_play),
            format!("{:.3}", row.success_rate),
            row.explosive_plays.to_string(),
            format!("{:.3}", row.explosive_play_rate),
            format!("{:.2}", row.points_per_trip),
            row.avg_start_field_pos.clone(),
            row.drives.to_string(),
            row.turnover_margin.to_string(),
            format!("{:.2}", row.points_per_drive),
            format!("{:.1}", row.net_punting),
            format!("{:.1}", row.net_kickoff),
            row.penalty_yards.to_string(),
            row.non_offensive_points.to_string(),
        ]);
    }
    out
}

fn play_list_rows(report: &GameReport) -> Vec<Vec<String>> {
    let mut out = vec![vec![
        "View".to_string(),
        "Team".to_string(),
        "Category".to_string(),
        "Quarter".to_string(),
        "Clock".to_string(),
        "Type".to_string(),
        "Yards".to_string(),
        "Points".to_string(),
        "WP Delta".to_string(),
        "Text".to_string(),
    ]];
    let views = [
        ("competitive", &report.stats.competitive),
        ("full", &report.stats.full),
    ];
    for (view_name, view) in views {
        for category in EXPANDED_CATEGORIES {
            for team in &report.team_meta {
                let Some(details) = view.details.get(&team.id) else {
                    continue;
                };
                for play in category_plays(details, category) {
                    out.push(vec![
                        view_name.to_string(),
                        team.abbr.clone(),
                        category.to_string(),
                        play.quarter.map(|q| q.to_string()).unwrap_or_default(),
                        play.clock.clone().unwrap_or_default(),
                        play.play_type.clone(),
                        play.yards.map(|y| y.to_string()).unwrap_or_default(),
                        play.points.map(|p| p.to_string()).unwrap_or_default(),
                        play.probability
                            .map(|p| format!("{:+.3}", p.home_delta))
                            .unwrap_or_default(),
                        play.text.clone(),
                    ]);
                }
            }
        }
    }
    out
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
