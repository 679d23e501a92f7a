use std::collections::HashMap;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use gridiron_terminal::fake_feed::demo_game;
use gridiron_terminal::game_stats::{StatsOptions, process_game_stats};
use gridiron_terminal::pbp_fetch::parse_game_data_json;
use gridiron_terminal::win_prob::WpIndex;

fn bench_playbyplay_parse(c: &mut Criterion) {
    let raw = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/espn_playbyplay.json"
    ))
    .expect("fixture should be readable");

    c.bench_function("playbyplay_parse", |b| {
        b.iter(|| {
            let game = parse_game_data_json("401", black_box(&raw)).unwrap();
            black_box(game.play_count());
        })
    });
}

fn bench_wp_index_build(c: &mut Criterion) {
    let fake = demo_game();
    c.bench_function("wp_index_build", |b| {
        b.iter(|| {
            let index = WpIndex::build(
                black_box(&fake.game),
                black_box(&fake.samples),
                Some(fake.pregame),
            );
            black_box(index.has_samples());
        })
    });
}

fn bench_process_game_stats(c: &mut Criterion) {
    let fake = demo_game();
    let wp = WpIndex::build(&fake.game, &fake.samples, Some(fake.pregame));
    let options = StatsOptions::default();

    c.bench_function("process_game_stats", |b| {
        b.iter(|| {
            let stats = process_game_stats(black_box(&fake.game), &wp, &options).unwrap();
            black_box(stats.full.advanced.len());
        })
    });
}

fn bench_wp_absent_aggregation(c: &mut Criterion) {
    let fake = demo_game();
    let wp = WpIndex::build(&fake.game, &HashMap::new(), None);
    let options = StatsOptions {
        expanded: false,
        ..StatsOptions::default()
    };

    c.bench_function("process_game_stats_no_wp", |b| {
        b.iter(|| {
            let stats = process_game_stats(black_box(&fake.game), &wp, &options).unwrap();
            black_box(stats.competitive.advanced.len());
        })
    });
}

criterion_group!(
    benches,
    bench_playbyplay_parse,
    bench_wp_index_build,
    bench_process_game_stats,
    bench_wp_absent_aggregation
);
criterion_main!(benches);
