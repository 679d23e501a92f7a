use std::collections::HashMap;

use crate::state::{GameData, ProbSample, WpSnapshot};

pub const PREGAME_FALLBACK: (f64, f64) = (0.5, 0.5);

pub fn sanitize_prob(val: f64, fallback: f64) -> f64 {
    if val.is_finite() {
        val.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// Per-play win-probability index built once per game.
///
/// The probabilities feed is fetched independently of the play-by-play and is
/// not guaranteed to cover every play (paginated or delayed responses skip
/// some), so start-of-play values carry the last known end-of-play sample
/// forward, seeded by the pregame reading. Deltas are always computed against
/// the last known sample, never against an adjacent play with no reading.
#[derive(Debug, Clone, Default)]
pub struct WpIndex {
    snapshots: HashMap<String, WpSnapshot>,
    start_wp: HashMap<String, (f64, f64)>,
    pregame: (f64, f64),
    sample_count: usize,
}

impl WpIndex {
    pub fn build(
        game: &GameData,
        samples: &HashMap<String, ProbSample>,
        pregame: Option<(f64, f64)>,
    ) -> Self {
        let preg_home = sanitize_prob(
            pregame.map(|p| p.0).unwrap_or(PREGAME_FALLBACK.0),
            PREGAME_FALLBACK.0,
        );
        let preg_away = sanitize_prob(pregame.map(|p| p.1).unwrap_or(1.0 - preg_home), 1.0 - preg_home);

        let mut snapshots = HashMap::new();
        let mut start_wp = HashMap::new();
        let mut walk = (preg_home, preg_away);

        for drive in &game.drives {
            for play in &drive.plays {
                let Some(pid) = play.id.as_deref() else {
                    continue;
                };
                start_wp.insert(pid.to_string(), walk);
                if let Some(sample) = samples.get(pid) {
                    let home_wp = sanitize_prob(sample.home_wp, walk.0);
                    let away_wp = sanitize_prob(sample.away_wp, walk.1);
                    snapshots.insert(
                        pid.to_string(),
                        WpSnapshot {
                            home_wp,
                            away_wp,
                            tie: sample.tie,
                            home_delta: home_wp - walk.0,
                            away_delta: away_wp - walk.1,
                        },
                    );
                    walk = (home_wp, away_wp);
                }
            }
        }

        Self {
            snapshots,
            start_wp,
            pregame: (preg_home, preg_away),
            sample_count: samples.len(),
        }
    }

    /// End-of-play reading with deltas, when the feed covered this play.
    pub fn snapshot(&self, play_id: Option<&str>) -> Option<WpSnapshot> {
        self.snapshots.get(play_id?).copied()
    }

    /// Carry-forward (home, away) win probability at the start of the play.
    /// Falls back to the pregame seed for unknown ids.
    pub fn start_wp(&self, play_id: Option<&str>) -> (f64, f64) {
        play_id
            .and_then(|pid| self.start_wp.get(pid))
            .copied()
            .unwrap_or(self.pregame)
    }

    pub fn pregame(&self) -> (f64, f64) {
        self.pregame
    }

    pub fn has_samples(&self) -> bool {
        self.sample_count > 0
    }
}

/// Competitive while neither side's win probability has reached the
/// threshold.
pub fn is_competitive(wp: (f64, f64), threshold: f64) -> bool {
    wp.0.max(wp.1) < threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DriveRecord, GameData, GameStatus, PlayRecord};

    fn game_with_play_ids(ids: &[&str]) -> GameData {
        let plays = ids
            .iter()
            .map(|id| PlayRecord {
                id: Some((*id).to_string()),
                ..PlayRecord::default()
            })
            .collect();
        GameData {
            game_id: "g".to_string(),
            teams: Vec::new(),
            status: GameStatus::Final,
            drives: vec![DriveRecord {
                team_id: Some("1".to_string()),
                start_yards_to_endzone: None,
                start_text: None,
                plays,
            }],
            scoring_plays: Vec::new(),
        }
    }

    fn sample(home: f64) -> ProbSample {
        ProbSample {
            home_wp: home,
            away_wp: 1.0 - home,
            tie: 0.0,
        }
    }

    #[test]
    fn deltas_use_last_known_sample_across_gaps() {
        let game = game_with_play_ids(&["1", "2", "3"]);
        let mut samples = HashMap::new();
        samples.insert("1".to_string(), sample(0.60));
        // No sample for play 2; play 3 must delta against play 1.
        samples.insert("3".to_string(), sample(0.75));

        let index = WpIndex::build(&game, &samples, Some((0.55, 0.45)));

        let snap1 = index.snapshot(Some("1")).unwrap();
        assert!((snap1.home_delta - 0.05).abs() < 1e-9);

        assert!(index.snapshot(Some("2")).is_none());
        assert_eq!(index.start_wp(Some("2")), (0.60, 0.40));

        let snap3 = index.snapshot(Some("3")).unwrap();
        assert!((snap3.home_delta - 0.15).abs() < 1e-9);
        assert!((snap3.away_delta + 0.15).abs() < 1e-9);
    }

    #[test]
    fn pregame_seed_feeds_the_first_play() {
        let game = game_with_play_ids(&["1"]);
        let mut samples = HashMap::new();
        samples.insert("1".to_string(), sample(0.80));

        let index = WpIndex::build(&game, &samples, Some((0.55, 0.45)));
        assert_eq!(index.start_wp(Some("1")), (0.55, 0.45));
        let snap = index.snapshot(Some("1")).unwrap();
        assert!((snap.home_delta - 0.25).abs() < 1e-9);
    }

    #[test]
    fn zero_sum_holds_for_every_snapshot() {
        let game = game_with_play_ids(&["1", "2", "3", "4"]);
        let mut samples = HashMap::new();
        for (i, home) in [0.52, 0.61, 0.47, 0.91].iter().enumerate() {
            samples.insert((i + 1).to_string(), sample(*home));
        }
        let index = WpIndex::build(&game, &samples, None);
        for pid in ["1", "2", "3", "4"] {
            let snap = index.snapshot(Some(pid)).unwrap();
            assert!((snap.home_wp + snap.away_wp - 1.0).abs() < 1e-6);
            // Deltas mirror each other in a zero-sum model.
            assert!((snap.home_delta + snap.away_delta).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_feed_degrades_to_the_seed() {
        let game = game_with_play_ids(&["1", "2"]);
        let index = WpIndex::build(&game, &HashMap::new(), None);
        assert!(!index.has_samples());
        assert!(index.snapshot(Some("1")).is_none());
        assert_eq!(index.start_wp(Some("2")), PREGAME_FALLBACK);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let game = game_with_play_ids(&["1"]);
        let mut samples = HashMap::new();
        samples.insert(
            "1".to_string(),
            ProbSample {
                home_wp: 1.4,
                away_wp: -0.4,
                tie: 0.0,
            },
        );
        let index = WpIndex::build(&game, &samples, None);
        let snap = index.snapshot(Some("1")).unwrap();
        assert_eq!(snap.home_wp, 1.0);
        assert_eq!(snap.away_wp, 0.0);
    }

    #[test]
    fn competitive_threshold_boundary() {
        assert!(is_competitive((0.974, 0.026), 0.975));
        assert!(!is_competitive((0.975, 0.025), 0.975));
        assert!(!is_competitive((0.025, 0.975), 0.975));
    }
}
