pub mod classify;
pub mod fake_feed;
pub mod game_stats;
pub mod http_cache;
pub mod http_client;
pub mod pbp_fetch;
pub mod persist;
pub mod prob_fetch;
pub mod report_export;
pub mod state;
pub mod win_prob;
