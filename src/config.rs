use std::{
   net::SocketAddr,
   path::PathBuf,
   str::FromStr,
   time::Duration,
};

use crate::rate_limit::RateLimitConfig;

pub struct Config {
   pub db_path:          PathBuf,
   pub listen_addr:      SocketAddr,
   pub rate_limit:       RateLimitConfig,
   /// Take the client identity from `X-Forwarded-For` when present.
   pub trust_proxy:      bool,
   pub cleanup_interval: Duration,
   pub retention:        Duration,
   pub log_level:        String,
   pub log_json:         bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
   std::env::var(key)
      .ok()
      .and_then(|s| s.trim().parse().ok())
      .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
   std::env::var(key)
      .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
      .unwrap_or(false)
}

impl Config {
   pub fn from_env() -> Self {
      let db_path = std::env::var("LEADERBOARD_DB_PATH")
         .map(PathBuf::from)
         .unwrap_or_else(|_| PathBuf::from("./leaderboard.db"));

      let listen_addr = env_or(
         "LEADERBOARD_LISTEN_ADDR",
         SocketAddr::from(([127, 0, 0, 1], 3000)),
      );

      let defaults = RateLimitConfig::default();
      let rate_limit = RateLimitConfig {
         max_requests:      env_or("LEADERBOARD_RATE_LIMIT", defaults.max_requests),
         window_ms:         env_or("LEADERBOARD_RATE_WINDOW_MS", defaults.window_ms),
         sweep_probability: env_or("LEADERBOARD_SWEEP_PROBABILITY", defaults.sweep_probability),
      };

      let cleanup_interval =
         Duration::from_secs(env_or("LEADERBOARD_CLEANUP_INTERVAL", 86_400u64).max(1));
      let retention =
         Duration::from_secs(env_or("LEADERBOARD_RETENTION_DAYS", 30u64).saturating_mul(86_400));

      Self {
         db_path,
         listen_addr,
         rate_limit,
         trust_proxy: env_flag("LEADERBOARD_TRUST_PROXY"),
         cleanup_interval,
         retention,
         log_level: std::env::var("LEADERBOARD_LOG_LEVEL").unwrap_or_else(|_| "info".into()),
         log_json: env_flag("LEADERBOARD_LOG_JSON"),
      }
   }
}
