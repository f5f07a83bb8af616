use tracing_subscriber::{
   EnvFilter,
   fmt,
   prelude::*,
};

use crate::config::Config;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &Config) {
   let env_filter =
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

   let subscriber = tracing_subscriber::registry().with(env_filter);

   let result = if config.log_json {
      subscriber
         .with(fmt::layer().json().with_target(true))
         .try_init()
   } else {
      subscriber.with(fmt::layer().with_target(true)).try_init()
   };

   if let Err(e) = result {
      eprintln!("Failed to initialize logging: {e}");
   }
}
