mod api;
mod cleanup;
mod config;
mod db;
mod logging;
mod rate_limit;
mod scores;

use std::{
   net::SocketAddr,
   sync::Arc,
};

use api::AppState;
use config::Config;
use db::Db;
use rate_limit::AdmissionController;
use tokio::net::TcpListener;
use tracing::{
   error,
   info,
};

#[tokio::main]
async fn main() {
   let config = Arc::new(Config::from_env());
   logging::init(&config);

   info!(
      db = ?config.db_path,
      listen = %config.listen_addr,
      rate_limit = config.rate_limit.max_requests,
      rate_window_ms = config.rate_limit.window_ms,
      trust_proxy = config.trust_proxy,
      "starting leaderboard server"
   );

   let db = match Db::open(&config.db_path) {
      Ok(db) => Arc::new(db),
      Err(e) => {
         error!("failed to open database: {e}");
         std::process::exit(1);
      },
   };

   let app_state = Arc::new(AppState {
      db:          db.clone(),
      limiter:     Arc::new(AdmissionController::new(config.rate_limit)),
      trust_proxy: config.trust_proxy,
   });

   // Scheduled pruning of stale leaderboard entries
   let cleanup_db = db.clone();
   let cleanup_config = config.clone();
   tokio::spawn(async move {
      cleanup::run_cleanup(cleanup_db, cleanup_config).await;
   });

   let app = api::router(app_state);

   let listener = match TcpListener::bind(config.listen_addr).await {
      Ok(l) => l,
      Err(e) => {
         error!("failed to bind to {}: {e}", config.listen_addr);
         std::process::exit(1);
      },
   };

   info!("server listening on {}", config.listen_addr);

   if let Err(e) = axum::serve(
      listener,
      app.into_make_service_with_connect_info::<SocketAddr>(),
   )
   .await
   {
      error!("server error: {e}");
      std::process::exit(1);
   }
}
