use std::{
   sync::Arc,
   time::{
      Duration,
      SystemTime,
      UNIX_EPOCH,
   },
};

use tokio::time::interval;
use tracing::{
   error,
   info,
};

use crate::{
   config::Config,
   db::{
      Db,
      DbError,
   },
};

pub async fn run_cleanup(db: Arc<Db>, config: Arc<Config>) {
   let mut cleanup_interval = interval(config.cleanup_interval);

   info!(
      interval_secs = config.cleanup_interval.as_secs(),
      retention_days = config.retention.as_secs() / 86_400,
      "starting score cleanup"
   );

   loop {
      cleanup_interval.tick().await;

      match prune_stale(&db, SystemTime::now(), config.retention) {
         Ok(0) => {},
         Ok(removed) => info!(removed, "pruned stale scores"),
         Err(e) => error!("failed to prune stale scores: {e}"),
      }
   }
}

/// Delete every entry inserted more than `retention` before `now`.
pub fn prune_stale(db: &Db, now: SystemTime, retention: Duration) -> Result<usize, DbError> {
   let cutoff = now
      .checked_sub(retention)
      .unwrap_or(UNIX_EPOCH)
      .duration_since(UNIX_EPOCH)
      .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
      .unwrap_or(0);

   db.delete_created_before(cutoff)
}
