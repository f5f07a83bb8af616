use std::{
   path::Path,
   sync::{
      Mutex,
      MutexGuard,
      PoisonError,
   },
};

use rusqlite::{
   Connection,
   params,
};
use thiserror::Error;

use crate::scores::{
   NewScore,
   ScoreEntry,
};

#[derive(Debug, Error)]
pub enum DbError {
   #[error("SQLite error: {0}")]
   Sqlite(#[from] rusqlite::Error),
}

pub struct Db {
   conn: Mutex<Connection>,
}

impl Db {
   pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
      Self::with_connection(Connection::open(path)?)
   }

   #[cfg(test)]
   pub fn open_in_memory() -> Result<Self, DbError> {
      Self::with_connection(Connection::open_in_memory()?)
   }

   fn with_connection(conn: Connection) -> Result<Self, DbError> {
      let db = Db {
         conn: Mutex::new(conn),
      };
      db.init_schema()?;
      Ok(db)
   }

   fn conn(&self) -> MutexGuard<'_, Connection> {
      self.conn.lock().unwrap_or_else(PoisonError::into_inner)
   }

   fn init_schema(&self) -> Result<(), DbError> {
      self.conn().execute_batch(
         r#"
            CREATE TABLE IF NOT EXISTS scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_name TEXT NOT NULL,
                score INTEGER NOT NULL,
                level INTEGER NOT NULL,
                -- client-supplied or server-assigned, unix milliseconds
                timestamp INTEGER NOT NULL,
                ip TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_scores_score ON scores(score DESC);
            CREATE INDEX IF NOT EXISTS idx_scores_created_at ON scores(created_at);
            "#,
      )?;

      Ok(())
   }

   pub fn insert_score(&self, entry: &NewScore, ip: &str) -> Result<i64, DbError> {
      let conn = self.conn();

      conn.execute(
         r#"
            INSERT INTO scores (player_name, score, level, timestamp, ip)
            VALUES (?1, ?2, ?3, COALESCE(?4, CAST(strftime('%s', 'now') AS INTEGER) * 1000), ?5)
            "#,
         params![entry.player_name, entry.score, entry.level, entry.timestamp, ip],
      )?;

      Ok(conn.last_insert_rowid())
   }

   /// Highest scores first; equal scores keep submission order.
   pub fn top_scores(&self, limit: u32) -> Result<Vec<ScoreEntry>, DbError> {
      let conn = self.conn();

      let mut stmt = conn.prepare(
         r#"
            SELECT player_name, score, level, timestamp
            FROM scores
            ORDER BY score DESC, id ASC
            LIMIT ?1
            "#,
      )?;

      let entries = stmt
         .query_map(params![limit], |row| {
            Ok(ScoreEntry {
               player_name: row.get(0)?,
               score:       row.get(1)?,
               level:       row.get(2)?,
               timestamp:   row.get(3)?,
            })
         })?
         .collect::<Result<Vec<_>, _>>()?;

      Ok(entries)
   }

   /// Delete rows inserted before `cutoff` (unix seconds).
   pub fn delete_created_before(&self, cutoff: i64) -> Result<usize, DbError> {
      let rows = self
         .conn()
         .execute("DELETE FROM scores WHERE created_at < ?1", params![cutoff])?;

      Ok(rows)
   }

   pub fn score_count(&self) -> Result<i64, DbError> {
      let count: i64 = self
         .conn()
         .query_row("SELECT COUNT(*) FROM scores", [], |row| row.get(0))?;

      Ok(count)
   }

   #[cfg(test)]
   pub fn backdate_all(&self, created_at: i64) -> Result<(), DbError> {
      self
         .conn()
         .execute("UPDATE scores SET created_at = ?1", params![created_at])?;
      Ok(())
   }
}
