//! [`SqliteStore`], the SQLite implementation of [`GameStorage`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use mafia_core::{
  log::{DayLog, FinishLog, NightLog},
  snapshot::GameSnapshot,
  state::State,
  storage::GameStorage,
};

use crate::{
  Error, Result,
  encode::{
    RawGame, decode_dt, decode_uuid, encode_dt, encode_state, encode_team,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Read models ─────────────────────────────────────────────────────────────

/// A stored game with its latest snapshot.
#[derive(Debug, Clone)]
pub struct StoredGame {
  pub id:         Uuid,
  pub name:       Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub snapshot:   GameSnapshot,
}

/// One line of the game listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
  pub id:         Uuid,
  pub name:       Option<String>,
  pub state:      State,
  pub created_at: DateTime<Utc>,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Game history backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or refresh the `games` row for a snapshot. The name column is
  /// left alone on update; it belongs to [`GameStorage::name_game`].
  fn upsert_game(
    conn: &rusqlite::Connection,
    row: &GameRow,
  ) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO games (game_id, name, created_at, updated_at, state, snapshot_json)
       VALUES (?1, ?2, ?3, ?3, ?4, ?5)
       ON CONFLICT(game_id) DO UPDATE SET
         updated_at    = excluded.updated_at,
         state         = excluded.state,
         snapshot_json = excluded.snapshot_json",
      rusqlite::params![row.game_id, row.name, row.now, row.state, row.json],
    )?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Fetch a game by ID. Returns `None` if it was never stored.
  pub async fn get_game(&self, id: Uuid) -> Result<Option<StoredGame>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawGame> = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            "SELECT game_id, name, created_at, updated_at, snapshot_json
             FROM games WHERE game_id = ?1",
            rusqlite::params![id_str],
            |r| {
              Ok(RawGame {
                game_id:       r.get(0)?,
                name:          r.get(1)?,
                created_at:    r.get(2)?,
                updated_at:    r.get(3)?,
                snapshot_json: r.get(4)?,
              })
            },
          )
          .optional()?;
        Ok(raw)
      })
      .await?;

    raw
      .map(|raw| {
        Ok(StoredGame {
          id:         decode_uuid(&raw.game_id)?,
          name:       raw.name.clone(),
          created_at: decode_dt(&raw.created_at)?,
          updated_at: decode_dt(&raw.updated_at)?,
          snapshot:   raw.decode_snapshot()?,
        })
      })
      .transpose()
  }

  /// All stored games, oldest first.
  pub async fn list_games(&self) -> Result<Vec<GameSummary>> {
    let rows: Vec<(String, Option<String>, String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT game_id, name, state, created_at FROM games
           ORDER BY created_at, game_id",
        )?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, name, state, created_at)| {
        Ok(GameSummary {
          id: decode_uuid(&id)?,
          name,
          state: serde_json::from_value(serde_json::Value::String(state))?,
          created_at: decode_dt(&created_at)?,
        })
      })
      .collect()
  }

  /// Night logs of a game, by night number.
  pub async fn night_logs(&self, id: Uuid) -> Result<Vec<NightLog>> {
    self.logs(id, "night_logs").await
  }

  /// Day logs of a game, by day number.
  pub async fn day_logs(&self, id: Uuid) -> Result<Vec<DayLog>> {
    self.logs(id, "day_logs").await
  }

  async fn logs<T: serde::de::DeserializeOwned>(
    &self,
    id: Uuid,
    table: &'static str,
  ) -> Result<Vec<T>> {
    let id_str = encode_uuid(id);
    let rows: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT log_json FROM {table} WHERE game_id = ?1 ORDER BY number"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .iter()
      .map(|json| Ok(serde_json::from_str(json)?))
      .collect()
  }

  /// How a game ended, if it has.
  pub async fn finish_log(&self, id: Uuid) -> Result<Option<FinishLog>> {
    let id_str = encode_uuid(id);
    let json: Option<String> = self
      .conn
      .call(move |conn| {
        let json = conn
          .query_row(
            "SELECT log_json FROM finish_logs WHERE game_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        Ok(json)
      })
      .await?;

    json
      .map(|json| Ok(serde_json::from_str(&json)?))
      .transpose()
  }
}

// ─── Row encoding ────────────────────────────────────────────────────────────

struct GameRow {
  game_id: String,
  name:    Option<String>,
  now:     String,
  state:   String,
  json:    String,
}

impl GameRow {
  fn encode(game: &GameSnapshot) -> Result<Self> {
    Ok(Self {
      game_id: encode_uuid(game.id),
      name:    game.name.clone(),
      now:     encode_dt(Utc::now()),
      state:   encode_state(game.state)?,
      json:    game.to_json()?,
    })
  }
}

/// Encoded phase log ready for insertion.
struct LogRow {
  log_id: String,
  number: u32,
  json:   String,
}

impl LogRow {
  fn encode<T: serde::Serialize>(number: u32, log: &T) -> Result<Self> {
    Ok(Self {
      log_id: encode_uuid(Uuid::new_v4()),
      number,
      json: serde_json::to_string(log)?,
    })
  }
}

impl SqliteStore {
  async fn save_phase_log(
    &self,
    game: &GameSnapshot,
    table: &'static str,
    log: LogRow,
  ) -> Result<()> {
    let row = GameRow::encode(game)?;
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        Self::upsert_game(&tx, &row)?;
        tx.execute(
          &format!(
            "INSERT INTO {table} (log_id, game_id, number, log_json, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)"
          ),
          rusqlite::params![log.log_id, row.game_id, log.number, log.json, row.now],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── GameStorage impl ────────────────────────────────────────────────────────

impl GameStorage for SqliteStore {
  type Error = Error;

  async fn init_new_game(&self, game: GameSnapshot) -> Result<()> {
    let row = GameRow::encode(&game)?;
    tracing::debug!(game_id = %row.game_id, "storing new game");
    self
      .conn
      .call(move |conn| {
        Self::upsert_game(conn, &row)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn save_night_log(&self, game: GameSnapshot, log: NightLog) -> Result<()> {
    let row = LogRow::encode(log.number, &log)?;
    self.save_phase_log(&game, "night_logs", row).await
  }

  async fn save_day_log(&self, game: GameSnapshot, log: DayLog) -> Result<()> {
    let row = LogRow::encode(log.number, &log)?;
    self.save_phase_log(&game, "day_logs", row).await
  }

  async fn save_finish_log(
    &self,
    game: GameSnapshot,
    log: FinishLog,
  ) -> Result<()> {
    let row = GameRow::encode(&game)?;
    let winner = log.winner_team.map(encode_team);
    let is_fool = log.is_fool;
    let total_nights = log.total_nights;
    let json = serde_json::to_string(&log)?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        Self::upsert_game(&tx, &row)?;
        tx.execute(
          "INSERT INTO finish_logs
             (game_id, winner_team, is_fool, total_nights, log_json, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            row.game_id,
            winner,
            is_fool,
            total_nights,
            json,
            row.now
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn name_game(&self, game_id: Uuid, name: String) -> Result<()> {
    let id_str = encode_uuid(game_id);
    let now = encode_dt(Utc::now());
    let updated = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE games SET name = ?1, updated_at = ?2 WHERE game_id = ?3",
          rusqlite::params![name, now, id_str],
        )?;
        Ok(n)
      })
      .await?;

    if updated == 0 {
      return Err(Error::GameNotFound(game_id));
    }
    Ok(())
  }
}
