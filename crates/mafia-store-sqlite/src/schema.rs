//! SQL schema for the game history store.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per game, holding its latest snapshot.
CREATE TABLE IF NOT EXISTS games (
    game_id       TEXT PRIMARY KEY,
    name          TEXT,
    created_at    TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at    TEXT NOT NULL,
    state         TEXT NOT NULL,   -- serialised State
    snapshot_json TEXT NOT NULL
);

-- Phase logs are append-only.
CREATE TABLE IF NOT EXISTS night_logs (
    log_id      TEXT PRIMARY KEY,
    game_id     TEXT NOT NULL REFERENCES games(game_id),
    number      INTEGER NOT NULL,
    log_json    TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    UNIQUE (game_id, number)
);

CREATE TABLE IF NOT EXISTS day_logs (
    log_id      TEXT PRIMARY KEY,
    game_id     TEXT NOT NULL REFERENCES games(game_id),
    number      INTEGER NOT NULL,
    log_json    TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    UNIQUE (game_id, number)
);

CREATE TABLE IF NOT EXISTS finish_logs (
    game_id      TEXT PRIMARY KEY REFERENCES games(game_id),
    winner_team  TEXT,             -- NULL for a fool victory or a draw
    is_fool      INTEGER NOT NULL,
    total_nights INTEGER NOT NULL,
    log_json     TEXT NOT NULL,
    recorded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS night_logs_game_idx ON night_logs(game_id);
CREATE INDEX IF NOT EXISTS day_logs_game_idx   ON day_logs(game_id);

PRAGMA user_version = 1;
";
