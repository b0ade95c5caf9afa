//! SQL schema for the Hangar SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Collaborator tables (written by import/ingestion processes) ──────────────

CREATE TABLE IF NOT EXISTS aircraft (
    aircraft_id  TEXT PRIMARY KEY,
    owner_id     TEXT NOT NULL,
    registration TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS registry (
    registration_norm TEXT PRIMARY KEY,
    designator        TEXT,
    manufacturer      TEXT,
    model             TEXT
);

-- Catalog order is insertion order (requirement_id).
CREATE TABLE IF NOT EXISTS requirements (
    requirement_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    reference       TEXT NOT NULL,
    kind            TEXT NOT NULL,     -- 'AD' | 'SB'
    title           TEXT,
    designator      TEXT,
    manufacturer    TEXT,
    model           TEXT,
    effective_date  TEXT,              -- ISO date
    recurrence      TEXT NOT NULL,     -- JSON-encoded RecurrencePolicy
    mandatory       INTEGER NOT NULL,
    active          INTEGER NOT NULL DEFAULT 1,
    catalog_version TEXT NOT NULL,
    published_at    TEXT NOT NULL
);

-- Evidence is strictly append-only.
CREATE TABLE IF NOT EXISTS evidence (
    evidence_id     TEXT PRIMARY KEY,
    aircraft_id     TEXT NOT NULL REFERENCES aircraft(aircraft_id) ON DELETE CASCADE,
    reference       TEXT NOT NULL,     -- as written on the document
    kind            TEXT NOT NULL,
    compliance_date TEXT,
    airframe_hours  REAL,
    description     TEXT,
    source          TEXT NOT NULL,     -- 'document' | 'manual'
    observed_at     TEXT NOT NULL
);

-- ── Engine state ─────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS knowledge_states (
    aircraft_id            TEXT PRIMARY KEY REFERENCES aircraft(aircraft_id) ON DELETE CASCADE,
    type_key               TEXT,
    last_processed_version TEXT,
    alert_active           INTEGER NOT NULL DEFAULT 0,
    new_count              INTEGER NOT NULL DEFAULT 0,
    last_reviewed_at       TEXT,
    updated_at             TEXT NOT NULL
);

-- Only ever inserted into; rows go away only with their aircraft.
CREATE TABLE IF NOT EXISTS known_references (
    aircraft_id   TEXT NOT NULL REFERENCES aircraft(aircraft_id) ON DELETE CASCADE,
    reference     TEXT NOT NULL,
    first_version TEXT NOT NULL,
    PRIMARY KEY (aircraft_id, reference)
);

-- Shared across owners; never deleted from.
CREATE TABLE IF NOT EXISTS type_pool (
    type_key      TEXT NOT NULL,
    reference     TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    PRIMARY KEY (type_key, reference)
);

CREATE TABLE IF NOT EXISTS alerts (
    alert_id     TEXT PRIMARY KEY,
    type_key     TEXT NOT NULL,
    aircraft_id  TEXT NOT NULL REFERENCES aircraft(aircraft_id) ON DELETE CASCADE,
    reference    TEXT NOT NULL,
    kind         TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'UNREAD',
    created_at   TEXT NOT NULL,
    read_at      TEXT,
    dismissed_at TEXT,
    UNIQUE (aircraft_id, reference)
);

-- Append-only; rowid order is chronological order.
CREATE TABLE IF NOT EXISTS audit_log (
    event_id     TEXT PRIMARY KEY,
    event_type   TEXT NOT NULL,
    aircraft_id  TEXT,
    version      TEXT,
    new_count    INTEGER NOT NULL DEFAULT 0,
    refs         TEXT NOT NULL DEFAULT '[]',
    triggered_by TEXT NOT NULL,
    notes        TEXT,
    at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS aircraft_owner_idx       ON aircraft(owner_id);
CREATE INDEX IF NOT EXISTS evidence_aircraft_idx    ON evidence(aircraft_id);
CREATE INDEX IF NOT EXISTS knowledge_type_idx       ON knowledge_states(type_key);
CREATE INDEX IF NOT EXISTS alerts_aircraft_idx      ON alerts(aircraft_id);
CREATE INDEX IF NOT EXISTS audit_log_aircraft_idx   ON audit_log(aircraft_id);

PRAGMA user_version = 1;
";
