//! [`SqliteStore`], the SQLite implementation of [`DetectionStore`] and
//! [`AuditSink`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use hangar_core::{
  alert::{Alert, AlertCounts, AlertList, AlertStatus},
  audit::{AuditEvent, NewAuditEvent},
  knowledge::{
    Aircraft, AircraftKnowledgeState, FanOutResult, GlobalTypePool, KnowledgeMerge, MergeOutcome,
    PoolStats, ReviewOutcome, TypePoolSize,
  },
  reference::TypeKey,
  store::{AuditSink, DetectionStore},
};

use crate::{
  encode::{
    decode_type_key, encode_dt, encode_refs, encode_uuid, into_set, RawAircraft, RawAlert,
    RawAuditEvent, RawKnowledge,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Hangar store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
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

  /// Ensure a knowledge row exists; inside a transaction.
  fn ensure_state(
    conn: &rusqlite::Connection,
    aircraft_id: &str,
    now: &str,
  ) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO knowledge_states (aircraft_id, updated_at) VALUES (?1, ?2)
       ON CONFLICT(aircraft_id) DO NOTHING",
      rusqlite::params![aircraft_id, now],
    )?;
    Ok(())
  }

  /// `(unread, total)` over the owner's non-dismissed alerts.
  fn count_alerts(conn: &rusqlite::Connection, owner: &str) -> rusqlite::Result<(i64, i64)> {
    conn.query_row(
      "SELECT COALESCE(SUM(alerts.status = ?2), 0), COUNT(*)
       FROM alerts
       JOIN aircraft ON aircraft.aircraft_id = alerts.aircraft_id
       WHERE aircraft.owner_id = ?1 AND alerts.status != ?3",
      rusqlite::params![owner, AlertStatus::Unread.to_string(), AlertStatus::Dismissed.to_string()],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
  }

  /// Add `new_refs` to the type pool and alert every other aircraft of the
  /// type about the ones that were not there yet; inside the merge
  /// transaction.
  fn fan_out(
    tx: &rusqlite::Transaction<'_>,
    source_id: &str,
    type_key: &str,
    new_refs: &[(String, String)],
    now: &str,
  ) -> rusqlite::Result<RawFanOut> {
    let mut globally_new = Vec::new();
    {
      let mut insert = tx.prepare(
        "INSERT OR IGNORE INTO type_pool (type_key, reference, first_seen_at)
         VALUES (?1, ?2, ?3)",
      )?;
      for (reference, kind) in new_refs {
        if insert.execute(rusqlite::params![type_key, reference, now])? == 1 {
          globally_new.push((reference.clone(), kind.clone()));
        }
      }
    }

    let mut fan_out = RawFanOut {
      globally_new: globally_new.iter().map(|(r, _)| r.clone()).collect(),
      ..RawFanOut::default()
    };
    if globally_new.is_empty() {
      return Ok(fan_out);
    }

    let recipients: Vec<String> = {
      let mut stmt = tx.prepare(
        "SELECT aircraft_id FROM knowledge_states
         WHERE type_key = ?1 AND aircraft_id != ?2
         ORDER BY aircraft_id",
      )?;
      stmt
        .query_map(rusqlite::params![type_key, source_id], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut insert = tx.prepare(
      "INSERT OR IGNORE INTO alerts
         (alert_id, type_key, aircraft_id, reference, kind, status, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let unread = AlertStatus::Unread.to_string();
    for recipient in &recipients {
      let mut notified = false;
      for (reference, kind) in &globally_new {
        let alert_id = encode_uuid(Uuid::new_v4());
        let inserted = insert.execute(rusqlite::params![
          alert_id, type_key, recipient, reference, kind, unread, now
        ])?;
        if inserted == 1 {
          fan_out.alerts_created += 1;
          notified = true;
        }
      }
      if notified {
        fan_out.aircraft_notified += 1;
      }
    }
    Ok(fan_out)
  }

  async fn query_alert(&self, alert_id: String) -> Result<Option<Alert>> {
    let raw: Option<RawAlert> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM alerts WHERE alert_id = ?1", RawAlert::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![alert_id], RawAlert::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawAlert::into_alert).transpose()
  }
}

/// Fan-out tallies gathered inside the merge transaction.
#[derive(Default)]
struct RawFanOut {
  globally_new:      Vec<String>,
  alerts_created:    usize,
  aircraft_notified: usize,
}

// ─── DetectionStore impl ─────────────────────────────────────────────────────

impl DetectionStore for SqliteStore {
  type Error = Error;

  async fn get_aircraft(&self, aircraft_id: Uuid) -> Result<Option<Aircraft>> {
    let id_str = encode_uuid(aircraft_id);
    let raw: Option<RawAircraft> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM aircraft WHERE aircraft_id = ?1", RawAircraft::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawAircraft::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawAircraft::into_aircraft).transpose()
  }

  async fn list_aircraft<'a>(&'a self, owner_id: Option<&'a str>) -> Result<Vec<Aircraft>> {
    let owner = owner_id.map(str::to_owned);
    let raws: Vec<RawAircraft> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM aircraft WHERE (?1 IS NULL OR owner_id = ?1) ORDER BY rowid",
          RawAircraft::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![owner], RawAircraft::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAircraft::into_aircraft).collect()
  }

  async fn get_knowledge(&self, aircraft_id: Uuid) -> Result<Option<AircraftKnowledgeState>> {
    let id_str = encode_uuid(aircraft_id);
    let raw = self
      .conn
      .call(move |conn| Ok(RawKnowledge::read(conn, &id_str)?))
      .await?;
    raw.map(RawKnowledge::into_state).transpose()
  }

  async fn merge_known_references(&self, merge: KnowledgeMerge) -> Result<MergeOutcome> {
    let id_str = encode_uuid(merge.aircraft_id);
    let type_key = merge.type_key.clone().map(String::from);
    let version = merge.version;
    let applicable: Vec<(String, String)> = merge
      .applicable
      .into_iter()
      .map(|(reference, kind)| (reference, kind.to_string()))
      .collect();
    let now = encode_dt(Utc::now());

    let (new_refs, raw, raw_fan_out): (Vec<String>, Option<RawKnowledge>, Option<RawFanOut>) =
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          Self::ensure_state(&tx, &id_str, &now)?;

          let mut new_refs = Vec::new();
          {
            let mut insert = tx.prepare(
              "INSERT OR IGNORE INTO known_references (aircraft_id, reference, first_version)
               VALUES (?1, ?2, ?3)",
            )?;
            for (reference, kind) in &applicable {
              if insert.execute(rusqlite::params![id_str, reference, version])? == 1 {
                new_refs.push((reference.clone(), kind.clone()));
              }
            }
          }

          tx.execute(
            "UPDATE knowledge_states
             SET type_key = COALESCE(?2, type_key), last_processed_version = ?3, updated_at = ?4
             WHERE aircraft_id = ?1",
            rusqlite::params![id_str, type_key, version, now],
          )?;

          // An existing alert is left alone when nothing new turned up.
          if !new_refs.is_empty() {
            tx.execute(
              "UPDATE knowledge_states SET alert_active = 1, new_count = ?2 WHERE aircraft_id = ?1",
              rusqlite::params![id_str, new_refs.len() as u32],
            )?;
          }

          let raw_fan_out = match &type_key {
            Some(key) if !new_refs.is_empty() => {
              Some(Self::fan_out(&tx, &id_str, key, &new_refs, &now)?)
            }
            _ => None,
          };

          let raw = RawKnowledge::read(&tx, &id_str)?;
          tx.commit()?;
          let new_refs = new_refs.into_iter().map(|(reference, _)| reference).collect();
          Ok((new_refs, raw, raw_fan_out))
        })
        .await?;

    let state = raw
      .ok_or(Error::AircraftNotFound(merge.aircraft_id))?
      .into_state()?;
    let fan_out = merge.type_key.zip(raw_fan_out).map(|(type_key, raw)| FanOutResult {
      type_key,
      globally_new: raw.globally_new,
      alerts_created: raw.alerts_created,
      aircraft_notified: raw.aircraft_notified,
    });
    Ok(MergeOutcome { new_references: into_set(new_refs), state, fan_out })
  }

  async fn mark_reviewed(&self, aircraft_id: Uuid, at: DateTime<Utc>) -> Result<ReviewOutcome> {
    let id_str = encode_uuid(aircraft_id);
    let at_str = encode_dt(at);

    let (alert_cleared, previous_new_count, raw): (bool, u32, Option<RawKnowledge>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        Self::ensure_state(&tx, &id_str, &at_str)?;

        let (alert_cleared, previous): (bool, u32) = tx.query_row(
          "SELECT alert_active, new_count FROM knowledge_states WHERE aircraft_id = ?1",
          rusqlite::params![id_str],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        tx.execute(
          "UPDATE knowledge_states
           SET alert_active = 0, new_count = 0, last_reviewed_at = ?2, updated_at = ?2
           WHERE aircraft_id = ?1",
          rusqlite::params![id_str, at_str],
        )?;

        let raw = RawKnowledge::read(&tx, &id_str)?;
        tx.commit()?;
        Ok((alert_cleared, previous, raw))
      })
      .await?;

    let state = raw.ok_or(Error::AircraftNotFound(aircraft_id))?.into_state()?;
    Ok(ReviewOutcome { alert_cleared, previous_new_count, state })
  }

  async fn get_type_pool<'a>(&'a self, type_key: &'a TypeKey) -> Result<Option<GlobalTypePool>> {
    let key = type_key.as_str().to_owned();
    let refs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT reference FROM type_pool WHERE type_key = ?1 ORDER BY reference")?;
        let rows = stmt
          .query_map(rusqlite::params![key], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    if refs.is_empty() {
      return Ok(None);
    }
    Ok(Some(GlobalTypePool { type_key: type_key.clone(), known_references: into_set(refs) }))
  }

  async fn pool_stats(&self) -> Result<PoolStats> {
    let (total_references, total_alerts, top): (i64, i64, Vec<(String, i64)>) = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let total_references = tx.query_row("SELECT COUNT(*) FROM type_pool", [], |r| r.get(0))?;
        let total_alerts = tx.query_row("SELECT COUNT(*) FROM alerts", [], |r| r.get(0))?;
        let top = {
          let mut stmt = tx.prepare(
            "SELECT type_key, COUNT(*) FROM type_pool
             GROUP BY type_key
             ORDER BY COUNT(*) DESC, type_key
             LIMIT ?1",
          )?;
          stmt
            .query_map(rusqlite::params![PoolStats::TOP_TYPES as i64], |r| {
              Ok((r.get(0)?, r.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok((total_references, total_alerts, top))
      })
      .await?;

    let top_types = top
      .into_iter()
      .map(|(key, count)| {
        Ok(TypePoolSize { type_key: decode_type_key(&key)?, reference_count: count as usize })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(PoolStats {
      total_references: total_references as usize,
      total_alerts: total_alerts as usize,
      top_types,
    })
  }

  async fn list_alerts<'a>(
    &'a self,
    owner_id: &'a str,
    status: Option<AlertStatus>,
  ) -> Result<AlertList> {
    let owner = owner_id.to_owned();
    let status = status.map(|s| s.to_string());
    let dismissed = AlertStatus::Dismissed.to_string();

    let (raws, (unread_count, total_count)): (Vec<RawAlert>, (i64, i64)) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let rows = {
          let sql = format!(
            "SELECT {} FROM alerts
             JOIN aircraft ON aircraft.aircraft_id = alerts.aircraft_id
             WHERE aircraft.owner_id = ?1
               AND ((?2 IS NULL AND alerts.status != ?3) OR alerts.status = ?2)
             ORDER BY alerts.rowid DESC",
            RawAlert::COLUMNS
          );
          let mut stmt = tx.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![owner, status, dismissed], RawAlert::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let counts = Self::count_alerts(&tx, &owner)?;
        tx.commit()?;
        Ok((rows, counts))
      })
      .await?;

    Ok(AlertList {
      alerts:       raws.into_iter().map(RawAlert::into_alert).collect::<Result<_>>()?,
      total_count:  total_count as usize,
      unread_count: unread_count as usize,
    })
  }

  async fn alert_counts<'a>(&'a self, owner_id: &'a str) -> Result<AlertCounts> {
    let owner = owner_id.to_owned();
    let (unread_count, total_count) = self
      .conn
      .call(move |conn| Ok(Self::count_alerts(conn, &owner)?))
      .await?;

    Ok(AlertCounts {
      unread_count: unread_count as usize,
      total_count:  total_count as usize,
    })
  }

  async fn set_alert_status(
    &self,
    alert_id: Uuid,
    status: AlertStatus,
    at: DateTime<Utc>,
  ) -> Result<Option<Alert>> {
    let id_str = encode_uuid(alert_id);
    let target = status.to_string();
    let dismissed = AlertStatus::Dismissed.to_string();
    let at_str = encode_dt(at);

    let found: bool = self
      .conn
      .call({
        let id_str = id_str.clone();
        move |conn| {
          let tx = conn.transaction()?;
          let current: Option<String> = tx
            .query_row(
              "SELECT status FROM alerts WHERE alert_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?;

          let Some(current) = current else {
            return Ok(false);
          };

          // Same status is a no-op; dismissed is terminal.
          if current != target && current != dismissed {
            tx.execute(
              "UPDATE alerts
               SET status = ?2,
                   read_at = CASE WHEN ?2 = 'READ' THEN COALESCE(read_at, ?3) ELSE read_at END,
                   dismissed_at = CASE WHEN ?2 = 'DISMISSED' THEN ?3 ELSE dismissed_at END
               WHERE alert_id = ?1",
              rusqlite::params![id_str, target, at_str],
            )?;
          }
          tx.commit()?;
          Ok(true)
        }
      })
      .await?;

    if !found {
      return Ok(None);
    }
    self.query_alert(id_str).await
  }

  async fn mark_all_read<'a>(&'a self, owner_id: &'a str, at: DateTime<Utc>) -> Result<usize> {
    let owner = owner_id.to_owned();
    let at_str = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE alerts SET status = 'READ', read_at = ?2
           WHERE status = 'UNREAD'
             AND aircraft_id IN (SELECT aircraft_id FROM aircraft WHERE owner_id = ?1)",
          rusqlite::params![owner, at_str],
        )?)
      })
      .await?;
    Ok(changed)
  }
}

// ─── AuditSink impl ──────────────────────────────────────────────────────────

impl AuditSink for SqliteStore {
  type Error = Error;

  async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent> {
    let stored = AuditEvent {
      id:           Uuid::new_v4(),
      event_type:   event.event_type,
      aircraft_id:  event.aircraft_id,
      version:      event.version,
      new_count:    event.new_count,
      refs:         event.refs,
      triggered_by: event.triggered_by,
      notes:        event.notes,
      at:           Utc::now(),
    };

    let id_str = encode_uuid(stored.id);
    let event_type = stored.event_type.to_string();
    let aircraft_str = stored.aircraft_id.map(encode_uuid);
    let version = stored.version.clone();
    let new_count = stored.new_count;
    let refs = encode_refs(&stored.refs)?;
    let triggered_by = stored.triggered_by.clone();
    let notes = stored.notes.clone();
    let at = encode_dt(stored.at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_log
             (event_id, event_type, aircraft_id, version, new_count, refs, triggered_by, notes, at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            event_type,
            aircraft_str,
            version,
            new_count,
            refs,
            triggered_by,
            notes,
            at
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(stored)
  }

  async fn audit_log(&self, aircraft_id: Option<Uuid>, limit: usize) -> Result<Vec<AuditEvent>> {
    let aircraft_str = aircraft_id.map(encode_uuid);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawAuditEvent> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM audit_log
           WHERE (?1 IS NULL OR aircraft_id = ?1)
           ORDER BY rowid DESC
           LIMIT ?2",
          RawAuditEvent::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![aircraft_str, limit], RawAuditEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEvent::into_event).collect()
  }
}
