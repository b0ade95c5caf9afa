//! Alert status, review, and the collaborative alert inbox.

use chrono::{DateTime, Utc};
use hangar_core::{
  alert::{Alert, AlertCounts, AlertList, AlertStatus},
  audit::{AuditEvent, AuditEventType, NewAuditEvent},
  knowledge::{Aircraft, GlobalTypePool, PoolStats, ReviewOutcome},
  reference::TypeKey,
  source::{Catalog, EvidenceSource, IdentityResolver},
  store::{AuditSink, DetectionStore},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Engine, Error, Result};

/// Audit log page size when the caller gives none.
pub const DEFAULT_AUDIT_LIMIT: usize = 100;
/// Largest audit log page a caller may ask for.
pub const MAX_AUDIT_LIMIT: usize = 500;

/// The detection alert on one aircraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStatusView {
  pub aircraft_id:            Uuid,
  pub registration:           String,
  pub alert_active:           bool,
  pub new_count:              u32,
  pub last_processed_version: Option<String>,
  pub last_reviewed_at:       Option<DateTime<Utc>>,
}

impl<S, X> Engine<S, X>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  pub(crate) async fn require_aircraft(&self, aircraft_id: Uuid) -> Result<Aircraft> {
    self
      .store
      .get_aircraft(aircraft_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("aircraft {aircraft_id}")))
  }

  // ── Per-aircraft alert ────────────────────────────────────────────────

  pub async fn alert_status(&self, aircraft_id: Uuid) -> Result<AlertStatusView> {
    let aircraft = self.require_aircraft(aircraft_id).await?;
    let state = self
      .store
      .get_knowledge(aircraft_id)
      .await
      .map_err(Error::store)?;

    Ok(match state {
      Some(state) => AlertStatusView {
        aircraft_id,
        registration: aircraft.registration,
        alert_active: state.alert_active,
        new_count: state.new_count,
        last_processed_version: state.last_processed_version,
        last_reviewed_at: state.last_reviewed_at,
      },
      None => AlertStatusView {
        aircraft_id,
        registration: aircraft.registration,
        alert_active: false,
        new_count: 0,
        last_processed_version: None,
        last_reviewed_at: None,
      },
    })
  }

  /// Clear the aircraft's detection alert. Always audited, even when there
  /// was nothing to clear.
  pub async fn mark_reviewed(
    &self,
    aircraft_id: Uuid,
    reviewer: Option<&str>,
  ) -> Result<ReviewOutcome> {
    self.require_aircraft(aircraft_id).await?;
    let outcome = self
      .store
      .mark_reviewed(aircraft_id, Utc::now())
      .await
      .map_err(Error::store)?;

    let reviewer = reviewer
      .filter(|r| !r.trim().is_empty())
      .unwrap_or(self.config.triggered_by.as_str());
    let notes = if outcome.alert_cleared {
      format!("cleared {} new reference(s)", outcome.previous_new_count)
    } else {
      "no active alert".to_owned()
    };
    self
      .audit
      .record(
        NewAuditEvent::new(AuditEventType::AlertCleared, reviewer)
          .aircraft(aircraft_id)
          .new_count(outcome.previous_new_count)
          .notes(notes),
      )
      .await;

    tracing::info!(
      %aircraft_id,
      %reviewer,
      alert_cleared = outcome.alert_cleared,
      cleared = outcome.previous_new_count,
      "alert reviewed"
    );
    Ok(outcome)
  }

  // ── Collaborative alerts ──────────────────────────────────────────────

  /// The owner's alerts, newest first, with the same counts
  /// [`alert_counts`](Self::alert_counts) reports. `status` is matched
  /// case-insensitively; without it, dismissed alerts are left out.
  pub async fn list_alerts(&self, owner_id: &str, status: Option<&str>) -> Result<AlertList> {
    let status = status.map(parse_status).transpose()?;
    self
      .store
      .list_alerts(owner_id, status)
      .await
      .map_err(Error::store)
  }

  pub async fn alert_counts(&self, owner_id: &str) -> Result<AlertCounts> {
    self.store.alert_counts(owner_id).await.map_err(Error::store)
  }

  pub async fn mark_alert_read(&self, alert_id: &str) -> Result<Alert> {
    self.set_alert_status(alert_id, AlertStatus::Read).await
  }

  pub async fn dismiss_alert(&self, alert_id: &str) -> Result<Alert> {
    self.set_alert_status(alert_id, AlertStatus::Dismissed).await
  }

  /// Returns how many alerts moved from UNREAD to READ.
  pub async fn mark_all_read(&self, owner_id: &str) -> Result<usize> {
    self
      .store
      .mark_all_read(owner_id, Utc::now())
      .await
      .map_err(Error::store)
  }

  async fn set_alert_status(&self, alert_id: &str, status: AlertStatus) -> Result<Alert> {
    let id = Uuid::parse_str(alert_id.trim())
      .map_err(|_| Error::InvalidInput(format!("malformed alert id {alert_id:?}")))?;
    self
      .store
      .set_alert_status(id, status, Utc::now())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("alert {id}")))
  }

  // ── Audit and pools ───────────────────────────────────────────────────

  /// Most recent events first. `limit` is clamped to
  /// `1..=`[`MAX_AUDIT_LIMIT`].
  pub async fn audit_log(
    &self,
    aircraft_id: Option<Uuid>,
    limit: Option<usize>,
  ) -> Result<Vec<AuditEvent>> {
    let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
    self
      .store
      .audit_log(aircraft_id, limit)
      .await
      .map_err(Error::store)
  }

  pub async fn type_pool(&self, type_key: &str) -> Result<GlobalTypePool> {
    let key: TypeKey = type_key
      .parse()
      .map_err(|_| Error::InvalidInput(format!("malformed type key {type_key:?}")))?;
    self
      .store
      .get_type_pool(&key)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("type pool {key}")))
  }

  pub async fn pool_stats(&self) -> Result<PoolStats> {
    self.store.pool_stats().await.map_err(Error::store)
  }
}

fn parse_status(raw: &str) -> Result<AlertStatus> {
  raw
    .trim()
    .parse()
    .map_err(|_| Error::InvalidInput(format!("unknown alert status {raw:?}")))
}
