//! The comparison engine: catalog requirements versus an aircraft's evidence.
//!
//! Output is strictly factual. A row says whether a reference was found in the
//! paperwork, when it was last recorded, and when a recurring item next comes
//! up. Conclusions about the aircraft are left to the engineer reading the
//! same paperwork.
//!
//! Everything here is pure: no I/O, no clock. `today` is an input.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
  evidence::EvidenceRecord,
  recurrence::next_due,
  reference::{MatchKind, match_normalized, normalize},
  requirement::{CanonicalRequirement, RecurrencePolicy, RequirementKind},
  source::TypeIdentity,
};

/// A found recurring item whose next due date is at most this many days away
/// is reported as [`ComparisonStatus::DueSoon`].
pub const DUE_SOON_WINDOW_DAYS: i64 = 90;

// ─── Output types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonStatus {
  /// Found in the paperwork; nothing upcoming within the window.
  Ok,
  /// Not found in the paperwork.
  Missing,
  /// Not found, but published after the most recent evidence, so its absence
  /// is expected.
  NewRegulatory,
  /// Found, and the next recurrence falls within the window.
  DueSoon,
  /// In the paperwork but not in the catalog for this aircraft.
  InfoOnly,
}

/// Which side of the comparison a row originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOrigin {
  Catalog,
  Evidence,
}

/// One row of the comparison output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonItem {
  pub reference:          String,
  pub kind:               RequirementKind,
  pub title:              Option<String>,
  pub found:              bool,
  pub last_recorded_date: Option<NaiveDate>,
  pub recurrence_policy:  RecurrencePolicy,
  pub next_due:           Option<String>,
  pub next_due_date:      Option<NaiveDate>,
  pub status:             ComparisonStatus,
  pub origin:             ItemOrigin,
}

/// The full comparison for one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
  pub identity:           TypeIdentity,
  pub last_evidence_at:   Option<DateTime<Utc>>,
  /// Distinct catalog requirements compared.
  pub total_requirements: usize,
  pub found_count:        usize,
  /// Requirements not found, including those reported as new.
  pub missing_count:      usize,
  /// References of requirements reported as [`ComparisonStatus::NewRegulatory`].
  pub new_regulatory:     Vec<String>,
  pub items:              Vec<ComparisonItem>,
}

// ─── Compare ─────────────────────────────────────────────────────────────────

/// A requirement or evidence reference paired with its normalized form.
struct Normalized<'a, T> {
  key:   String,
  inner: &'a T,
}

fn normalize_requirements(
  requirements: &[CanonicalRequirement],
) -> Vec<Normalized<'_, CanonicalRequirement>> {
  let mut seen = HashSet::new();
  requirements
    .iter()
    .map(|r| Normalized { key: normalize(&r.reference), inner: r })
    .filter(|n| seen.insert(n.key.clone()))
    .collect()
}

fn normalize_evidence(evidence: &[EvidenceRecord]) -> Vec<Normalized<'_, EvidenceRecord>> {
  evidence
    .iter()
    .map(|e| Normalized { key: normalize(&e.reference), inner: e })
    .filter(|n| !n.key.is_empty())
    .collect()
}

/// Pick the evidence record that best matches `key`: exact beats partial,
/// then the latest compliance date, then input order.
fn best_match<'a>(
  key: &str,
  evidence: &[Normalized<'a, EvidenceRecord>],
) -> Option<&'a EvidenceRecord> {
  let mut best: Option<(MatchKind, Option<NaiveDate>, &EvidenceRecord)> = None;
  for candidate in evidence {
    let Some(kind) = match_normalized(key, &candidate.key) else {
      continue;
    };
    let rank = (kind, candidate.inner.compliance_date);
    if best.is_none_or(|(k, d, _)| rank > (k, d)) {
      best = Some((kind, candidate.inner.compliance_date, candidate.inner));
    }
  }
  best.map(|(_, _, record)| record)
}

fn unmatched_status(
  requirement: &CanonicalRequirement,
  last_evidence_at: Option<DateTime<Utc>>,
) -> ComparisonStatus {
  match (requirement.effective_date, last_evidence_at) {
    (Some(effective), Some(last)) if effective > last.date_naive() => {
      ComparisonStatus::NewRegulatory
    }
    _ => ComparisonStatus::Missing,
  }
}

fn catalog_row(
  requirement: &CanonicalRequirement,
  matched: Option<&EvidenceRecord>,
  last_evidence_at: Option<DateTime<Utc>>,
  today: NaiveDate,
) -> ComparisonItem {
  let mut item = ComparisonItem {
    reference:          requirement.reference.clone(),
    kind:               requirement.kind,
    title:              requirement.title.clone(),
    found:              matched.is_some(),
    last_recorded_date: None,
    recurrence_policy:  requirement.recurrence_policy,
    next_due:           None,
    next_due_date:      None,
    status:             unmatched_status(requirement, last_evidence_at),
    origin:             ItemOrigin::Catalog,
  };

  let Some(record) = matched else {
    return item;
  };

  let recorded = record.recorded_date();
  let due = next_due(requirement.recurrence_policy, Some(recorded), record.airframe_hours);
  item.last_recorded_date = Some(recorded);
  item.next_due = due.display;
  item.next_due_date = due.due_at;
  item.status = match due.due_at {
    Some(due_at) if (due_at - today).num_days() <= DUE_SOON_WINDOW_DAYS => {
      ComparisonStatus::DueSoon
    }
    _ => ComparisonStatus::Ok,
  };
  item
}

/// Evidence references that match no requirement at all, one row per
/// distinct normalized reference.
fn info_rows(
  requirements: &[Normalized<'_, CanonicalRequirement>],
  evidence: &[Normalized<'_, EvidenceRecord>],
) -> Vec<ComparisonItem> {
  let mut rows: Vec<(String, ComparisonItem)> = Vec::new();
  for record in evidence {
    if requirements
      .iter()
      .any(|r| match_normalized(&r.key, &record.key).is_some())
    {
      continue;
    }
    let recorded = record.inner.recorded_date();
    if let Some((_, existing)) = rows.iter_mut().find(|(k, _)| *k == record.key) {
      existing.last_recorded_date = existing.last_recorded_date.max(Some(recorded));
      continue;
    }
    rows.push((record.key.clone(), ComparisonItem {
      reference:          record.inner.reference.clone(),
      kind:               record.inner.kind,
      title:              record.inner.description.clone(),
      found:              true,
      last_recorded_date: Some(recorded),
      recurrence_policy:  RecurrencePolicy::Once,
      next_due:           None,
      next_due_date:      None,
      status:             ComparisonStatus::InfoOnly,
      origin:             ItemOrigin::Evidence,
    }));
  }
  rows.into_iter().map(|(_, item)| item).collect()
}

/// Classify every applicable requirement against the aircraft's evidence.
///
/// Requirements sharing a normalized reference are compared once. Each
/// requirement looks for its own best match, so one ambiguous evidence string
/// may be reported as found for several requirements.
pub fn compare(
  identity: &TypeIdentity,
  requirements: &[CanonicalRequirement],
  evidence: &[EvidenceRecord],
  last_evidence_at: Option<DateTime<Utc>>,
  today: NaiveDate,
) -> ComparisonReport {
  let requirements = normalize_requirements(requirements);
  let evidence = normalize_evidence(evidence);

  let mut items: Vec<ComparisonItem> = requirements
    .iter()
    .map(|r| {
      let matched = best_match(&r.key, &evidence);
      catalog_row(r.inner, matched, last_evidence_at, today)
    })
    .collect();

  let found_count = items.iter().filter(|i| i.found).count();
  let new_regulatory = items
    .iter()
    .filter(|i| i.status == ComparisonStatus::NewRegulatory)
    .map(|i| i.reference.clone())
    .collect();

  items.extend(info_rows(&requirements, &evidence));
  items.sort_by(|a, b| a.found.cmp(&b.found).then_with(|| a.reference.cmp(&b.reference)));

  ComparisonReport {
    identity: identity.clone(),
    last_evidence_at,
    total_requirements: requirements.len(),
    found_count,
    missing_count: requirements.len() - found_count,
    new_regulatory,
    items,
  }
}

// ─── Baseline ────────────────────────────────────────────────────────────────

/// One catalog reference with how often it appears in the paperwork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineItem {
  pub reference:         String,
  pub kind:              RequirementKind,
  pub title:             Option<String>,
  pub effective_date:    Option<NaiveDate>,
  pub recurrence_policy: RecurrencePolicy,
  /// Number of evidence records matching this reference.
  pub times_seen:        usize,
  pub last_seen_date:    Option<NaiveDate>,
  pub seen:              bool,
}

/// The catalog baseline for an aircraft, cross-referenced with evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineReport {
  pub total_references: usize,
  pub total_seen:       usize,
  pub total_not_seen:   usize,
  pub items:            Vec<BaselineItem>,
}

/// One line per distinct catalog reference, counting every matching evidence
/// record.
pub fn baseline(
  requirements: &[CanonicalRequirement],
  evidence: &[EvidenceRecord],
) -> BaselineReport {
  let requirements = normalize_requirements(requirements);
  let evidence = normalize_evidence(evidence);

  let items: Vec<BaselineItem> = requirements
    .iter()
    .map(|r| {
      let hits: Vec<&EvidenceRecord> = evidence
        .iter()
        .filter(|e| match_normalized(&r.key, &e.key).is_some())
        .map(|e| e.inner)
        .collect();
      BaselineItem {
        reference:         r.inner.reference.clone(),
        kind:              r.inner.kind,
        title:             r.inner.title.clone(),
        effective_date:    r.inner.effective_date,
        recurrence_policy: r.inner.recurrence_policy,
        times_seen:        hits.len(),
        last_seen_date:    hits.iter().map(|e| e.recorded_date()).max(),
        seen:              !hits.is_empty(),
      }
    })
    .collect();

  let total_seen = items.iter().filter(|i| i.seen).count();
  BaselineReport {
    total_references: items.len(),
    total_seen,
    total_not_seen: items.len() - total_seen,
    items,
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::requirement::Applicability;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
  }

  fn requirement(reference: &str) -> CanonicalRequirement {
    CanonicalRequirement::new(reference, RequirementKind::Ad, Applicability::default())
  }

  fn evidence(reference: &str, compliance: Option<NaiveDate>) -> EvidenceRecord {
    let mut record = EvidenceRecord::new(reference, RequirementKind::Ad, at(2024, 12, 1));
    record.compliance_date = compliance;
    record
  }

  fn row<'a>(report: &'a ComparisonReport, reference: &str) -> &'a ComparisonItem {
    report
      .items
      .iter()
      .find(|i| i.reference == reference)
      .unwrap_or_else(|| panic!("no row for {reference}"))
  }

  #[test]
  fn requirement_newer_than_all_evidence_is_new_regulatory() {
    let mut req = requirement("CF-2025-01");
    req.effective_date = Some(date(2025, 1, 5));
    let records = [evidence("CF-2019-12", Some(date(2020, 6, 1)))];

    let report = compare(
      &TypeIdentity::default(),
      &[req],
      &records,
      Some(at(2024, 12, 31)),
      date(2025, 2, 1),
    );
    assert_eq!(row(&report, "CF-2025-01").status, ComparisonStatus::NewRegulatory);
    assert_eq!(report.new_regulatory, vec!["CF-2025-01".to_string()]);
    assert_eq!(report.missing_count, 1);
  }

  #[test]
  fn requirement_older_than_evidence_is_missing() {
    let mut req = requirement("CF-2018-03");
    req.effective_date = Some(date(2018, 3, 1));
    let report = compare(&TypeIdentity::default(), &[req], &[], Some(at(2024, 1, 1)), date(2025, 1, 1));
    assert_eq!(row(&report, "CF-2018-03").status, ComparisonStatus::Missing);
  }

  #[test]
  fn unknown_evidence_timestamp_means_missing() {
    let mut req = requirement("CF-2025-01");
    req.effective_date = Some(date(2025, 1, 5));
    let report = compare(&TypeIdentity::default(), &[req], &[], None, date(2025, 2, 1));
    assert_eq!(row(&report, "CF-2025-01").status, ComparisonStatus::Missing);
  }

  #[test]
  fn recurring_item_inside_window_is_due_soon() {
    let mut req = requirement("CF-2019-12");
    req.recurrence_policy = RecurrencePolicy::Years(5);
    let records = [evidence("CF-2019-12", Some(date(2020, 6, 1)))];

    let report = compare(&TypeIdentity::default(), &[req], &records, None, date(2025, 5, 1));
    let item = row(&report, "CF-2019-12");
    assert_eq!(item.next_due.as_deref(), Some("2025-06-01"));
    assert_eq!(item.next_due_date, Some(date(2025, 6, 1)));
    assert_eq!(item.status, ComparisonStatus::DueSoon);
  }

  #[test]
  fn recurring_item_outside_window_is_ok() {
    let mut req = requirement("CF-2019-12");
    req.recurrence_policy = RecurrencePolicy::Years(5);
    let records = [evidence("CF-2019-12", Some(date(2020, 6, 1)))];

    let report = compare(&TypeIdentity::default(), &[req], &records, None, date(2024, 1, 1));
    assert_eq!(row(&report, "CF-2019-12").status, ComparisonStatus::Ok);
  }

  #[test]
  fn lowercase_undashed_evidence_is_found() {
    let records = [evidence("cf 2024 01", None)];
    let report = compare(
      &TypeIdentity::default(),
      &[requirement("CF-2024-01")],
      &records,
      None,
      date(2025, 1, 1),
    );
    let item = row(&report, "CF-2024-01");
    assert!(item.found);
    assert_eq!(item.status, ComparisonStatus::Ok);
    // Observed date stands in for a missing compliance date.
    assert_eq!(item.last_recorded_date, Some(date(2024, 12, 1)));
  }

  #[test]
  fn exact_match_beats_partial_and_latest_date_wins() {
    let mut req = requirement("CF-2024-01");
    req.recurrence_policy = RecurrencePolicy::Years(1);
    let records = [
      evidence("CF-2024-01R2", Some(date(2024, 11, 1))),
      evidence("CF-2024-01", Some(date(2024, 2, 1))),
      evidence("cf-2024-01", Some(date(2024, 5, 1))),
    ];
    let report = compare(&TypeIdentity::default(), &[req], &records, None, date(2024, 6, 1));
    assert_eq!(row(&report, "CF-2024-01").last_recorded_date, Some(date(2024, 5, 1)));
  }

  #[test]
  fn unmatched_evidence_is_info_only_once() {
    let records = [
      evidence("STC-SA00123", Some(date(2021, 1, 1))),
      evidence("stc sa00123", Some(date(2022, 1, 1))),
      evidence("---", None),
    ];
    let report = compare(
      &TypeIdentity::default(),
      &[requirement("CF-2024-01")],
      &records,
      None,
      date(2025, 1, 1),
    );
    let info: Vec<_> = report
      .items
      .iter()
      .filter(|i| i.status == ComparisonStatus::InfoOnly)
      .collect();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].reference, "STC-SA00123");
    assert_eq!(info[0].last_recorded_date, Some(date(2022, 1, 1)));
    assert_eq!(info[0].origin, ItemOrigin::Evidence);
  }

  #[test]
  fn unmatched_rows_sort_first_then_by_reference() {
    let records = [evidence("CF-2020-01", None), evidence("ZZ-1", None)];
    let report = compare(
      &TypeIdentity::default(),
      &[requirement("CF-2022-02"), requirement("CF-2020-01"), requirement("CF-2021-05")],
      &records,
      None,
      date(2025, 1, 1),
    );
    let order: Vec<&str> = report.items.iter().map(|i| i.reference.as_str()).collect();
    assert_eq!(order, vec!["CF-2021-05", "CF-2022-02", "CF-2020-01", "ZZ-1"]);
  }

  #[test]
  fn found_plus_missing_equals_requirements() {
    let requirements = [
      requirement("CF-2020-01"),
      requirement("CF-2021-05"),
      requirement("CF-2022-02"),
      requirement("SB 172-01"),
    ];
    let records = [evidence("CF-2020-01", None), evidence("172-01", None)];
    let report = compare(&TypeIdentity::default(), &requirements, &records, None, date(2025, 1, 1));
    assert_eq!(report.total_requirements, 4);
    assert_eq!(report.found_count, 2);
    assert_eq!(report.found_count + report.missing_count, report.total_requirements);
  }

  #[test]
  fn ambiguous_evidence_matches_every_candidate() {
    let records = [evidence("2024-01", None)];
    let report = compare(
      &TypeIdentity::default(),
      &[requirement("CF-2024-01"), requirement("US-2024-01")],
      &records,
      None,
      date(2025, 1, 1),
    );
    assert_eq!(report.found_count, 2);
  }

  #[test]
  fn baseline_counts_are_consistent() {
    let requirements = [requirement("CF-2020-01"), requirement("CF-2021-05"), requirement("CF-2020-01")];
    let records = [
      evidence("CF-2020-01", Some(date(2020, 3, 1))),
      evidence("cf202001", Some(date(2023, 3, 1))),
    ];
    let report = baseline(&requirements, &records);
    assert_eq!(report.total_references, 2);
    assert_eq!(report.total_seen, 1);
    assert_eq!(report.total_not_seen, 1);
    assert_eq!(report.total_seen + report.total_not_seen, report.total_references);

    let seen = &report.items[0];
    assert_eq!(seen.times_seen, 2);
    assert_eq!(seen.last_seen_date, Some(date(2023, 3, 1)));
  }
}
