//! Next-due computation for recurring requirements.
//!
//! Missing inputs never fail: they degrade to a textual description of the
//! policy with no concrete due date.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::requirement::RecurrencePolicy;

/// The next-due marker for a requirement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextDue {
  /// Human-readable marker: an ISO date, an hours figure, or a description
  /// of the policy when there is not enough data for either.
  pub display: Option<String>,
  /// A concrete calendar date, when one can be computed.
  pub due_at:  Option<NaiveDate>,
}

impl NextDue {
  fn date(due_at: NaiveDate) -> Self {
    Self {
      display: Some(due_at.format("%Y-%m-%d").to_string()),
      due_at:  Some(due_at),
    }
  }

  fn text(display: String) -> Self {
    Self { display: Some(display), due_at: None }
  }
}

/// Compute the next-due marker from the last known compliance date/hours.
pub fn next_due(
  policy: RecurrencePolicy,
  last_date: Option<NaiveDate>,
  last_hours: Option<f64>,
) -> NextDue {
  match policy {
    RecurrencePolicy::Once => NextDue::default(),
    RecurrencePolicy::Years(n) => last_date
      .and_then(|d| d.checked_add_months(Months::new(n.saturating_mul(12))))
      .map(NextDue::date)
      .unwrap_or_else(|| NextDue::text(format!("Every {n} year(s) after the last recorded date"))),
    RecurrencePolicy::Hours(n) => match last_hours {
      Some(hours) => NextDue::text(format!("{:.1} hours", hours + f64::from(n))),
      None => NextDue::text(format!("Every {n} hours after the last recorded hours")),
    },
    RecurrencePolicy::Cycles(n) => NextDue::text(format!("Every {n} cycles")),
    RecurrencePolicy::CalendarMonths(n) => last_date
      .and_then(|d| d.checked_add_days(Days::new(30 * u64::from(n))))
      .map(NextDue::date)
      .unwrap_or_else(|| NextDue::text(format!("Every {n} month(s) after the last recorded date"))),
  }
}
