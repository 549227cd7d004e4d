//! Query window planning
//!
//! Each run asks the site for events from the day of the newest stored event
//! up to today. Without stored events the window starts at the catalogue's
//! epoch.

use crate::storage::{PriorOutput, StorageError};
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Date layout of the search form fields (`DD/MM/YYYY`)
pub const WINDOW_DATE_FORMAT: &str = "%d/%m/%Y";

/// Earliest date the catalogue holds
pub const DEFAULT_EPOCH: &str = "29/07/1998";

/// Failure to inspect previously persisted output
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("previous output is unreadable: {0}")]
    Unreadable(#[from] StorageError),
}

/// The `[date_from, date_to]` range submitted to the search form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    date_from: NaiveDate,
    date_to: NaiveDate,
}

impl QueryWindow {
    pub fn new(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self { date_from, date_to }
    }

    pub fn date_from(&self) -> NaiveDate {
        self.date_from
    }

    pub fn date_to(&self) -> NaiveDate {
        self.date_to
    }

    /// Lower bound as submitted to the form
    pub fn form_from(&self) -> String {
        self.date_from.format(WINDOW_DATE_FORMAT).to_string()
    }

    /// Upper bound as submitted to the form
    pub fn form_to(&self) -> String {
        self.date_to.format(WINDOW_DATE_FORMAT).to_string()
    }
}

impl fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.form_from(), self.form_to())
    }
}

/// Parses a `DD/MM/YYYY` date
pub fn parse_window_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), WINDOW_DATE_FORMAT).ok()
}

/// Plans the window, reporting unreadable prior output as an error
///
/// # Arguments
///
/// * `prior` - Previously persisted output, consulted read-only
/// * `epoch` - Lower bound used when nothing was collected yet
/// * `today` - Current date, used as the upper bound
pub fn try_plan_window<P>(
    prior: &P,
    epoch: NaiveDate,
    today: NaiveDate,
) -> Result<QueryWindow, PlannerError>
where
    P: PriorOutput + ?Sized,
{
    let date_from = prior
        .latest_timestamp()?
        .map(|latest| latest.date())
        .unwrap_or(epoch);

    Ok(QueryWindow::new(date_from, today))
}

/// Plans the window, falling back to `epoch` if prior output is unreadable
///
/// Never fails: a corrupt or unreadable output is logged and treated as if
/// nothing had been collected.
pub fn plan_window<P>(prior: &P, epoch: NaiveDate, today: NaiveDate) -> QueryWindow
where
    P: PriorOutput + ?Sized,
{
    match try_plan_window(prior, epoch, today) {
        Ok(window) => window,
        Err(e) => {
            tracing::warn!("{}; starting from epoch {}", e, epoch.format(WINDOW_DATE_FORMAT));
            QueryWindow::new(epoch, today)
        }
    }
}
