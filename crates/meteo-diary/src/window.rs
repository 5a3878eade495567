use chrono::{Datelike, Days, NaiveDate};

use crate::model::ForecastWindow;

/// Days past next Monday that the month grid still publishes.
pub const UPCOMING_HORIZON_DAYS: u64 = 30;
const DAYS_PER_WEEK: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    FullyFuture,
    FullyPast,
    Straddling,
}

/// The clipped request window and the sub-windows routed to each pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub kind: PartitionKind,
    pub window: ForecastWindow,
    pub historical: Option<ForecastWindow>,
    pub upcoming: Option<ForecastWindow>,
}

/// Monday of the week containing `today`; the month grid's first cell.
pub fn week_start(today: NaiveDate) -> NaiveDate {
    let back = u64::from(today.weekday().num_days_from_monday());
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}

/// Monday of the week after the one containing `today`.
pub fn next_monday(today: NaiveDate) -> NaiveDate {
    let start = week_start(today);
    start
        .checked_add_days(Days::new(DAYS_PER_WEEK))
        .unwrap_or(start)
}

pub fn latest_upcoming(today: NaiveDate) -> NaiveDate {
    let monday = next_monday(today);
    monday
        .checked_add_days(Days::new(UPCOMING_HORIZON_DAYS))
        .unwrap_or(monday)
}

fn previous_day(today: NaiveDate) -> NaiveDate {
    today.pred_opt().unwrap_or(today)
}

/// Clips `since..=until` to the forecastable range.
pub fn clip(since: NaiveDate, until: NaiveDate, today: NaiveDate) -> ForecastWindow {
    let latest = latest_upcoming(today);
    let since = since.min(latest);
    let until = if until < since {
        since
    } else {
        until.min(latest)
    };
    ForecastWindow::new(since, until)
}

/// Splits the clipped window at yesterday: days up to and including
/// yesterday go to the diary, days from today on go to the month grid.
/// A window that starts at or after yesterday is served by the grid alone.
pub fn partition(since: NaiveDate, until: NaiveDate, today: NaiveDate) -> Partition {
    let window = clip(since, until, today);
    let yesterday = previous_day(today);

    if window.since() >= yesterday {
        return Partition {
            kind: PartitionKind::FullyFuture,
            window,
            historical: None,
            upcoming: Some(window),
        };
    }

    if window.until() < yesterday {
        return Partition {
            kind: PartitionKind::FullyPast,
            window,
            historical: Some(window),
            upcoming: None,
        };
    }

    let upcoming = (window.until() >= today).then(|| ForecastWindow::new(today, window.until()));
    Partition {
        kind: PartitionKind::Straddling,
        window,
        historical: Some(ForecastWindow::new(window.since(), yesterday)),
        upcoming,
    }
}
