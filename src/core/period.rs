//! Date range partitioning into calendar periods

use chrono::{Datelike, Duration, Months, NaiveDate};

use crate::core::types::{Granularity, Period};
use crate::error::AppError;

/// Lazily yields the periods covering `[start, end]`, in order.
#[derive(Debug, Clone)]
pub(crate) struct Periods {
    next: Option<NaiveDate>,
    end: NaiveDate,
    granularity: Granularity,
}

pub(crate) fn partition(
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
) -> Result<Periods, AppError> {
    if start > end {
        return Err(AppError::InvalidRange { start, end });
    }
    Ok(Periods {
        next: Some(start),
        end,
        granularity,
    })
}

impl Iterator for Periods {
    type Item = Period;

    fn next(&mut self) -> Option<Period> {
        let start = self.next?;
        let unit_end = unit_end(start, self.granularity).unwrap_or(self.end);
        let end = unit_end.min(self.end);

        self.next = if end < self.end { end.succ_opt() } else { None };

        Some(Period { start, end })
    }
}

/// Sunday closing the Monday-based week containing `date`
fn week_end(date: NaiveDate) -> Option<NaiveDate> {
    let weekday = date.weekday().num_days_from_monday();
    date.checked_add_signed(Duration::days(6 - i64::from(weekday)))
}

/// Last day of the unit containing `date`; None past the representable calendar
fn unit_end(date: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Day => Some(date),
        Granularity::Week => week_end(date),
        Granularity::Month => date
            .with_day(1)?
            .checked_add_months(Months::new(1))?
            .pred_opt(),
    }
}
