//! Booking rules. Everything here is pure; "today" comes from a [`Clock`].

use chrono::{Duration, Local, NaiveDate};

use crate::model::{DateRange, ReservationResult};

/// A reservation must start at least this many days after today.
pub const MINIMUM_LEAD_DAYS: i64 = 30;

/// `end - start` may not exceed this many days.
pub const MAXIMUM_LENGTH_DAYS: i64 = 3;

/// Shorter ranges are stretched to this length before they are stored.
pub const MINIMUM_LENGTH_DAYS: i64 = 1;

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Date order, and the stretched range must still be a real calendar range.
pub fn check_dates(range: &DateRange) -> Result<(), ReservationResult> {
    if !range.is_well_formed() || normalize(*range).is_none() {
        return Err(ReservationResult::InvalidReservationDates);
    }
    Ok(())
}

pub fn check_lead_time(range: &DateRange, today: NaiveDate) -> Result<(), ReservationResult> {
    let earliest = today
        .checked_add_signed(Duration::days(MINIMUM_LEAD_DAYS))
        .unwrap_or(NaiveDate::MAX);
    if range.start < earliest {
        return Err(ReservationResult::ReservationTooEarly);
    }
    Ok(())
}

pub fn check_length(range: &DateRange) -> Result<(), ReservationResult> {
    if range.length_days() > MAXIMUM_LENGTH_DAYS {
        return Err(ReservationResult::ReservationTooLong);
    }
    Ok(())
}

/// Date rules in evaluation order. Availability and room existence are checked by the engine.
pub fn check_rules(range: &DateRange, today: NaiveDate) -> Result<(), ReservationResult> {
    check_dates(range)?;
    check_lead_time(range, today)?;
    check_length(range)
}

/// The range that actually gets stored for a request.
pub fn normalize(range: DateRange) -> Option<DateRange> {
    range.with_min_length(MINIMUM_LENGTH_DAYS)
}
