use serde::Serialize;
use time::Date;

use crate::error::ServiceError;

/// `YYYY-MM-DD` serde format for stay dates.
pub mod day {
    use time::Date;

    time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

    pub use iso_date::{deserialize, serialize};

    pub mod option {
        pub use super::iso_date::option::{deserialize, serialize};
    }
}

/// `HH:MM` serde format for check-in / check-out times.
pub mod clock_time {
    use time::Time;

    time::serde::format_description!(hh_mm, Time, "[hour]:[minute]");

    pub use hh_mm::{deserialize, serialize};

    pub mod option {
        pub use super::hh_mm::option::{deserialize, serialize};
    }
}

pub const INVALID_RANGE: &str = "check-out date must be after check-in date";
pub const PAST_CHECK_IN: &str = "check-in date cannot be in the past";

/// Half-open stay interval `[check_in, check_out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    #[serde(with = "day")]
    check_in: Date,
    #[serde(with = "day")]
    check_out: Date,
}

impl DateRange {
    /// Builds a range, rejecting empty and inverted intervals.
    pub fn new(check_in: Date, check_out: Date) -> Result<Self, ServiceError> {
        if check_out <= check_in {
            return Err(ServiceError::invalid(INVALID_RANGE));
        }
        Ok(Self { check_in, check_out })
    }

    pub fn check_in(&self) -> Date {
        self.check_in
    }

    pub fn check_out(&self) -> Date {
        self.check_out
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).whole_days()
    }

    /// True unless the two ranges are fully disjoint. Touching ends do not overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.intersects(other.check_in, other.check_out)
    }

    pub fn intersects(&self, check_in: Date, check_out: Date) -> bool {
        !(check_out <= self.check_in || check_in >= self.check_out)
    }

    pub fn ensure_not_before(&self, today: Date) -> Result<(), ServiceError> {
        if self.check_in < today {
            return Err(ServiceError::invalid(PAST_CHECK_IN));
        }
        Ok(())
    }
}
