use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    dates::{day, DateRange},
    properties::repo_types::Property,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Statuses that hold the dates and block other bookings.
    pub const BLOCKING: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    pub fn blocks_dates(self) -> bool {
        Self::BLOCKING.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub property_id: Uuid,
    pub guest_id: Uuid,
    #[serde(with = "day")]
    pub check_in: Date,
    #[serde(with = "day")]
    pub check_out: Date,
    pub guests: i32,
    pub total_price: f64,
    pub currency: String,
    pub status: BookingStatus,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Booking {
    /// True when this booking holds dates that intersect `range`.
    pub fn conflicts_with(&self, range: &DateRange) -> bool {
        self.status.blocks_dates() && range.intersects(self.check_in, self.check_out)
    }
}

/// Booking joined with its listing and guest.
#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking: Booking,
    pub property: Property,
    pub guest: User,
}

/// Insert payload; status is always stored as pending.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub range: DateRange,
    pub guests: i32,
    pub total_price: f64,
    pub currency: String,
    pub notes: Option<String>,
}
