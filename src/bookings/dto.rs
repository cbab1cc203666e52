use serde::{de, Deserialize, Deserializer, Serialize};
use time::Date;
use uuid::Uuid;

use crate::{
    auth::dto::PublicUser,
    bookings::{
        repo_types::{Booking, BookingDetails, BookingStatus},
        transitions::INVALID_STATUS,
    },
    dates::day,
    properties::repo_types::Property,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub property_id: Uuid,
    #[serde(with = "day")]
    pub check_in: Date,
    #[serde(with = "day")]
    pub check_out: Date,
    pub guests: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update. Each present field is gated separately; either date may
/// be sent alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBookingRequest {
    #[serde(default, with = "day::option")]
    pub check_in: Option<Date>,
    #[serde(default, with = "day::option")]
    pub check_out: Option<Date>,
    pub guests: Option<i32>,
    #[serde(default, deserialize_with = "status_name")]
    pub status: Option<BookingStatus>,
    pub notes: Option<String>,
}

fn status_name<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BookingStatus>, D::Error> {
    let Some(name) = Option::<String>::deserialize(d)? else {
        return Ok(None);
    };
    let status = match name.trim().to_lowercase().as_str() {
        "pending" => BookingStatus::Pending,
        "confirmed" => BookingStatus::Confirmed,
        "cancelled" => BookingStatus::Cancelled,
        "completed" => BookingStatus::Completed,
        _ => return Err(de::Error::custom(INVALID_STATUS)),
    };
    Ok(Some(status))
}

impl UpdateBookingRequest {
    pub fn touches_dates(&self) -> bool {
        self.check_in.is_some() || self.check_out.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: Booking,
    pub nights: i64,
    pub property: Property,
    pub guest: PublicUser,
}

impl From<BookingDetails> for BookingResponse {
    fn from(d: BookingDetails) -> Self {
        Self {
            nights: (d.booking.check_out - d.booking.check_in).whole_days(),
            guest: PublicUser::from(&d.guest),
            property: d.property,
            booking: d.booking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_reads_partial_dates() {
        let patch: UpdateBookingRequest =
            serde_json::from_value(serde_json::json!({ "check_out": "2025-06-08" })).unwrap();
        assert!(patch.touches_dates());
        assert!(patch.check_in.is_none());
        assert_eq!(patch.check_out, Some(time::macros::date!(2025 - 06 - 08)));

        let patch: UpdateBookingRequest =
            serde_json::from_value(serde_json::json!({ "status": "confirmed" })).unwrap();
        assert!(!patch.touches_dates());
        assert_eq!(patch.status, Some(BookingStatus::Confirmed));
    }

    #[test]
    fn unknown_status_is_rejected_at_parse_time() {
        let err = serde_json::from_value::<UpdateBookingRequest>(
            serde_json::json!({ "status": "archived" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains(INVALID_STATUS));

        let patch: UpdateBookingRequest =
            serde_json::from_value(serde_json::json!({ "status": null, "notes": "hi" })).unwrap();
        assert_eq!(patch.status, None);
    }
}
