use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{OffsetDateTime, Time};
use uuid::Uuid;

use crate::dates::{clock_time, DateRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
    Condo,
    Villa,
    Cabin,
    Studio,
}

/// Listing lifecycle. New listings wait in `Pending` until an admin approves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Pending,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub description: String,
    #[sqlx(rename = "property_type")]
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub status: PropertyStatus,
    pub price_per_night: f64,
    pub currency: String,
    pub max_guests: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub rules: Vec<String>,
    #[serde(with = "clock_time::option")]
    pub check_in_time: Option<Time>,
    #[serde(with = "clock_time::option")]
    pub check_out_time: Option<Time>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert payload; status is always stored as pending.
#[derive(Debug, Clone)]
pub struct NewProperty {
    pub host_id: Uuid,
    pub title: String,
    pub description: String,
    pub kind: PropertyType,
    pub price_per_night: f64,
    pub currency: String,
    pub max_guests: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub rules: Vec<String>,
    pub check_in_time: Option<Time>,
    pub check_out_time: Option<Time>,
}

/// Search filters applied to active listings. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct PropertySearch {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub guests: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub kind: Option<PropertyType>,
    pub amenities: Vec<String>,
    /// Only listings with no pending/confirmed booking overlapping `[from, to)`.
    pub available: Option<DateRange>,
}
