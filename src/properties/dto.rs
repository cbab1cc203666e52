use serde::{Deserialize, Serialize};
use time::{Date, Time};
use uuid::Uuid;

use crate::{
    dates::{clock_time, day},
    error::{ServiceError, ServiceResult},
    pagination::Pagination,
    properties::repo_types::{PropertyStatus, PropertyType},
};

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePropertyRequest {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub price_per_night: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub max_guests: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default, with = "clock_time::option")]
    pub check_in_time: Option<Time>,
    #[serde(default, with = "clock_time::option")]
    pub check_out_time: Option<Time>,
}

/// Partial update. A field is applied exactly when it is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePropertyRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PropertyType>,
    pub status: Option<PropertyStatus>,
    pub price_per_night: Option<f64>,
    pub currency: Option<String>,
    pub max_guests: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub rules: Option<Vec<String>>,
    #[serde(default, with = "clock_time::option")]
    pub check_in_time: Option<Time>,
    #[serde(default, with = "clock_time::option")]
    pub check_out_time: Option<Time>,
}

fn check_title(title: &str) -> ServiceResult<()> {
    let len = title.trim().chars().count();
    if !(10..=100).contains(&len) {
        return Err(ServiceError::invalid(
            "title must be between 10 and 100 characters",
        ));
    }
    Ok(())
}

fn check_description(description: &str) -> ServiceResult<()> {
    if description.trim().chars().count() < 50 {
        return Err(ServiceError::invalid(
            "description must be at least 50 characters",
        ));
    }
    Ok(())
}

fn check_price(price: f64) -> ServiceResult<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ServiceError::invalid("price per night must be positive"));
    }
    Ok(())
}

fn check_range(field: &str, value: i32, min: i32, max: i32) -> ServiceResult<()> {
    if value < min || value > max {
        return Err(ServiceError::invalid(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(())
}

fn check_required(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::invalid(format!("{field} is required")));
    }
    Ok(())
}

impl CreatePropertyRequest {
    pub fn validate(&self) -> ServiceResult<()> {
        check_title(&self.title)?;
        check_description(&self.description)?;
        check_price(self.price_per_night)?;
        check_range("max guests", self.max_guests, 1, 20)?;
        check_range("bedrooms", self.bedrooms, 0, 20)?;
        check_range("bathrooms", self.bathrooms, 1, 20)?;
        check_required("address", &self.address)?;
        check_required("city", &self.city)?;
        check_required("state", &self.state)?;
        check_required("country", &self.country)?;
        check_required("zip code", &self.zip_code)?;
        Ok(())
    }
}

impl UpdatePropertyRequest {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        if let Some(price) = self.price_per_night {
            check_price(price)?;
        }
        if let Some(v) = self.max_guests {
            check_range("max guests", v, 1, 20)?;
        }
        if let Some(v) = self.bedrooms {
            check_range("bedrooms", v, 0, 20)?;
        }
        if let Some(v) = self.bathrooms {
            check_range("bathrooms", v, 1, 20)?;
        }
        for (field, value) in [
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
            ("zip code", &self.zip_code),
            ("currency", &self.currency),
        ] {
            if let Some(value) = value {
                check_required(field, value)?;
            }
        }
        Ok(())
    }
}

/// Query string of `GET /properties/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub guests: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<PropertyType>,
    /// Comma-separated; every listed amenity must be present.
    pub amenities: Option<String>,
    #[serde(default, with = "day::option")]
    pub check_in: Option<Date>,
    #[serde(default, with = "day::option")]
    pub check_out: Option<Date>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SearchQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination::new(
            self.page.unwrap_or(defaults.page),
            self.limit.unwrap_or(defaults.limit),
        )
    }

    pub fn amenity_list(&self) -> Vec<String> {
        self.amenities
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(with = "day")]
    pub check_in: Date,
    #[serde(with = "day")]
    pub check_out: Date,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub property_id: Uuid,
    #[serde(with = "day")]
    pub check_in: Date,
    #[serde(with = "day")]
    pub check_out: Date,
    pub available: bool,
}

/// A request that passes validation.
#[cfg(test)]
pub(crate) fn sample_create_request() -> CreatePropertyRequest {
    serde_json::from_value(serde_json::json!({
        "title": "Sunny loft by the river",
        "description": "A bright two bedroom loft with river views, fast wifi and a full kitchen.",
        "type": "apartment",
        "price_per_night": 100.0,
        "max_guests": 4,
        "bedrooms": 0,
        "bathrooms": 1,
        "address": "1 Main St",
        "city": "Porto",
        "state": "Porto",
        "country": "Portugal",
        "zip_code": "4000-001",
        "amenities": ["wifi", "kitchen"],
        "check_in_time": "15:00"
    }))
    .unwrap()
}
