use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    bookings::{
        availability::AvailabilityChecker,
        dto::{BookingResponse, CreateBookingRequest, UpdateBookingRequest},
        repo::BookingStore,
        repo_types::{BookingDetails, BookingStatus, NewBooking},
        transitions::{self, Parties},
    },
    clock::Clock,
    dates::DateRange,
    error::{ServiceError, ServiceResult, StoreError},
    pagination::Pagination,
    properties::{
        repo::PropertyStore,
        repo_types::{Property, PropertyStatus},
    },
};

pub const BOOKING_NOT_FOUND: &str = "booking not found";
pub const PROPERTY_NOT_FOUND: &str = "property not found";
pub const PROPERTY_NOT_BOOKABLE: &str = "property is not available for booking";
pub const DATES_UNAVAILABLE: &str = "property is not available for the selected dates";
pub const BOOKING_CHANGED: &str = "booking was changed by another request, reload and retry";
const AT_LEAST_ONE_NIGHT: &str = "booking must be for at least one night";
const AT_LEAST_ONE_GUEST: &str = "number of guests must be at least 1";

fn check_capacity(guests: i32, property: &Property) -> ServiceResult<()> {
    if guests < 1 {
        return Err(ServiceError::invalid(AT_LEAST_ONE_GUEST));
    }
    if guests > property.max_guests {
        return Err(ServiceError::invalid(format!(
            "number of guests ({guests}) exceeds property maximum ({})",
            property.max_guests
        )));
    }
    Ok(())
}

fn price_for(range: DateRange, property: &Property) -> ServiceResult<f64> {
    let nights = range.nights();
    if nights <= 0 {
        return Err(ServiceError::invalid(AT_LEAST_ONE_NIGHT));
    }
    Ok(nights as f64 * property.price_per_night)
}

/// Overlap rejections raised by the store's own atomic re-check read the
/// same as the ones caught up front.
fn booking_write_failed(context: &'static str) -> impl FnOnce(StoreError) -> ServiceError {
    move |err| match err {
        StoreError::Conflict(detail) => {
            warn!(%detail, "booking write lost an availability race");
            ServiceError::conflict(DATES_UNAVAILABLE)
        }
        StoreError::Stale => {
            warn!("booking changed between read and write");
            ServiceError::conflict(BOOKING_CHANGED)
        }
        other => ServiceError::store(context)(other),
    }
}

pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    properties: Arc<dyn PropertyStore>,
    availability: AvailabilityChecker,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        properties: Arc<dyn PropertyStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            availability: AvailabilityChecker::new(bookings.clone()),
            bookings,
            properties,
            clock,
        }
    }

    async fn load(&self, id: Uuid) -> ServiceResult<BookingDetails> {
        self.bookings
            .get(id)
            .await
            .map_err(ServiceError::store("failed to get booking"))?
            .ok_or_else(|| ServiceError::not_found(BOOKING_NOT_FOUND))
    }

    async fn load_property(&self, id: Uuid) -> ServiceResult<Property> {
        self.properties
            .get(id)
            .await
            .map_err(ServiceError::store("failed to get property"))?
            .ok_or_else(|| ServiceError::not_found(PROPERTY_NOT_FOUND))
    }

    #[instrument(skip(self, req), fields(user_id = %user.id, property_id = %req.property_id))]
    pub async fn create(
        &self,
        user: AuthUser,
        req: CreateBookingRequest,
    ) -> ServiceResult<BookingResponse> {
        let range = DateRange::new(req.check_in, req.check_out)?;
        range.ensure_not_before(self.clock.today())?;

        let property = self.load_property(req.property_id).await?;
        if property.status != PropertyStatus::Active {
            return Err(ServiceError::conflict(PROPERTY_NOT_BOOKABLE));
        }
        check_capacity(req.guests, &property)?;

        if self
            .availability
            .overlaps(property.id, range, None)
            .await?
        {
            return Err(ServiceError::conflict(DATES_UNAVAILABLE));
        }

        let total_price = price_for(range, &property)?;
        let created = self
            .bookings
            .create(NewBooking {
                property_id: property.id,
                guest_id: user.id,
                range,
                guests: req.guests,
                total_price,
                currency: property.currency.clone(),
                notes: req.notes,
            })
            .await
            .map_err(booking_write_failed("failed to create booking"))?;

        info!(booking_id = %created.id, nights = range.nights(), total_price, "booking created");
        let details = self.load(created.id).await?;
        Ok(details.into())
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn get(&self, user: AuthUser, id: Uuid) -> ServiceResult<BookingResponse> {
        let details = self.load(id).await?;
        let who = Parties::of(&user, details.booking.guest_id, details.property.host_id);
        if !who.any() {
            return Err(ServiceError::forbidden(
                "unauthorized: you can only view your own bookings",
            ));
        }
        Ok(details.into())
    }

    /// Applies every present field of the patch after all of their gates
    /// pass, then persists the result in one write.
    #[instrument(skip(self, patch), fields(user_id = %user.id))]
    pub async fn update(
        &self,
        user: AuthUser,
        id: Uuid,
        patch: UpdateBookingRequest,
    ) -> ServiceResult<BookingResponse> {
        let details = self.load(id).await?;
        let current = &details.booking;
        let property = &details.property;
        let who = Parties::of(&user, current.guest_id, property.host_id);
        if !who.any() {
            return Err(ServiceError::forbidden(
                "unauthorized: you can only update your own bookings",
            ));
        }

        let mut next = current.clone();
        let today = self.clock.today();

        if patch.touches_dates() {
            if current.status != BookingStatus::Pending {
                return Err(ServiceError::conflict(
                    "cannot modify dates for confirmed or completed bookings",
                ));
            }
            if !(who.guest || who.admin) {
                return Err(ServiceError::forbidden(
                    "only the guest can modify booking dates",
                ));
            }
            let range = DateRange::new(
                patch.check_in.unwrap_or(current.check_in),
                patch.check_out.unwrap_or(current.check_out),
            )?;
            range.ensure_not_before(today)?;
            if self
                .availability
                .overlaps(property.id, range, Some(current.id))
                .await?
            {
                return Err(ServiceError::conflict(DATES_UNAVAILABLE));
            }
            next.check_in = range.check_in();
            next.check_out = range.check_out();
            next.total_price = price_for(range, property)?;
        }

        if let Some(guests) = patch.guests {
            if current.status != BookingStatus::Pending {
                return Err(ServiceError::conflict(
                    "cannot modify guest count for confirmed or completed bookings",
                ));
            }
            if !(who.guest || who.admin) {
                return Err(ServiceError::forbidden(
                    "only the guest can modify guest count",
                ));
            }
            check_capacity(guests, property)?;
            next.guests = guests;
        }

        if let Some(target) = patch.status {
            transitions::check(current.status, target, who)?;
            if target == BookingStatus::Completed {
                transitions::ensure_stay_ended(current.check_out, today)?;
            }
            next.status = target;
        }

        if let Some(notes) = patch.notes {
            next.notes = Some(notes);
        }

        let saved = self
            .bookings
            .update(&next, current.status)
            .await
            .map_err(booking_write_failed("failed to update booking"))?;

        info!(booking_id = %saved.id, status = ?saved.status, "booking updated");
        Ok(BookingDetails {
            booking: saved,
            ..details
        }
        .into())
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn cancel(&self, user: AuthUser, id: Uuid) -> ServiceResult<BookingResponse> {
        let details = self.load(id).await?;
        let who = Parties::of(&user, details.booking.guest_id, details.property.host_id);
        transitions::check_cancel(details.booking.status, who)?;

        let mut next = details.booking.clone();
        next.status = BookingStatus::Cancelled;
        let saved = self
            .bookings
            .update(&next, details.booking.status)
            .await
            .map_err(booking_write_failed("failed to cancel booking"))?;

        info!(booking_id = %saved.id, "booking cancelled");
        Ok(BookingDetails {
            booking: saved,
            ..details
        }
        .into())
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn user_bookings(
        &self,
        user: AuthUser,
        page: Pagination,
    ) -> ServiceResult<Vec<BookingResponse>> {
        let page = page.normalized();
        let rows = self
            .bookings
            .list_by_guest(user.id, page.offset(), page.limit)
            .await
            .map_err(ServiceError::store("failed to get user bookings"))?;
        Ok(rows.into_iter().map(BookingResponse::from).collect())
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn property_bookings(
        &self,
        user: AuthUser,
        property_id: Uuid,
        page: Pagination,
    ) -> ServiceResult<Vec<BookingResponse>> {
        let property = self.load_property(property_id).await?;
        if property.host_id != user.id {
            return Err(ServiceError::forbidden(
                "unauthorized: you can only view bookings for your own properties",
            ));
        }

        let page = page.normalized();
        let rows = self
            .bookings
            .list_by_property(property_id, page.offset(), page.limit)
            .await
            .map_err(ServiceError::store("failed to get property bookings"))?;
        Ok(rows.into_iter().map(BookingResponse::from).collect())
    }
}
