use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
    bookings::repo::BookingStore,
    dates::DateRange,
    error::{ServiceError, ServiceResult},
};

/// Answers whether a stay would collide with bookings that hold their dates.
#[derive(Clone)]
pub struct AvailabilityChecker {
    bookings: Arc<dyn BookingStore>,
}

impl AvailabilityChecker {
    pub fn new(bookings: Arc<dyn BookingStore>) -> Self {
        Self { bookings }
    }

    /// True when a pending or confirmed booking on the property intersects
    /// `range`. `exclude` drops one booking from the comparison so a booking
    /// being moved never collides with itself.
    pub async fn overlaps(
        &self,
        property_id: Uuid,
        range: DateRange,
        exclude: Option<Uuid>,
    ) -> ServiceResult<bool> {
        let clashes = self
            .bookings
            .conflicting(property_id, range)
            .await
            .map_err(ServiceError::store("failed to check availability"))?;

        let hit = clashes
            .iter()
            .filter(|b| Some(b.id) != exclude)
            .any(|b| b.conflicts_with(&range));
        debug!(%property_id, ?range, hit, "availability checked");
        Ok(hit)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::{
        bookings::repo_types::BookingStatus,
        memory::{MemoryStore, Seed},
    };

    fn range(a: time::Date, b: time::Date) -> DateRange {
        DateRange::new(a, b).unwrap()
    }

    #[tokio::test]
    async fn only_blocking_bookings_count() {
        let store = MemoryStore::default();
        let seed = Seed::new(&store).await;
        let checker = AvailabilityChecker::new(Arc::new(store.clone()));

        let booking = seed
            .booking(range(date!(2025 - 06 - 01), date!(2025 - 06 - 05)))
            .await;

        let stay = range(date!(2025 - 06 - 03), date!(2025 - 06 - 07));
        assert!(checker.overlaps(seed.property.id, stay, None).await.unwrap());

        store.set_booking_status(booking.id, BookingStatus::Cancelled);
        assert!(!checker.overlaps(seed.property.id, stay, None).await.unwrap());

        store.set_booking_status(booking.id, BookingStatus::Completed);
        assert!(!checker.overlaps(seed.property.id, stay, None).await.unwrap());
    }

    #[tokio::test]
    async fn excluded_booking_does_not_collide_with_itself() {
        let store = MemoryStore::default();
        let seed = Seed::new(&store).await;
        let checker = AvailabilityChecker::new(Arc::new(store.clone()));

        let booking = seed
            .booking(range(date!(2025 - 06 - 01), date!(2025 - 06 - 05)))
            .await;
        let moved = range(date!(2025 - 06 - 02), date!(2025 - 06 - 06));

        assert!(checker.overlaps(seed.property.id, moved, None).await.unwrap());
        assert!(!checker
            .overlaps(seed.property.id, moved, Some(booking.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn back_to_back_stays_are_free() {
        let store = MemoryStore::default();
        let seed = Seed::new(&store).await;
        let checker = AvailabilityChecker::new(Arc::new(store.clone()));

        seed.booking(range(date!(2025 - 06 - 01), date!(2025 - 06 - 05)))
            .await;
        let next = range(date!(2025 - 06 - 05), date!(2025 - 06 - 09));
        assert!(!checker.overlaps(seed.property.id, next, None).await.unwrap());
    }
}
