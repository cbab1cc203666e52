use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    auth::repo::users_by_ids,
    bookings::repo_types::{Booking, BookingDetails, BookingStatus, NewBooking},
    dates::DateRange,
    error::{StoreError, StoreResult},
    properties::repo::properties_by_ids,
};

const BOOKING_COLUMNS: &str = "id, property_id, guest_id, check_in, check_out, guests, \
                               total_price, currency, status, notes, created_at, updated_at";

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a pending booking. Fails with `Conflict` when a pending or
    /// confirmed booking on the same property overlaps; the check and the
    /// insert happen atomically.
    async fn create(&self, booking: NewBooking) -> StoreResult<Booking>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<BookingDetails>>;

    /// Newest first.
    async fn list_by_guest(
        &self,
        guest_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<BookingDetails>>;

    /// Newest first.
    async fn list_by_property(
        &self,
        property_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<BookingDetails>>;

    /// Writes every mutable field at once, provided the stored status is
    /// still `expected` (`Stale` otherwise). While the booking still holds
    /// its dates they are re-checked against the other bookings in the same
    /// atomic step, failing with `Conflict` on overlap.
    async fn update(&self, booking: &Booking, expected: BookingStatus) -> StoreResult<Booking>;

    /// Pending or confirmed bookings on `property_id` intersecting `range`.
    async fn conflicting(&self, property_id: Uuid, range: DateRange) -> StoreResult<Vec<Booking>>;
}

#[derive(Clone)]
pub struct PgBookingStore {
    db: PgPool,
}

impl PgBookingStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn hydrate(&self, bookings: Vec<Booking>) -> StoreResult<Vec<BookingDetails>> {
        let property_ids: Vec<Uuid> = bookings.iter().map(|b| b.property_id).collect();
        let guest_ids: Vec<Uuid> = bookings.iter().map(|b| b.guest_id).collect();
        let properties = properties_by_ids(&self.db, &property_ids).await?;
        let guests = users_by_ids(&self.db, &guest_ids).await?;

        bookings
            .into_iter()
            .map(|booking| {
                let property = properties.get(&booking.property_id).cloned();
                let guest = guests.get(&booking.guest_id).cloned();
                match (property, guest) {
                    (Some(property), Some(guest)) => Ok(BookingDetails {
                        booking,
                        property,
                        guest,
                    }),
                    _ => Err(StoreError::Unavailable(format!(
                        "booking {} references a missing property or guest",
                        booking.id
                    ))),
                }
            })
            .collect()
    }
}

/// Locks the property row. Concurrent writers for the same property queue here.
async fn lock_property(tx: &mut Transaction<'_, Postgres>, property_id: Uuid) -> StoreResult<()> {
    sqlx::query("SELECT id FROM properties WHERE id = $1 FOR UPDATE")
        .bind(property_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::NotFound)?;
    Ok(())
}

/// Looks for blocking bookings overlapping `range`. Call with the property locked.
async fn check_overlap(
    tx: &mut Transaction<'_, Postgres>,
    property_id: Uuid,
    range: DateRange,
    exclude: Option<Uuid>,
) -> StoreResult<()> {
    let clash: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM bookings
            WHERE property_id = $1
              AND status IN ('pending', 'confirmed')
              AND NOT (check_out <= $2 OR check_in >= $3)
              AND ($4::uuid IS NULL OR id <> $4)
        )
        "#,
    )
    .bind(property_id)
    .bind(range.check_in())
    .bind(range.check_out())
    .bind(exclude)
    .fetch_one(&mut **tx)
    .await?;

    if clash {
        return Err(StoreError::Conflict(
            "overlapping booking for this property".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn create(&self, b: NewBooking) -> StoreResult<Booking> {
        let mut tx = self.db.begin().await?;
        lock_property(&mut tx, b.property_id).await?;
        check_overlap(&mut tx, b.property_id, b.range, None).await?;

        let sql = format!(
            r#"
            INSERT INTO bookings (property_id, guest_id, check_in, check_out, guests,
                                  total_price, currency, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            RETURNING {BOOKING_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(b.property_id)
            .bind(b.guest_id)
            .bind(b.range.check_in())
            .bind(b.range.check_out())
            .bind(b.guests)
            .bind(b.total_price)
            .bind(&b.currency)
            .bind(&b.notes)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<BookingDetails>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let Some(row) = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
        else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row]).await?.pop())
    }

    async fn list_by_guest(
        &self,
        guest_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<BookingDetails>> {
        let sql = format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE guest_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, Booking>(&sql)
            .bind(guest_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        self.hydrate(rows).await
    }

    async fn list_by_property(
        &self,
        property_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<BookingDetails>> {
        let sql = format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE property_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, Booking>(&sql)
            .bind(property_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        self.hydrate(rows).await
    }

    async fn update(&self, b: &Booking, expected: BookingStatus) -> StoreResult<Booking> {
        let mut tx = self.db.begin().await?;
        // property first, then booking: the same order as create
        lock_property(&mut tx, b.property_id).await?;

        let stored: BookingStatus =
            sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(b.id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound)?;
        if stored != expected {
            return Err(StoreError::Stale);
        }

        if b.status.blocks_dates() {
            let range = DateRange::new(b.check_in, b.check_out)
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
            check_overlap(&mut tx, b.property_id, range, Some(b.id)).await?;
        }

        let sql = format!(
            r#"
            UPDATE bookings SET
                check_in = $2, check_out = $3, guests = $4, total_price = $5,
                status = $6, notes = $7, updated_at = now()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(b.id)
            .bind(b.check_in)
            .bind(b.check_out)
            .bind(b.guests)
            .bind(b.total_price)
            .bind(b.status)
            .bind(&b.notes)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn conflicting(&self, property_id: Uuid, range: DateRange) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE property_id = $1
              AND status IN ('pending', 'confirmed')
              AND NOT (check_out <= $2 OR check_in >= $3)
            "#
        );
        let rows = sqlx::query_as::<_, Booking>(&sql)
            .bind(property_id)
            .bind(range.check_in())
            .bind(range.check_out())
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }
}
