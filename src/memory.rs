//! In-process entity store for exercising the services without Postgres.
//! One mutex guards every table, so each write is atomic like a transaction.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{NewUser, Role, User},
        AuthUser,
    },
    bookings::{
        repo::BookingStore,
        repo_types::{Booking, BookingDetails, BookingStatus, NewBooking},
    },
    dates::DateRange,
    error::{StoreError, StoreResult},
    properties::{
        dto::sample_create_request,
        repo::PropertyStore,
        repo_types::{NewProperty, Property, PropertySearch, PropertyStatus},
    },
    reviews::{
        repo::ReviewStore,
        repo_types::{NewReview, RatingSummary, Review, ReviewDetails},
    },
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    properties: Vec<Property>,
    deleted_properties: HashSet<Uuid>,
    bookings: Vec<Booking>,
    reviews: Vec<Review>,
    deleted_reviews: HashSet<Uuid>,
}

impl Tables {
    fn property(&self, id: Uuid) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    fn live_property(&self, id: Uuid) -> Option<&Property> {
        self.property(id)
            .filter(|p| !self.deleted_properties.contains(&p.id))
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn booking_details(&self, booking: &Booking) -> StoreResult<BookingDetails> {
        match (self.property(booking.property_id), self.user(booking.guest_id)) {
            (Some(property), Some(guest)) => Ok(BookingDetails {
                booking: booking.clone(),
                property: property.clone(),
                guest: guest.clone(),
            }),
            _ => Err(StoreError::Unavailable("dangling booking".into())),
        }
    }

    fn review_details(&self, review: &Review) -> StoreResult<ReviewDetails> {
        match (self.property(review.property_id), self.user(review.reviewer_id)) {
            (Some(property), Some(reviewer)) => Ok(ReviewDetails {
                review: review.clone(),
                property: property.clone(),
                reviewer: reviewer.clone(),
            }),
            _ => Err(StoreError::Unavailable("dangling review".into())),
        }
    }

    fn live_reviews(&self) -> impl DoubleEndedIterator<Item = &Review> + '_ {
        self.reviews
            .iter()
            .filter(|r| !self.deleted_reviews.contains(&r.id))
    }

    fn clashes(&self, property_id: Uuid, range: &DateRange, exclude: Option<Uuid>) -> bool {
        self.bookings
            .iter()
            .filter(|b| b.property_id == property_id && Some(b.id) != exclude)
            .any(|b| b.conflicts_with(range))
    }

    fn matches(&self, p: &Property, f: &PropertySearch) -> bool {
        let contains = |hay: &str, needle: &Option<String>| match needle.as_deref() {
            Some(n) if !n.is_empty() => hay.to_lowercase().contains(&n.to_lowercase()),
            _ => true,
        };
        p.status == PropertyStatus::Active
            && !self.deleted_properties.contains(&p.id)
            && contains(&p.city, &f.city)
            && contains(&p.state, &f.state)
            && contains(&p.country, &f.country)
            && f.guests.map_or(true, |g| p.max_guests >= g)
            && f.min_price.map_or(true, |m| p.price_per_night >= m)
            && f.max_price.map_or(true, |m| p.price_per_night <= m)
            && f.kind.map_or(true, |k| p.kind == k)
            && f.amenities.iter().all(|a| p.amenities.contains(a))
            && f
                .available
                .map_or(true, |range| !self.clashes(p.id, &range, None))
    }
}

fn page<T>(rows: impl Iterator<Item = T>, offset: i64, limit: i64) -> Vec<T> {
    rows.skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn set_user_active(&self, id: Uuid, active: bool) {
        let mut t = self.lock();
        if let Some(u) = t.users.iter_mut().find(|u| u.id == id) {
            u.is_active = active;
        }
    }

    pub fn set_property_status(&self, id: Uuid, status: PropertyStatus) {
        let mut t = self.lock();
        if let Some(p) = t.properties.iter_mut().find(|p| p.id == id) {
            p.status = status;
        }
    }

    pub fn set_booking_status(&self, id: Uuid, status: BookingStatus) {
        let mut t = self.lock();
        if let Some(b) = t.bookings.iter_mut().find(|b| b.id == id) {
            b.status = status;
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            role: user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock().user(id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn create(&self, p: NewProperty) -> StoreResult<Property> {
        let now = OffsetDateTime::now_utc();
        let row = Property {
            id: Uuid::new_v4(),
            host_id: p.host_id,
            title: p.title,
            description: p.description,
            kind: p.kind,
            status: PropertyStatus::Pending,
            price_per_night: p.price_per_night,
            currency: p.currency,
            max_guests: p.max_guests,
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            address: p.address,
            city: p.city,
            state: p.state,
            country: p.country,
            zip_code: p.zip_code,
            latitude: p.latitude,
            longitude: p.longitude,
            amenities: p.amenities,
            images: p.images,
            rules: p.rules,
            check_in_time: p.check_in_time,
            check_out_time: p.check_out_time,
            created_at: now,
            updated_at: now,
        };
        self.lock().properties.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Property>> {
        Ok(self.lock().live_property(id).cloned())
    }

    async fn update(&self, p: &Property) -> StoreResult<Property> {
        let mut t = self.lock();
        if t.deleted_properties.contains(&p.id) {
            return Err(StoreError::NotFound);
        }
        let slot = t
            .properties
            .iter_mut()
            .find(|row| row.id == p.id)
            .ok_or(StoreError::NotFound)?;
        *slot = Property {
            updated_at: OffsetDateTime::now_utc(),
            ..p.clone()
        };
        Ok(slot.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.lock();
        if t.live_property(id).is_none() {
            return Err(StoreError::NotFound);
        }
        t.deleted_properties.insert(id);
        Ok(())
    }

    async fn list_active(&self, offset: i64, limit: i64) -> StoreResult<Vec<Property>> {
        let t = self.lock();
        let rows = t.properties.iter().rev().filter(|p| {
            p.status == PropertyStatus::Active && !t.deleted_properties.contains(&p.id)
        });
        Ok(page(rows.cloned(), offset, limit))
    }

    async fn list_by_host(
        &self,
        host_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<Property>> {
        let t = self.lock();
        let rows = t
            .properties
            .iter()
            .rev()
            .filter(|p| p.host_id == host_id && !t.deleted_properties.contains(&p.id));
        Ok(page(rows.cloned(), offset, limit))
    }

    async fn search(
        &self,
        filter: &PropertySearch,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Property>, i64)> {
        let t = self.lock();
        let hits: Vec<Property> = t
            .properties
            .iter()
            .rev()
            .filter(|p| t.matches(p, filter))
            .cloned()
            .collect();
        let total = hits.len() as i64;
        Ok((page(hits.into_iter(), offset, limit), total))
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn create(&self, b: NewBooking) -> StoreResult<Booking> {
        let mut t = self.lock();
        if t.property(b.property_id).is_none() {
            return Err(StoreError::NotFound);
        }
        if t.clashes(b.property_id, &b.range, None) {
            return Err(StoreError::Conflict("bookings_no_overlap".into()));
        }
        let now = OffsetDateTime::now_utc();
        let row = Booking {
            id: Uuid::new_v4(),
            property_id: b.property_id,
            guest_id: b.guest_id,
            check_in: b.range.check_in(),
            check_out: b.range.check_out(),
            guests: b.guests,
            total_price: b.total_price,
            currency: b.currency,
            status: BookingStatus::Pending,
            notes: b.notes,
            created_at: now,
            updated_at: now,
        };
        t.bookings.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<BookingDetails>> {
        let t = self.lock();
        t.bookings
            .iter()
            .find(|b| b.id == id)
            .map(|b| t.booking_details(b))
            .transpose()
    }

    async fn list_by_guest(
        &self,
        guest_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<BookingDetails>> {
        let t = self.lock();
        let rows = t.bookings.iter().rev().filter(|b| b.guest_id == guest_id);
        page(rows, offset, limit)
            .into_iter()
            .map(|b| t.booking_details(b))
            .collect()
    }

    async fn list_by_property(
        &self,
        property_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<BookingDetails>> {
        let t = self.lock();
        let rows = t
            .bookings
            .iter()
            .rev()
            .filter(|b| b.property_id == property_id);
        page(rows, offset, limit)
            .into_iter()
            .map(|b| t.booking_details(b))
            .collect()
    }

    async fn update(&self, b: &Booking, expected: BookingStatus) -> StoreResult<Booking> {
        let mut t = self.lock();
        match t.bookings.iter().find(|row| row.id == b.id) {
            None => return Err(StoreError::NotFound),
            Some(row) if row.status != expected => return Err(StoreError::Stale),
            Some(_) => {}
        }
        if b.status.blocks_dates() {
            let range = DateRange::new(b.check_in, b.check_out)
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
            if t.clashes(b.property_id, &range, Some(b.id)) {
                return Err(StoreError::Conflict("bookings_no_overlap".into()));
            }
        }
        let slot = t
            .bookings
            .iter_mut()
            .find(|row| row.id == b.id)
            .ok_or(StoreError::NotFound)?;
        *slot = Booking {
            updated_at: OffsetDateTime::now_utc(),
            ..b.clone()
        };
        Ok(slot.clone())
    }

    async fn conflicting(&self, property_id: Uuid, range: DateRange) -> StoreResult<Vec<Booking>> {
        let t = self.lock();
        Ok(t.bookings
            .iter()
            .filter(|b| b.property_id == property_id && b.conflicts_with(&range))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn create(&self, r: NewReview) -> StoreResult<Review> {
        let mut t = self.lock();
        if t.live_reviews().any(|x| x.booking_id == r.booking_id) {
            return Err(StoreError::Conflict("reviews_booking_id_live".into()));
        }
        let now = OffsetDateTime::now_utc();
        let row = Review {
            id: Uuid::new_v4(),
            property_id: r.property_id,
            booking_id: r.booking_id,
            reviewer_id: r.reviewer_id,
            rating: r.rating,
            comment: r.comment,
            created_at: now,
            updated_at: now,
        };
        t.reviews.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<ReviewDetails>> {
        let t = self.lock();
        let found = t
            .live_reviews()
            .find(|r| r.id == id)
            .map(|r| t.review_details(r))
            .transpose();
        found
    }

    async fn get_by_booking(&self, booking_id: Uuid) -> StoreResult<Option<Review>> {
        Ok(self
            .lock()
            .live_reviews()
            .find(|r| r.booking_id == booking_id)
            .cloned())
    }

    async fn list_by_property(
        &self,
        property_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<ReviewDetails>> {
        let t = self.lock();
        let rows = t.live_reviews().rev().filter(|r| r.property_id == property_id);
        page(rows, offset, limit)
            .into_iter()
            .map(|r| t.review_details(r))
            .collect()
    }

    async fn list_by_reviewer(
        &self,
        reviewer_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<ReviewDetails>> {
        let t = self.lock();
        let rows = t.live_reviews().rev().filter(|r| r.reviewer_id == reviewer_id);
        page(rows, offset, limit)
            .into_iter()
            .map(|r| t.review_details(r))
            .collect()
    }

    async fn list_all(&self, offset: i64, limit: i64) -> StoreResult<Vec<ReviewDetails>> {
        let t = self.lock();
        page(t.live_reviews().rev(), offset, limit)
            .into_iter()
            .map(|r| t.review_details(r))
            .collect()
    }

    async fn update(&self, r: &Review) -> StoreResult<Review> {
        let mut t = self.lock();
        if t.deleted_reviews.contains(&r.id) {
            return Err(StoreError::NotFound);
        }
        let slot = t
            .reviews
            .iter_mut()
            .find(|row| row.id == r.id)
            .ok_or(StoreError::NotFound)?;
        slot.rating = r.rating;
        slot.comment = r.comment.clone();
        slot.updated_at = OffsetDateTime::now_utc();
        Ok(slot.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.lock();
        if !t.live_reviews().any(|r| r.id == id) {
            return Err(StoreError::NotFound);
        }
        t.deleted_reviews.insert(id);
        Ok(())
    }

    async fn rating(&self, property_id: Uuid) -> StoreResult<RatingSummary> {
        let t = self.lock();
        let ratings: Vec<i32> = t
            .live_reviews()
            .filter(|r| r.property_id == property_id)
            .map(|r| r.rating)
            .collect();
        let review_count = ratings.len() as i64;
        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().sum::<i32>() as f64 / ratings.len() as f64
        };
        Ok(RatingSummary {
            property_id,
            average_rating,
            review_count,
        })
    }
}

pub fn auth(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        role: user.role,
    }
}

/// A host with one active listing (100 USD/night, up to 4 guests), a guest
/// and an admin.
pub struct Seed {
    store: MemoryStore,
    pub host: User,
    pub guest: User,
    pub admin: User,
    pub property: Property,
}

impl Seed {
    pub async fn new(store: &MemoryStore) -> Self {
        let host = new_user(store, Role::Host).await;
        let guest = new_user(store, Role::Guest).await;
        let admin = new_user(store, Role::Admin).await;

        let req = sample_create_request();
        let created = PropertyStore::create(
            store,
            NewProperty {
                host_id: host.id,
                title: req.title,
                description: req.description,
                kind: req.kind,
                price_per_night: req.price_per_night,
                currency: "USD".into(),
                max_guests: req.max_guests,
                bedrooms: req.bedrooms,
                bathrooms: req.bathrooms,
                address: req.address,
                city: req.city,
                state: req.state,
                country: req.country,
                zip_code: req.zip_code,
                latitude: req.latitude,
                longitude: req.longitude,
                amenities: req.amenities,
                images: req.images,
                rules: req.rules,
                check_in_time: req.check_in_time,
                check_out_time: req.check_out_time,
            },
        )
        .await
        .unwrap();
        store.set_property_status(created.id, PropertyStatus::Active);
        let property = PropertyStore::get(store, created.id)
            .await
            .unwrap()
            .unwrap();

        Self {
            store: store.clone(),
            host,
            guest,
            admin,
            property,
        }
    }

    pub async fn user(&self, role: Role) -> User {
        new_user(&self.store, role).await
    }

    /// A pending booking by the seeded guest on the seeded listing.
    pub async fn booking(&self, range: DateRange) -> Booking {
        BookingStore::create(
            &self.store,
            NewBooking {
                property_id: self.property.id,
                guest_id: self.guest.id,
                range,
                guests: 2,
                total_price: range.nights() as f64 * self.property.price_per_night,
                currency: self.property.currency.clone(),
                notes: None,
            },
        )
        .await
        .unwrap()
    }
}

async fn new_user(store: &MemoryStore, role: Role) -> User {
    UserStore::create(
        store,
        NewUser {
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "not-a-real-hash".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            phone: None,
            role,
        },
    )
    .await
    .unwrap()
}
