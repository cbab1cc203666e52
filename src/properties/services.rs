use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    bookings::availability::AvailabilityChecker,
    cache::Cache,
    dates::DateRange,
    error::{ServiceError, ServiceResult},
    pagination::{Page, Pagination},
    properties::{
        dto::{
            AvailabilityResponse, CreatePropertyRequest, SearchQuery, UpdatePropertyRequest,
            DEFAULT_CURRENCY,
        },
        repo::PropertyStore,
        repo_types::{NewProperty, Property, PropertySearch, PropertyStatus},
    },
};

pub const PROPERTY_NOT_FOUND: &str = "property not found";
pub const NOT_BOOKABLE: &str = "property is not available for booking";
pub const UPDATE_FORBIDDEN: &str = "unauthorized: you can only update your own properties";
pub const DELETE_FORBIDDEN: &str = "unauthorized: you can only delete your own properties";
pub const ACTIVATE_FORBIDDEN: &str = "only admins can activate properties";
pub const APPROVE_FORBIDDEN: &str = "only admins can approve properties";
pub const CREATE_FORBIDDEN: &str = "only hosts can create properties";

fn cache_key(id: Uuid) -> String {
    format!("property:{id}")
}

fn apply_patch(p: &mut Property, patch: UpdatePropertyRequest) {
    macro_rules! set {
        ($($field:ident),* $(,)?) => {
            $(if let Some(v) = patch.$field { p.$field = v; })*
        };
    }
    if let Some(title) = patch.title {
        p.title = title.trim().to_string();
    }
    set!(
        description,
        kind,
        status,
        price_per_night,
        currency,
        max_guests,
        bedrooms,
        bathrooms,
        address,
        city,
        state,
        country,
        zip_code,
        amenities,
        images,
        rules,
    );
    if patch.latitude.is_some() {
        p.latitude = patch.latitude;
    }
    if patch.longitude.is_some() {
        p.longitude = patch.longitude;
    }
    if patch.check_in_time.is_some() {
        p.check_in_time = patch.check_in_time;
    }
    if patch.check_out_time.is_some() {
        p.check_out_time = patch.check_out_time;
    }
}

pub struct PropertyService {
    properties: Arc<dyn PropertyStore>,
    availability: AvailabilityChecker,
    cache: Arc<dyn Cache>,
}

impl PropertyService {
    pub fn new(
        properties: Arc<dyn PropertyStore>,
        availability: AvailabilityChecker,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            properties,
            availability,
            cache,
        }
    }

    /// Straight from the store; never served from cache.
    async fn load(&self, id: Uuid) -> ServiceResult<Property> {
        self.properties
            .get(id)
            .await
            .map_err(ServiceError::store("failed to get property"))?
            .ok_or_else(|| ServiceError::not_found(PROPERTY_NOT_FOUND))
    }

    async fn cached(&self, id: Uuid) -> Option<Property> {
        let raw = match self.cache.get(&cache_key(id)).await {
            Ok(hit) => hit?,
            Err(e) => {
                warn!(error = %e, property_id = %id, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, property_id = %id, "cached property unreadable");
                None
            }
        }
    }

    async fn remember(&self, p: &Property) {
        let raw = match serde_json::to_string(p) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, property_id = %p.id, "encode property for cache failed");
                return;
            }
        };
        if let Err(e) = self.cache.set(&cache_key(p.id), &raw).await {
            warn!(error = %e, property_id = %p.id, "cache write failed");
        }
    }

    async fn forget(&self, id: Uuid) {
        if let Err(e) = self.cache.invalidate(&cache_key(id)).await {
            warn!(error = %e, property_id = %id, "cache invalidate failed");
        }
    }

    #[instrument(skip(self, req), fields(user_id = %user.id))]
    pub async fn create(&self, user: AuthUser, req: CreatePropertyRequest) -> ServiceResult<Property> {
        match user.role {
            Role::Host | Role::Admin => {}
            Role::Guest => return Err(ServiceError::forbidden(CREATE_FORBIDDEN)),
        }
        req.validate()?;

        let currency = req
            .currency
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let created = self
            .properties
            .create(NewProperty {
                host_id: user.id,
                title: req.title.trim().to_string(),
                description: req.description,
                kind: req.kind,
                price_per_night: req.price_per_night,
                currency,
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
            })
            .await
            .map_err(ServiceError::store("failed to create property"))?;

        info!(property_id = %created.id, "property created, awaiting approval");
        Ok(created)
    }

    /// Read-through: cache first, store on miss or cache failure.
    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> ServiceResult<Property> {
        if let Some(p) = self.cached(id).await {
            debug!(property_id = %id, "cache hit");
            return Ok(p);
        }
        let p = self.load(id).await?;
        self.remember(&p).await;
        Ok(p)
    }

    #[instrument(skip(self, patch), fields(user_id = %user.id))]
    pub async fn update(
        &self,
        user: AuthUser,
        id: Uuid,
        patch: UpdatePropertyRequest,
    ) -> ServiceResult<Property> {
        let mut property = self.load(id).await?;
        if property.host_id != user.id {
            return Err(ServiceError::forbidden(UPDATE_FORBIDDEN));
        }
        patch.validate()?;
        if patch.status == Some(PropertyStatus::Active) {
            return Err(ServiceError::forbidden(ACTIVATE_FORBIDDEN));
        }

        apply_patch(&mut property, patch);
        let saved = self
            .properties
            .update(&property)
            .await
            .map_err(ServiceError::store("failed to update property"))?;
        self.forget(id).await;

        info!(property_id = %id, "property updated");
        Ok(saved)
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn delete(&self, user: AuthUser, id: Uuid) -> ServiceResult<()> {
        let property = self.load(id).await?;
        if property.host_id != user.id {
            return Err(ServiceError::forbidden(DELETE_FORBIDDEN));
        }
        self.properties
            .soft_delete(id)
            .await
            .map_err(ServiceError::store("failed to delete property"))?;
        self.forget(id).await;

        info!(property_id = %id, "property deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(&self, page: Pagination) -> ServiceResult<Vec<Property>> {
        let page = page.normalized();
        self.properties
            .list_active(page.offset(), page.limit)
            .await
            .map_err(ServiceError::store("failed to get properties"))
    }

    #[instrument(skip(self, query))]
    pub async fn search(&self, query: SearchQuery) -> ServiceResult<Page<Property>> {
        let page = query.pagination();
        let available = match (query.check_in, query.check_out) {
            (Some(check_in), Some(check_out)) => Some(DateRange::new(check_in, check_out)?),
            _ => None,
        };
        let filter = PropertySearch {
            amenities: query.amenity_list(),
            city: query.city,
            state: query.state,
            country: query.country,
            guests: query.guests,
            min_price: query.min_price,
            max_price: query.max_price,
            kind: query.kind,
            available,
        };

        let (items, total) = self
            .properties
            .search(&filter, page.offset(), page.limit)
            .await
            .map_err(ServiceError::store("failed to search properties"))?;
        debug!(total, "search finished");

        Ok(Page {
            items,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(total),
        })
    }

    #[instrument(skip(self))]
    pub async fn by_host(&self, host_id: Uuid, page: Pagination) -> ServiceResult<Vec<Property>> {
        let page = page.normalized();
        self.properties
            .list_by_host(host_id, page.offset(), page.limit)
            .await
            .map_err(ServiceError::store("failed to get properties by host"))
    }

    #[instrument(skip(self))]
    pub async fn check_availability(
        &self,
        id: Uuid,
        range: DateRange,
    ) -> ServiceResult<AvailabilityResponse> {
        let property = self.load(id).await?;
        if property.status != PropertyStatus::Active {
            return Err(ServiceError::conflict(NOT_BOOKABLE));
        }
        let taken = self.availability.overlaps(id, range, None).await?;
        Ok(AvailabilityResponse {
            property_id: id,
            check_in: range.check_in(),
            check_out: range.check_out(),
            available: !taken,
        })
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn approve(&self, user: AuthUser, id: Uuid) -> ServiceResult<Property> {
        if !user.role.is_admin() {
            return Err(ServiceError::forbidden(APPROVE_FORBIDDEN));
        }
        let mut property = self.load(id).await?;
        property.status = PropertyStatus::Active;
        let saved = self
            .properties
            .update(&property)
            .await
            .map_err(ServiceError::store("failed to approve property"))?;
        self.forget(id).await;

        info!(property_id = %id, "property approved");
        Ok(saved)
    }
}
