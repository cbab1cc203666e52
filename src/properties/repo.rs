use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{StoreError, StoreResult},
    properties::repo_types::{NewProperty, Property, PropertySearch},
};

pub(crate) const PROPERTY_COLUMNS: &str = "id, host_id, title, description, property_type, status, \
     price_per_night, currency, max_guests, bedrooms, bathrooms, address, city, state, country, \
     zip_code, latitude, longitude, amenities, images, rules, check_in_time, check_out_time, \
     created_at, updated_at";

#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn create(&self, property: NewProperty) -> StoreResult<Property>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<Property>>;
    async fn update(&self, property: &Property) -> StoreResult<Property>;
    async fn soft_delete(&self, id: Uuid) -> StoreResult<()>;
    async fn list_active(&self, offset: i64, limit: i64) -> StoreResult<Vec<Property>>;
    async fn list_by_host(&self, host_id: Uuid, offset: i64, limit: i64)
        -> StoreResult<Vec<Property>>;
    /// Returns the requested page and the total number of matches.
    async fn search(
        &self,
        filter: &PropertySearch,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Property>, i64)>;
}

#[derive(Clone)]
pub struct PgPropertyStore {
    db: PgPool,
}

impl PgPropertyStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Escapes LIKE metacharacters so user input only matches literally.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_search_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PropertySearch) {
    qb.push(" WHERE deleted_at IS NULL AND status = 'active'");

    for (column, value) in [
        ("city", &filter.city),
        ("state", &filter.state),
        ("country", &filter.country),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            qb.push(format!(" AND {column} ILIKE "))
                .push_bind(contains_pattern(value));
        }
    }
    if let Some(guests) = filter.guests {
        qb.push(" AND max_guests >= ").push_bind(guests);
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND price_per_night >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND price_per_night <= ").push_bind(max);
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND property_type = ").push_bind(kind);
    }
    if !filter.amenities.is_empty() {
        qb.push(" AND amenities @> ").push_bind(filter.amenities.clone());
    }
    if let Some(range) = filter.available {
        qb.push(
            " AND NOT EXISTS (SELECT 1 FROM bookings b \
               WHERE b.property_id = properties.id \
                 AND b.status IN ('pending', 'confirmed') \
                 AND NOT (b.check_out <= ",
        )
        .push_bind(range.check_in())
        .push(" OR b.check_in >= ")
        .push_bind(range.check_out())
        .push("))");
    }
}

#[async_trait]
impl PropertyStore for PgPropertyStore {
    async fn create(&self, p: NewProperty) -> StoreResult<Property> {
        let sql = format!(
            r#"
            INSERT INTO properties (
                host_id, title, description, property_type, status, price_per_night, currency,
                max_guests, bedrooms, bathrooms, address, city, state, country, zip_code,
                latitude, longitude, amenities, images, rules, check_in_time, check_out_time
            )
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21)
            RETURNING {PROPERTY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Property>(&sql)
            .bind(p.host_id)
            .bind(&p.title)
            .bind(&p.description)
            .bind(p.kind)
            .bind(p.price_per_night)
            .bind(&p.currency)
            .bind(p.max_guests)
            .bind(p.bedrooms)
            .bind(p.bathrooms)
            .bind(&p.address)
            .bind(&p.city)
            .bind(&p.state)
            .bind(&p.country)
            .bind(&p.zip_code)
            .bind(p.latitude)
            .bind(p.longitude)
            .bind(&p.amenities)
            .bind(&p.images)
            .bind(&p.rules)
            .bind(p.check_in_time)
            .bind(p.check_out_time)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Property>> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, Property>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn update(&self, p: &Property) -> StoreResult<Property> {
        let sql = format!(
            r#"
            UPDATE properties SET
                title = $2, description = $3, property_type = $4, status = $5,
                price_per_night = $6, currency = $7, max_guests = $8, bedrooms = $9,
                bathrooms = $10, address = $11, city = $12, state = $13, country = $14,
                zip_code = $15, latitude = $16, longitude = $17, amenities = $18, images = $19,
                rules = $20, check_in_time = $21, check_out_time = $22, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PROPERTY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Property>(&sql)
            .bind(p.id)
            .bind(&p.title)
            .bind(&p.description)
            .bind(p.kind)
            .bind(p.status)
            .bind(p.price_per_night)
            .bind(&p.currency)
            .bind(p.max_guests)
            .bind(p.bedrooms)
            .bind(p.bathrooms)
            .bind(&p.address)
            .bind(&p.city)
            .bind(&p.state)
            .bind(&p.country)
            .bind(&p.zip_code)
            .bind(p.latitude)
            .bind(p.longitude)
            .bind(&p.amenities)
            .bind(&p.images)
            .bind(&p.rules)
            .bind(p.check_in_time)
            .bind(p.check_out_time)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<()> {
        let done = sqlx::query(
            "UPDATE properties SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_active(&self, offset: i64, limit: i64) -> StoreResult<Vec<Property>> {
        let sql = format!(
            r#"
            SELECT {PROPERTY_COLUMNS}
            FROM properties
            WHERE status = 'active' AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query_as::<_, Property>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn list_by_host(
        &self,
        host_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<Property>> {
        let sql = format!(
            r#"
            SELECT {PROPERTY_COLUMNS}
            FROM properties
            WHERE host_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, Property>(&sql)
            .bind(host_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn search(
        &self,
        filter: &PropertySearch,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Property>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM properties");
        push_search_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut page = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties"
        ));
        push_search_filters(&mut page, filter);
        page.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = page
            .build_query_as::<Property>()
            .fetch_all(&self.db)
            .await?;

        Ok((rows, total))
    }
}

/// Loads listings for hydrating joined records. Soft-deleted rows are included.
pub(crate) async fn properties_by_ids(
    db: &PgPool,
    ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, Property>> {
    let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ANY($1)");
    let rows = sqlx::query_as::<_, Property>(&sql)
        .bind(ids)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(contains_pattern("Lisbon"), "%Lisbon%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn search_sql_only_filters_requested_fields() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM properties");
        push_search_filters(
            &mut qb,
            &PropertySearch {
                city: Some("porto".into()),
                guests: Some(4),
                amenities: vec!["wifi".into()],
                ..Default::default()
            },
        );
        let sql = qb.sql();
        assert!(sql.contains("status = 'active'"));
        assert!(sql.contains("city ILIKE $1"));
        assert!(sql.contains("max_guests >= $2"));
        assert!(sql.contains("amenities @> $3"));
        assert!(!sql.contains("country"));
        assert!(!sql.contains("NOT EXISTS"));
    }
}
