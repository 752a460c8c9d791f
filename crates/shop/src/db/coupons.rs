//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use stockhub_core::{CouponId, DiscountType};

use crate::models::coupon::normalize_code;
use crate::models::{Coupon, CouponUpdate, NewCoupon, Page};
use crate::store::StoreError;

const COUPON_COLUMNS: &str = "coupon_id, code, discount_type, discount_value, max_uses, uses, \
     expires_at, is_active, created_at";

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    coupon_id: CouponId,
    code: String,
    discount_type: DiscountType,
    discount_value: Decimal,
    max_uses: Option<i32>,
    uses: i32,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: row.coupon_id,
            code: row.code,
            discount_type: row.discount_type,
            discount_value: row.discount_value,
            max_uses: row.max_uses,
            uses: row.uses,
            expires_at: row.expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a coupon with a normalized code.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the code already exists.
    pub async fn create(&self, coupon: &NewCoupon) -> Result<Coupon, StoreError> {
        let sql = format!(
            r"
            INSERT INTO coupons (code, discount_type, discount_value, max_uses, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COUPON_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(normalize_code(&coupon.code))
            .bind(coupon.discount_type)
            .bind(coupon.discount_value)
            .bind(coupon.max_uses)
            .bind(coupon.expires_at)
            .bind(coupon.is_active)
            .fetch_one(self.pool)
            .await?;

        Ok(row.into())
    }

    /// Find a coupon by code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1");
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(normalize_code(code))
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Get a coupon by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn get_by_id(&self, id: CouponId) -> Result<Option<Coupon>, StoreError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE coupon_id = $1");
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// List coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn list(&self, page: Page) -> Result<Vec<Coupon>, StoreError> {
        let sql = format!(
            "SELECT {COUPON_COLUMNS} FROM coupons \
             ORDER BY created_at DESC, coupon_id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Apply a partial update. The row is left alone when the new
    /// `max_uses` would fall below the uses already consumed.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the coupon does not exist
    /// - `StoreError::Conflict` if `max_uses` is below the current use count
    pub async fn update(&self, id: CouponId, update: &CouponUpdate) -> Result<Coupon, StoreError> {
        let sql = format!(
            r"
            UPDATE coupons SET
                discount_type = COALESCE($2, discount_type),
                discount_value = COALESCE($3, discount_value),
                max_uses = COALESCE($4, max_uses),
                expires_at = COALESCE($5, expires_at),
                is_active = COALESCE($6, is_active)
            WHERE coupon_id = $1
              AND (COALESCE($4, max_uses) IS NULL OR uses <= COALESCE($4, max_uses))
            RETURNING {COUPON_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(id)
            .bind(update.discount_type)
            .bind(update.discount_value)
            .bind(update.max_uses)
            .bind(update.expires_at)
            .bind(update.is_active)
            .fetch_optional(self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }
        match self.get_by_id(id).await? {
            Some(existing) => Err(StoreError::Conflict(format!(
                "coupon {id} already used {} times",
                existing.uses
            ))),
            None => Err(StoreError::not_found(format!("coupon {id}"))),
        }
    }

    /// Delete a coupon.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM coupons WHERE coupon_id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("coupon {id}")));
        }
        Ok(())
    }

    /// Consume one use. The guard makes concurrent redemptions safe: at most
    /// `max_uses` of them can ever succeed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn apply(&self, id: CouponId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE coupons
            SET uses = uses + 1
            WHERE coupon_id = $1 AND (max_uses IS NULL OR uses < max_uses)
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
